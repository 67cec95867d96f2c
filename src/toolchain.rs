//! External toolchain discovery and image probing.
//!
//! The primary editor is ImageMagick, in either of its two command forms:
//! the version 7 `magick` binary (where identify is spelled `magick
//! identify`) or the legacy `convert` + `identify` pair. Specialized lossy
//! codecs (`cwebp`/`dwebp`, `cjpeg`/`djpeg`) are optional; when a full
//! decode/encode pair is present, `optimize` prefers it over the generic
//! editor.
//!
//! Discovery runs once at startup and the resulting [`Toolchain`] value is
//! passed into the pipeline — there is no global, so tests construct their
//! own and execute against a mock runner.

use crate::exec::{CommandRunner, Invocation};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("missing ImageMagick (need `magick` or both `convert` + `identify`)")]
    MissingEditor,
}

/// The two interchangeable ImageMagick front-ends.
#[derive(Debug, Clone)]
enum Editor {
    /// ImageMagick 7: a single `magick` binary.
    Magick(PathBuf),
    /// ImageMagick 6: separate `convert` and `identify` binaries.
    Legacy { convert: PathBuf, identify: PathBuf },
}

/// Discovered paths and availability of the external binaries.
#[derive(Debug, Clone)]
pub struct Toolchain {
    editor: Editor,
    pub cwebp: Option<PathBuf>,
    pub dwebp: Option<PathBuf>,
    pub cjpeg: Option<PathBuf>,
    pub djpeg: Option<PathBuf>,
}

impl Toolchain {
    /// Probe PATH for the editor and the optional codecs.
    pub fn detect() -> Result<Self, ToolchainError> {
        Self::with_lookup(find_in_path)
    }

    /// Discovery with an injectable lookup, so tests can fake PATH contents.
    pub(crate) fn with_lookup(
        lookup: impl Fn(&str) -> Option<PathBuf>,
    ) -> Result<Self, ToolchainError> {
        let editor = if let Some(magick) = lookup("magick") {
            Editor::Magick(magick)
        } else {
            match (lookup("convert"), lookup("identify")) {
                (Some(convert), Some(identify)) => Editor::Legacy { convert, identify },
                _ => return Err(ToolchainError::MissingEditor),
            }
        };

        Ok(Self {
            editor,
            cwebp: lookup("cwebp"),
            dwebp: lookup("dwebp"),
            cjpeg: lookup("cjpeg"),
            djpeg: lookup("djpeg"),
        })
    }

    /// Identifier echoed in the summary so consumers know which form ran.
    pub fn backend_id(&self) -> &'static str {
        match &self.editor {
            Editor::Magick(_) => "imagemagick:magick",
            Editor::Legacy { .. } => "imagemagick:convert",
        }
    }

    /// Start an edit command reading `input`.
    pub fn edit_command(&self, input: &Path) -> Invocation {
        match &self.editor {
            Editor::Magick(magick) => Invocation::new(magick.display().to_string()).arg_path(input),
            Editor::Legacy { convert, .. } => {
                Invocation::new(convert.display().to_string()).arg_path(input)
            }
        }
    }

    fn identify_command(&self) -> Invocation {
        match &self.editor {
            Editor::Magick(magick) => {
                Invocation::new(magick.display().to_string()).arg("identify")
            }
            Editor::Legacy { identify, .. } => Invocation::new(identify.display().to_string()),
        }
    }

    pub fn has_jpeg_pair(&self) -> bool {
        self.cjpeg.is_some() && self.djpeg.is_some()
    }

    pub fn has_webp_pair(&self) -> bool {
        self.cwebp.is_some() && self.dwebp.is_some()
    }

    /// Probe one file. A failed probe yields an (almost) empty info rather
    /// than an error — operations that need dimensions fail per item later.
    pub fn probe(&self, runner: &dyn CommandRunner, path: &Path) -> ImageInfo {
        let mut info = ImageInfo {
            size_bytes: std::fs::metadata(path).map(|m| m.len()).ok(),
            ..ImageInfo::default()
        };

        let cmd = self
            .identify_command()
            .arg("-ping")
            .arg("-format")
            .arg("%m|%w|%h|%[channels]|%[exif:Orientation]")
            .arg_path(path);

        let Ok(out) = runner.run(&cmd) else {
            return info;
        };
        if !out.success() {
            return info;
        }
        // Multi-frame images emit one record per frame; the first one wins.
        if let Some(first) = out.stdout.lines().next() {
            parse_identify_line(first, &mut info);
        }
        info
    }

    #[cfg(test)]
    pub(crate) fn fake_magick() -> Self {
        Self {
            editor: Editor::Magick(PathBuf::from("magick")),
            cwebp: None,
            dwebp: None,
            cjpeg: None,
            djpeg: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn fake_full() -> Self {
        Self {
            editor: Editor::Magick(PathBuf::from("magick")),
            cwebp: Some(PathBuf::from("cwebp")),
            dwebp: Some(PathBuf::from("dwebp")),
            cjpeg: Some(PathBuf::from("cjpeg")),
            djpeg: Some(PathBuf::from("djpeg")),
        }
    }

    #[cfg(test)]
    pub(crate) fn fake_legacy() -> Self {
        Self {
            editor: Editor::Legacy {
                convert: PathBuf::from("convert"),
                identify: PathBuf::from("identify"),
            },
            cwebp: None,
            dwebp: None,
            cjpeg: None,
            djpeg: None,
        }
    }
}

/// Probed facts about one image file, recomputed after every write.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageInfo {
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<String>,
    pub alpha: Option<bool>,
    pub exif_orientation: Option<String>,
    pub size_bytes: Option<u64>,
}

impl ImageInfo {
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha == Some(true)
    }
}

/// Parse one `identify -format "%m|%w|%h|%[channels]|%[exif:Orientation]"`
/// record into `info`. Fields are best-effort: whatever parses, lands.
fn parse_identify_line(line: &str, info: &mut ImageInfo) {
    let parts: Vec<&str> = line.split('|').collect();

    if let Some(format) = parts.first().map(|s| s.trim())
        && !format.is_empty()
    {
        info.format = Some(format.to_string());
    }
    if parts.len() >= 3
        && let (Ok(w), Ok(h)) = (parts[1].trim().parse(), parts[2].trim().parse())
    {
        info.width = Some(w);
        info.height = Some(h);
    }
    if let Some(channels) = parts.get(3).map(|s| s.trim())
        && !channels.is_empty()
    {
        // "srgba"/"graya"/"cmyka" carry an alpha channel; "gray" does not.
        info.alpha = Some(channels.to_lowercase().ends_with('a'));
        info.channels = Some(channels.to_string());
    }
    if let Some(orientation) = parts.get(4).map(|s| s.trim())
        && !orientation.is_empty()
    {
        info.exif_orientation = Some(orientation.to_string());
    }
}

/// Locate an executable on PATH. The pack has no `which`-style dependency,
/// so this stays a private helper.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
