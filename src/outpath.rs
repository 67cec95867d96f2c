//! Output modes, path derivation, and safe writes.
//!
//! Exactly one output mode is chosen per run. In-place rewrites are gated
//! behind an explicit confirmation flag. Under directory output, two inputs
//! may derive the same output path (same stem, different source dirs); that
//! collision aborts the whole batch before anything is written — it is the
//! only whole-batch-fatal validation.
//!
//! Writes go to a temp sibling first and are renamed over the final path, so
//! a crashed external command never leaves a half-written output visible.

use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutPathError {
    #[error("must specify exactly one output mode: --out, --out-dir, or --in-place")]
    ModeUnchosen,
    #[error("--in-place is destructive and requires --yes")]
    InPlaceNeedsYes,
    #[error("--out requires exactly one input file")]
    SingleInputRequired,
    #[error("--out extension must match --to {expected}: {path}")]
    ConvertExtMismatch { expected: &'static str, path: String },
    #[error("optimize does not change formats; output extension must match input")]
    OptimizeExtMismatch,
    #[error("only convert changes formats; output extension must match input")]
    ExtMismatch,
    #[error("output exists (pass --overwrite to replace): {0}")]
    Exists(String),
    #[error("output collisions detected; colliding paths: {}", .0.join(", "))]
    Collisions(Vec<String>),
}

/// Where outputs land — one of three, never a mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Single explicit output file; valid only with exactly one input.
    File(PathBuf),
    /// One output per input, input stem preserved, inside this directory.
    Dir(PathBuf),
    /// Rewrite each input where it stands.
    InPlace,
}

impl OutputMode {
    /// Resolve the three CLI flags into a mode. The CLI layer already
    /// enforces exclusivity; this keeps the library API safe on its own.
    pub fn resolve(
        out: Option<PathBuf>,
        out_dir: Option<PathBuf>,
        in_place: bool,
        yes: bool,
    ) -> Result<Self, OutPathError> {
        let chosen = usize::from(out.is_some()) + usize::from(out_dir.is_some()) + usize::from(in_place);
        if chosen != 1 {
            return Err(OutPathError::ModeUnchosen);
        }
        if in_place && !yes {
            return Err(OutPathError::InPlaceNeedsYes);
        }
        if let Some(out) = out {
            return Ok(OutputMode::File(out));
        }
        if let Some(dir) = out_dir {
            return Ok(OutputMode::Dir(dir));
        }
        Ok(OutputMode::InPlace)
    }

    pub fn is_in_place(&self) -> bool {
        matches!(self, OutputMode::InPlace)
    }
}

/// Lowercased extension with `jpeg` folded into `jpg`.
pub fn ext_normalize(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ext == "jpeg" { "jpg".to_string() } else { ext }
}

/// Formats that can carry an alpha channel on output.
pub fn supports_alpha(ext: &str) -> bool {
    matches!(ext, "png" | "webp")
}

/// Formats with no alpha channel at all.
pub fn is_opaque_format(ext: &str) -> bool {
    ext == "jpg"
}

/// Derive the output path for one input under the chosen mode.
///
/// `forced_ext` pins the extension under directory output (set for
/// `convert`); otherwise the input's normalized extension is kept.
pub fn derive_out_path(mode: &OutputMode, input: &Path, forced_ext: Option<&str>) -> PathBuf {
    match mode {
        OutputMode::InPlace => input.to_path_buf(),
        OutputMode::File(path) => path.clone(),
        OutputMode::Dir(dir) => {
            let ext = match forced_ext {
                Some(ext) => ext.to_string(),
                None => ext_normalize(input),
            };
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if ext.is_empty() {
                dir.join(input.file_name().map(PathBuf::from).unwrap_or_default())
            } else {
                dir.join(format!("{stem}.{ext}"))
            }
        }
    }
}

/// Enforce the output-extension rule for the operation.
pub fn check_extension(
    operation_name: &str,
    forced_ext: Option<&'static str>,
    input: &Path,
    output: &Path,
) -> Result<(), OutPathError> {
    let out_ext = ext_normalize(output);

    if let Some(expected) = forced_ext {
        if out_ext != expected {
            return Err(OutPathError::ConvertExtMismatch {
                expected,
                path: output.display().to_string(),
            });
        }
        return Ok(());
    }

    if out_ext != ext_normalize(input) {
        return Err(if operation_name == "optimize" {
            OutPathError::OptimizeExtMismatch
        } else {
            OutPathError::ExtMismatch
        });
    }
    Ok(())
}

/// Detect two inputs mapping to the same output path. Returns every
/// colliding path once, sorted, for the batch-abort message.
pub fn find_collisions(planned: &[(PathBuf, PathBuf)]) -> Vec<String> {
    let mut first_input: HashMap<&Path, &Path> = HashMap::new();
    let mut colliding: Vec<String> = Vec::new();

    for (input, output) in planned {
        if first_input.insert(output.as_path(), input.as_path()).is_some() {
            let display = output.display().to_string();
            if !colliding.contains(&display) {
                colliding.push(display);
            }
        }
    }
    colliding.sort();
    colliding
}

/// Refuse to clobber an existing output unless `--overwrite` was given.
pub fn check_overwrite(path: &Path, overwrite: bool) -> Result<(), OutPathError> {
    if path.exists() && !overwrite {
        return Err(OutPathError::Exists(path.display().to_string()));
    }
    Ok(())
}

/// A hidden temp sibling of `final_path`, same extension so the external
/// tool infers the right container format.
pub fn temp_write_path(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..8)
            .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
            .collect()
    };
    let ext = final_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    final_path.with_file_name(format!(".{stem}.tmp-{suffix}{ext}"))
}

/// A temp sibling for intermediate decode output (e.g. the PAM handoff in
/// the webp re-encode pipeline).
pub fn temp_intermediate_path(final_path: &Path, ext: &str) -> PathBuf {
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..8)
            .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
            .collect()
    };
    final_path.with_file_name(format!(".tmp-{suffix}.{ext}"))
}

/// Move the finished temp file over the final path.
pub fn atomic_replace(tmp: &Path, final_path: &Path) -> std::io::Result<()> {
    std::fs::rename(tmp, final_path)
}
