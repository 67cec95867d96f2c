//! Operation descriptions: *what* to do, not *how* to do it.
//!
//! [`Operation`] is one variant per subcommand, each carrying only the
//! parameters that operation accepts — an illegal flag combination is not
//! representable. The planning module turns an `Operation` plus probed image
//! facts into external command lines.

use crate::geometry::{CropRect, ResizeRequest};

/// Target container formats `convert` can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConvertTarget {
    Png,
    Jpg,
    Webp,
}

impl ConvertTarget {
    pub fn ext(self) -> &'static str {
        match self {
            ConvertTarget::Png => "png",
            ConvertTarget::Jpg => "jpg",
            ConvertTarget::Webp => "webp",
        }
    }
}

/// Anchor for crops and padding, matching ImageMagick's gravity names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Gravity {
    #[default]
    Center,
    North,
    South,
    East,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Gravity {
    pub fn as_magick(self) -> &'static str {
        match self {
            Gravity::Center => "center",
            Gravity::North => "north",
            Gravity::South => "south",
            Gravity::East => "east",
            Gravity::West => "west",
            Gravity::Northeast => "northeast",
            Gravity::Northwest => "northwest",
            Gravity::Southeast => "southeast",
            Gravity::Southwest => "southwest",
        }
    }
}

/// Crop source of truth — exactly one, by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropSpec {
    /// Explicit rectangle, anchored at its own offsets.
    Rect(CropRect),
    /// Explicit size, anchored at the gravity.
    Size(u32, u32),
    /// Largest rectangle of this ratio that fits, anchored at the gravity.
    Aspect(u32, u32),
}

/// One operation with its validated parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Info,
    AutoOrient,
    Convert {
        to: ConvertTarget,
        quality: Option<u8>,
    },
    Resize {
        request: ResizeRequest,
        /// Render at 2x before box fitting to reduce aliasing.
        pre_upscale: bool,
    },
    Rotate {
        /// Degrees clockwise; negatives rotate counter-clockwise.
        degrees: i32,
    },
    Crop {
        spec: CropSpec,
        gravity: Gravity,
    },
    Pad {
        width: u32,
        height: u32,
        gravity: Gravity,
    },
    Flip,
    Flop,
    Optimize {
        quality: Option<u8>,
        lossless: bool,
        progressive: bool,
    },
}

impl Operation {
    /// Subcommand spelling, echoed in summaries and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Info => "info",
            Operation::AutoOrient => "auto-orient",
            Operation::Convert { .. } => "convert",
            Operation::Resize { .. } => "resize",
            Operation::Rotate { .. } => "rotate",
            Operation::Crop { .. } => "crop",
            Operation::Pad { .. } => "pad",
            Operation::Flip => "flip",
            Operation::Flop => "flop",
            Operation::Optimize { .. } => "optimize",
        }
    }

    /// Whether this operation derives and writes output files.
    pub fn writes_output(&self) -> bool {
        !matches!(self, Operation::Info)
    }

    /// Whether the shared auto-orient toggle applies. `info` never
    /// transforms and `auto-orient` *is* the orientation step.
    pub fn honors_auto_orient(&self) -> bool {
        !matches!(self, Operation::Info | Operation::AutoOrient)
    }

    /// The extension the output must carry: `convert` pins it to the
    /// target format, every other operation pins it to the input's.
    pub fn forced_ext(&self) -> Option<&'static str> {
        match self {
            Operation::Convert { to, .. } => Some(to.ext()),
            _ => None,
        }
    }
}

/// Options shared by every output-producing operation.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub overwrite: bool,
    pub dry_run: bool,
    pub auto_orient: bool,
    pub strip_metadata: bool,
    pub background: Option<String>,
    pub report: bool,
}
