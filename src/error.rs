//! Top-level error taxonomy and exit-code mapping.
//!
//! Per-item failures never surface here — they are recorded on the item and
//! the batch continues. What does surface: usage mistakes (exit 2, detected
//! before anything is written) and environment/runtime failures (exit 1).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    /// Anything the user fixes by editing the invocation: bad flag
    /// combinations, malformed geometry, unresolvable inputs, extension
    /// mismatches, output collisions.
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Toolchain(#[from] crate::toolchain::ToolchainError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            _ => 1,
        }
    }
}

impl From<crate::inputs::InputError> for CliError {
    fn from(err: crate::inputs::InputError) -> Self {
        match err {
            crate::inputs::InputError::Io(io) => CliError::Io(io),
            crate::inputs::InputError::Walk(walk) => CliError::Io(walk.into()),
            other => CliError::Usage(other.to_string()),
        }
    }
}

impl From<crate::outpath::OutPathError> for CliError {
    fn from(err: crate::outpath::OutPathError) -> Self {
        CliError::Usage(err.to_string())
    }
}

impl From<crate::geometry::GeometryError> for CliError {
    fn from(err: crate::geometry::GeometryError) -> Self {
        CliError::Usage(err.to_string())
    }
}
