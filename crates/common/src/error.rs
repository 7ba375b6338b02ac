//! Central error type for the engine (thiserror-based).

use std::sync::Arc;

use thiserror::Error;

use crate::time::RationalTime;

/// Top-level playback engine error.
///
/// Clonable so a single failure can be shared by every holder of the same
/// frame future; I/O errors are wrapped in `Arc` for that reason.
#[derive(Clone, Debug, Error)]
pub enum PlaybackError {
    #[error("cannot open file: {path}")]
    FileOpenFailed { path: String },

    #[error("no plugin matches: {path}")]
    NoPluginMatches { path: String },

    #[error("decode failed: {path}: {reason}")]
    DecodeFailed { path: String, reason: String },

    #[error("time out of range: {0}")]
    OutOfRange(RationalTime),

    #[error("invalid edit list: {reason}")]
    InvalidEditList { reason: String },

    /// The request's future was dropped before a value was produced.
    /// Never logged as an error.
    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for PlaybackError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

impl PlaybackError {
    /// Whether this error only signals a dropped future.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience Result type for engine operations.
pub type PlaybackResult<T> = Result<T, PlaybackError>;
