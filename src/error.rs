//! Error types for a guide run

use std::path::PathBuf;

/// Terminal failure of a guide run or provider lookup.
#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    #[error("config: {0}")]
    Config(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("fetching window starting at {start}: {reason}")]
    Fetch { start: i64, reason: String },
    #[error("malformed listings for window starting at {start}: {reason}")]
    Malformed { start: i64, reason: String },
    #[error("provider lookup failed: {0}")]
    Lookup(String),
    #[error("{context} ({path}): {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("run cancelled")]
    Cancelled,
}

impl GuideError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GuideError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
