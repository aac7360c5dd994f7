use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the ambient surfaces of the tracker.
///
/// Sensor trouble never shows up here: an absent or denied sensor just
/// produces an empty stream, and a malformed event is dropped.
#[derive(Error, Debug)]
pub enum WhereError {
    #[error("Preferences I/O failed for {path}: {source}")]
    PreferencesIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Preferences file {path} is corrupt: {source}")]
    PreferencesCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Replay log {path} could not be loaded: {reason}")]
    ReplayLog { path: PathBuf, reason: String },

    #[error("Dashboard server error: {0}")]
    Dashboard(String),

    #[error("Session is no longer running")]
    SessionClosed,
}

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, WhereError>;
