use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything that can go wrong while downloading one resource.
///
/// Values are cheap to clone so a failure can be stored in the segment result
/// that produced it and still be surfaced in the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DownloadError {
    #[error("resource size unknown")]
    SizeUnknown,

    #[error("invalid byte range {start}-{end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("file error on {path}: {message}")]
    FileIo { path: PathBuf, message: String },

    #[error("segment incomplete: expected {expected} bytes, got {actual}")]
    ShortSegment { expected: u64, actual: u64 },

    /// A 206 whose Content-Range names a different span than the one asked for.
    #[error("requested bytes {requested}, server sent {served}")]
    RangeMismatch { requested: String, served: String },

    #[error("segment worker stopped: {0}")]
    WorkerPanicked(String),

    #[error("merge incomplete: missing segments {missing:?}, short segments {short:?}")]
    MergeIncomplete { missing: Vec<usize>, short: Vec<usize> },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("download did not finish within {0:?}")]
    TimedOut(Duration),
}

impl DownloadError {
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        DownloadError::FileIo {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
