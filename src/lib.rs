//! Segmented parallel HTTP downloader.
//!
//! A HEAD probe discovers the resource size, the body is split into byte
//! ranges fetched concurrently into temp files, and the temp files are merged
//! in order. Servers that report no size get a single unranged stream.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod downloader;
pub mod error;
pub mod fallback;
pub mod fetch;
pub mod logging;
pub mod merge;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod state;
pub mod utils;

pub use config::DownloadConfig;
pub use downloader::Downloader;
pub use error::DownloadError;
pub use state::{DownloadReport, OverallStatus, SegmentResult, SegmentStatus};
