use reqwest::Client;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::{DownloadError, Result};

pub const DEFAULT_SEGMENTS: usize = 16;
pub const DEFAULT_MERGE_BUFFER: usize = 8192;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub segments: NonZeroUsize,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub merge_buffer_size: usize,
    pub show_progress: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            segments: NonZeroUsize::new(DEFAULT_SEGMENTS).unwrap_or(NonZeroUsize::MIN),
            user_agent: concat!("segdl/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            merge_buffer_size: DEFAULT_MERGE_BUFFER,
            show_progress: true,
        }
    }
}

impl DownloadConfig {
    pub fn with_segments(mut self, segments: usize) -> Result<Self> {
        self.segments = NonZeroUsize::new(segments)
            .ok_or_else(|| DownloadError::InvalidConfig("segment count must be at least 1".into()))?;
        Ok(self)
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.merge_buffer_size == 0 {
            return Err(DownloadError::InvalidConfig(
                "merge buffer size must be non-zero".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(DownloadError::InvalidConfig("user agent is empty".into()));
        }
        Ok(())
    }

    /// Shared HTTP client. Redirects follow reqwest's default policy.
    pub fn client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(DownloadError::from)
    }
}
