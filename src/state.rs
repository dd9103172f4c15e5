use chrono::{DateTime, Local};
use indicatif::HumanBytes;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::error::DownloadError;

/// What the server told us about a resource before any body was transferred.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub url: String,
    /// `None` when the size could not be discovered.
    pub total_size: Option<u64>,
    pub accepts_ranges: RangeSupport,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RangeSupport {
    /// `Accept-Ranges: bytes`
    Advertised,
    /// `Accept-Ranges: none`
    Refused,
    /// Header absent or carrying an unknown unit.
    Unspecified,
}

impl ResourceDescriptor {
    pub fn unknown(url: &str) -> Self {
        Self {
            url: url.to_string(),
            total_size: None,
            accepts_ranges: RangeSupport::Unspecified,
        }
    }

    /// Size to segment by, if the resource can be fetched in ranges at all.
    pub fn segmentable_size(&self) -> Option<u64> {
        if self.accepts_ranges == RangeSupport::Refused {
            return None;
        }
        self.total_size.filter(|size| *size > 0)
    }
}

/// Inclusive, zero-based byte span. `start <= end` always holds.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Like `new`, for spans that must not be empty.
    pub fn checked(start: u64, end: u64) -> Result<Self, DownloadError> {
        Self::new(start, end).ok_or(DownloadError::InvalidRange { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One unit of parallel work. A `None` range is an empty segment that is
/// never requested.
#[derive(Debug, Clone)]
pub struct SegmentTask {
    pub index: usize,
    pub range: Option<ByteRange>,
    pub temp_path: PathBuf,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    Pending,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SegmentResult {
    pub index: usize,
    pub status: SegmentStatus,
    pub http_status: Option<u16>,
    pub transfer_error: Option<DownloadError>,
    /// Latest sampled rate; advisory only.
    pub throughput_bytes_per_sec: f64,
    pub bytes_written: u64,
}

impl SegmentResult {
    pub fn pending(index: usize) -> Self {
        Self {
            index,
            status: SegmentStatus::Pending,
            http_status: None,
            transfer_error: None,
            throughput_bytes_per_sec: 0.0,
            bytes_written: 0,
        }
    }

    pub fn skipped(index: usize) -> Self {
        Self {
            status: SegmentStatus::Skipped,
            ..Self::pending(index)
        }
    }

    pub fn succeed(&mut self) {
        self.status = SegmentStatus::Succeeded;
        self.transfer_error = None;
    }

    pub fn fail(&mut self, err: DownloadError) {
        self.status = SegmentStatus::Failed;
        self.transfer_error = Some(err);
    }

    pub fn is_failed(&self) -> bool {
        self.status == SegmentStatus::Failed
    }

    /// Short status line for display next to the segment number.
    pub fn describe(&self) -> String {
        match (&self.status, &self.transfer_error) {
            (SegmentStatus::Pending, _) => "pending".to_string(),
            (SegmentStatus::Skipped, _) => "skipped (empty segment)".to_string(),
            (SegmentStatus::Succeeded, _) => format!(
                "done, {} ({}/s)",
                HumanBytes(self.bytes_written),
                HumanBytes(self.throughput_bytes_per_sec as u64)
            ),
            (SegmentStatus::Failed, Some(err)) => format!("failed ({})", err),
            (SegmentStatus::Failed, None) => "failed".to_string(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Segmented download merged into the output file.
    Success,
    /// At least one segment failed or could not be merged; no output produced.
    PartialFailure,
    /// Size discovery failed and the single-stream download succeeded.
    Fallback,
    /// The download could not be carried out at all.
    Aborted,
}

impl OverallStatus {
    pub fn is_success(self) -> bool {
        matches!(self, OverallStatus::Success | OverallStatus::Fallback)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct DownloadReport {
    pub url: String,
    pub output_path: PathBuf,
    pub overall_status: OverallStatus,
    pub total_size: Option<u64>,
    pub per_segment: Vec<SegmentResult>,
    pub error: Option<DownloadError>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl DownloadReport {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "URL:    {}", self.url)?;
        writeln!(f, "Output: {}", self.output_path.display())?;
        if let Some(size) = self.total_size {
            writeln!(f, "Size:   {}", HumanBytes(size))?;
        }
        for segment in &self.per_segment {
            writeln!(f, "  segment {:>2}: {}", segment.index, segment.describe())?;
        }
        write!(
            f,
            "Result: {:?} in {:.2}s",
            self.overall_status,
            self.elapsed_secs()
        )?;
        if let Some(err) = &self.error {
            write!(f, " ({})", err)?;
        }
        Ok(())
    }
}
