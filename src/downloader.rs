use chrono::{DateTime, Local};
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::coordinator;
use crate::error::{DownloadError, Result};
use crate::fallback::fetch_whole;
use crate::merge::{self, cleanup, MergePart};
use crate::plan::{build_tasks, plan, scratch_paths, staging_path};
use crate::probe::probe;
use crate::progress::Progress;
use crate::state::{DownloadReport, OverallStatus, SegmentResult, SegmentTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Probing,
    Planning,
    Fetching,
    Merging,
    Fallback,
    Done(OverallStatus),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Probing => f.write_str("probing"),
            Phase::Planning => f.write_str("planning"),
            Phase::Fetching => f.write_str("fetching"),
            Phase::Merging => f.write_str("merging"),
            Phase::Fallback => f.write_str("fallback"),
            Phase::Done(status) => write!(f, "done ({:?})", status),
        }
    }
}

/// Everything one invocation accumulates on its way to a report.
struct Run<'a> {
    url: &'a str,
    output: &'a Path,
    started_at: DateTime<Local>,
    total_size: Option<u64>,
    phase: Phase,
}

impl<'a> Run<'a> {
    fn enter(&mut self, phase: Phase) {
        debug!(url = self.url, from = %self.phase, to = %phase, "download state change");
        self.phase = phase;
    }

    fn finish(
        mut self,
        status: OverallStatus,
        per_segment: Vec<SegmentResult>,
        error: Option<DownloadError>,
    ) -> DownloadReport {
        self.enter(Phase::Done(status));
        info!(url = self.url, output = %self.output.display(), ?status, "download finished");
        DownloadReport {
            url: self.url.to_string(),
            output_path: self.output.to_path_buf(),
            overall_status: status,
            total_size: self.total_size,
            per_segment,
            error,
            started_at: self.started_at,
            finished_at: Local::now(),
        }
    }
}

pub struct Downloader {
    client: Client,
    config: DownloadConfig,
    progress: Progress,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        config.validate()?;
        let client = config.client()?;
        let progress = Progress::new(config.show_progress);
        Ok(Self {
            client,
            config,
            progress,
        })
    }

    /// Downloads `url` to `output`, in parallel segments when the server
    /// reports a size, otherwise as a single stream.
    ///
    /// Never returns an error: every failure ends up in the report. A failed
    /// download leaves neither a partial output file nor temp files, and an
    /// existing file at `output` is only replaced on success.
    pub async fn download(&self, url: &str, output: &Path) -> DownloadReport {
        let mut run = Run {
            url,
            output,
            started_at: Local::now(),
            total_size: None,
            phase: Phase::Probing,
        };
        info!(url, output = %output.display(), "starting download");

        if let Err(e) = ensure_parent_dir(output).await {
            return run.finish(OverallStatus::Aborted, vec![], Some(e));
        }

        let descriptor = probe(&self.client, url).await;
        run.total_size = descriptor.total_size;

        match descriptor.segmentable_size() {
            Some(size) => self.download_segmented(run, size).await,
            None => {
                info!(url, total_size = ?descriptor.total_size, "size unknown or ranges refused, using a single stream");
                self.download_single(run).await
            }
        }
    }

    /// Like [`Downloader::download`], but gives up after `limit`.
    ///
    /// On timeout the report is lost and every temp and staging file the
    /// download could have created is removed. Segment tasks that are still
    /// running are not interrupted.
    pub async fn download_within(&self, url: &str, output: &Path, limit: Duration) -> Result<DownloadReport> {
        match tokio::time::timeout(limit, self.download(url, output)).await {
            Ok(report) => Ok(report),
            Err(_) => {
                warn!(url, ?limit, "download timed out, removing partial files");
                let scratch = scratch_paths(output, self.config.segments);
                cleanup(scratch.iter().map(PathBuf::as_path)).await;
                Err(DownloadError::TimedOut(limit))
            }
        }
    }

    async fn download_single(&self, mut run: Run<'_>) -> DownloadReport {
        run.enter(Phase::Fallback);
        let pb = self.progress.stream_bar(&file_label(run.output));
        let result = fetch_whole(&self.client, run.url, run.output, pb).await;

        if result.is_failed() {
            let error = result.transfer_error.clone();
            run.finish(OverallStatus::Aborted, vec![result], error)
        } else {
            run.finish(OverallStatus::Fallback, vec![result], None)
        }
    }

    async fn download_segmented(&self, mut run: Run<'_>, size: u64) -> DownloadReport {
        run.enter(Phase::Planning);
        let ranges = match plan(size, self.config.segments) {
            Ok(ranges) => ranges,
            Err(e) => return run.finish(OverallStatus::Aborted, vec![], Some(e)),
        };
        let tasks = build_tasks(ranges, run.output);
        info!(url = run.url, size, segments = tasks.len(), "segmented download planned");

        run.enter(Phase::Fetching);
        let results = coordinator::run(&self.client, run.url, &tasks, &self.progress).await;

        if let Some(failed) = results.iter().find(|r| r.is_failed()) {
            let error = failed.transfer_error.clone();
            warn!(
                url = run.url,
                failed = results.iter().filter(|r| r.is_failed()).count(),
                "segments failed, discarding download"
            );
            cleanup(tasks.iter().map(|t| t.temp_path.as_path())).await;
            return run.finish(OverallStatus::PartialFailure, results, error);
        }

        run.enter(Phase::Merging);
        self.finish_merge(run, &tasks, results).await
    }

    /// Merges the fetched temp files into the output and reports the result.
    /// Temp and staging files are gone afterwards whatever happened.
    async fn finish_merge(
        &self,
        run: Run<'_>,
        tasks: &[SegmentTask],
        results: Vec<SegmentResult>,
    ) -> DownloadReport {
        let staging = staging_path(run.output);
        match self.merge_segments(tasks, &staging, run.output).await {
            Ok(()) => run.finish(OverallStatus::Success, results, None),
            Err(e) => {
                cleanup(tasks.iter().map(|t| t.temp_path.as_path())).await;
                cleanup([staging.as_path()]).await;
                let status = match e {
                    DownloadError::MergeIncomplete { .. } => OverallStatus::PartialFailure,
                    _ => OverallStatus::Aborted,
                };
                run.finish(status, results, Some(e))
            }
        }
    }

    async fn merge_segments(&self, tasks: &[SegmentTask], staging: &Path, output: &Path) -> Result<()> {
        let parts: Vec<MergePart> = tasks
            .iter()
            .filter_map(|t| {
                t.range.map(|range| MergePart {
                    index: t.index,
                    path: t.temp_path.clone(),
                    expected_len: range.len(),
                })
            })
            .collect();

        let outcome = merge::merge(&parts, staging, self.config.merge_buffer_size).await?;
        if let Some(e) = outcome.into_error() {
            return Err(e);
        }

        fs::rename(staging, output)
            .await
            .map_err(|e| DownloadError::io(output, e))
    }
}

async fn ensure_parent_dir(output: &Path) -> Result<()> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e)),
        _ => Ok(()),
    }
}

fn file_label(output: &Path) -> String {
    output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| output.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::segment_temp_path;
    use crate::state::SegmentStatus;
    use std::num::NonZeroUsize;
    use tempfile::TempDir;

    fn run_for(output: &Path) -> Run<'_> {
        Run {
            url: "http://localhost/out.bin",
            output,
            started_at: Local::now(),
            total_size: Some(20),
            phase: Phase::Merging,
        }
    }

    fn succeeded(index: usize, bytes: u64) -> SegmentResult {
        let mut result = SegmentResult::pending(index);
        result.bytes_written = bytes;
        result.succeed();
        result
    }

    #[tokio::test]
    async fn vanished_segment_file_ends_as_partial_failure() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.bin");
        let downloader = Downloader::new(DownloadConfig::default().with_progress(false)).unwrap();
        let tasks = build_tasks(plan(20, NonZeroUsize::new(2).unwrap()).unwrap(), &output);

        // Segment 1 was fetched, but its temp file is gone by merge time.
        std::fs::write(&tasks[0].temp_path, [7u8; 10]).unwrap();
        let results = vec![succeeded(0, 10), succeeded(1, 10)];

        let report = downloader
            .finish_merge(run_for(&output), &tasks, results)
            .await;

        assert_eq!(report.overall_status, OverallStatus::PartialFailure);
        assert_eq!(
            report.error,
            Some(DownloadError::MergeIncomplete {
                missing: vec![1],
                short: vec![]
            })
        );
        assert!(report
            .per_segment
            .iter()
            .all(|r| r.status == SegmentStatus::Succeeded));
        assert!(!output.exists());
        assert!(!staging_path(&output).exists());
        assert!(!segment_temp_path(&output, 0).exists());
    }

    #[tokio::test]
    async fn truncated_segment_file_ends_as_partial_failure() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.bin");
        std::fs::write(&output, b"previous").unwrap();
        let downloader = Downloader::new(DownloadConfig::default().with_progress(false)).unwrap();
        let tasks = build_tasks(plan(20, NonZeroUsize::new(2).unwrap()).unwrap(), &output);

        std::fs::write(&tasks[0].temp_path, [1u8; 10]).unwrap();
        std::fs::write(&tasks[1].temp_path, [2u8; 4]).unwrap();
        let results = vec![succeeded(0, 10), succeeded(1, 10)];

        let report = downloader
            .finish_merge(run_for(&output), &tasks, results)
            .await;

        assert_eq!(report.overall_status, OverallStatus::PartialFailure);
        assert_eq!(
            report.error,
            Some(DownloadError::MergeIncomplete {
                missing: vec![],
                short: vec![1]
            })
        );
        assert_eq!(std::fs::read(&output).unwrap(), b"previous");
        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["out.bin"]);
    }

    #[tokio::test]
    async fn complete_segment_files_are_merged_in_order() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.bin");
        let downloader = Downloader::new(DownloadConfig::default().with_progress(false)).unwrap();
        let tasks = build_tasks(plan(6, NonZeroUsize::new(2).unwrap()).unwrap(), &output);

        std::fs::write(&tasks[0].temp_path, b"abc").unwrap();
        std::fs::write(&tasks[1].temp_path, b"def").unwrap();
        let results = vec![succeeded(0, 3), succeeded(1, 3)];

        let report = downloader
            .finish_merge(run_for(&output), &tasks, results)
            .await;

        assert_eq!(report.overall_status, OverallStatus::Success);
        assert_eq!(std::fs::read(&output).unwrap(), b"abcdef");
        assert!(!staging_path(&output).exists());
    }
}
