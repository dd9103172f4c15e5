use futures::StreamExt;
use indicatif::ProgressBar;
use reqwest::{header, Client, Response, StatusCode};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{DownloadError, Result};
use crate::state::{ByteRange, SegmentResult};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Transfer rate estimate owned by a single fetch.
///
/// The first observation only records a baseline; after that a new rate is
/// computed at most once per `SAMPLE_INTERVAL`.
#[derive(Debug, Default)]
pub struct ThroughputSampler {
    last: Option<(Instant, u64)>,
    rate: Option<f64>,
}

impl ThroughputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, now: Instant, total_bytes: u64) {
        let Some((at, bytes)) = self.last else {
            self.last = Some((now, total_bytes));
            return;
        };
        let elapsed = now.saturating_duration_since(at);
        if elapsed < SAMPLE_INTERVAL {
            return;
        }
        let delta = total_bytes.saturating_sub(bytes);
        self.rate = Some(delta as f64 / elapsed.as_secs_f64());
        self.last = Some((now, total_bytes));
    }

    pub fn rate(&self) -> Option<f64> {
        self.rate
    }
}

/// Streams `range` of `url` into a fresh file at `dest`.
///
/// 206 is the expected answer. 200 means the server ignored the range and is
/// only acceptable when `accept_full_body` is set, i.e. this is the sole
/// segment and the full body is exactly the range. The temp file is left on
/// disk either way.
pub async fn fetch_segment(
    client: &Client,
    url: &str,
    index: usize,
    range: ByteRange,
    dest: &Path,
    accept_full_body: bool,
    pb: ProgressBar,
) -> SegmentResult {
    let mut result = SegmentResult::pending(index);
    let mut sampler = ThroughputSampler::new();

    debug!(segment = index, range = %range, "requesting segment");
    let outcome = transfer_range(
        client,
        url,
        range,
        dest,
        accept_full_body,
        &pb,
        &mut sampler,
        &mut result,
    )
    .await;
    result.throughput_bytes_per_sec = sampler.rate().unwrap_or(0.0);

    match outcome {
        Ok(()) => {
            info!(segment = index, bytes = result.bytes_written, "segment complete");
            result.succeed();
            pb.finish_with_message("done");
        }
        Err(e) => {
            warn!(segment = index, error = %e, "segment failed");
            pb.abandon_with_message(format!("failed: {}", e));
            result.fail(e);
        }
    }
    result
}

#[allow(clippy::too_many_arguments)]
async fn transfer_range(
    client: &Client,
    url: &str,
    range: ByteRange,
    dest: &Path,
    accept_full_body: bool,
    pb: &ProgressBar,
    sampler: &mut ThroughputSampler,
    result: &mut SegmentResult,
) -> Result<()> {
    let mut file = File::create(dest)
        .await
        .map_err(|e| DownloadError::io(dest, e))?;

    let response = client
        .get(url)
        .header(header::RANGE, range.header_value())
        .send()
        .await?;

    let status = response.status();
    result.http_status = Some(status.as_u16());
    let accepted = status == StatusCode::PARTIAL_CONTENT
        || (status == StatusCode::OK && accept_full_body);
    if !accepted {
        return Err(DownloadError::UnexpectedStatus(status.as_u16()));
    }
    if status == StatusCode::PARTIAL_CONTENT {
        check_served_range(&response, range)?;
    }

    stream_to_file(response, &mut file, dest, pb, sampler, &mut result.bytes_written).await?;

    if result.bytes_written != range.len() {
        return Err(DownloadError::ShortSegment {
            expected: range.len(),
            actual: result.bytes_written,
        });
    }
    Ok(())
}

/// A 206 must carry the span that was asked for. Servers that omit
/// `Content-Range` are trusted; the length check still applies to them.
fn check_served_range(response: &Response, range: ByteRange) -> Result<()> {
    let Some(value) = response.headers().get(header::CONTENT_RANGE) else {
        return Ok(());
    };
    let text = value.to_str().unwrap_or_default();
    match served_span(text) {
        Some((start, end)) if start == range.start() && end == range.end() => Ok(()),
        _ => Err(DownloadError::RangeMismatch {
            requested: range.to_string(),
            served: text.to_string(),
        }),
    }
}

/// `(start, end)` out of `bytes <start>-<end>/<size>`; the size may be `*`.
fn served_span(value: &str) -> Option<(u64, u64)> {
    let (span, _size) = value.trim().strip_prefix("bytes ")?.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

/// Copies a response body chunk by chunk into `file`, counting bytes into
/// `written` as they land.
pub(crate) async fn stream_to_file(
    response: Response,
    file: &mut File,
    path: &Path,
    pb: &ProgressBar,
    sampler: &mut ThroughputSampler,
    written: &mut u64,
) -> Result<()> {
    let mut stream = response.bytes_stream();
    sampler.observe(Instant::now(), *written);

    while let Some(item) = stream.next().await {
        let chunk = item?;
        if chunk.is_empty() {
            continue;
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        *written += chunk.len() as u64;
        pb.inc(chunk.len() as u64);
        sampler.observe(Instant::now(), *written);
    }

    file.flush().await.map_err(|e| DownloadError::io(path, e))
}
