use indicatif::ProgressBar;
use reqwest::{Client, StatusCode};
use std::path::Path;
use tokio::fs::{self, File};
use tracing::{info, warn};

use crate::error::{DownloadError, Result};
use crate::fetch::{stream_to_file, ThroughputSampler};
use crate::merge::cleanup;
use crate::plan::staging_path;
use crate::state::SegmentResult;

const ACCEPTED: [StatusCode; 3] = [StatusCode::OK, StatusCode::CREATED, StatusCode::ACCEPTED];

/// Downloads the whole body with one unranged GET.
///
/// The body goes to a staging file that replaces `output` only on success;
/// on failure the staging file is removed so no partial artifact remains.
pub async fn fetch_whole(client: &Client, url: &str, output: &Path, pb: ProgressBar) -> SegmentResult {
    let staging = staging_path(output);
    let mut result = SegmentResult::pending(0);
    let mut sampler = ThroughputSampler::new();

    let outcome = transfer_whole(client, url, &staging, output, &pb, &mut sampler, &mut result).await;
    result.throughput_bytes_per_sec = sampler.rate().unwrap_or(0.0);

    match outcome {
        Ok(()) => {
            info!(url, bytes = result.bytes_written, "single-stream download complete");
            pb.finish_with_message("done");
            result.succeed();
        }
        Err(e) => {
            warn!(url, error = %e, "single-stream download failed, cleaning up");
            pb.abandon_with_message(format!("failed: {}", e));
            cleanup([staging.as_path()]).await;
            result.fail(e);
        }
    }
    result
}

async fn transfer_whole(
    client: &Client,
    url: &str,
    staging: &Path,
    output: &Path,
    pb: &ProgressBar,
    sampler: &mut ThroughputSampler,
    result: &mut SegmentResult,
) -> Result<()> {
    let mut file = File::create(staging)
        .await
        .map_err(|e| DownloadError::io(staging, e))?;

    let response = client.get(url).send().await?;
    let status = response.status();
    result.http_status = Some(status.as_u16());
    if !ACCEPTED.contains(&status) {
        return Err(DownloadError::UnexpectedStatus(status.as_u16()));
    }
    if let Some(len) = response.content_length() {
        pb.set_length(len);
    }

    stream_to_file(response, &mut file, staging, pb, sampler, &mut result.bytes_written).await?;
    drop(file);

    fs::rename(staging, output)
        .await
        .map_err(|e| DownloadError::io(output, e))
}
