use reqwest::Client;
use tracing::{debug, error};

use crate::error::DownloadError;
use crate::fetch::fetch_segment;
use crate::progress::Progress;
use crate::state::{SegmentResult, SegmentTask};

/// Fetches every non-empty segment concurrently and waits for all of them.
///
/// Results come back in task order regardless of completion order. A failing
/// segment does not cancel its siblings; whether the download as a whole
/// succeeded is decided after the join.
pub async fn run(
    client: &Client,
    url: &str,
    tasks: &[SegmentTask],
    progress: &Progress,
) -> Vec<SegmentResult> {
    // A 200 reply can only be trusted when one request covers the whole body.
    let active = tasks.iter().filter(|t| t.range.is_some()).count();
    let accept_full_body = active == 1;
    debug!(segments = tasks.len(), active, "launching segment fetchers");

    let mut handles = Vec::with_capacity(tasks.len());
    for task in tasks {
        let Some(range) = task.range else {
            handles.push((task.index, None));
            continue;
        };

        let client = client.clone();
        let url = url.to_string();
        let dest = task.temp_path.clone();
        let index = task.index;
        let pb = progress.segment_bar(index, range.len());

        let handle = tokio::spawn(async move {
            fetch_segment(&client, &url, index, range, &dest, accept_full_body, pb).await
        });
        handles.push((index, Some(handle)));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (index, handle) in handles {
        let result = match handle {
            None => SegmentResult::skipped(index),
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(segment = index, error = %e, "segment worker did not finish");
                    let mut result = SegmentResult::pending(index);
                    result.fail(DownloadError::WorkerPanicked(e.to_string()));
                    result
                }
            },
        };
        results.push(result);
    }
    results
}
