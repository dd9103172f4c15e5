use reqwest::{header, Client};
use tracing::{debug, warn};

use crate::state::{RangeSupport, ResourceDescriptor};

/// Asks the server for the resource size with a HEAD request.
///
/// Never fails: any error, non-success status or missing `Content-Length`
/// produces a descriptor with an unknown size, which routes the download to
/// the single-stream path.
pub async fn probe(client: &Client, url: &str) -> ResourceDescriptor {
    let response = match client.head(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(url, error = %e, "size probe failed");
            return ResourceDescriptor::unknown(url);
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "size probe rejected");
        return ResourceDescriptor::unknown(url);
    }

    // A HEAD response carries no body, so the body size hint is useless here.
    let headers = response.headers();
    let total_size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let accepts_ranges = match headers
        .get(header::ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase())
    {
        Some(unit) if unit == "bytes" => RangeSupport::Advertised,
        Some(unit) if unit == "none" => RangeSupport::Refused,
        _ => RangeSupport::Unspecified,
    };

    debug!(url, ?total_size, ?accepts_ranges, "size probe complete");

    ResourceDescriptor {
        url: url.to_string(),
        total_size,
        accepts_ranges,
    }
}
