//! Capability probe: metadata-only request against the target URL.

use reqwest::blocking::Client;
use reqwest::header;

use super::config::DownloadConfig;
use super::error::{DownloadError, DownloadResult};

/// Result of probing a URL for size and range support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    /// Declared total size in bytes. Zero means the server did not
    /// report a usable Content-Length.
    pub total_size: u64,
    /// Whether the server explicitly advertises byte-range requests.
    pub range_supported: bool,
}

/// Probe the target URL with a HEAD request.
///
/// Redirects are followed. Range support is recognized only from an
/// explicit `Accept-Ranges: bytes` response header. Any transport error
/// or non-success status is fatal to the whole download operation.
pub fn probe(url: &str, config: &DownloadConfig) -> DownloadResult<ProbeResult> {
    let client = Client::builder()
        .timeout(config.probe_timeout)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| DownloadError::Http(e.to_string()))?;

    let response = client
        .head(url)
        .send()
        .map_err(|e| DownloadError::Probe {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Probe {
            url: url.to_string(),
            reason: format!("HEAD request failed with status {}", status),
        });
    }

    let total_size = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let range_supported = response
        .headers()
        .get(header::ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("bytes"))
        .unwrap_or(false);

    Ok(ProbeResult {
        total_size,
        range_supported,
    })
}
