//! Single-stream fallback for servers without byte-range support.
//!
//! Streams the full body straight to the destination in fixed blocks.
//! No temporary files and no assembly step; a failed transfer removes
//! the partial destination before the error propagates.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use reqwest::blocking::Client;
use tracing::debug;

use super::config::DownloadConfig;
use super::error::{DownloadError, DownloadResult};
use super::progress::{ProgressCallback, ProgressEvent};
use super::segment::deadline_for;

/// Download the whole resource sequentially into `dest`.
///
/// `total_size` is the probed size, zero when unknown; when known, the
/// final size is verified against it. Progress events are emitted on
/// integer-percentage changes, or per block when the total is unknown.
pub fn download_single(
    url: &str,
    dest: &Path,
    total_size: u64,
    callback: Option<&Arc<ProgressCallback>>,
    config: &DownloadConfig,
) -> DownloadResult<u64> {
    // Whole-request deadline scaled to the probed size; a minimum-sized
    // deadline applies when the size is unknown.
    let client = Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(deadline_for(total_size.max(1), config))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| DownloadError::Http(e.to_string()))?;

    let mut response = client.get(url).send().map_err(|e| DownloadError::Stream {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Stream {
            url: url.to_string(),
            reason: format!("GET request failed with status {}", status),
        });
    }

    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| DownloadError::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;

    let mut buffer = vec![0u8; config.fallback_block_size];
    let mut written: u64 = 0;
    let mut last_percent: Option<u8> = None;

    let result = loop {
        let n = match response.read(&mut buffer) {
            Ok(n) => n,
            Err(e) => {
                break Err(DownloadError::Stream {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        };
        if n == 0 {
            break Ok(());
        }
        if let Err(e) = output.write_all(&buffer[..n]) {
            break Err(DownloadError::Write {
                path: dest.to_path_buf(),
                source: e,
            });
        }
        written += n as u64;

        if let Some(cb) = callback {
            let percent = if total_size > 0 {
                (written.saturating_mul(100) / total_size).min(100) as u8
            } else {
                0
            };
            if total_size == 0 || last_percent != Some(percent) {
                last_percent = Some(percent);
                cb(ProgressEvent::Bytes {
                    bytes: written,
                    total: total_size,
                    percent,
                });
            }
        }
    };

    let result = result.and_then(|_| {
        output.flush().map_err(|e| DownloadError::Write {
            path: dest.to_path_buf(),
            source: e,
        })
    });

    if let Err(e) = result {
        fs::remove_file(dest).ok();
        return Err(e);
    }

    if total_size > 0 && written != total_size {
        fs::remove_file(dest).ok();
        return Err(DownloadError::FinalSizeMismatch {
            expected: total_size,
            actual: written,
        });
    }

    debug!(bytes = written, dest = %dest.display(), "single-stream download complete");
    Ok(written)
}
