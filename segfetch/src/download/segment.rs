//! Per-segment fetch worker.
//!
//! Each worker owns an independent HTTP client (sharing connection
//! state between workers caused cross-worker stalls in practice and is
//! forbidden), fetches exactly one byte range into a private temporary
//! file, and batches progress updates into the shared table. The
//! per-segment deadline, not the stall detector, is what fails a hung
//! transfer.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{header, StatusCode};
use tracing::debug;

use super::config::DownloadConfig;
use super::error::DownloadError;
use super::plan::SegmentSpec;
use super::progress::ProgressTable;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Read unit for streamed segments. Kept small so intermediary traffic
/// shaping does not interfere with individual reads.
const STREAM_READ_UNIT: usize = MIB as usize;

/// Fine-grained progress updates apply below this offset so progress
/// becomes visible quickly after a segment starts.
const FAST_START_WINDOW: u64 = 10 * MIB;

/// Lifecycle state of one segment transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    /// Worker dispatched, no bytes received yet.
    Pending,
    /// First byte received.
    InProgress,
    /// All expected bytes written and verified.
    Succeeded,
    /// Terminal failure; the temporary file has been removed.
    Failed,
}

/// Terminal record produced by exactly one worker.
#[derive(Debug)]
pub struct SegmentResult {
    /// Segment id, matching its spec.
    pub id: u32,
    /// Temporary file path. Valid only when `status` is `Succeeded`;
    /// ownership passes to the assembler.
    pub temp_path: PathBuf,
    /// Bytes written to the temporary file.
    pub bytes_written: u64,
    /// Terminal status, set exactly once by the owning worker.
    pub status: SegmentStatus,
    /// Failure cause when `status` is `Failed`.
    pub error: Option<DownloadError>,
}

impl SegmentResult {
    /// Whether this segment completed successfully.
    pub fn succeeded(&self) -> bool {
        self.status == SegmentStatus::Succeeded
    }
}

/// Worker that fetches one byte range into a temporary file.
pub struct SegmentWorker {
    url: String,
    spec: SegmentSpec,
    temp_path: PathBuf,
    table: Arc<ProgressTable>,
    config: DownloadConfig,
}

impl SegmentWorker {
    /// Create a worker for one segment.
    pub fn new(
        url: impl Into<String>,
        spec: SegmentSpec,
        temp_path: PathBuf,
        table: Arc<ProgressTable>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            url: url.into(),
            spec,
            temp_path,
            table,
            config,
        }
    }

    /// Run the transfer to completion.
    ///
    /// Always produces a terminal result; on failure the temporary file
    /// has already been removed. Never retries.
    pub fn run(self) -> SegmentResult {
        let id = self.spec.id;
        let temp_path = self.temp_path.clone();

        match self.fetch() {
            Ok(bytes) => {
                debug!(segment = id, bytes, "segment complete");
                SegmentResult {
                    id,
                    temp_path,
                    bytes_written: bytes,
                    status: SegmentStatus::Succeeded,
                    error: None,
                }
            }
            Err(e) => {
                fs::remove_file(&temp_path).ok();
                SegmentResult {
                    id,
                    temp_path,
                    bytes_written: 0,
                    status: SegmentStatus::Failed,
                    error: Some(e),
                }
            }
        }
    }

    fn fetch(&self) -> Result<u64, DownloadError> {
        let id = self.spec.id;
        let expected = self.spec.expected_size();
        let deadline = deadline_for(expected, &self.config);

        // Independent client per worker: own connection pool, request
        // deadline scaled to the segment size.
        let client = Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(deadline)
            .user_agent(self.config.user_agent.clone())
            .build()
            .map_err(|e| DownloadError::Http(e.to_string()))?;

        let response = client
            .get(&self.url)
            .header(
                header::RANGE,
                format!("bytes={}-{}", self.spec.start, self.spec.end),
            )
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    DownloadError::SegmentTimeout {
                        id,
                        timeout: deadline,
                    }
                } else {
                    DownloadError::SegmentRead {
                        id,
                        reason: e.to_string(),
                    }
                }
            })?;

        let http_status = response.status();
        if http_status != StatusCode::PARTIAL_CONTENT && http_status != StatusCode::OK {
            return Err(DownloadError::SegmentStatus {
                id,
                status: http_status.as_u16(),
            });
        }
        debug!(
            segment = id,
            start = self.spec.start,
            end = self.spec.end,
            deadline_secs = deadline.as_secs(),
            "segment transfer started"
        );

        let bytes = if expected < self.config.in_memory_limit {
            self.fetch_buffered(response, deadline)?
        } else {
            self.fetch_streamed(response, deadline)?
        };

        if bytes != expected {
            return Err(DownloadError::SegmentSizeMismatch {
                id,
                expected,
                actual: bytes,
            });
        }
        Ok(bytes)
    }

    /// Small-segment path: fetch the whole body in one call, write once.
    /// Avoids streaming-related stalls for small transfers.
    fn fetch_buffered(
        &self,
        response: reqwest::blocking::Response,
        deadline: Duration,
    ) -> Result<u64, DownloadError> {
        let id = self.spec.id;

        let body = response.bytes().map_err(|e| {
            if e.is_timeout() {
                DownloadError::SegmentTimeout {
                    id,
                    timeout: deadline,
                }
            } else {
                DownloadError::SegmentRead {
                    id,
                    reason: e.to_string(),
                }
            }
        })?;

        let mut file = self.create_temp()?;
        file.write_all(&body).map_err(|e| DownloadError::Write {
            path: self.temp_path.clone(),
            source: e,
        })?;

        self.table.record(id, body.len() as u64);
        Ok(body.len() as u64)
    }

    /// Large-segment path: stream in fixed read units, flushing to disk
    /// and updating shared progress at size-tiered intervals.
    fn fetch_streamed(
        &self,
        mut response: reqwest::blocking::Response,
        deadline: Duration,
    ) -> Result<u64, DownloadError> {
        let id = self.spec.id;
        let expected = self.spec.expected_size();
        let flush_every = flush_interval(expected);
        let report_every = report_interval(expected);

        let file = self.create_temp()?;
        let mut writer = BufWriter::with_capacity(flush_every as usize, file);
        let mut buffer = vec![0u8; STREAM_READ_UNIT];
        let mut written: u64 = 0;
        let mut last_reported: u64 = 0;

        loop {
            let n = response.read(&mut buffer).map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock
                {
                    DownloadError::SegmentTimeout {
                        id,
                        timeout: deadline,
                    }
                } else {
                    DownloadError::SegmentRead {
                        id,
                        reason: e.to_string(),
                    }
                }
            })?;
            if n == 0 {
                break;
            }

            writer
                .write_all(&buffer[..n])
                .map_err(|e| DownloadError::Write {
                    path: self.temp_path.clone(),
                    source: e,
                })?;
            written += n as u64;

            // Fine-grained updates during the fast-start window, then
            // batched updates at the tiered interval.
            let interval = if written < FAST_START_WINDOW {
                MIB
            } else {
                report_every
            };
            if written - last_reported >= interval {
                self.table.record(id, written);
                last_reported = written;
            }
        }

        writer.flush().map_err(|e| DownloadError::Write {
            path: self.temp_path.clone(),
            source: e,
        })?;
        self.table.record(id, written);
        Ok(written)
    }

    fn create_temp(&self) -> Result<File, DownloadError> {
        File::create(&self.temp_path).map_err(|e| DownloadError::Write {
            path: self.temp_path.clone(),
            source: e,
        })
    }
}

/// Whole-request deadline scaled to the transfer size: twice the
/// transfer time at the assumed minimum speed, clamped to the
/// configured bounds.
pub(crate) fn deadline_for(expected: u64, config: &DownloadConfig) -> Duration {
    let mib = (expected as f64 / MIB as f64).max(1.0);
    let secs = (2.0 * mib / config.min_speed_mib_s).clamp(
        config.min_deadline.as_secs_f64(),
        config.max_deadline.as_secs_f64(),
    );
    Duration::from_secs_f64(secs)
}

/// Disk flush interval: 20 MiB for segments up to 1 GiB, 100 MiB above.
fn flush_interval(expected: u64) -> u64 {
    if expected > GIB {
        100 * MIB
    } else {
        20 * MIB
    }
}

/// Shared-progress update interval: 5 MiB up to 1 GiB, 50 MiB above.
fn report_interval(expected: u64) -> u64 {
    if expected > GIB {
        50 * MIB
    } else {
        5 * MIB
    }
}

/// Build a collision-free temporary path for one segment, as a sibling
/// of the destination so assembly stays on one filesystem.
pub(crate) fn temp_path_for(dest: &Path, nonce: u64, id: u32) -> PathBuf {
    let name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download");
    dest.with_file_name(format!(".{}.{:x}.part{}", name, nonce, id))
}
