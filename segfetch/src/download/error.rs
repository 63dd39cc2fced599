//! Error types for the download engine.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can occur during a download operation.
///
/// A single failed segment fails the whole operation; the error always
/// identifies which stage failed and why. No variant corresponds to a
/// partially written destination file, which is never left behind.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL was empty or unusable before any request was made.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to construct an HTTP client.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// The metadata probe request failed. Fatal, never retried.
    #[error("probe of {url} failed: {reason}")]
    Probe { url: String, reason: String },

    /// A segment request returned a status other than 200 or 206.
    #[error("segment {id}: unexpected HTTP status {status}")]
    SegmentStatus { id: u32, status: u16 },

    /// A segment transfer exceeded its deadline.
    #[error("segment {id}: timed out after {}s", .timeout.as_secs())]
    SegmentTimeout { id: u32, timeout: Duration },

    /// A segment's network read failed.
    #[error("segment {id}: read failed: {reason}")]
    SegmentRead { id: u32, reason: String },

    /// A segment completed with the wrong number of bytes.
    #[error("segment {id}: expected {expected} bytes, wrote {actual}")]
    SegmentSizeMismatch { id: u32, expected: u64, actual: u64 },

    /// One or more segments failed; assembly refused to run.
    #[error("segments {failed:?} failed to download")]
    SegmentsFailed { failed: Vec<u32> },

    /// A temporary segment file was missing at assembly time.
    #[error("segment {id}: temporary file missing: {path}")]
    MissingSegment { id: u32, path: PathBuf },

    /// The assembled file did not match the declared total size.
    #[error("assembled file is {actual} bytes, expected {expected}")]
    FinalSizeMismatch { expected: u64, actual: u64 },

    /// The single-stream transfer failed mid-flight.
    #[error("download of {url} failed: {reason}")]
    Stream { url: String, reason: String },

    /// Failed to read a file.
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}
