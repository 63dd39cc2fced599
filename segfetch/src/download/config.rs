//! Configuration for the download engine.

use std::time::Duration;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Configuration for the download engine.
///
/// The defaults encode the production tuning; tests tighten the timing
/// fields to keep runtimes short.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Timeout for the metadata probe request.
    pub probe_timeout: Duration,

    /// TCP connect timeout for segment and fallback requests.
    pub connect_timeout: Duration,

    /// Minimum number of segments when ranges are supported.
    pub min_segments: u32,

    /// Maximum number of segments.
    pub max_segments: u32,

    /// Bytes of file per segment used to derive the segment count.
    pub segment_unit: u64,

    /// Total size above which `large_segment_unit` is used instead,
    /// bounding temporary-file fan-out for very large artifacts.
    pub large_file_threshold: u64,

    /// Per-segment unit for files above `large_file_threshold`.
    pub large_segment_unit: u64,

    /// Segments smaller than this are fetched fully into memory and
    /// written in one call; larger segments stream to disk.
    pub in_memory_limit: u64,

    /// Assumed minimum transfer speed (MiB/s) for deriving each
    /// request's whole-transfer deadline.
    pub min_speed_mib_s: f64,

    /// Lower bound on the request deadline.
    pub min_deadline: Duration,

    /// Upper bound on the request deadline.
    pub max_deadline: Duration,

    /// Progress monitor polling interval.
    pub poll_interval: Duration,

    /// Settling period before stall detection starts.
    pub stall_settle: Duration,

    /// Duration of zero aggregate progress that counts as a stall.
    pub stall_threshold: Duration,

    /// Block size for the single-stream fallback.
    pub fallback_block_size: usize,

    /// Copy buffer size used while assembling segments.
    pub copy_buffer_size: usize,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(60),
            min_segments: 4,
            max_segments: 8,
            segment_unit: 10 * MIB,
            large_file_threshold: 10 * GIB,
            large_segment_unit: GIB,
            in_memory_limit: 100 * MIB,
            min_speed_mib_s: 1.0,
            min_deadline: Duration::from_secs(300),
            max_deadline: Duration::from_secs(1800),
            poll_interval: Duration::from_millis(300),
            stall_settle: Duration::from_secs(5),
            stall_threshold: Duration::from_secs(15),
            fallback_block_size: 4 * MIB as usize,
            copy_buffer_size: 64 * MIB as usize,
            user_agent: concat!("segfetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloadConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the connect timeout for segment requests.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the progress monitor polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the stall settling period and detection threshold.
    pub fn with_stall_timing(mut self, settle: Duration, threshold: Duration) -> Self {
        self.stall_settle = settle;
        self.stall_threshold = threshold;
        self
    }

    /// Set the in-memory fetch limit for segments.
    pub fn with_in_memory_limit(mut self, limit: u64) -> Self {
        self.in_memory_limit = limit;
        self
    }

    /// Set the assembly copy buffer size.
    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.min_segments, 4);
        assert_eq!(config.max_segments, 8);
        assert_eq!(config.segment_unit, 10 * MIB);
        assert_eq!(config.large_segment_unit, GIB);
        assert_eq!(config.in_memory_limit, 100 * MIB);
        assert_eq!(config.poll_interval, Duration::from_millis(300));
        assert_eq!(config.stall_settle, Duration::from_secs(5));
        assert_eq!(config.stall_threshold, Duration::from_secs(15));
    }

    #[test]
    fn test_builder_pattern() {
        let config = DownloadConfig::new()
            .with_probe_timeout(Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(10))
            .with_stall_timing(Duration::from_millis(50), Duration::from_millis(100))
            .with_copy_buffer_size(4096);

        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.stall_settle, Duration::from_millis(50));
        assert_eq!(config.stall_threshold, Duration::from_millis(100));
        assert_eq!(config.copy_buffer_size, 4096);
    }

    #[test]
    fn test_copy_buffer_size_never_zero() {
        let config = DownloadConfig::new().with_copy_buffer_size(0);
        assert_eq!(config.copy_buffer_size, 1);
    }
}
