//! Byte-range partition planning.
//!
//! The plan builder is a pure function of the probe result: it decides
//! how many segments to use and partitions `[0, total)` into contiguous
//! inclusive ranges, or emits a single-stream plan when segmentation is
//! not viable.

use super::config::DownloadConfig;

/// One contiguous byte range of the target file.
///
/// Immutable once built; `id` defines assembly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpec {
    /// Zero-based segment index.
    pub id: u32,
    /// First byte offset of the range.
    pub start: u64,
    /// Last byte offset of the range, inclusive.
    pub end: u64,
}

impl SegmentSpec {
    /// Number of bytes this segment is expected to produce.
    pub fn expected_size(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Immutable partition of a download into ordered segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    /// Declared total size (zero when unknown).
    pub total_size: u64,
    /// Whether the server accepts byte-range requests.
    pub range_supported: bool,
    /// Contiguous, non-overlapping segments covering `[0, total_size)`.
    /// Empty when the plan calls for the single-stream fallback.
    pub segments: Vec<SegmentSpec>,
}

impl DownloadPlan {
    /// Whether this plan routes to the single-stream fallback.
    pub fn is_single_stream(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of planned segments.
    pub fn segment_count(&self) -> u32 {
        self.segments.len() as u32
    }
}

/// Build a download plan from the probe result.
///
/// With range support and a known size, the segment count is
/// `clamp(total / unit, min, max)` where `unit` is size-tiered: files
/// above `large_file_threshold` use `large_segment_unit` per segment to
/// bound temporary-file fan-out. The count is additionally capped at
/// the total so no segment is ever empty. The partition uses equal
/// floor-divided sizes with the final segment absorbing the remainder.
pub fn build_plan(total_size: u64, range_supported: bool, config: &DownloadConfig) -> DownloadPlan {
    if total_size == 0 || !range_supported {
        return DownloadPlan {
            total_size,
            range_supported: false,
            segments: Vec::new(),
        };
    }

    let unit = if total_size > config.large_file_threshold {
        config.large_segment_unit
    } else {
        config.segment_unit
    };

    let count = (total_size / unit)
        .clamp(config.min_segments as u64, config.max_segments as u64)
        .min(total_size);

    let chunk = total_size / count;
    let segments = (0..count)
        .map(|i| {
            let start = i * chunk;
            let end = if i == count - 1 {
                total_size - 1
            } else {
                start + chunk - 1
            };
            SegmentSpec {
                id: i as u32,
                start,
                end,
            }
        })
        .collect();

    DownloadPlan {
        total_size,
        range_supported: true,
        segments,
    }
}
