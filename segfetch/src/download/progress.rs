//! Shared progress tracking and the supervisory monitor loop.
//!
//! Workers batch byte-count updates into a [`ProgressTable`] guarded by
//! one coarse lock; contention is negligible because updates happen at
//! multi-mebibyte granularity, not per read. A single [`ProgressMonitor`]
//! thread polls the table, reports integer-percentage changes, and
//! detects stalls. Stalls are observability only; the per-segment
//! request deadline is what actually enforces liveness.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::config::DownloadConfig;

/// Progress observation emitted by the download operation.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Aggregate byte progress. Emitted when the integer percentage
    /// changes; `percent` is zero when the total size is unknown.
    Bytes {
        bytes: u64,
        total: u64,
        percent: u8,
    },
    /// No aggregate progress for at least the stall threshold while
    /// work remains outstanding. Reported, never acted on.
    Stall {
        stalled_for: Duration,
        segments: Vec<SegmentProgress>,
    },
}

/// Per-segment detail included in stall observations.
#[derive(Debug, Clone)]
pub struct SegmentProgress {
    pub id: u32,
    pub bytes: u64,
    pub expected: u64,
    pub percent: u8,
}

/// Progress callback invoked by the monitor and the fallback path.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Shared per-segment progress counters.
///
/// Owned by the download operation, injected into workers and the
/// monitor. One mutex guards the whole table; the finished-worker count
/// is a separate atomic so the monitor can terminate without taking the
/// lock.
#[derive(Debug)]
pub struct ProgressTable {
    slots: Mutex<Vec<u64>>,
    finished: AtomicUsize,
}

impl ProgressTable {
    /// Create a table with one zeroed slot per segment.
    pub fn new(segments: usize) -> Self {
        Self {
            slots: Mutex::new(vec![0; segments]),
            finished: AtomicUsize::new(0),
        }
    }

    /// Record the absolute byte count for a segment.
    pub fn record(&self, id: u32, bytes: u64) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(id as usize) {
            *slot = bytes;
        }
    }

    /// Sum of all per-segment byte counts.
    pub fn total(&self) -> u64 {
        self.slots.lock().iter().sum()
    }

    /// Copy of the per-segment byte counts.
    pub fn snapshot(&self) -> Vec<u64> {
        self.slots.lock().clone()
    }

    /// Number of slots in the table.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark one worker as having reached a terminal state.
    pub fn mark_finished(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of workers that reached a terminal state.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Whether every worker has reached a terminal state.
    pub fn all_finished(&self) -> bool {
        self.finished() >= self.len()
    }
}

fn percent_of(bytes: u64, total: u64) -> u8 {
    if total == 0 {
        0
    } else {
        (bytes.saturating_mul(100) / total).min(100) as u8
    }
}

/// Supervisory loop polling the progress table for the lifetime of the
/// worker fan-out.
///
/// Runs on its own thread; dropping the monitor joins it, which returns
/// once every worker has been marked finished.
pub struct ProgressMonitor {
    handle: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    /// Spawn the monitor thread.
    ///
    /// `expected` holds each segment's expected size, indexed by id, and
    /// is used only for the per-segment detail in stall observations.
    pub fn spawn(
        table: Arc<ProgressTable>,
        expected: Vec<u64>,
        total_size: u64,
        callback: Option<Arc<ProgressCallback>>,
        config: &DownloadConfig,
    ) -> Self {
        let poll = config.poll_interval;
        let settle = config.stall_settle;
        let stall_threshold = config.stall_threshold;

        let handle = thread::spawn(move || {
            let started = Instant::now();
            let mut last_percent: Option<u8> = None;
            let mut last_total: u64 = 0;
            let mut stalled_since: Option<Instant> = None;

            loop {
                if table.all_finished() {
                    break;
                }
                thread::sleep(poll);

                let counts = table.snapshot();
                let total: u64 = counts.iter().sum();
                let percent = percent_of(total, total_size);

                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    if let Some(ref cb) = callback {
                        cb(ProgressEvent::Bytes {
                            bytes: total,
                            total: total_size,
                            percent,
                        });
                    }
                }

                // Stall detection only starts after the settling period
                // so worker startup never trips it.
                if started.elapsed() >= settle {
                    if total == last_total {
                        let since = *stalled_since.get_or_insert_with(Instant::now);
                        if since.elapsed() >= stall_threshold && !table.all_finished() {
                            tracing::warn!(
                                stalled_secs = since.elapsed().as_secs(),
                                bytes = total,
                                "download stalled"
                            );
                            if let Some(ref cb) = callback {
                                let segments = counts
                                    .iter()
                                    .enumerate()
                                    .map(|(i, &bytes)| {
                                        let expected = expected.get(i).copied().unwrap_or(0);
                                        SegmentProgress {
                                            id: i as u32,
                                            bytes,
                                            expected,
                                            percent: percent_of(bytes, expected),
                                        }
                                    })
                                    .collect();
                                cb(ProgressEvent::Stall {
                                    stalled_for: since.elapsed(),
                                    segments,
                                });
                            }
                            // Reset so repeated stalls keep reporting.
                            stalled_since = Some(Instant::now());
                        }
                    } else {
                        stalled_since = None;
                    }
                }
                last_total = total;
            }

            // Final report so callers always observe the terminal total.
            if let Some(ref cb) = callback {
                let total = table.total();
                cb(ProgressEvent::Bytes {
                    bytes: total,
                    total: total_size,
                    percent: percent_of(total, total_size),
                });
            }
        });

        Self {
            handle: Some(handle),
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> DownloadConfig {
        DownloadConfig::new()
            .with_poll_interval(Duration::from_millis(5))
            .with_stall_timing(Duration::from_millis(40), Duration::from_millis(60))
    }

    #[test]
    fn test_table_records_and_sums() {
        let table = ProgressTable::new(3);
        table.record(0, 100);
        table.record(2, 50);
        assert_eq!(table.total(), 150);
        assert_eq!(table.snapshot(), vec![100, 0, 50]);
    }

    #[test]
    fn test_table_ignores_out_of_range_id() {
        let table = ProgressTable::new(1);
        table.record(5, 100);
        assert_eq!(table.total(), 0);
    }

    #[test]
    fn test_table_finished_tracking() {
        let table = ProgressTable::new(2);
        assert!(!table.all_finished());
        table.mark_finished();
        assert!(!table.all_finished());
        table.mark_finished();
        assert!(table.all_finished());
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 100), 0);
        assert_eq!(percent_of(50, 100), 50);
        assert_eq!(percent_of(100, 100), 100);
        assert_eq!(percent_of(10, 0), 0);
    }

    #[test]
    fn test_monitor_reports_percentage_changes() {
        let table = Arc::new(ProgressTable::new(1));
        let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |e| sink.lock().push(e));

        let monitor = ProgressMonitor::spawn(
            Arc::clone(&table),
            vec![1000],
            1000,
            Some(Arc::new(callback)),
            &fast_config(),
        );

        thread::sleep(Duration::from_millis(15));
        table.record(0, 500);
        thread::sleep(Duration::from_millis(15));
        table.record(0, 1000);
        table.mark_finished();
        drop(monitor);

        let events = events.lock();
        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Bytes { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(percents.contains(&50), "saw {:?}", percents);
        assert_eq!(*percents.last().unwrap(), 100);
    }

    #[test]
    fn test_stall_fires_only_after_settle_and_threshold() {
        let table = Arc::new(ProgressTable::new(1));
        let started = Instant::now();
        let first_stall: Arc<Mutex<Option<Duration>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&first_stall);
        let callback: ProgressCallback = Box::new(move |e| {
            if let ProgressEvent::Stall { .. } = e {
                sink.lock().get_or_insert(started.elapsed());
            }
        });

        let config = fast_config();
        let monitor = ProgressMonitor::spawn(
            Arc::clone(&table),
            vec![1000],
            1000,
            Some(Arc::new(callback)),
            &config,
        );

        // Zero progress long enough for settle + threshold to elapse.
        thread::sleep(Duration::from_millis(250));
        table.mark_finished();
        drop(monitor);

        let fired_at = first_stall.lock().expect("stall should have fired");
        assert!(
            fired_at >= config.stall_settle + config.stall_threshold,
            "stall fired too early: {:?}",
            fired_at
        );
    }

    #[test]
    fn test_no_stall_when_workers_finish_quickly() {
        let table = Arc::new(ProgressTable::new(1));
        let stalled = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&stalled);
        let callback: ProgressCallback = Box::new(move |e| {
            if let ProgressEvent::Stall { .. } = e {
                sink.fetch_add(1, Ordering::SeqCst);
            }
        });

        let monitor = ProgressMonitor::spawn(
            Arc::clone(&table),
            vec![100],
            100,
            Some(Arc::new(callback)),
            &fast_config(),
        );

        table.record(0, 100);
        table.mark_finished();
        drop(monitor);

        assert_eq!(stalled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stall_event_carries_segment_detail() {
        let table = Arc::new(ProgressTable::new(2));
        table.record(0, 500);
        let detail: Arc<Mutex<Option<Vec<SegmentProgress>>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&detail);
        let callback: ProgressCallback = Box::new(move |e| {
            if let ProgressEvent::Stall { segments, .. } = e {
                sink.lock().get_or_insert(segments);
            }
        });

        let monitor = ProgressMonitor::spawn(
            Arc::clone(&table),
            vec![1000, 2000],
            3000,
            Some(Arc::new(callback)),
            &fast_config(),
        );

        thread::sleep(Duration::from_millis(250));
        table.mark_finished();
        table.mark_finished();
        drop(monitor);

        let detail = detail.lock().take().expect("stall detail expected");
        assert_eq!(detail.len(), 2);
        assert_eq!(detail[0].bytes, 500);
        assert_eq!(detail[0].percent, 50);
        assert_eq!(detail[1].bytes, 0);
        assert_eq!(detail[1].expected, 2000);
    }
}
