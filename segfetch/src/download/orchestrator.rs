//! High-level download orchestration.
//!
//! Wires the pipeline together: probe, plan, fan out one worker thread
//! per segment supervised by a single progress monitor, then assemble.
//! Plans flagged for the fallback bypass the fan-out entirely.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use super::assemble;
use super::config::DownloadConfig;
use super::error::{DownloadError, DownloadResult};
use super::plan::build_plan;
use super::probe;
use super::progress::{ProgressCallback, ProgressMonitor, ProgressTable};
use super::segment::{temp_path_for, SegmentResult, SegmentStatus, SegmentWorker};
use super::single;

/// Successful download outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    /// Final destination path.
    pub path: PathBuf,
    /// Final size in bytes.
    pub bytes: u64,
}

/// Segmented file downloader.
///
/// Owns the configuration; each call to [`download`](Self::download) is
/// one independent operation with its own progress table and temporary
/// files. There is no mid-flight cancellation and no resume state: a
/// failed operation cleans up completely and a retry starts fresh.
#[derive(Debug, Clone, Default)]
pub struct Downloader {
    config: DownloadConfig,
}

impl Downloader {
    /// Create a downloader with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a downloader with custom settings.
    pub fn with_config(config: DownloadConfig) -> Self {
        Self { config }
    }

    /// Get the active configuration.
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download `url` into `dest`.
    ///
    /// Does not return until every worker has reached a terminal state
    /// and assembly has completed. On any failure all temporary files
    /// and any partial destination are removed; the destination path
    /// never holds a truncated result.
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> DownloadResult<Downloaded> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DownloadError::InvalidUrl("empty URL".to_string()));
        }

        let probed = probe::probe(url, &self.config)?;
        let plan = build_plan(probed.total_size, probed.range_supported, &self.config);
        let on_progress = on_progress.map(Arc::new);

        if plan.is_single_stream() {
            debug!(
                url,
                total_size = probed.total_size,
                range_supported = probed.range_supported,
                "segmentation not viable, using single stream"
            );
            let bytes = single::download_single(
                url,
                dest,
                probed.total_size,
                on_progress.as_ref(),
                &self.config,
            )?;
            return Ok(Downloaded {
                path: dest.to_path_buf(),
                bytes,
            });
        }

        info!(
            url,
            total_size = plan.total_size,
            segments = plan.segment_count(),
            "starting segmented download"
        );

        let table = Arc::new(ProgressTable::new(plan.segments.len()));
        let expected: Vec<u64> = plan.segments.iter().map(|s| s.expected_size()).collect();
        let monitor = ProgressMonitor::spawn(
            Arc::clone(&table),
            expected,
            plan.total_size,
            on_progress.clone(),
            &self.config,
        );

        let nonce = operation_nonce();
        let mut handles = Vec::with_capacity(plan.segments.len());
        for spec in &plan.segments {
            let worker = SegmentWorker::new(
                url,
                *spec,
                temp_path_for(dest, nonce, spec.id),
                Arc::clone(&table),
                self.config.clone(),
            );
            let table = Arc::clone(&table);
            handles.push(thread::spawn(move || {
                let result = worker.run();
                table.mark_finished();
                result
            }));
        }

        let mut results: Vec<SegmentResult> = Vec::with_capacity(handles.len());
        for (i, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(result) => results.push(result),
                Err(_) => {
                    // A panicked worker never marked itself finished.
                    table.mark_finished();
                    results.push(SegmentResult {
                        id: i as u32,
                        temp_path: temp_path_for(dest, nonce, i as u32),
                        bytes_written: 0,
                        status: SegmentStatus::Failed,
                        error: Some(DownloadError::SegmentRead {
                            id: i as u32,
                            reason: "worker thread panicked".to_string(),
                        }),
                    });
                }
            }
        }
        drop(monitor);

        for result in &results {
            if let Some(ref e) = result.error {
                warn!(segment = result.id, error = %e, "segment failed");
            }
        }

        let bytes = assemble::assemble(&plan, &results, dest, &self.config)?;
        info!(bytes, dest = %dest.display(), "download complete");

        Ok(Downloaded {
            path: dest.to_path_buf(),
            bytes,
        })
    }
}

/// Per-operation nonce mixed into temporary file names so concurrent
/// operations against the same destination directory never collide.
fn operation_nonce() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
        .unwrap_or(0);
    (u64::from(process::id()) << 32) ^ nanos
}
