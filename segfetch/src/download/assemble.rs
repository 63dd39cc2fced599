//! Ordered assembly of segment temporaries into the destination file.
//!
//! The destination path must never be left holding a truncated result:
//! any precondition violation or mid-copy failure purges every
//! temporary file, and the destination is removed whenever this module
//! created it.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use super::config::DownloadConfig;
use super::error::{DownloadError, DownloadResult};
use super::plan::DownloadPlan;
use super::segment::SegmentResult;

/// Concatenate all segment temporaries into `dest` in ascending id
/// order and verify the final size.
///
/// Preconditions: every result `Succeeded` and every temporary file
/// present. Results must be ordered by id. On success all temporaries
/// are deleted and the final byte count is returned.
pub fn assemble(
    plan: &DownloadPlan,
    results: &[SegmentResult],
    dest: &Path,
    config: &DownloadConfig,
) -> DownloadResult<u64> {
    debug_assert_eq!(results.len(), plan.segments.len());
    debug_assert!(
        results.iter().enumerate().all(|(i, r)| r.id == i as u32),
        "results must be ordered by segment id"
    );

    let failed: Vec<u32> = results
        .iter()
        .filter(|r| !r.succeeded())
        .map(|r| r.id)
        .collect();
    if !failed.is_empty() {
        remove_temps(results);
        return Err(DownloadError::SegmentsFailed { failed });
    }

    for result in results {
        if !result.temp_path.exists() {
            remove_temps(results);
            return Err(DownloadError::MissingSegment {
                id: result.id,
                path: result.temp_path.clone(),
            });
        }
    }

    // Exclusive write: refuse a destination that appeared since the
    // caller's pre-check. The destination is only ever removed below
    // this point, once this operation owns it.
    let output = match OpenOptions::new().write(true).create_new(true).open(dest) {
        Ok(file) => file,
        Err(e) => {
            remove_temps(results);
            return Err(DownloadError::Write {
                path: dest.to_path_buf(),
                source: e,
            });
        }
    };

    match copy_ordered(output, results, dest, config.copy_buffer_size) {
        Ok(written) => {
            remove_temps(results);
            if written != plan.total_size {
                fs::remove_file(dest).ok();
                return Err(DownloadError::FinalSizeMismatch {
                    expected: plan.total_size,
                    actual: written,
                });
            }
            debug!(bytes = written, dest = %dest.display(), "assembly complete");
            Ok(written)
        }
        Err(e) => {
            remove_temps(results);
            fs::remove_file(dest).ok();
            Err(e)
        }
    }
}

/// Stream each temporary into the destination through a bounded buffer.
/// Never loads a whole segment into memory.
fn copy_ordered(
    mut output: File,
    results: &[SegmentResult],
    dest: &Path,
    buffer_size: usize,
) -> DownloadResult<u64> {
    let mut buffer = vec![0u8; buffer_size];
    let mut written: u64 = 0;

    for result in results {
        let mut input = File::open(&result.temp_path).map_err(|e| DownloadError::Read {
            path: result.temp_path.clone(),
            source: e,
        })?;
        loop {
            let n = input.read(&mut buffer).map_err(|e| DownloadError::Read {
                path: result.temp_path.clone(),
                source: e,
            })?;
            if n == 0 {
                break;
            }
            output
                .write_all(&buffer[..n])
                .map_err(|e| DownloadError::Write {
                    path: dest.to_path_buf(),
                    source: e,
                })?;
            written += n as u64;
        }
    }

    output.flush().map_err(|e| DownloadError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(written)
}

/// Remove every temporary file; best effort.
fn remove_temps(results: &[SegmentResult]) {
    for result in results {
        fs::remove_file(&result.temp_path).ok();
    }
}
