//! Segmented HTTP download engine.
//!
//! This module provides the full download pipeline:
//! - Capability probing via HEAD requests (`probe`)
//! - Byte-range partition planning (`plan`)
//! - Concurrent per-segment fetch workers (`segment`)
//! - Shared progress tracking and stall reporting (`progress`)
//! - Ordered assembly of segment temporaries (`assemble`)
//! - Sequential fallback for servers without range support (`single`)
//! - High-level orchestration (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! Downloader (orchestrator)
//!         │
//!         ├── probe ──► ProbeResult (total size, range support)
//!         │
//!         ├── build_plan ──► DownloadPlan (ordered SegmentSpecs)
//!         │
//!         ├── SegmentWorker × N ──► ProgressTable ◄── ProgressMonitor
//!         │        (one thread each)      (shared)      (one thread)
//!         │
//!         ├── assemble ──► destination file
//!         │
//!         └── single-stream fallback (no ranges / unknown size)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use segfetch::download::{Downloader, ProgressEvent};
//!
//! let downloader = Downloader::new();
//! let done = downloader.download(
//!     "https://example.com/model.bin",
//!     Path::new("/models/model.bin"),
//!     Some(Box::new(|event| {
//!         if let ProgressEvent::Bytes { percent, .. } = event {
//!             println!("{}%", percent);
//!         }
//!     })),
//! )?;
//! println!("downloaded {} bytes to {}", done.bytes, done.path.display());
//! ```

mod assemble;
mod config;
mod error;
mod orchestrator;
mod plan;
mod probe;
mod progress;
mod segment;
mod single;

pub use config::DownloadConfig;
pub use error::{DownloadError, DownloadResult};
pub use orchestrator::{Downloaded, Downloader};
pub use plan::{build_plan, DownloadPlan, SegmentSpec};
pub use probe::ProbeResult;
pub use progress::{ProgressCallback, ProgressEvent, ProgressTable, SegmentProgress};
pub use segment::{SegmentResult, SegmentStatus};
