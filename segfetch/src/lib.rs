//! SegFetch - segmented parallel HTTP file downloader.
//!
//! This library downloads a single remote file by splitting it into byte-range
//! segments fetched concurrently, tracking per-segment progress under a shared
//! table, reporting stalls without cancelling work, and assembling the
//! segments into the destination file only once every segment has succeeded.
//! Servers without byte-range support fall back to a sequential single-stream
//! path.

pub mod download;

pub use download::{Downloaded, Downloader};
