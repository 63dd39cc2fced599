//! The `get` command: download a URL into a directory.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use segfetch::download::{Downloader, ProgressEvent};

use crate::error::CliError;

#[derive(Args)]
pub struct GetArgs {
    /// URL to download
    pub url: String,

    /// Directory to save the file into
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Override the destination filename (derived from the URL by default)
    #[arg(short, long)]
    pub filename: Option<String>,
}

pub fn run(args: &GetArgs) -> Result<(), CliError> {
    let url = args.url.trim();
    if url.is_empty() {
        return Err(CliError::InvalidInput("no URL provided".to_string()));
    }

    let filename = match &args.filename {
        Some(name) => name.clone(),
        None => filename_from_url(url),
    };
    fs::create_dir_all(&args.output_dir)?;
    let dest = args.output_dir.join(filename);

    // Idempotence guard: an existing file short-circuits before any
    // network request is made.
    if let Some(size) = existing_file_size(&dest) {
        println!(
            "{} {} already exists ({}), skipping download",
            style("skipped:").yellow().bold(),
            dest.display(),
            HumanBytes(size)
        );
        return Ok(());
    }

    tracing::debug!(url, dest = %dest.display(), "starting download");

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .expect("valid progress template"),
    );

    let render = bar.clone();
    let done = Downloader::new().download(
        url,
        &dest,
        Some(Box::new(move |event| match event {
            ProgressEvent::Bytes { bytes, total, .. } => {
                if total > 0 {
                    render.set_length(total);
                }
                render.set_position(bytes);
            }
            ProgressEvent::Stall {
                stalled_for,
                segments,
            } => {
                let detail: Vec<String> = segments
                    .iter()
                    .map(|s| format!("#{} {}% ({})", s.id, s.percent, HumanBytes(s.bytes)))
                    .collect();
                render.println(format!(
                    "{} no progress for {}s [{}]",
                    style("stalled:").yellow().bold(),
                    stalled_for.as_secs(),
                    detail.join(", ")
                ));
            }
        })),
    )?;
    bar.finish_and_clear();

    println!(
        "{} {} ({})",
        style("downloaded:").green().bold(),
        done.path.display(),
        HumanBytes(done.bytes)
    );
    Ok(())
}

/// Size of the file at `dest`, if one exists.
fn existing_file_size(dest: &Path) -> Option<u64> {
    fs::metadata(dest).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Derive a destination filename from the URL: strip the query string,
/// take the last path component, fall back to a generic name.
fn filename_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let candidate = without_query.rsplit('/').next().unwrap_or("");
    if candidate.is_empty() || !candidate.contains('.') {
        "downloaded.bin".to_string()
    } else {
        candidate.to_string()
    }
}
