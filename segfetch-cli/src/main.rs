//! SegFetch CLI - command-line interface.
//!
//! Thin wrapper over the `segfetch` library: argument parsing, the
//! already-downloaded pre-check, and console rendering of progress and
//! stall observations. All transfer logic lives in the library.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segfetch", version, about = "Segmented parallel file downloader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a file
    Get(commands::get::GetArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Get(args) => commands::get::run(&args),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
