//! Error types for the CLI.

use std::fmt;

use segfetch::download::DownloadError;

/// Errors surfaced to the CLI user.
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line input.
    InvalidInput(String),
    /// Filesystem preparation failed (output directory, metadata).
    Io(std::io::Error),
    /// The download operation failed.
    Download(DownloadError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "{}", msg),
            Self::Io(e) => write!(f, "{}", e),
            Self::Download(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Download(e) => Some(e),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        Self::Download(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
