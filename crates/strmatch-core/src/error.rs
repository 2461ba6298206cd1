//! Error types for the strmatch core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for strmatch operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The data file backing the corpus does not exist
    #[error("Data file not found: {}", .0.display())]
    DataFileNotFound(PathBuf),

    /// The data file exists but could not be read
    #[error("Failed to load data file {}: {source}", path.display())]
    DataFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Certificate parsing or inspection error
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
