use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the media-consolidator library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The timestamp oracle (exiftool) could not be located or probed
    #[error("metadata oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// File or directory not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// CSV log error
    #[error("CSV log error: {0}")]
    Csv(#[from] csv::Error),

    /// Config file (de)serialization error
    #[error("Config file error: {0}")]
    ConfigFile(#[from] serde_json::Error),
}
