// src/error.rs

//! Crate-wide error type
//!
//! Variants follow the failure classes a package or index build can hit.
//! Every one of them is fatal for the build that raised it.

use crate::codesign::SigningError;
use crate::compression::CompressionError;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or inconsistent build configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Archive path that is empty or absolute
    #[error("Illegal archive entry: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Failed to compute signature: {0}")]
    Signing(#[from] SigningError),

    /// Timestamp authority did not hand back a usable token
    #[error("Failed to retrieve signature: {0}")]
    SignatureRetrieval(String),

    #[error("Download failed: {0}")]
    DownloadError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Failure class, used as a structured logging field
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigError(_) | Self::InvalidPath(_) => "configuration",
            Self::IoError(_) | Self::DownloadError(_) | Self::Compression(_) => "io",
            Self::Signing(_) => "cryptographic",
            Self::SignatureRetrieval(_) => "remote-authority",
            Self::ParseError(_) => "parse",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}
