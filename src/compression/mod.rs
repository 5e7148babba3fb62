// src/compression/mod.rs
//! Compression for package archives
//!
//! The inner payload is gzip by default, or xz when the caller asks for it.
//! The outer package is never compressed.

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use thiserror::Error;

/// xz preset used for payloads
const XZ_LEVEL: u32 = 6;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to finish {format} stream: {source}")]
    Finish {
        format: &'static str,
        source: io::Error,
    },
}

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    /// No compression (raw tar)
    None,
    /// Gzip, readable by every consumer
    #[default]
    Gzip,
    /// XZ/LZMA, smaller but needs a newer consumer
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from magic bytes
    ///
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else {
            Self::None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A writer that compresses on the fly
///
/// Must be closed with [`Encoder::finish`]; dropping it may lose the
/// trailing compressed block.
pub enum Encoder<W: Write> {
    Plain(W),
    Gzip(flate2::write::GzEncoder<W>),
    Xz(xz2::write::XzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(inner: W, format: CompressionFormat) -> Self {
        match format {
            CompressionFormat::None => Self::Plain(inner),
            CompressionFormat::Gzip => Self::Gzip(flate2::write::GzEncoder::new(
                inner,
                flate2::Compression::default(),
            )),
            CompressionFormat::Xz => Self::Xz(xz2::write::XzEncoder::new(inner, XZ_LEVEL)),
        }
    }

    /// Flush the compressed trailer and hand back the inner writer
    pub fn finish(self) -> Result<W, CompressionError> {
        match self {
            Self::Plain(mut w) => {
                w.flush().map_err(|e| CompressionError::Finish {
                    format: "none",
                    source: e,
                })?;
                Ok(w)
            }
            Self::Gzip(e) => e.finish().map_err(|e| CompressionError::Finish {
                format: "gzip",
                source: e,
            }),
            Self::Xz(e) => e.finish().map_err(|e| CompressionError::Finish {
                format: "xz",
                source: e,
            }),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(e) => e.write(buf),
            Self::Xz(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(e) => e.flush(),
            Self::Xz(e) => e.flush(),
        }
    }
}

/// Create a decompressing reader for the given format
pub fn create_decoder<'a, R: Read + 'a>(reader: R, format: CompressionFormat) -> Box<dyn Read + 'a> {
    match format {
        CompressionFormat::None => Box::new(reader),
        CompressionFormat::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        CompressionFormat::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
    }
}
