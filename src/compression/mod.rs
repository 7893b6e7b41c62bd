// src/compression/mod.rs
//! Index archive reading
//!
//! Packages and Sources indices are published plain, gzip- or
//! bzip2-compressed. The format is chosen purely from the file name suffix;
//! no magic-byte sniffing is done.

use crate::error::Error;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Archive-reading errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to open {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("Failed to decompress {format} data: {source}")]
    Decompression {
        format: &'static str,
        source: io::Error,
    },

    #[error("Index is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
}

/// Supported index encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// No compression (raw data)
    None,
    /// Gzip compression (.gz)
    Gzip,
    /// Bzip2 compression (.bz2)
    Bzip2,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    ///
    /// # Examples
    /// ```
    /// use apt_mirror::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_extension("Packages.gz"), CompressionFormat::Gzip);
    /// assert_eq!(CompressionFormat::from_extension("Sources.bz2"), CompressionFormat::Bzip2);
    /// assert_eq!(CompressionFormat::from_extension("Packages.xz"), CompressionFormat::None);
    /// ```
    pub fn from_extension(path: &str) -> Self {
        if path.ends_with(".gz") {
            Self::Gzip
        } else if path.ends_with(".bz2") {
            Self::Bzip2
        } else {
            Self::None
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Create a decompressing reader for the given format
pub fn create_decoder<'a, R: Read + 'a>(reader: R, format: CompressionFormat) -> Box<dyn Read + 'a> {
    match format {
        CompressionFormat::None => Box::new(reader),
        CompressionFormat::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        CompressionFormat::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
    }
}

/// Decode an index file into text
fn read_index(path: &Path) -> Result<String, CompressionError> {
    let format = CompressionFormat::from_extension(&path.to_string_lossy());
    let file = File::open(path).map_err(|source| CompressionError::Open {
        path: path.display().to_string(),
        source,
    })?;

    let mut decoder = create_decoder(BufReader::new(file), format);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|source| CompressionError::Decompression {
            format: format.name(),
            source,
        })?;

    Ok(String::from_utf8(output)?)
}

/// Open an index file and return its decoded text
///
/// Missing, truncated or corrupt files surface as [`Error::Decode`].
pub fn open(path: &Path) -> crate::Result<String> {
    read_index(path).map_err(|e| Error::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
