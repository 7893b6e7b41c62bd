// src/hash.rs

//! Hashing for Release file verification
//!
//! Release files carry one checksum section per algorithm:
//! - **MD5Sum**: legacy, still published by every Debian-style archive
//! - **SHA1**: legacy
//! - **SHA256**: the default the mirror verifies against
//!
//! Only the algorithm selected in the configuration is ever computed.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
}

impl HashAlgorithm {
    /// Get the hash output length as a hex string
    #[inline]
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    /// Name used in log messages and config files
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5SUM",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    /// Header that opens this algorithm's section in a Release file
    #[inline]
    pub const fn release_header(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5Sum",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    /// Match a Release file line against the known section headers
    pub fn from_release_header(line: &str) -> Option<Self> {
        [Self::Md5, Self::Sha1, Self::Sha256]
            .into_iter()
            .find(|algo| line.starts_with(algo.release_header()))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MD5SUM" | "MD5" => Ok(Self::Md5),
            "SHA1" | "SHA-1" => Ok(Self::Sha1),
            "SHA256" | "SHA-256" => Ok(Self::Sha256),
            _ => Err(HashError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Hash computation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Unknown hash algorithm name
    UnknownAlgorithm(String),
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAlgorithm(name) => write!(f, "unknown hash algorithm: {}", name),
        }
    }
}

impl std::error::Error for HashError {}

/// Incremental hasher over any supported algorithm
pub struct Hasher {
    state: HasherState,
}

enum HasherState {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Md5 => HasherState::Md5(Md5::new()),
            HashAlgorithm::Sha1 => HasherState::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
        };
        Self { state }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Md5(h) => h.update(data),
            HasherState::Sha1(h) => h.update(data),
            HasherState::Sha256(h) => h.update(data),
        }
    }

    /// Finalize into a lowercase hex digest
    pub fn finalize(self) -> String {
        match self.state {
            HasherState::Md5(h) => format!("{:x}", h.finalize()),
            HasherState::Sha1(h) => format!("{:x}", h.finalize()),
            HasherState::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Compute hash of a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Compute hash of data from a reader
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, reader: &mut R) -> io::Result<String> {
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// A digest that did not match its declared value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub expected: String,
    pub actual: String,
    pub algorithm: HashAlgorithm,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} does not match {} ({})",
            self.actual, self.expected, self.algorithm
        )
    }
}

impl std::error::Error for VerifyError {}

/// Verify a file against an expected hex digest (case-insensitive)
///
/// Streams the file content to avoid loading it entirely into memory.
/// The outer `io::Result` reports read failures; the inner result reports
/// a digest mismatch.
pub fn verify_file(
    path: &Path,
    expected: &str,
    algorithm: HashAlgorithm,
) -> io::Result<Result<(), VerifyError>> {
    let mut file = std::fs::File::open(path)?;
    let actual = hash_reader(algorithm, &mut file)?;

    if actual.eq_ignore_ascii_case(expected) {
        Ok(Ok(()))
    } else {
        Ok(Err(VerifyError {
            expected: expected.to_string(),
            actual,
            algorithm,
        }))
    }
}
