// src/repository/parsers/mod.rs

//! Parsers for Debian repository metadata
//!
//! - [`release`]: hash sections of `Release` files
//! - [`packages`]: binary package indices (`Packages[.gz|.bz2]`)
//! - [`sources`]: source package indices (`Sources[.gz|.bz2]`)
//!
//! Packages and Sources share the deb822 layout: records ("stanzas")
//! separated by blank lines, `Field: value` lines, and continuation lines
//! that start with whitespace. Both are deserialized through `rfc822-like`
//! into stanza structs whose fields all default to empty, so a stanza
//! missing a field still parses and is dropped by the caller.

pub mod packages;
pub mod release;
pub mod sources;

pub use packages::{PackageRecord, parse_packages};
pub use release::{HashEntry, parse_release};
pub use sources::{SourceFile, SourceRecord, parse_sources};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// An index whose text is not valid deb822
#[derive(Error, Debug)]
#[error("malformed {kind} index: {reason}")]
pub struct ParseError {
    pub kind: &'static str,
    pub reason: String,
}

/// Deserialize every stanza of a deb822 document
pub(crate) fn stanzas<T: DeserializeOwned>(
    text: &str,
    kind: &'static str,
) -> Result<Vec<T>, ParseError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    rfc822_like::from_str(text).map_err(|e| ParseError {
        kind,
        reason: e.to_string(),
    })
}
