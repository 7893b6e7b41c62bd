// src/repository/parsers/sources.rs

//! Source package indices
//!
//! Only the `Files:` list is consumed; the `Checksums-*` lists name the same
//! files and are ignored.

use serde::Deserialize;
use tracing::warn;

use super::{ParseError, stanzas};

/// Fields of a Sources stanza the mirror needs
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct SourceStanza {
    #[serde(rename = "Package")]
    package: String,
    #[serde(rename = "Directory")]
    directory: String,
    /// One `digest size filename` entry per continuation line
    #[serde(rename = "Files")]
    files: String,
}

/// One entry of a stanza's `Files:` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub digest: String,
    pub size: u64,
    pub filename: String,
}

/// One stanza of a Sources index
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceRecord {
    pub name: String,
    pub directory: String,
    pub files: Vec<SourceFile>,
}

impl SourceRecord {
    /// Mirror-relative paths of every file, in list order
    pub fn paths(&self) -> impl Iterator<Item = String> + '_ {
        self.files.iter().map(move |f| {
            if self.directory.is_empty() {
                f.filename.clone()
            } else {
                format!("{}/{}", self.directory.trim_end_matches('/'), f.filename)
            }
        })
    }
}

/// Parse a Sources index
///
/// A stanza yields a record when it names a package. Malformed `Files:`
/// entries are skipped with a warning.
pub fn parse_sources(text: &str) -> Result<Vec<SourceRecord>, ParseError> {
    let records = stanzas::<SourceStanza>(text, "Sources")?
        .into_iter()
        .filter_map(into_record)
        .collect();
    Ok(records)
}

fn into_record(stanza: SourceStanza) -> Option<SourceRecord> {
    let name = stanza.package.trim();
    if name.is_empty() {
        return None;
    }

    let files = stanza
        .files
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let file = parse_file_line(line);
            if file.is_none() {
                warn!("Skipping malformed Files entry in {}: {:?}", name, line);
            }
            file
        })
        .collect();

    Some(SourceRecord {
        name: name.to_string(),
        directory: stanza.directory.trim().to_string(),
        files,
    })
}

fn parse_file_line(line: &str) -> Option<SourceFile> {
    let mut fields = line.split_whitespace();
    let digest = fields.next()?;
    let size = fields.next()?.parse().ok()?;
    let filename = fields.next()?;

    Some(SourceFile {
        digest: digest.to_string(),
        size,
        filename: filename.to_string(),
    })
}
