// src/repository/parsers/packages.rs

//! Binary package indices

use serde::Deserialize;

use super::{ParseError, stanzas};

/// Fields of a Packages stanza the mirror needs
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct PackageStanza {
    #[serde(rename = "Package")]
    package: String,
    #[serde(rename = "Filename")]
    filename: String,
}

/// One stanza of a Packages index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    /// Path of the .deb relative to the mirror root
    pub relative_path: String,
}

/// Parse a Packages index
///
/// Stanzas lacking either `Package:` or `Filename:` produce no record.
pub fn parse_packages(text: &str) -> Result<Vec<PackageRecord>, ParseError> {
    let records = stanzas::<PackageStanza>(text, "Packages")?
        .into_iter()
        .filter_map(|stanza| {
            let name = stanza.package.trim();
            let relative_path = stanza.filename.trim();
            if name.is_empty() || relative_path.is_empty() {
                return None;
            }
            Some(PackageRecord {
                name: name.to_string(),
                relative_path: relative_path.to_string(),
            })
        })
        .collect();
    Ok(records)
}
