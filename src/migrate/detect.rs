//! Version classification for raw journal documents.
//!
//! Detection runs on untyped `serde_json::Value` because the whole point is
//! to classify documents that may not parse into the current typed shape:
//! partial writes, legacy eras, hand-edited files. Every branch of the
//! ladder tolerates arbitrary input.

use crate::history::LATEST_VERSION;
use serde_json::Value;
use std::fmt;

/// Version tag detected on a raw document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocVersion {
    /// Pre-beta era. Reserved: nothing is currently classified as alpha.
    Alpha,
    /// Flat-record era: separate, untagged system/sector entries appended
    /// per transition, no `version` field.
    Beta,
    /// Numbered format era.
    Version(u32),
    /// Unclassifiable document.
    Unknown,
}

impl DocVersion {
    /// True when the tag names the current format.
    pub fn is_latest(self) -> bool {
        matches!(self, DocVersion::Version(LATEST_VERSION))
    }
}

impl fmt::Display for DocVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocVersion::Alpha => write!(f, "alpha"),
            DocVersion::Beta => write!(f, "beta"),
            DocVersion::Version(n) => write!(f, "v{}", n),
            DocVersion::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify a raw document into a version tag.
///
/// A `version` field that is a whole number wins outright; a `version` field
/// of any other type (a float from an interrupted write, a string) is
/// unclassifiable rather than guessed at. Documents without the field fall
/// through the era predicates.
pub fn detect_version(raw: &Value) -> DocVersion {
    if let Some(version) = raw.get("version") {
        return match version.as_u64() {
            Some(n) => u32::try_from(n)
                .map(DocVersion::Version)
                .unwrap_or(DocVersion::Unknown),
            None => DocVersion::Unknown,
        };
    }
    if is_alpha_document(raw) {
        return DocVersion::Alpha;
    }
    if is_beta_document(raw) {
        return DocVersion::Beta;
    }
    DocVersion::Unknown
}

/// Alpha-era recognition. Permanently conservative: no structural signature
/// for alpha documents has ever been pinned down, so nothing is classified
/// as alpha and the tag stays reserved in [`DocVersion`].
pub fn is_alpha_document(_raw: &Value) -> bool {
    false
}

/// Beta journals predate the `version` field and stored flat, untagged
/// update records: each entry is the entity's fields directly rather than a
/// bundled `{system, sector}` pair. The signature is a non-empty `snapshots`
/// array whose first entry has no nested `system` key.
pub fn is_beta_document(raw: &Value) -> bool {
    if raw.get("version").is_some() {
        return false;
    }
    match raw.get("snapshots").and_then(Value::as_array) {
        Some(entries) => match entries.first() {
            Some(first) => first.get("system").is_none(),
            None => false,
        },
        None => false,
    }
}

/// True when the document needs the migration chain before a typed parse.
pub fn should_upgrade(raw: &Value) -> bool {
    !detect_version(raw).is_latest()
}
