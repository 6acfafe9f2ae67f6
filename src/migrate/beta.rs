//! Structural rewrite of beta-era journals to the bundled v1 format.
//!
//! A beta journal appended each transition as two flat entries: the system's
//! fields in one record and the containing sector's fields in the next, both
//! stamped with the same timestamp. v1 bundles the pair into one
//! `{time, system, sector}` record. The rewrite classifies each flat entry
//! by shape, merges adjacent entries that share a timestamp, and stamps the
//! document with the current version.

use crate::error::{JournalError, Result};
use crate::history::LATEST_VERSION;
use serde_json::{json, Map, Value};

/// Transient keys the beta writer sometimes let through; stripped so the
/// upgraded journal matches what the current writer would have produced.
const SYSTEM_TRANSIENTS: [&str; 3] = ["position", "score", "receivedAt"];
const SECTOR_TRANSIENTS: [&str; 3] = ["adjacent", "centroid", "points"];

#[derive(Clone, Copy, PartialEq, Eq)]
enum FlatKind {
    System,
    Sector,
}

/// Shape heuristic for one flat entry. Systems carry `sector_id`/`status`,
/// sectors carry `division`; anything else is unclassifiable.
fn classify(entry: &Value) -> Option<FlatKind> {
    let body = entry.as_object()?;
    if body.contains_key("sector_id") || body.contains_key("status") {
        Some(FlatKind::System)
    } else if body.contains_key("division") {
        Some(FlatKind::Sector)
    } else {
        None
    }
}

/// Entity fields of a flat entry: everything except the timestamp and the
/// known transient keys.
fn entity_body(entry: &Value, transients: &[&str]) -> Map<String, Value> {
    let mut body = entry.as_object().cloned().unwrap_or_default();
    body.remove("time");
    for key in transients {
        body.remove(*key);
    }
    body
}

fn half(kind: FlatKind, entry: &Value) -> (String, Value) {
    match kind {
        FlatKind::System => (
            "system".to_string(),
            Value::Object(entity_body(entry, &SYSTEM_TRANSIENTS)),
        ),
        FlatKind::Sector => (
            "sector".to_string(),
            Value::Object(entity_body(entry, &SECTOR_TRANSIENTS)),
        ),
    }
}

/// Merge a flat entry list into bundled records, preserving order. An entry
/// the classifier cannot place fails the upgrade rather than being silently
/// dropped.
fn bundle_entries(entries: &[Value], log_name: &str) -> Result<Vec<Value>> {
    let mut bundled = Vec::with_capacity(entries.len());
    let mut index = 0;

    while index < entries.len() {
        let entry = &entries[index];
        let kind = classify(entry).ok_or_else(|| {
            JournalError::Malformed(format!(
                "unclassifiable flat entry at {}[{}]",
                log_name, index
            ))
        })?;

        let mut record = Map::new();
        record.insert(
            "time".to_string(),
            entry.get("time").cloned().unwrap_or(Value::Null),
        );
        let (key, body) = half(kind, entry);
        record.insert(key, body);

        // The other half of the same transition, if the next entry is the
        // opposite shape at the same timestamp.
        if let Some(next) = entries.get(index + 1) {
            if let Some(next_kind) = classify(next) {
                if next_kind != kind && next.get("time") == entry.get("time") {
                    let (key, body) = half(next_kind, next);
                    record.insert(key, body);
                    index += 1;
                }
            }
        }

        bundled.push(Value::Object(record));
        index += 1;
    }

    Ok(bundled)
}

/// Rewrite a beta document into the v1 shape, in place.
pub(super) fn upgrade_to_v1(raw: &mut Value) -> Result<()> {
    let doc = raw
        .as_object_mut()
        .ok_or_else(|| JournalError::Malformed("beta document is not an object".to_string()))?;

    for log_name in ["snapshots", "undo"] {
        let entries = match doc.get(log_name).and_then(Value::as_array) {
            Some(entries) => entries.clone(),
            None => Vec::new(),
        };
        let bundled = bundle_entries(&entries, log_name)?;
        doc.insert(log_name.to_string(), Value::Array(bundled));
    }

    doc.insert("version".to_string(), json!(LATEST_VERSION));
    Ok(())
}
