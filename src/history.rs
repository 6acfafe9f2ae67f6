//! The per-instance journal aggregate.
//!
//! A [`History`] holds the galaxy as it looked at instance creation (`base`),
//! the galaxy as it looks now (`current`), and two parallel logs: `snapshots`
//! (forward records, in time order) and `undo` (the paired inverse records).
//! Index `i` of `undo` is the structural inverse of index `i` of `snapshots`,
//! which is what makes backward replay possible.

use crate::types::{GalaxyState, InstanceId, Sector, System, Timestamp};
use serde::{Deserialize, Serialize};

/// Latest persisted document format version. Documents carrying anything
/// else go through the migration chain before a typed parse.
pub const LATEST_VERSION: u32 = 1;

/// One forward or undo journal entry.
///
/// A system transition bundles both halves, because a system ownership
/// change always implies a sector balance change. A sector-only transition
/// carries just the sector half; the absent half is omitted on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<System>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<Sector>,
}

/// Versioned journal for one instance.
///
/// `base` is immutable after creation; `current` advances only through diff
/// application; `version` advances only through migration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub version: u32,
    pub start: Timestamp,
    pub base: GalaxyState,
    pub current: GalaxyState,
    pub snapshots: Vec<SnapshotRecord>,
    pub undo: Vec<SnapshotRecord>,
    pub instance: InstanceId,
    #[serde(rename = "currentTimestamp")]
    pub current_timestamp: Timestamp,
}

impl History {
    /// Fresh journal at first observation of a full galaxy dump:
    /// `base` and `current` start as clones, logs empty, clock at `start`.
    pub fn new(instance: InstanceId, base: GalaxyState, start: Timestamp) -> Self {
        let current = base.clone();
        History {
            version: LATEST_VERSION,
            start,
            base,
            current,
            snapshots: Vec::new(),
            undo: Vec::new(),
            instance,
            current_timestamp: start,
        }
    }

    /// Append one undo/forward pair at matching indices and advance
    /// `currentTimestamp` to the forward record's time. All journal growth
    /// funnels through here so the logs can never drift out of step.
    pub fn record_transition(&mut self, undo: SnapshotRecord, forward: SnapshotRecord) {
        self.current_timestamp = forward.time;
        self.undo.push(undo);
        self.snapshots.push(forward);
    }

    /// Number of recorded transitions.
    pub fn transition_count(&self) -> usize {
        debug_assert_eq!(self.snapshots.len(), self.undo.len());
        self.snapshots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SectorId, SystemId, SystemStatus};
    use serde_json::json;

    fn small_galaxy() -> GalaxyState {
        GalaxyState {
            stellar_systems: vec![System {
                id: SystemId(1),
                name: "Sol".to_string(),
                owner: None,
                sector_id: SectorId(0),
                status: SystemStatus::Uninhabited,
                faction: None,
            }],
            sectors: vec![Sector {
                id: SectorId(0),
                name: "Core".to_string(),
                owner: None,
                division: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_new_history_clones_base_into_current() {
        let history = History::new(InstanceId(20), small_galaxy(), Timestamp::now());
        assert_eq!(history.version, LATEST_VERSION);
        assert_eq!(history.base, history.current);
        assert_eq!(history.transition_count(), 0);
        assert_eq!(history.current_timestamp, history.start);
    }

    #[test]
    fn test_record_transition_keeps_logs_paired() {
        let mut history = History::new(InstanceId(20), small_galaxy(), Timestamp::now());
        let before = history.current.stellar_systems[0].clone();
        let mut after = before.clone();
        after.owner = Some("Granite".to_string());

        let undo_time = history.current_timestamp;
        let forward_time = Timestamp::now();
        history.record_transition(
            SnapshotRecord {
                time: undo_time,
                system: Some(before),
                sector: None,
            },
            SnapshotRecord {
                time: forward_time,
                system: Some(after),
                sector: None,
            },
        );

        assert_eq!(history.snapshots.len(), 1);
        assert_eq!(history.undo.len(), 1);
        assert_eq!(history.current_timestamp, forward_time);
        assert_eq!(history.undo[0].time, history.start);
    }

    #[test]
    fn test_wire_field_names() {
        let history = History::new(InstanceId(3), small_galaxy(), Timestamp::now());
        let doc = serde_json::to_value(&history).unwrap();
        assert!(doc.get("currentTimestamp").is_some());
        assert!(doc.get("current_timestamp").is_none());
        assert_eq!(doc["version"], json!(1));
        assert_eq!(doc["instance"], json!(3));
        assert!(doc["base"]["stellar_systems"].is_array());
    }

    #[test]
    fn test_sector_only_record_omits_system_half() {
        let record = SnapshotRecord {
            time: Timestamp::now(),
            system: None,
            sector: Some(Sector {
                id: SectorId(0),
                name: "Core".to_string(),
                owner: Some("Basalt".to_string()),
                division: Vec::new(),
            }),
        };
        let encoded = serde_json::to_value(&record).unwrap();
        assert!(encoded.get("system").is_none());
        assert!(encoded.get("sector").is_some());
    }

    #[test]
    fn test_document_round_trip() {
        let mut history = History::new(InstanceId(20), small_galaxy(), Timestamp::now());
        history.current.stellar_systems[0].owner = Some("Granite".to_string());

        let first = serde_json::to_value(&history).unwrap();
        let decoded: History = serde_json::from_value(first.clone()).unwrap();
        let second = serde_json::to_value(&decoded).unwrap();
        assert_eq!(first, second);
        assert_eq!(history, decoded);
    }
}
