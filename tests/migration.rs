//! Legacy document classification and upgrade, end to end.

use proptest::prelude::*;
use serde_json::{json, Value};
use starlog::{
    detect_version, should_upgrade, upgrade, DocVersion, HistoryStore, InstanceId, JournalError,
    SectorId, SectorState, StoreConfig, SystemId, SystemStatus, SystemUpdate,
};
use std::fs;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn test_store(dir: &TempDir) -> HistoryStore {
    HistoryStore::open(StoreConfig {
        root: dir.path().join("journals"),
        migrate_on_load: true,
    })
}

/// A beta-era journal: one recorded transition, stored as flat system and
/// sector entries sharing a timestamp, no version field anywhere.
fn beta_document() -> Value {
    json!({
        "start": "2019-06-01T00:00:00.000Z",
        "base": {
            "stellar_systems": [{
                "id": 1, "name": "Sol", "owner": null,
                "sector_id": 0, "status": "uninhabited", "faction": null
            }],
            "sectors": [{"id": 0, "name": "Core", "owner": null, "division": []}]
        },
        "current": {
            "stellar_systems": [{
                "id": 1, "name": "Sol", "owner": "Granite",
                "sector_id": 0, "status": "uninhabited", "faction": "Granite"
            }],
            "sectors": [{"id": 0, "name": "Core", "owner": "Granite", "division": []}]
        },
        "snapshots": [
            {
                "time": "2019-06-01T00:01:00.000Z",
                "id": 1, "name": "Sol", "owner": "Granite",
                "sector_id": 0, "status": "uninhabited", "faction": "Granite",
                "position": {"x": 5.0, "y": 5.0}
            },
            {
                "time": "2019-06-01T00:01:00.000Z",
                "id": 0, "name": "Core", "owner": "Granite", "division": [],
                "adjacent": [2, 3], "points": [{"x": 0.0, "y": 0.0}]
            }
        ],
        "undo": [
            {
                "time": "2019-06-01T00:00:00.000Z",
                "id": 1, "name": "Sol", "owner": null,
                "sector_id": 0, "status": "uninhabited", "faction": null
            },
            {
                "time": "2019-06-01T00:00:00.000Z",
                "id": 0, "name": "Core", "owner": null, "division": []
            }
        ],
        "instance": 11,
        "currentTimestamp": "2019-06-01T00:01:00.000Z"
    })
}

// --- Classification ---

#[test]
fn test_detector_table() {
    assert_eq!(detect_version(&json!({})), DocVersion::Unknown);
    assert_eq!(detect_version(&json!({"snapshots": [{}]})), DocVersion::Beta);
    assert_eq!(
        detect_version(&json!({"version": 1, "snapshots": []})),
        DocVersion::Version(1)
    );
    assert_eq!(detect_version(&beta_document()), DocVersion::Beta);
}

#[test]
fn test_should_upgrade_rules() {
    assert!(should_upgrade(&json!({"version": 0.5})));
    assert!(should_upgrade(&json!({})));
    assert!(should_upgrade(&beta_document()));
    assert!(!should_upgrade(&json!({"version": 1})));
}

// --- The chain itself ---

#[test]
fn test_beta_upgrade_bundles_flat_pairs() {
    init_tracing();
    let history = upgrade(beta_document()).unwrap();

    assert_eq!(history.version, 1);
    assert_eq!(history.instance, InstanceId(11));
    assert_eq!(history.transition_count(), 1);

    let forward = &history.snapshots[0];
    let system = forward.system.as_ref().unwrap();
    let sector = forward.sector.as_ref().unwrap();
    assert_eq!(system.owner.as_deref(), Some("Granite"));
    assert_eq!(system.id, SystemId(1));
    assert_eq!(sector.owner.as_deref(), Some("Granite"));
    assert_eq!(sector.id, SectorId(0));

    let undo = &history.undo[0];
    assert_eq!(undo.system.as_ref().unwrap().owner, None);
    assert_eq!(undo.sector.as_ref().unwrap().owner, None);
}

#[test]
fn test_unevenly_bundled_logs_fail_the_upgrade() {
    // The forward halves share a timestamp and merge into one record; the
    // undo halves are pushed apart so they bundle separately. The upgrade
    // must refuse to return logs of different lengths.
    let mut doc = beta_document();
    doc["undo"][1]["time"] = json!("2019-06-01T00:00:30.000Z");

    let err = upgrade(doc).unwrap_err();
    assert!(matches!(err, JournalError::Malformed(_)));
    assert!(err.to_string().contains("1 snapshots vs 2 undo"));
}

#[test]
fn test_unknown_document_fails_with_tag() {
    let err = upgrade(json!({})).unwrap_err();
    assert!(matches!(
        err,
        JournalError::UnrecognizedVersion(DocVersion::Unknown)
    ));
    assert_eq!(err.to_string(), "Unrecognized document version: unknown");
}

#[test]
fn test_future_version_fails() {
    let err = upgrade(json!({"version": 7})).unwrap_err();
    assert!(matches!(
        err,
        JournalError::UnrecognizedVersion(DocVersion::Version(7))
    ));
}

// --- Wired into the load path ---

#[test]
fn test_load_migrates_then_first_mutation_persists_latest() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let path = store.instance_path(InstanceId(11));
    fs::write(&path, serde_json::to_vec_pretty(&beta_document()).unwrap()).unwrap();

    // Loading upgrades in memory only.
    let history = store.load(InstanceId(11)).unwrap();
    assert_eq!(history.version, 1);
    assert_eq!(history.transition_count(), 1);
    let on_disk: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert!(on_disk.get("version").is_none());

    // The next recorded transition writes the upgraded document back.
    let update = SystemUpdate {
        id: SystemId(1),
        name: "Sol".to_string(),
        owner: Some("Basalt".to_string()),
        sector_id: SectorId(0),
        status: SystemStatus::Uninhabited,
        faction: Some("Basalt".to_string()),
        position: None,
        score: None,
        received_at: None,
    };
    let lookup = |_: SectorId| Option::<SectorState>::None;
    assert!(store
        .apply_system_update(&update, InstanceId(11), &lookup)
        .unwrap());

    let on_disk: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk["version"], json!(1));
    assert_eq!(on_disk["snapshots"].as_array().unwrap().len(), 2);
    // Bundled v1 records on disk now, not flat beta entries.
    assert!(on_disk["snapshots"][0].get("system").is_some());

    let fresh = test_store(&dir);
    let reloaded = fresh.load(InstanceId(11)).unwrap();
    assert_eq!(reloaded.transition_count(), 2);
    assert_eq!(
        reloaded.current.stellar_systems[0].owner.as_deref(),
        Some("Basalt")
    );
}

#[test]
fn test_load_surfaces_unrecognized_version() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let path = store.instance_path(InstanceId(12));
    fs::write(&path, serde_json::to_vec(&json!({"version": 0.5})).unwrap()).unwrap();

    let err = store.load(InstanceId(12)).unwrap_err();
    assert!(matches!(
        err,
        JournalError::UnrecognizedVersion(DocVersion::Unknown)
    ));
}

// --- Robustness over arbitrary documents ---

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1e9f64..1e9f64).prop_map(|f| json!(f)),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z_]{1,10}", inner), 0..6).prop_map(|pairs| {
                Value::Object(pairs.into_iter().collect())
            }),
        ]
    })
}

proptest! {
    /// No input, however mangled, may panic the detector or the chain.
    #[test]
    fn prop_detection_and_upgrade_never_panic(doc in arb_json()) {
        let tag = detect_version(&doc);
        prop_assert_eq!(should_upgrade(&doc), !tag.is_latest());
        let _ = upgrade(doc);
    }

    /// Integer version fields classify as themselves, and only the latest
    /// version is exempt from upgrading.
    #[test]
    fn prop_integer_versions_classify_exactly(version in 0u32..16) {
        let doc = json!({"version": version, "snapshots": []});
        prop_assert_eq!(detect_version(&doc), DocVersion::Version(version));
        prop_assert_eq!(should_upgrade(&doc), version != 1);
    }

    /// The beta signature never fires on a versioned document.
    #[test]
    fn prop_versioned_documents_are_never_beta(version in 0u32..16, entries in 0usize..4) {
        let snapshots: Vec<Value> = (0..entries).map(|_| json!({})).collect();
        let doc = json!({"version": version, "snapshots": snapshots});
        prop_assert!(detect_version(&doc) != DocVersion::Beta);
    }
}
