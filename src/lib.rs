//! # Starlog
//!
//! A per-instance, append-only journal of ownership and status transitions
//! for a galaxy simulation, with paired undo records and incremental
//! migration of legacy journal documents.
//!
//! ## Core Concepts
//!
//! - **History**: one journal per simulation instance: the galaxy as first
//!   observed (`base`), as currently tracked (`current`), and every
//!   transition in between
//! - **Forward/undo records**: each recorded transition appends an "after"
//!   record to `snapshots` and its "before" inverse at the same index of
//!   `undo`, enabling backward replay
//! - **Diffing**: updates from the host only reach the journal when a
//!   tracked field changes (`owner`/`status` for systems, `owner` for
//!   sectors); transient observation data is stripped at the boundary
//! - **Migration**: raw documents are classified by a version detector and
//!   upgraded in place, one era at a time, before the typed parse
//!
//! ## Example
//!
//! ```ignore
//! use starlog::{HistoryStore, InstanceId, StoreConfig};
//!
//! let store = HistoryStore::open(StoreConfig {
//!     root: "./journals".into(),
//!     ..Default::default()
//! });
//!
//! // First full observation creates the journal.
//! let history = store.create(InstanceId(20), &galaxy_dump)?;
//!
//! // Later observations are diffed; only real transitions are recorded.
//! let changed = store.apply_system_update(&system, InstanceId(20), &lookup)?;
//!
//! // Replay material: paired forward/undo logs.
//! let history = store.load(InstanceId(20))?;
//! assert_eq!(history.snapshots.len(), history.undo.len());
//! ```

pub mod diff;
pub mod error;
pub mod history;
pub mod migrate;
pub mod store;
pub mod types;

// Re-exports
pub use error::{JournalError, Result};
pub use history::{History, SnapshotRecord, LATEST_VERSION};
pub use migrate::{
    detect_version, is_alpha_document, is_beta_document, should_upgrade, upgrade, DocVersion,
};
pub use store::{HistoryStore, StoreConfig};
pub use types::*;
