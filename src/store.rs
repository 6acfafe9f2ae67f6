//! File-backed store of per-instance journals.
//!
//! One JSON document per instance under the configured root, a process-wide
//! cache keyed by instance id, and the orchestration that ties loading,
//! diffing, migration, and persistence together. This is the only module
//! that touches durable storage.

use crate::diff;
use crate::error::{JournalError, Result};
use crate::history::History;
use crate::migrate;
use crate::types::{
    Clock, GalaxyState, GalaxyUpdate, InstanceId, SectorLookup, SectorUpdate, SystemClock,
    SystemUpdate,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding one `<instance>.json` document per instance.
    pub root: PathBuf,

    /// Run the migration chain when a loaded document is not at the latest
    /// format. When off, legacy documents fail the typed parse and the
    /// `migrate` entry points are left to tooling.
    pub migrate_on_load: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./journals"),
            migrate_on_load: true,
        }
    }
}

/// Keyed store of one [`History`] per instance.
///
/// Loaded journals are cached for the life of the process; the cache is
/// unbounded and never invalidated implicitly (see
/// [`HistoryStore::invalidate`]). The design assumes a single writer
/// process per instance, so there is no file locking and no transaction
/// discipline beyond atomic whole-document replacement.
pub struct HistoryStore {
    config: StoreConfig,
    clock: Box<dyn Clock>,
    cache: RwLock<HashMap<InstanceId, History>>,
    fatal: AtomicBool,
}

impl HistoryStore {
    /// Open a store rooted at `config.root`, creating the directory when
    /// missing. Never fails: if the root cannot be created the store opens
    /// with writes disabled, and every mutating call from then on is a
    /// silent no-op, so unusable storage is never half-written. Reads stay
    /// live and loud.
    pub fn open(config: StoreConfig) -> Self {
        Self::open_with_clock(config, SystemClock)
    }

    /// Open with an injected clock. Tests use this to pin record times.
    pub fn open_with_clock(config: StoreConfig, clock: impl Clock + 'static) -> Self {
        let fatal = match fs::create_dir_all(&config.root) {
            Ok(()) => false,
            Err(e) => {
                error!(
                    root = %config.root.display(),
                    error = %e,
                    "failed to create journal root; disabling all writes"
                );
                true
            }
        };

        Self {
            config,
            clock: Box::new(clock),
            cache: RwLock::new(HashMap::new()),
            fatal: AtomicBool::new(fatal),
        }
    }

    fn writes_disabled(&self) -> bool {
        self.fatal.load(Ordering::Relaxed)
    }

    /// Path of an instance's journal document.
    pub fn instance_path(&self, instance: InstanceId) -> PathBuf {
        self.config.root.join(format!("{}.json", instance))
    }

    /// True if the instance has a journal, cached or on disk.
    pub fn exists(&self, instance: InstanceId) -> bool {
        self.cache.read().contains_key(&instance) || self.instance_path(instance).exists()
    }

    /// Load an instance's journal.
    ///
    /// Returns the cached copy when present; otherwise reads the document
    /// (`NotFound` if absent, `Parse` if undeserializable or claiming a
    /// different instance id), runs the migration chain first when configured
    /// and the document is not at the latest format, and caches the result
    /// for the life of the process.
    /// Loading never writes the upgraded document back; the next persisted
    /// mutation does.
    pub fn load(&self, instance: InstanceId) -> Result<History> {
        self.ensure_cached(instance)?;
        self.cache
            .read()
            .get(&instance)
            .cloned()
            .ok_or(JournalError::NotFound(instance))
    }

    /// Drop the cached entry so the next load re-reads the document.
    ///
    /// The cache otherwise lives as long as the process: edits made to a
    /// backing document out-of-band are never noticed without this.
    pub fn invalidate(&self, instance: InstanceId) {
        self.cache.write().remove(&instance);
    }

    /// Create a journal for an instance from a full galaxy dump, cache it,
    /// and persist it.
    ///
    /// Creation happens once per instance: if a journal already exists the
    /// stored one is returned and the new dump is ignored with a warning,
    /// so a host re-sending its first observation can never wipe a journal.
    pub fn create(&self, instance: InstanceId, galaxy: &GalaxyUpdate) -> Result<History> {
        let history = History::new(instance, GalaxyState::from(galaxy), self.clock.now());
        if self.writes_disabled() {
            debug!(%instance, "storage disabled; create is a no-op");
            return Ok(history);
        }

        if self.exists(instance) {
            warn!(%instance, "journal already exists; ignoring new galaxy snapshot");
            return self.load(instance);
        }

        self.cache.write().insert(instance, history.clone());
        if let Err(e) = self.persist(&history) {
            error!(%instance, error = %e, "failed to persist new journal");
        }
        Ok(history)
    }

    /// Serialize and synchronously overwrite the instance's document.
    ///
    /// The bytes go to a temp file, get fsynced, and are renamed over the
    /// target, so a crash mid-write can never truncate a journal.
    pub fn persist(&self, history: &History) -> Result<()> {
        if self.writes_disabled() {
            debug!(instance = %history.instance, "storage disabled; dropping write");
            return Ok(());
        }

        let bytes = serde_json::to_vec_pretty(history)
            .map_err(|e| JournalError::Serialization(e.to_string()))?;
        write_atomic(&self.instance_path(history.instance), &bytes)
    }

    /// Record one system observation: load, diff, persist when changed.
    ///
    /// Returns whether a transition was recorded. Read-path failures
    /// (missing journal, unknown ids) propagate; a persist failure after a
    /// recorded transition is logged and swallowed.
    pub fn apply_system_update(
        &self,
        candidate: &SystemUpdate,
        instance: InstanceId,
        sectors: &dyn SectorLookup,
    ) -> Result<bool> {
        if self.writes_disabled() {
            debug!(%instance, system = %candidate.id, "storage disabled; dropping system update");
            return Ok(false);
        }
        self.ensure_cached(instance)?;

        let mut cache = self.cache.write();
        let history = cache
            .get_mut(&instance)
            .ok_or(JournalError::NotFound(instance))?;
        let changed = diff::apply_system_update(history, candidate, sectors, self.clock.now())?;

        if changed {
            let snapshot = history.clone();
            drop(cache);
            if let Err(e) = self.persist(&snapshot) {
                error!(%instance, error = %e, "failed to persist journal after system update");
            }
        }
        Ok(changed)
    }

    /// Record sector observations, one forward/undo pair per sector whose
    /// `owner` differs from the stored state.
    ///
    /// An empty slice (the host observed no galaxy) is a no-op before any
    /// I/O. Candidate ids are validated against `current` before any diff
    /// is applied, so an unknown sector fails the whole batch without
    /// partial mutation; one persist covers the batch. Returns the number
    /// of transitions recorded.
    pub fn apply_sector_update(
        &self,
        candidates: &[SectorUpdate],
        instance: InstanceId,
    ) -> Result<usize> {
        if candidates.is_empty() {
            return Ok(0);
        }
        if self.writes_disabled() {
            debug!(%instance, "storage disabled; dropping sector update");
            return Ok(0);
        }
        self.ensure_cached(instance)?;

        let mut cache = self.cache.write();
        let history = cache
            .get_mut(&instance)
            .ok_or(JournalError::NotFound(instance))?;

        for candidate in candidates {
            if history.current.sector(candidate.id).is_none() {
                return Err(JournalError::UnknownSector {
                    sector: candidate.id,
                    instance,
                });
            }
        }

        let mut recorded = 0;
        for candidate in candidates {
            if diff::apply_sector_update(history, candidate, self.clock.now())? {
                recorded += 1;
            }
        }

        if recorded > 0 {
            let snapshot = history.clone();
            drop(cache);
            if let Err(e) = self.persist(&snapshot) {
                error!(%instance, error = %e, "failed to persist journal after sector update");
            }
        }
        Ok(recorded)
    }

    fn ensure_cached(&self, instance: InstanceId) -> Result<()> {
        if self.cache.read().contains_key(&instance) {
            return Ok(());
        }
        let history = self.read_document(instance)?;
        self.cache.write().insert(instance, history);
        Ok(())
    }

    fn read_document(&self, instance: InstanceId) -> Result<History> {
        let path = self.instance_path(instance);
        if !path.exists() {
            return Err(JournalError::NotFound(instance));
        }

        let bytes = fs::read(&path)?;
        let raw: Value = serde_json::from_slice(&bytes).map_err(|e| JournalError::Parse {
            instance,
            reason: e.to_string(),
        })?;

        let history: History = if self.config.migrate_on_load && migrate::should_upgrade(&raw) {
            let from = migrate::detect_version(&raw);
            match migrate::upgrade(raw) {
                Ok(history) => {
                    info!(%instance, %from, "upgraded legacy journal document");
                    history
                }
                Err(e) => {
                    error!(%instance, %from, error = %e, "failed to migrate journal document");
                    return Err(e);
                }
            }
        } else {
            serde_json::from_value(raw).map_err(|e| JournalError::Parse {
                instance,
                reason: e.to_string(),
            })?
        };

        // persist derives the write path from the document's instance field.
        if history.instance != instance {
            return Err(JournalError::Parse {
                instance,
                reason: format!("document belongs to instance {}", history.instance),
            });
        }

        Ok(history)
    }
}

/// Write via temp file + fsync + rename so the target is replaced whole or
/// not at all. Directory fsync is best-effort.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    #[cfg(unix)]
    if let Some(dir) = path.parent() {
        if let Ok(handle) = File::open(dir) {
            let _ = handle.sync_all();
        }
    }

    Ok(())
}
