//! Change detection and journal record construction.
//!
//! These functions are pure with respect to storage: they inspect and mutate
//! a loaded [`History`] and report whether anything changed; persistence is
//! the store's job. Change detection is deliberately narrow (`owner` and
//! `status` for systems, `owner` for sectors) so routine observation churn
//! over positions, scores, and geometry never grows the journal.

use crate::error::{JournalError, Result};
use crate::history::{History, SnapshotRecord};
use crate::types::{Sector, SectorLookup, SectorUpdate, System, SystemUpdate, Timestamp};

/// Apply one system observation to the journal.
///
/// If the candidate's `owner` or `status` differs from the stored system, a
/// forward/undo record pair is appended: the undo half captures the stored
/// system and sector as they were (timestamped with the journal's previous
/// transition time), the forward half captures the candidate and the live
/// sector truth at `now`. The stored system's `owner`/`faction`/`status` and
/// the stored sector's `owner`/`division` are updated in place.
///
/// Returns `Ok(false)` without touching the journal when nothing tracked
/// changed.
pub fn apply_system_update(
    history: &mut History,
    candidate: &SystemUpdate,
    sectors: &dyn SectorLookup,
    now: Timestamp,
) -> Result<bool> {
    let instance = history.instance;

    let stored_system = history
        .current
        .system(candidate.id)
        .cloned()
        .ok_or(JournalError::UnknownSystem {
            system: candidate.id,
            instance,
        })?;
    let stored_sector = history
        .current
        .sector(candidate.sector_id)
        .cloned()
        .ok_or(JournalError::UnknownSector {
            sector: candidate.sector_id,
            instance,
        })?;

    if stored_system.owner == candidate.owner && stored_system.status == candidate.status {
        return Ok(false);
    }

    // Live balance at the moment of transition. On a miss the stored values
    // stand in; the record never carries a half-resolved sector.
    let live = sectors.sector_state(candidate.sector_id);
    let forward_sector = match &live {
        Some(state) => Sector {
            owner: state.owner.clone(),
            division: state.division.clone(),
            ..stored_sector.clone()
        },
        None => stored_sector.clone(),
    };

    let undo = SnapshotRecord {
        time: history.current_timestamp,
        system: Some(stored_system),
        sector: Some(stored_sector),
    };
    let forward = SnapshotRecord {
        time: now,
        system: Some(System::from(candidate)),
        sector: Some(forward_sector),
    };

    let system = history
        .current
        .system_mut(candidate.id)
        .ok_or(JournalError::UnknownSystem {
            system: candidate.id,
            instance,
        })?;
    system.owner = candidate.owner.clone();
    system.faction = candidate.faction.clone();
    system.status = candidate.status;

    if let Some(state) = live {
        let sector = history
            .current
            .sector_mut(candidate.sector_id)
            .ok_or(JournalError::UnknownSector {
                sector: candidate.sector_id,
                instance,
            })?;
        sector.owner = state.owner;
        sector.division = state.division;
    }

    history.record_transition(undo, forward);
    Ok(true)
}

/// Apply one sector observation to the journal.
///
/// Change detection compares `owner` only. A difference appends a
/// sector-only record pair (no system half) and updates the stored sector's
/// `owner` and `division` from the candidate.
pub fn apply_sector_update(
    history: &mut History,
    candidate: &SectorUpdate,
    now: Timestamp,
) -> Result<bool> {
    let instance = history.instance;

    let stored_sector = history
        .current
        .sector(candidate.id)
        .cloned()
        .ok_or(JournalError::UnknownSector {
            sector: candidate.id,
            instance,
        })?;

    if stored_sector.owner == candidate.owner {
        return Ok(false);
    }

    let undo = SnapshotRecord {
        time: history.current_timestamp,
        system: None,
        sector: Some(stored_sector),
    };
    let forward = SnapshotRecord {
        time: now,
        system: None,
        sector: Some(Sector::from(candidate)),
    };

    let sector = history
        .current
        .sector_mut(candidate.id)
        .ok_or(JournalError::UnknownSector {
            sector: candidate.id,
            instance,
        })?;
    sector.owner = candidate.owner.clone();
    sector.division = candidate.division.clone();

    history.record_transition(undo, forward);
    Ok(true)
}
