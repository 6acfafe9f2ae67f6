//! Incremental migration of legacy journal documents.
//!
//! The chain is a small state machine over version tags: detect the tag,
//! apply that era's structural rewrite to the raw document in place, detect
//! again, until the document reaches the latest format and parses into a
//! typed [`History`]. Every transition must strictly advance the tag; a
//! rewrite that fails to do so is an error, not a retry.

mod beta;
mod detect;

pub use detect::{
    detect_version, is_alpha_document, is_beta_document, should_upgrade, DocVersion,
};

use crate::error::{JournalError, Result};
use crate::history::History;
use serde_json::Value;
use tracing::debug;

/// Cap on chain steps. One step per known era is plenty; the bound turns a
/// rewrite bug into an error instead of a spin.
const MAX_STEPS: usize = 4;

/// Upgrade a raw document to the latest format and parse it.
///
/// Fails with [`JournalError::UnrecognizedVersion`] when the document cannot
/// be classified or no upgrade path exists for its tag, with
/// [`JournalError::MigrationStalled`] when a rewrite fails to advance the
/// tag, and with [`JournalError::Malformed`] when the fully upgraded
/// document still resists the typed parse or its forward and undo logs come
/// out different lengths.
pub fn upgrade(mut raw: Value) -> Result<History> {
    let mut version = detect_version(&raw);
    let mut steps = 0;

    while !version.is_latest() {
        if steps >= MAX_STEPS {
            return Err(JournalError::MigrationStalled(version));
        }
        steps += 1;

        match version {
            DocVersion::Beta => beta::upgrade_to_v1(&mut raw)?,
            // Reserved tag, no upgrade path; nothing currently classifies
            // as alpha.
            DocVersion::Alpha => return Err(JournalError::UnrecognizedVersion(version)),
            DocVersion::Version(_) | DocVersion::Unknown => {
                return Err(JournalError::UnrecognizedVersion(version))
            }
        }

        let next = detect_version(&raw);
        if next == version {
            return Err(JournalError::MigrationStalled(version));
        }
        debug!(from = %version, to = %next, "advanced journal document one version step");
        version = next;
    }

    let history: History =
        serde_json::from_value(raw).map_err(|e| JournalError::Malformed(e.to_string()))?;

    // Era rewrites restructure the two logs independently. A History's logs
    // pair index-for-index; unequal lengths here are corruption.
    if history.snapshots.len() != history.undo.len() {
        return Err(JournalError::Malformed(format!(
            "unpaired journal logs: {} snapshots vs {} undo records",
            history.snapshots.len(),
            history.undo.len()
        )));
    }

    Ok(history)
}
