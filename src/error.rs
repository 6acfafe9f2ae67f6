//! Error types for the journal.

use crate::migrate::DocVersion;
use crate::types::{InstanceId, SectorId, SystemId};
use thiserror::Error;

/// Main error type for journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No history for instance {0}")]
    NotFound(InstanceId),

    #[error("Failed to parse history for instance {instance}: {reason}")]
    Parse { instance: InstanceId, reason: String },

    #[error("Unknown system {system} in instance {instance}")]
    UnknownSystem {
        system: SystemId,
        instance: InstanceId,
    },

    #[error("Unknown sector {sector} in instance {instance}")]
    UnknownSector {
        sector: SectorId,
        instance: InstanceId,
    },

    #[error("Unrecognized document version: {0}")]
    UnrecognizedVersion(DocVersion),

    #[error("Migration stalled at version {0}")]
    MigrationStalled(DocVersion),

    #[error("Malformed history document: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;
