//! Core types for the galaxy journal.
//!
//! Entities come in two shapes: the journaled shape (`System`, `Sector`)
//! holding only the fields the journal tracks, and the trust-boundary shape
//! (`SystemUpdate`, `SectorUpdate`) matching what the host game sends,
//! transient fields included. Conversion from update to journaled shape is
//! the stripping step: journaled types cannot represent transient data.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one simulated session; owns one journal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a stellar system within a galaxy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemId(pub u64);

impl fmt::Debug for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemId({})", self.0)
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a sector within a galaxy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectorId(pub u64);

impl fmt::Debug for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectorId({})", self.0)
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock instant, persisted as an RFC 3339 UTC string.
///
/// Truncated to millisecond precision at construction so the serialized
/// form is fixed-width and lexicographic order matches chronological order,
/// and so a serialize/deserialize round trip is the identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        Timestamp(Utc::now().trunc_subsecs(3))
    }

    /// The wire form: RFC 3339 with millisecond precision and a `Z` suffix.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_rfc3339())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| Timestamp(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

/// Timestamp source, injectable so tests can run on a deterministic clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Production clock backed by wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Map coordinates. Transient: never journaled.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Habitation status of a stellar system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Uninhabited,
    Inhabited,
}

/// One faction's share of a sector's balance of power.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactionShare {
    pub faction: Option<String>,
    pub points: f64,
}

/// A stellar system as journaled: tracked fields only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub id: SystemId,
    pub name: String,
    pub owner: Option<String>,
    pub sector_id: SectorId,
    pub status: SystemStatus,
    pub faction: Option<String>,
}

/// A stellar system as reported by the host game.
///
/// Carries transient observation data (`position`, `score`, `receivedAt`)
/// that must never reach the journal; conversion to [`System`] drops it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemUpdate {
    pub id: SystemId,
    pub name: String,
    pub owner: Option<String>,
    pub sector_id: SectorId,
    pub status: SystemStatus,
    #[serde(default)]
    pub faction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(
        default,
        rename = "receivedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub received_at: Option<Timestamp>,
}

impl From<&SystemUpdate> for System {
    fn from(update: &SystemUpdate) -> Self {
        System {
            id: update.id,
            name: update.name.clone(),
            owner: update.owner.clone(),
            sector_id: update.sector_id,
            status: update.status,
            faction: update.faction.clone(),
        }
    }
}

/// A sector as journaled: tracked fields only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub name: String,
    pub owner: Option<String>,
    pub division: Vec<FactionShare>,
}

/// A sector as reported by the host game.
///
/// `adjacent`, `centroid` and `points` (the boundary polygon, not to be
/// confused with [`FactionShare::points`]) are map geometry the journal
/// never stores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectorUpdate {
    pub id: SectorId,
    pub name: String,
    pub owner: Option<String>,
    #[serde(default)]
    pub division: Vec<FactionShare>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjacent: Vec<SectorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Position>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Position>,
}

impl From<&SectorUpdate> for Sector {
    fn from(update: &SectorUpdate) -> Self {
        Sector {
            id: update.id,
            name: update.name.clone(),
            owner: update.owner.clone(),
            division: update.division.clone(),
        }
    }
}

/// Full galaxy state as journaled: every system and sector, tracked fields
/// only. Entity ids are unique within their list and stable for the life of
/// the instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GalaxyState {
    pub stellar_systems: Vec<System>,
    pub sectors: Vec<Sector>,
}

impl GalaxyState {
    pub fn system(&self, id: SystemId) -> Option<&System> {
        self.stellar_systems.iter().find(|s| s.id == id)
    }

    pub fn system_mut(&mut self, id: SystemId) -> Option<&mut System> {
        self.stellar_systems.iter_mut().find(|s| s.id == id)
    }

    pub fn sector(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.id == id)
    }

    pub fn sector_mut(&mut self, id: SectorId) -> Option<&mut Sector> {
        self.sectors.iter_mut().find(|s| s.id == id)
    }
}

/// Full galaxy dump as supplied by the host at instance creation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GalaxyUpdate {
    #[serde(default)]
    pub stellar_systems: Vec<SystemUpdate>,
    #[serde(default)]
    pub sectors: Vec<SectorUpdate>,
}

impl From<&GalaxyUpdate> for GalaxyState {
    fn from(update: &GalaxyUpdate) -> Self {
        GalaxyState {
            stellar_systems: update.stellar_systems.iter().map(System::from).collect(),
            sectors: update.sectors.iter().map(Sector::from).collect(),
        }
    }
}

/// Live sector truth as resolved by the environment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectorState {
    pub owner: Option<String>,
    pub division: Vec<FactionShare>,
}

/// Authoritative live sector state accessor, injected into system-update
/// application. The journal never resolves sector truth through globals.
///
/// Any `Fn(SectorId) -> Option<SectorState>` closure qualifies, so hosts can
/// hand in a capture over whatever owns the live map.
pub trait SectorLookup {
    fn sector_state(&self, sector: SectorId) -> Option<SectorState>;
}

impl<F> SectorLookup for F
where
    F: Fn(SectorId) -> Option<SectorState>,
{
    fn sector_state(&self, sector: SectorId) -> Option<SectorState> {
        self(sector)
    }
}
