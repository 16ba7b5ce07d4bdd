//! Shared primitive types used across the entire simulation.

/// Wall-clock time in whole seconds since the Unix epoch.
pub type Timestamp = i64;

/// Row identifiers as assigned by the store.
pub type FiefdomId   = i64;
pub type CharacterId = i64;
pub type BuildingId  = i64;
pub type WallId      = i64;
pub type OfficialId  = i64;

/// A stable, unique identifier for any entity in the simulation.
pub type EntityId = i64;

pub const SECONDS_PER_HOUR: f64 = 3600.0;
