//! Persistent entities: fiefdoms and everything stationed on them.
//!
//! These are plain rows. Behaviour lives in the placement, morale and
//! time-advancement modules, which read these snapshots and never touch
//! the store themselves.

use crate::types::{BuildingId, CharacterId, FiefdomId, OfficialId, Timestamp, WallId, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Every stockpile a fiefdom tracks. Order matches the fiefdom table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Peasants,
    Gold,
    Grain,
    Wood,
    Stone,
    Steel,
    Bronze,
    Leather,
    Mana,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::Peasants,
        Resource::Gold,
        Resource::Grain,
        Resource::Wood,
        Resource::Stone,
        Resource::Steel,
        Resource::Bronze,
        Resource::Leather,
        Resource::Mana,
    ];

    /// Column / field name. Also used as the diff field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Peasants => "peasants",
            Self::Gold     => "gold",
            Self::Grain    => "grain",
            Self::Wood     => "wood",
            Self::Stone    => "stone",
            Self::Steel    => "steel",
            Self::Bronze   => "bronze",
            Self::Leather  => "leather",
            Self::Mana     => "mana",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bag of resource amounts: costs, refunds, starting stockpiles.
pub type ResourceBundle = BTreeMap<Resource, i64>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub peasants: i64,
    pub gold:     i64,
    pub grain:    i64,
    pub wood:     i64,
    pub stone:    i64,
    pub steel:    i64,
    pub bronze:   i64,
    pub leather:  i64,
    pub mana:     i64,
}

impl Resources {
    pub fn from_bundle(bundle: &ResourceBundle) -> Self {
        let mut r = Self::default();
        for (res, amount) in bundle {
            *r.get_mut(*res) = *amount;
        }
        r
    }

    pub fn get(&self, resource: Resource) -> i64 {
        match resource {
            Resource::Peasants => self.peasants,
            Resource::Gold     => self.gold,
            Resource::Grain    => self.grain,
            Resource::Wood     => self.wood,
            Resource::Stone    => self.stone,
            Resource::Steel    => self.steel,
            Resource::Bronze   => self.bronze,
            Resource::Leather  => self.leather,
            Resource::Mana     => self.mana,
        }
    }

    pub fn get_mut(&mut self, resource: Resource) -> &mut i64 {
        match resource {
            Resource::Peasants => &mut self.peasants,
            Resource::Gold     => &mut self.gold,
            Resource::Grain    => &mut self.grain,
            Resource::Wood     => &mut self.wood,
            Resource::Stone    => &mut self.stone,
            Resource::Steel    => &mut self.steel,
            Resource::Bronze   => &mut self.bronze,
            Resource::Leather  => &mut self.leather,
            Resource::Mana     => &mut self.mana,
        }
    }

    /// The resources in `cost` this stockpile cannot pay for.
    pub fn shortfall(&self, cost: &ResourceBundle) -> Vec<Resource> {
        cost.iter()
            .filter(|(res, amount)| self.get(**res) < **amount)
            .map(|(res, _)| *res)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiefdom {
    pub id:               FiefdomId,
    pub owner_id:         CharacterId,
    pub name:             String,
    pub x:                i64,
    pub y:                i64,
    pub resources:        Resources,
    /// Highest wall generation raised so far. 0 = no wall ring.
    pub wall_count:       i64,
    pub morale:           f64,
    pub last_update_time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id:                 BuildingId,
    pub fiefdom_id:         FiefdomId,
    pub building_type:      String,
    /// 0 = under construction, >= 1 = active.
    pub level:              i64,
    pub x:                  i64,
    pub y:                  i64,
    /// Start of the running construction or upgrade. 0 when idle.
    pub construction_start: Timestamp,
    pub last_updated:       Timestamp,
}

impl Building {
    pub fn is_active(&self) -> bool {
        self.level >= 1
    }

    pub fn is_constructing(&self) -> bool {
        self.construction_start > 0
    }

    /// Level the running construction will reach.
    pub fn target_level(&self) -> i64 {
        self.level + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wall {
    pub id:                 WallId,
    pub fiefdom_id:         FiefdomId,
    pub generation:         i64,
    pub level:              i64,
    pub hp:                 i64,
    pub construction_start: Timestamp,
    pub last_updated:       Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficialRole {
    Bailiff,
    Wizard,
    Architect,
    Steward,
    Reeve,
    Beadle,
    Constable,
    Forester,
}

impl OfficialRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bailiff   => "bailiff",
            Self::Wizard    => "wizard",
            Self::Architect => "architect",
            Self::Steward   => "steward",
            Self::Reeve     => "reeve",
            Self::Beadle    => "beadle",
            Self::Constable => "constable",
            Self::Forester  => "forester",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(role: &str) -> Option<Self> {
        match role.to_ascii_lowercase().as_str() {
            "bailiff"   => Some(Self::Bailiff),
            "wizard"    => Some(Self::Wizard),
            "architect" => Some(Self::Architect),
            "steward"   => Some(Self::Steward),
            "reeve"     => Some(Self::Reeve),
            "beadle"    => Some(Self::Beadle),
            "constable" => Some(Self::Constable),
            "forester"  => Some(Self::Forester),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Official {
    pub id:           OfficialId,
    pub fiefdom_id:   FiefdomId,
    pub role:         OfficialRole,
    pub template_id:  String,
    pub name:         String,
    pub level:        i64,
    pub intelligence: u8,
    pub charisma:     u8,
    pub wisdom:       u8,
    pub diligence:    u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    pub id:             EntityId,
    pub fiefdom_id:     FiefdomId,
    pub hero_config_id: String,
    pub level:          i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationedCombatant {
    pub id:                  EntityId,
    pub fiefdom_id:          FiefdomId,
    pub combatant_config_id: String,
    pub level:               i64,
}

/// A queued combatant training. Completes into a `StationedCombatant`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJob {
    pub id:                  EntityId,
    pub fiefdom_id:          FiefdomId,
    pub combatant_config_id: String,
    pub level:               i64,
    pub started_at:          Timestamp,
    pub duration_secs:       i64,
}

impl TrainingJob {
    pub fn completes_at(&self) -> Timestamp {
        self.started_at + self.duration_secs
    }
}
