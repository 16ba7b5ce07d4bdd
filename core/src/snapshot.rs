//! Fiefdom snapshot — the full, caught-up state of one fiefdom as a single
//! serializable value. Served to callers on every state read.

use crate::{
    model::{Building, Fiefdom, Hero, Official, StationedCombatant, TrainingJob, Wall},
    morale::MoraleBreakdown,
    types::Timestamp,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiefdomSnapshot {
    pub taken_at:   Timestamp,
    pub fiefdom:    Fiefdom,
    pub buildings:  Vec<Building>,
    pub walls:      Vec<Wall>,
    pub officials:  Vec<Official>,
    pub heroes:     Vec<Hero>,
    pub combatants: Vec<StationedCombatant>,
    pub training:   Vec<TrainingJob>,
    pub morale:     MoraleBreakdown,
}

impl FiefdomSnapshot {
    pub fn building(&self, id: i64) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn buildings_of_type<'a>(&'a self, building_type: &'a str) -> impl Iterator<Item = &'a Building> + 'a {
        self.buildings.iter().filter(move |b| b.building_type == building_type)
    }
}
