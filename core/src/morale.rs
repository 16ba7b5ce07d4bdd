//! Morale aggregator — folds every morale source of a fiefdom into one
//! score bounded to [0, 100].
//!
//! PASS ORDER (fixed): buildings → walls → officials → heroes → combatants.
//! Within a source, Add contributions are summed and only the largest Max
//! contribution is kept; both are added to the running total before that
//! source's Multiply factors scale it.
//!
//! Pure: reads snapshots and configuration only.

use crate::{
    config::GameConfig,
    model::{Building, Hero, Official, StationedCombatant, Wall},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MORALE_FLOOR:   f64 = 0.0;
pub const MORALE_CEILING: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMode {
    #[default]
    Add,
    Max,
    Multiply,
}

/// Morale effect attached to a single configuration entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoraleEffect {
    /// Value at each level, starting at level 1. Levels past the end reuse
    /// the last entry.
    #[serde(default)]
    pub per_level: Vec<f64>,
    #[serde(default)]
    pub mode: EffectMode,
    /// Upper bound on this entry's contribution.
    #[serde(default)]
    pub cap: Option<f64>,
}

impl MoraleEffect {
    pub fn value_at(&self, level: i64) -> f64 {
        if level <= 0 || self.per_level.is_empty() {
            return 0.0;
        }
        let idx = ((level - 1) as usize).min(self.per_level.len() - 1);
        self.per_level[idx]
    }

    fn capped(&self, value: f64) -> f64 {
        match self.cap {
            Some(cap) => value.min(cap),
            None => value,
        }
    }

    fn contribution(&self, value: f64) -> Contribution {
        Contribution { mode: self.mode, value: self.capped(value) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub mode:  EffectMode,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoraleSource {
    Buildings,
    Walls,
    Officials,
    Heroes,
    Combatants,
}

/// Per-source effect on the running total, plus the final score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoraleBreakdown {
    pub buildings:  f64,
    pub walls:      f64,
    pub officials:  f64,
    pub heroes:     f64,
    pub combatants: f64,
    /// Running total before clamping.
    pub raw:        f64,
    pub score:      f64,
}

/// Everything the aggregator looks at for one fiefdom.
#[derive(Debug, Clone, Copy)]
pub struct MoraleInputs<'a> {
    pub buildings:  &'a [Building],
    pub walls:      &'a [Wall],
    pub officials:  &'a [Official],
    pub heroes:     &'a [Hero],
    pub combatants: &'a [StationedCombatant],
}

/// Bound a morale value to [0, 100]. NaN collapses to the floor.
pub fn clamp_morale(value: f64) -> f64 {
    if value.is_nan() {
        return MORALE_FLOOR;
    }
    value.clamp(MORALE_FLOOR, MORALE_CEILING)
}

/// Combined contribution of every active building of one type.
///
/// `levels` holds the level of each building of that type; inactive
/// (level 0) buildings are ignored. Returns None when nothing contributes.
pub fn building_contribution(effect: Option<&MoraleEffect>, levels: &[i64]) -> Option<Contribution> {
    let effect = effect?;
    let values: Vec<f64> = levels
        .iter()
        .filter(|l| **l > 0)
        .map(|l| effect.value_at(*l))
        .collect();
    if values.is_empty() {
        return None;
    }
    let combined = match effect.mode {
        EffectMode::Add      => values.iter().sum(),
        EffectMode::Max      => values.iter().copied().fold(f64::MIN, f64::max),
        EffectMode::Multiply => values.iter().product(),
    };
    Some(effect.contribution(combined))
}

/// A single levelled entry: a wall, an official, a hero or a combatant.
fn levelled_contribution(effect: Option<&MoraleEffect>, level: i64) -> Option<Contribution> {
    let effect = effect?;
    if level <= 0 {
        return None;
    }
    Some(effect.contribution(effect.value_at(level)))
}

pub fn building_contributions(config: &GameConfig, buildings: &[Building]) -> Vec<Contribution> {
    let mut levels_by_type: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    for b in buildings {
        levels_by_type.entry(b.building_type.as_str()).or_default().push(b.level);
    }
    levels_by_type
        .into_iter()
        .filter_map(|(name, levels)| {
            let effect = config.building(name).and_then(|c| c.morale.as_ref());
            building_contribution(effect, &levels)
        })
        .collect()
}

pub fn wall_contributions(config: &GameConfig, walls: &[Wall]) -> Vec<Contribution> {
    walls
        .iter()
        .filter_map(|w| {
            let effect = config.wall(w.generation).and_then(|c| c.morale.as_ref());
            levelled_contribution(effect, w.level)
        })
        .collect()
}

pub fn official_contributions(config: &GameConfig, officials: &[Official]) -> Vec<Contribution> {
    officials
        .iter()
        .filter_map(|o| {
            let effect = config.officials.get(&o.template_id).and_then(|c| c.morale.as_ref());
            levelled_contribution(effect, o.level)
        })
        .collect()
}

pub fn hero_contributions(config: &GameConfig, heroes: &[Hero]) -> Vec<Contribution> {
    heroes
        .iter()
        .filter_map(|h| {
            let effect = config.heroes.get(&h.hero_config_id).and_then(|c| c.morale.as_ref());
            levelled_contribution(effect, h.level)
        })
        .collect()
}

pub fn combatant_contributions(config: &GameConfig, combatants: &[StationedCombatant]) -> Vec<Contribution> {
    combatants
        .iter()
        .filter_map(|c| {
            let effect = config.combatants.get(&c.combatant_config_id).and_then(|cfg| cfg.morale.as_ref());
            levelled_contribution(effect, c.level)
        })
        .collect()
}

/// Apply one source's contributions to the running total.
pub fn apply_source(total: f64, contributions: &[Contribution]) -> f64 {
    let mut adds = 0.0;
    let mut best: Option<f64> = None;
    for c in contributions {
        match c.mode {
            EffectMode::Add => adds += c.value,
            EffectMode::Max => best = Some(best.map_or(c.value, |b| b.max(c.value))),
            EffectMode::Multiply => {}
        }
    }

    let mut next = total + adds + best.unwrap_or(0.0);
    for c in contributions {
        // A non-positive factor is a config hole, not a wipe-out.
        if c.mode == EffectMode::Multiply && c.value > 0.0 {
            next *= c.value;
        }
    }
    next
}

pub fn calculate_fiefdom_morale(config: &GameConfig, inputs: &MoraleInputs<'_>) -> MoraleBreakdown {
    let passes: [(MoraleSource, Vec<Contribution>); 5] = [
        (MoraleSource::Buildings,  building_contributions(config, inputs.buildings)),
        (MoraleSource::Walls,      wall_contributions(config, inputs.walls)),
        (MoraleSource::Officials,  official_contributions(config, inputs.officials)),
        (MoraleSource::Heroes,     hero_contributions(config, inputs.heroes)),
        (MoraleSource::Combatants, combatant_contributions(config, inputs.combatants)),
    ];

    let mut breakdown = MoraleBreakdown::default();
    let mut total = MORALE_FLOOR;
    for (source, contributions) in &passes {
        let next = apply_source(total, contributions);
        let delta = next - total;
        match source {
            MoraleSource::Buildings  => breakdown.buildings  = delta,
            MoraleSource::Walls      => breakdown.walls      = delta,
            MoraleSource::Officials  => breakdown.officials  = delta,
            MoraleSource::Heroes     => breakdown.heroes     = delta,
            MoraleSource::Combatants => breakdown.combatants = delta,
        }
        total = next;
    }

    breakdown.raw = total;
    breakdown.score = clamp_morale(total);
    breakdown
}
