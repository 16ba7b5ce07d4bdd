//! Time advancement engine — lazy catch-up from elapsed wall-clock time.
//!
//! There is no tick loop. A pass brings one fiefdom (or all of them) from a
//! checkpoint up to `now`.
//!
//! PASS ORDER per fiefdom (fixed):
//!   1. building constructions / upgrades complete
//!   2. wall constructions / upgrades complete
//!   3. production accrues, split at any upgrade that landed mid-window
//!   4. training jobs complete into stationed combatants
//!   5. morale is recomputed and stored
//!
//! A fiefdom's window starts at max(pass checkpoint, fiefdom checkpoint), so
//! an administrative sweep never double-counts a fiefdom caught up lazily in
//! between. Only whole units reach the stockpile; the fraction stays in the
//! building's production accumulator.

use crate::{
    action::{EntityKind, FieldDiff},
    clock::Clock,
    config::GameConfig,
    error::{GameError, GameResult},
    model::{Building, Resource},
    morale::{calculate_fiefdom_morale, MoraleInputs},
    store::GameStore,
    types::{BuildingId, EntityId, FiefdomId, Timestamp, WallId, SECONDS_PER_HOUR},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance for float noise before flooring accrued production.
const ACCRUAL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionEntry {
    pub fiefdom_id:  FiefdomId,
    pub resource:    Resource,
    pub amount:      i64,
    pub source_type: String,
    pub source_id:   BuildingId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletedJob {
    Building {
        fiefdom_id:    FiefdomId,
        building_id:   BuildingId,
        building_type: String,
        level:         i64,
        completed_at:  Timestamp,
    },
    Wall {
        fiefdom_id:   FiefdomId,
        wall_id:      WallId,
        generation:   i64,
        level:        i64,
        completed_at: Timestamp,
    },
    Training {
        fiefdom_id:     FiefdomId,
        job_id:         EntityId,
        combatant_id:   EntityId,
        combatant_type: String,
        level:          i64,
        completed_at:   Timestamp,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoraleChange {
    pub fiefdom_id: FiefdomId,
    pub old:        f64,
    pub new:        f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeUpdateResult {
    pub new_timestamp:              Timestamp,
    pub elapsed_hours:              f64,
    pub production_updates_applied: usize,
    pub productions:                Vec<ProductionEntry>,
    pub completed:                  Vec<CompletedJob>,
    pub morale_changes:             Vec<MoraleChange>,
    pub fiefdoms_updated:           usize,
    /// Every stored field the pass changed, for callers that broadcast.
    #[serde(skip)]
    pub diffs:                      Vec<FieldDiff>,
}

impl TimeUpdateResult {
    /// Total whole units of `resource` accrued by `fiefdom_id` in this pass.
    pub fn produced(&self, fiefdom_id: FiefdomId, resource: Resource) -> i64 {
        self.productions
            .iter()
            .filter(|p| p.fiefdom_id == fiefdom_id && p.resource == resource)
            .map(|p| p.amount)
            .sum()
    }
}

/// An upgrade or construction that landed during the current pass.
#[derive(Debug, Clone, Copy)]
struct LevelChange {
    old_level:    i64,
    new_level:    i64,
    completed_at: Timestamp,
}

pub struct TimeEngine<'a> {
    config: &'a GameConfig,
    store:  &'a GameStore,
    clock:  &'a dyn Clock,
}

impl<'a> TimeEngine<'a> {
    pub fn new(config: &'a GameConfig, store: &'a GameStore, clock: &'a dyn Clock) -> Self {
        Self { config, store, clock }
    }

    /// Bring every fiefdom in scope up to the clock's `now`, in one
    /// transaction. `filter = None` sweeps all fiefdoms.
    pub fn update_state_since(
        &self,
        last_update_time: Timestamp,
        filter: Option<FiefdomId>,
    ) -> GameResult<TimeUpdateResult> {
        let now = self.clock.now();
        if last_update_time > now {
            return Err(GameError::FutureCheckpoint { checkpoint: last_update_time, now });
        }
        let tx = self.store.begin_transaction()?;
        let result = self.advance(last_update_time, now, filter)?;
        tx.commit()?;
        Ok(result)
    }

    /// Same as `update_state_since` but runs inside whatever transaction the
    /// caller holds.
    pub fn advance(
        &self,
        last_update_time: Timestamp,
        now: Timestamp,
        filter: Option<FiefdomId>,
    ) -> GameResult<TimeUpdateResult> {
        debug_assert!(self.store.in_transaction(), "time pass outside a transaction");
        if last_update_time > now {
            return Err(GameError::FutureCheckpoint { checkpoint: last_update_time, now });
        }
        let ids = match filter {
            Some(id) => vec![id],
            None => self.store.all_fiefdom_ids()?,
        };

        let mut result = TimeUpdateResult {
            new_timestamp: now,
            elapsed_hours: (now - last_update_time) as f64 / SECONDS_PER_HOUR,
            ..TimeUpdateResult::default()
        };
        for id in ids {
            self.advance_fiefdom(id, last_update_time, now, &mut result)?;
        }
        result.production_updates_applied = result.productions.len();

        debug!(
            "time pass to {now}: {} fiefdom(s), {} production entries, {} completion(s)",
            result.fiefdoms_updated,
            result.production_updates_applied,
            result.completed.len()
        );
        Ok(result)
    }

    fn advance_fiefdom(
        &self,
        fiefdom_id: FiefdomId,
        since: Timestamp,
        now: Timestamp,
        result: &mut TimeUpdateResult,
    ) -> GameResult<()> {
        let fiefdom = self.store
            .get_fiefdom(fiefdom_id)?
            .ok_or(GameError::FiefdomNotFound { id: fiefdom_id })?;
        let window_start = since.max(fiefdom.last_update_time).min(now);

        let buildings = self.store.buildings_for_fiefdom(fiefdom_id)?;
        let level_changes = self.complete_buildings(&buildings, now, result)?;
        self.complete_walls(fiefdom_id, now, result)?;

        let mut resources = fiefdom.resources.clone();
        for building in &buildings {
            let change = level_changes.get(&building.id).copied();
            for (resource, amount) in self.accrue(building, change, window_start, now)? {
                *resources.get_mut(resource) += amount;
                result.productions.push(ProductionEntry {
                    fiefdom_id,
                    resource,
                    amount,
                    source_type: building.building_type.clone(),
                    source_id:   building.id,
                });
            }
        }
        if resources != fiefdom.resources {
            self.store.update_resources(fiefdom_id, &resources)?;
            for resource in Resource::ALL {
                let (old, new) = (fiefdom.resources.get(resource), resources.get(resource));
                if old != new {
                    result.diffs.push(FieldDiff::new(EntityKind::Fiefdom, fiefdom_id, resource.as_str(), old, new));
                }
            }
        }

        self.complete_training(fiefdom_id, now, result)?;
        self.recompute_morale(fiefdom_id, fiefdom.morale, result)?;

        self.store.update_last_update_time(fiefdom_id, now)?;
        if fiefdom.last_update_time != now {
            result.diffs.push(FieldDiff::new(
                EntityKind::Fiefdom,
                fiefdom_id,
                "last_update_time",
                fiefdom.last_update_time,
                now,
            ));
        }
        result.fiefdoms_updated += 1;
        Ok(())
    }

    // ── Construction ──────────────────────────────────────────

    fn complete_buildings(
        &self,
        buildings: &[Building],
        now: Timestamp,
        result: &mut TimeUpdateResult,
    ) -> GameResult<BTreeMap<BuildingId, LevelChange>> {
        let mut changes = BTreeMap::new();
        for b in buildings.iter().filter(|b| b.is_constructing()) {
            let target = b.target_level();
            let Some(duration) = self.config
                .building(&b.building_type)
                .and_then(|cfg| cfg.construction_time(target))
            else {
                warn!("building {} has unknown type '{}'; construction left pending", b.id, b.building_type);
                continue;
            };
            if now - b.construction_start < duration {
                continue;
            }
            let completed_at = b.construction_start + duration;
            self.store.complete_building_construction(b.id, target, completed_at)?;
            info!(
                "fiefdom {}: {} #{} reached level {target} at {completed_at}",
                b.fiefdom_id, b.building_type, b.id
            );
            changes.insert(b.id, LevelChange { old_level: b.level, new_level: target, completed_at });
            result.diffs.push(FieldDiff::new(EntityKind::Building, b.id, "level", b.level, target));
            result.diffs.push(FieldDiff::new(EntityKind::Building, b.id, "construction_start", b.construction_start, 0i64));
            result.completed.push(CompletedJob::Building {
                fiefdom_id:    b.fiefdom_id,
                building_id:   b.id,
                building_type: b.building_type.clone(),
                level:         target,
                completed_at,
            });
        }
        Ok(changes)
    }

    fn complete_walls(
        &self,
        fiefdom_id: FiefdomId,
        now: Timestamp,
        result: &mut TimeUpdateResult,
    ) -> GameResult<()> {
        for w in self.store.walls_for_fiefdom(fiefdom_id)? {
            if w.construction_start <= 0 {
                continue;
            }
            let target = w.level + 1;
            let Some(cfg) = self.config.wall(w.generation) else {
                warn!("fiefdom {fiefdom_id}: wall {} has unconfigured generation {}", w.id, w.generation);
                continue;
            };
            let Some(duration) = cfg.construction_time(target) else { continue };
            if now - w.construction_start < duration {
                continue;
            }
            let completed_at = w.construction_start + duration;
            let hp = cfg.hp_at(target);
            self.store.complete_wall_construction(w.id, target, hp, completed_at)?;
            result.diffs.push(FieldDiff::new(EntityKind::Wall, w.id, "level", w.level, target));
            result.diffs.push(FieldDiff::new(EntityKind::Wall, w.id, "hp", w.hp, hp));
            result.diffs.push(FieldDiff::new(EntityKind::Wall, w.id, "construction_start", w.construction_start, 0i64));
            info!(
                "fiefdom {fiefdom_id}: wall generation {} reached level {target} at {completed_at}",
                w.generation
            );
            result.completed.push(CompletedJob::Wall {
                fiefdom_id,
                wall_id: w.id,
                generation: w.generation,
                level: target,
                completed_at,
            });
        }
        Ok(())
    }

    // ── Production ────────────────────────────────────────────

    /// Whole units `building` produced over its window, per resource.
    /// Updates the building's accumulators and `last_updated`.
    fn accrue(
        &self,
        building: &Building,
        change: Option<LevelChange>,
        window_start: Timestamp,
        now: Timestamp,
    ) -> GameResult<Vec<(Resource, i64)>> {
        let Some(cfg) = self.config.building(&building.building_type) else {
            return Ok(Vec::new());
        };
        let start = window_start.max(building.last_updated);
        if start >= now {
            return Ok(Vec::new());
        }

        // (level, hours) segments; an upgrade landing inside the window splits it.
        let segments: Vec<(i64, f64)> = match change {
            Some(c) => {
                let split = c.completed_at.clamp(start, now);
                vec![
                    (c.old_level, hours_between(start, split)),
                    (c.new_level, hours_between(split, now)),
                ]
            }
            None => vec![(building.level, hours_between(start, now))],
        };
        let final_level = change.map_or(building.level, |c| c.new_level);
        if final_level < 1 {
            return Ok(Vec::new());
        }

        let mut produced = Vec::new();
        for (resource, prod) in &cfg.production {
            let raw: f64 = segments
                .iter()
                .map(|(level, hours)| prod.rate_per_hour(*level) * hours)
                .sum();
            if raw <= 0.0 {
                continue;
            }
            let carried = self.store.production_remainder(building.id, *resource)?;
            let total = raw + carried;
            let whole = (total + ACCRUAL_EPSILON).floor();
            let remainder = (total - whole).max(0.0);
            self.store.set_production_remainder(building.id, *resource, remainder)?;
            if whole >= 1.0 {
                produced.push((*resource, whole as i64));
            }
        }
        self.store.set_building_last_updated(building.id, now)?;
        Ok(produced)
    }

    // ── Training ──────────────────────────────────────────────

    fn complete_training(
        &self,
        fiefdom_id: FiefdomId,
        now: Timestamp,
        result: &mut TimeUpdateResult,
    ) -> GameResult<()> {
        for job in self.store.training_jobs_for_fiefdom(fiefdom_id)? {
            if now - job.started_at < job.duration_secs {
                continue;
            }
            let combatant_id = self.store
                .insert_stationed_combatant(fiefdom_id, &job.combatant_config_id, job.level)?;
            self.store.delete_training_job(job.id)?;
            result.diffs.extend([
                FieldDiff::new(EntityKind::TrainingJob, job.id, "combatant_type", job.combatant_config_id.clone(), None::<String>),
                FieldDiff::new(EntityKind::TrainingJob, job.id, "level", job.level, None::<i64>),
                FieldDiff::new(EntityKind::TrainingJob, job.id, "started_at", job.started_at, None::<i64>),
                FieldDiff::new(EntityKind::Combatant, combatant_id, "combatant_type", None::<String>, job.combatant_config_id.clone()),
                FieldDiff::new(EntityKind::Combatant, combatant_id, "level", None::<i64>, job.level),
            ]);
            info!(
                "fiefdom {fiefdom_id}: {} (level {}) finished training",
                job.combatant_config_id, job.level
            );
            result.completed.push(CompletedJob::Training {
                fiefdom_id,
                job_id: job.id,
                combatant_id,
                combatant_type: job.combatant_config_id.clone(),
                level: job.level,
                completed_at: job.completes_at(),
            });
        }
        Ok(())
    }

    // ── Morale ────────────────────────────────────────────────

    fn recompute_morale(
        &self,
        fiefdom_id: FiefdomId,
        old: f64,
        result: &mut TimeUpdateResult,
    ) -> GameResult<()> {
        let new = fiefdom_morale(self.config, self.store, fiefdom_id)?;
        if (new - old).abs() > f64::EPSILON {
            self.store.update_morale(fiefdom_id, new)?;
            debug!("fiefdom {fiefdom_id}: morale {old:.2} -> {new:.2}");
            result.diffs.push(FieldDiff::new(EntityKind::Fiefdom, fiefdom_id, "morale", old, new));
            result.morale_changes.push(MoraleChange { fiefdom_id, old, new });
        }
        Ok(())
    }
}

/// Current morale score of a fiefdom from its stored entities.
pub fn fiefdom_morale(config: &GameConfig, store: &GameStore, fiefdom_id: FiefdomId) -> GameResult<f64> {
    let buildings  = store.buildings_for_fiefdom(fiefdom_id)?;
    let walls      = store.walls_for_fiefdom(fiefdom_id)?;
    let officials  = store.officials_for_fiefdom(fiefdom_id)?;
    let heroes     = store.heroes_for_fiefdom(fiefdom_id)?;
    let combatants = store.combatants_for_fiefdom(fiefdom_id)?;
    let breakdown = calculate_fiefdom_morale(config, &MoraleInputs {
        buildings:  &buildings,
        walls:      &walls,
        officials:  &officials,
        heroes:     &heroes,
        combatants: &combatants,
    });
    Ok(breakdown.score)
}

fn hours_between(from: Timestamp, to: Timestamp) -> f64 {
    (to - from).max(0) as f64 / SECONDS_PER_HOUR
}
