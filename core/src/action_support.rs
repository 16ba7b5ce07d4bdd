//! Checks and mutations shared by the action handlers.
//!
//! Every mutation helper records a `FieldDiff` for each field it changes.

use crate::{
    action::{reject, ActionContext, ActionEnv, ActionFailure, EntityKind, FieldDiff},
    config::{BuildingTypeConfig, GameConfig},
    error::GameError,
    model::{Building, Fiefdom, Resource, ResourceBundle, Wall},
    types::{BuildingId, WallId},
};
use serde_json::{Map, Value};

/// Slack for float noise when scaling integer costs.
const SCALE_EPSILON: f64 = 1e-9;

// ── Lookups ────────────────────────────────────────────────────────

/// The context fiefdom, provided the caller owns it.
pub fn owned_fiefdom(env: &ActionEnv<'_>, ctx: &ActionContext) -> Result<Fiefdom, ActionFailure> {
    let Some(fiefdom) = env.store.get_fiefdom(ctx.fiefdom_id)? else {
        return reject("fiefdom_not_found", format!("Fiefdom {} does not exist", ctx.fiefdom_id));
    };
    if fiefdom.owner_id != ctx.character_id {
        return reject(
            "not_owner",
            format!("Character {} does not own fiefdom {}", ctx.character_id, fiefdom.id),
        );
    }
    Ok(fiefdom)
}

/// A building of `fiefdom`. Buildings of other fiefdoms look missing.
pub fn fiefdom_building(
    env: &ActionEnv<'_>,
    fiefdom: &Fiefdom,
    building_id: BuildingId,
) -> Result<Building, ActionFailure> {
    match env.store.get_building(building_id)? {
        Some(b) if b.fiefdom_id == fiefdom.id => Ok(b),
        Some(_) => reject("not_owner", format!("Building {building_id} belongs to another fiefdom")),
        None => reject("building_not_found", format!("Building {building_id} does not exist")),
    }
}

pub fn fiefdom_wall(env: &ActionEnv<'_>, fiefdom: &Fiefdom, wall_id: WallId) -> Result<Wall, ActionFailure> {
    match env.store.get_wall(wall_id)? {
        Some(w) if w.fiefdom_id == fiefdom.id => Ok(w),
        Some(_) => reject("not_owner", format!("Wall {wall_id} belongs to another fiefdom")),
        None => reject("wall_not_found", format!("Wall {wall_id} does not exist")),
    }
}

pub fn building_config<'c>(config: &'c GameConfig, building_type: &str) -> Result<&'c BuildingTypeConfig, ActionFailure> {
    match config.building(building_type) {
        Some(cfg) => Ok(cfg),
        None => reject("unknown_building_type", format!("Unknown building type: {building_type}")),
    }
}

/// The wall generation whose ring constrains placement. A `wall_count` with
/// no configured generation is a consistency error, not a rejection.
pub fn active_wall_generation(config: &GameConfig, fiefdom: &Fiefdom) -> Result<i64, ActionFailure> {
    let generation = fiefdom.wall_count;
    if generation == 0 {
        return Ok(0);
    }
    if generation < 0 || config.wall(generation).is_none() {
        return Err(GameError::InvalidWallGeneration { fiefdom_id: fiefdom.id, generation }.into());
    }
    Ok(generation)
}

// ── Costs ──────────────────────────────────────────────────────────

pub fn require_resources(fiefdom: &Fiefdom, cost: &ResourceBundle) -> Result<(), ActionFailure> {
    let short = fiefdom.resources.shortfall(cost);
    if short.is_empty() {
        return Ok(());
    }
    let detail: Vec<String> = short
        .iter()
        .map(|res| {
            format!(
                "{res} (need {}, have {})",
                cost.get(res).copied().unwrap_or(0),
                fiefdom.resources.get(*res)
            )
        })
        .collect();
    reject("insufficient_resources", format!("Not enough {}", detail.join(", ")))
}

/// `bundle` scaled by `fraction`, rounded down per resource. Zero entries
/// are dropped.
pub fn scale_bundle(bundle: &ResourceBundle, fraction: f64) -> ResourceBundle {
    bundle
        .iter()
        .filter_map(|(res, amount)| {
            let scaled = (*amount as f64 * fraction + SCALE_EPSILON).floor() as i64;
            (scaled > 0).then_some((*res, scaled))
        })
        .collect()
}

/// Everything paid into a building so far, including a running upgrade.
pub fn invested_cost(cfg: &BuildingTypeConfig, building: &Building) -> ResourceBundle {
    let paid_level = if building.is_constructing() { building.target_level() } else { building.level };
    cfg.cumulative_cost(paid_level)
}

pub fn bundle_json(bundle: &ResourceBundle) -> Value {
    let map: Map<String, Value> = bundle
        .iter()
        .map(|(res, amount)| (res.as_str().to_string(), Value::from(*amount)))
        .collect();
    Value::Object(map)
}

/// Subtract `cost` from the fiefdom stockpile, in memory and in the store.
pub fn deduct_resources(
    env: &ActionEnv<'_>,
    fiefdom: &mut Fiefdom,
    cost: &ResourceBundle,
    diffs: &mut Vec<FieldDiff>,
) -> Result<(), ActionFailure> {
    require_resources(fiefdom, cost)?;
    adjust_resources(env, fiefdom, cost, -1, diffs)
}

/// Add `amount` to the fiefdom stockpile, in memory and in the store.
pub fn credit_resources(
    env: &ActionEnv<'_>,
    fiefdom: &mut Fiefdom,
    amount: &ResourceBundle,
    diffs: &mut Vec<FieldDiff>,
) -> Result<(), ActionFailure> {
    adjust_resources(env, fiefdom, amount, 1, diffs)
}

fn adjust_resources(
    env: &ActionEnv<'_>,
    fiefdom: &mut Fiefdom,
    bundle: &ResourceBundle,
    sign: i64,
    diffs: &mut Vec<FieldDiff>,
) -> Result<(), ActionFailure> {
    let mut changed = false;
    for (res, amount) in bundle.iter().filter(|(_, a)| **a != 0) {
        let old = fiefdom.resources.get(*res);
        let new = old + sign * amount;
        *fiefdom.resources.get_mut(*res) = new;
        diffs.push(resource_diff(fiefdom, *res, old, new));
        changed = true;
    }
    if changed {
        env.store.update_resources(fiefdom.id, &fiefdom.resources)?;
    }
    Ok(())
}

fn resource_diff(fiefdom: &Fiefdom, resource: Resource, old: i64, new: i64) -> FieldDiff {
    FieldDiff::new(EntityKind::Fiefdom, fiefdom.id, resource.as_str(), old, new)
}

// ── Building removal ───────────────────────────────────────────────

/// Delete a building, refunding the configured fraction of what was paid
/// into it. Returns the refund.
pub fn demolish_with_refund(
    env: &ActionEnv<'_>,
    fiefdom: &mut Fiefdom,
    building: &Building,
    diffs: &mut Vec<FieldDiff>,
) -> Result<ResourceBundle, ActionFailure> {
    let refund = env
        .config
        .building(&building.building_type)
        .map(|cfg| scale_bundle(&invested_cost(cfg, building), env.config.world.demolish_refund_fraction))
        .unwrap_or_default();
    credit_resources(env, fiefdom, &refund, diffs)?;
    env.store.delete_building(building.id)?;
    diffs.extend(building_removed_diffs(building));
    Ok(refund)
}

pub fn building_created_diffs(building: &Building) -> Vec<FieldDiff> {
    let id = building.id;
    vec![
        FieldDiff::new(EntityKind::Building, id, "building_type", None::<String>, building.building_type.clone()),
        FieldDiff::new(EntityKind::Building, id, "level", None::<i64>, building.level),
        FieldDiff::new(EntityKind::Building, id, "x", None::<i64>, building.x),
        FieldDiff::new(EntityKind::Building, id, "y", None::<i64>, building.y),
        FieldDiff::new(EntityKind::Building, id, "construction_start", None::<i64>, building.construction_start),
    ]
}

pub fn building_removed_diffs(building: &Building) -> Vec<FieldDiff> {
    let id = building.id;
    vec![
        FieldDiff::new(EntityKind::Building, id, "building_type", building.building_type.clone(), None::<String>),
        FieldDiff::new(EntityKind::Building, id, "level", building.level, None::<i64>),
        FieldDiff::new(EntityKind::Building, id, "x", building.x, None::<i64>),
        FieldDiff::new(EntityKind::Building, id, "y", building.y, None::<i64>),
    ]
}
