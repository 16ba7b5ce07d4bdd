//! Wall rings: starting a new generation.
//!
//! Generation N needs generation N-1 and may be raised once. The new ring
//! takes effect for placement immediately (`wall_count = N`), and any
//! building standing on it is demolished with the usual refund. The wall
//! itself starts at level 0 and reaches level 1 through the time engine.

use crate::{
    action::{reject, ActionContext, ActionEnv, ActionFailure, ActionHandler, ActionOutcome, ActionResult, EntityKind, FieldDiff},
    action_support::{bundle_json, deduct_resources, owned_fiefdom, require_resources},
    command::{parse_payload, BuildWallPayload},
    config::WallGenerationConfig,
    construction_actions::clear_buildings,
    model::{Building, Fiefdom, ResourceBundle},
    placement::PlacementValidator,
};
use log::warn;
use serde_json::{json, Value};

pub struct BuildWallAction;

struct WallPlan<'c> {
    fiefdom:    Fiefdom,
    generation: i64,
    cfg:        &'c WallGenerationConfig,
    cost:       ResourceBundle,
}

impl BuildWallAction {
    fn plan<'c>(&self, env: &ActionEnv<'c>, payload: &Value, ctx: &ActionContext) -> Result<WallPlan<'c>, ActionFailure> {
        let BuildWallPayload { generation } = parse_payload(payload)?;
        let fiefdom = owned_fiefdom(env, ctx)?;
        let Some(cfg) = env.config.wall(generation) else {
            return reject("generation_invalid", format!("Invalid wall generation: {generation}"));
        };

        let walls = env.store.walls_for_fiefdom(fiefdom.id)?;
        if generation > 1 && !walls.iter().any(|w| w.generation == generation - 1) {
            return reject(
                "generation_sequence_required",
                format!("Must build wall generation {} first", generation - 1),
            );
        }
        if walls.iter().any(|w| w.generation == generation) {
            return reject("generation_exists", format!("Wall generation {generation} already exists"));
        }

        let cost = cfg.cost_for_level(1);
        require_resources(&fiefdom, &cost)?;
        Ok(WallPlan { fiefdom, generation, cfg, cost })
    }

    /// Buildings standing on the new ring. The anchor is never cleared.
    fn buildings_on_ring(&self, env: &ActionEnv<'_>, fiefdom: &Fiefdom, generation: i64) -> Result<Vec<Building>, ActionFailure> {
        let validator = PlacementValidator::new(env.config);
        let mut doomed = Vec::new();
        for b in env.store.buildings_for_fiefdom(fiefdom.id)? {
            let Some(rect) = validator.footprint(&b.building_type, b.x, b.y) else { continue };
            if !validator.overlaps_walls(generation, &rect) {
                continue;
            }
            if env.config.is_anchor(&b.building_type) {
                warn!("fiefdom {}: {} #{} sits on wall generation {generation}; left standing", fiefdom.id, b.building_type, b.id);
                continue;
            }
            doomed.push(b);
        }
        Ok(doomed)
    }
}

impl ActionHandler for BuildWallAction {
    fn kind(&self) -> &'static str { "build_wall" }

    fn description(&self) -> &'static str {
        "Raise the next wall generation, clearing buildings on its ring"
    }

    fn validate(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        self.plan(env, payload, ctx)?;
        Ok(ActionResult::ok(env.now()))
    }

    fn execute(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let WallPlan { mut fiefdom, generation, cfg, cost } = self.plan(env, payload, ctx)?;
        let now = env.now();
        let mut diffs = Vec::new();
        deduct_resources(env, &mut fiefdom, &cost, &mut diffs)?;

        let doomed = self.buildings_on_ring(env, &fiefdom, generation)?;
        let demolished = clear_buildings(env, &mut fiefdom, &doomed, &mut diffs)?;

        let wall_id = env.store.insert_wall(fiefdom.id, generation, 0, 0, now, now)?;
        diffs.push(FieldDiff::new(EntityKind::Wall, wall_id, "generation", None::<i64>, generation));
        diffs.push(FieldDiff::new(EntityKind::Wall, wall_id, "level", None::<i64>, 0i64));
        diffs.push(FieldDiff::new(EntityKind::Wall, wall_id, "construction_start", None::<i64>, now));

        if generation > fiefdom.wall_count {
            env.store.update_wall_count(fiefdom.id, generation)?;
            diffs.push(FieldDiff::new(EntityKind::Fiefdom, fiefdom.id, "wall_count", fiefdom.wall_count, generation));
        }

        Ok(ActionResult::ok(now)
            .with_result(json!({
                "wall_id":              wall_id,
                "generation":           generation,
                "width":                cfg.width,
                "length":               cfg.length,
                "thickness":            cfg.thickness,
                "cost":                 bundle_json(&cost),
                "completes_at":         cfg.construction_time(1).map(|secs| now + secs),
                "demolished_buildings": demolished,
            }))
            .with_diffs(diffs))
    }
}
