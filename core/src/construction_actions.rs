//! Building actions: build, upgrade, move, demolish.
//!
//! Each handler plans first (every check, no writes) and executes from the
//! plan. `execute` always re-plans, so calling it without `validate` can
//! never apply an invalid change.

use crate::{
    action::{reject, ActionContext, ActionEnv, ActionFailure, ActionHandler, ActionOutcome, ActionResult, EntityKind, FieldDiff},
    action_support::{
        active_wall_generation, building_config, building_created_diffs, bundle_json, deduct_resources,
        demolish_with_refund, fiefdom_building, fiefdom_wall, owned_fiefdom, require_resources, scale_bundle,
    },
    command::{parse_payload, BuildPayload, DemolishPayload, MovePayload, UpgradePayload},
    model::{Building, Fiefdom, ResourceBundle, Wall},
    placement::{PlacementValidator, SiteLayout},
    types::BuildingId,
};
use serde_json::{json, Value};

/// Turn a failed placement check into a rejection carrying its code.
fn check_site(
    env: &ActionEnv<'_>,
    fiefdom: &Fiefdom,
    buildings: &[Building],
    building_type: &str,
    x: i64,
    y: i64,
    exclude: Option<BuildingId>,
) -> Result<(), ActionFailure> {
    let layout = SiteLayout {
        fiefdom_id: fiefdom.id,
        wall_generation: active_wall_generation(env.config, fiefdom)?,
        buildings,
    };
    let check = PlacementValidator::new(env.config)
        .check_placement(&layout, building_type, x, y, true, exclude);
    match check.error {
        None => Ok(()),
        Some(err) => reject(err.code(), check.message),
    }
}

// ── build ──────────────────────────────────────────────────────────

pub struct BuildAction;

struct BuildPlan {
    fiefdom: Fiefdom,
    payload: BuildPayload,
    cost:    ResourceBundle,
}

impl BuildAction {
    fn plan(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> Result<BuildPlan, ActionFailure> {
        let payload: BuildPayload = parse_payload(payload)?;
        let fiefdom = owned_fiefdom(env, ctx)?;
        let cfg = building_config(env.config, &payload.building_type)?;
        let buildings = env.store.buildings_for_fiefdom(fiefdom.id)?;

        let anchor = env.config.world.anchor_type.as_str();
        if env.config.is_anchor(&payload.building_type) {
            if buildings.iter().any(|b| b.building_type == anchor) {
                return reject("anchor_exists", format!("This fiefdom already has a {anchor}"));
            }
        } else if !buildings.iter().any(|b| b.building_type == anchor && b.is_active()) {
            return reject("anchor_required", format!("A completed {anchor} is required before other buildings"));
        }

        check_site(env, &fiefdom, &buildings, &payload.building_type, payload.x, payload.y, None)?;

        let cost = cfg.cost_for_level(1);
        require_resources(&fiefdom, &cost)?;
        Ok(BuildPlan { fiefdom, payload, cost })
    }
}

impl ActionHandler for BuildAction {
    fn kind(&self) -> &'static str { "build" }

    fn description(&self) -> &'static str {
        "Place a new building; construction starts immediately"
    }

    fn validate(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        self.plan(env, payload, ctx)?;
        Ok(ActionResult::ok(env.now()))
    }

    fn execute(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let BuildPlan { mut fiefdom, payload, cost } = self.plan(env, payload, ctx)?;
        let now = env.now();
        let mut diffs = Vec::new();
        deduct_resources(env, &mut fiefdom, &cost, &mut diffs)?;

        let id = env.store.insert_building(fiefdom.id, &payload.building_type, 0, payload.x, payload.y, now, now)?;
        let building = Building {
            id,
            fiefdom_id: fiefdom.id,
            building_type: payload.building_type.clone(),
            level: 0,
            x: payload.x,
            y: payload.y,
            construction_start: now,
            last_updated: now,
        };
        diffs.extend(building_created_diffs(&building));

        let completes_at = env.config
            .building(&building.building_type)
            .and_then(|cfg| cfg.construction_time(1))
            .map(|secs| now + secs);
        Ok(ActionResult::ok(now)
            .with_result(json!({
                "building_id":   id,
                "building_type": building.building_type,
                "x":             building.x,
                "y":             building.y,
                "cost":          bundle_json(&cost),
                "completes_at":  completes_at,
            }))
            .with_diffs(diffs))
    }
}

// ── upgrade ────────────────────────────────────────────────────────

pub struct UpgradeAction;

enum UpgradeTarget {
    Building(Building),
    Wall(Wall),
}

struct UpgradePlan {
    fiefdom: Fiefdom,
    target:  UpgradeTarget,
    cost:    ResourceBundle,
}

impl UpgradeAction {
    fn plan(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> Result<UpgradePlan, ActionFailure> {
        let payload: UpgradePayload = parse_payload(payload)?;
        let fiefdom = owned_fiefdom(env, ctx)?;

        let (target, cost) = match (payload.building_id, payload.wall_id) {
            (Some(building_id), None) => {
                let building = fiefdom_building(env, &fiefdom, building_id)?;
                let cfg = building_config(env.config, &building.building_type)?;
                if building.is_constructing() {
                    return reject("upgrade_in_progress", format!("Building {building_id} is already under construction"));
                }
                if building.level >= cfg.max_level {
                    return reject("max_level_reached", format!("{} is at its max level {}", building.building_type, cfg.max_level));
                }
                let cost = cfg.cost_for_level(building.target_level());
                (UpgradeTarget::Building(building), cost)
            }
            (None, Some(wall_id)) => {
                let wall = fiefdom_wall(env, &fiefdom, wall_id)?;
                let Some(cfg) = env.config.wall(wall.generation) else {
                    return reject("generation_invalid", format!("Wall generation {} is not configured", wall.generation));
                };
                if wall.construction_start > 0 {
                    return reject("upgrade_in_progress", format!("Wall {wall_id} is already under construction"));
                }
                if wall.level >= cfg.max_level() {
                    return reject("max_level_reached", format!("Wall generation {} is at its max level {}", wall.generation, cfg.max_level()));
                }
                let cost = cfg.cost_for_level(wall.level + 1);
                (UpgradeTarget::Wall(wall), cost)
            }
            _ => return reject("invalid_payload", "Exactly one of building_id or wall_id is required"),
        };

        require_resources(&fiefdom, &cost)?;
        Ok(UpgradePlan { fiefdom, target, cost })
    }
}

impl ActionHandler for UpgradeAction {
    fn kind(&self) -> &'static str { "upgrade" }

    fn description(&self) -> &'static str {
        "Upgrade a building or wall to its next level"
    }

    fn validate(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        self.plan(env, payload, ctx)?;
        Ok(ActionResult::ok(env.now()))
    }

    fn execute(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let UpgradePlan { mut fiefdom, target, cost } = self.plan(env, payload, ctx)?;
        let now = env.now();
        let mut diffs = Vec::new();
        deduct_resources(env, &mut fiefdom, &cost, &mut diffs)?;

        let result = match target {
            UpgradeTarget::Building(b) => {
                env.store.start_building_construction(b.id, now)?;
                diffs.push(FieldDiff::new(EntityKind::Building, b.id, "construction_start", b.construction_start, now));
                json!({
                    "building_id":      b.id,
                    "upgrade_to_level": b.target_level(),
                    "cost":             bundle_json(&cost),
                })
            }
            UpgradeTarget::Wall(w) => {
                env.store.start_wall_construction(w.id, now)?;
                diffs.push(FieldDiff::new(EntityKind::Wall, w.id, "construction_start", w.construction_start, now));
                json!({
                    "wall_id":          w.id,
                    "upgrade_to_level": w.level + 1,
                    "cost":             bundle_json(&cost),
                })
            }
        };
        Ok(ActionResult::ok(now).with_result(result).with_diffs(diffs))
    }
}

// ── move ───────────────────────────────────────────────────────────

pub struct MoveAction;

struct MovePlan {
    fiefdom:  Fiefdom,
    building: Building,
    payload:  MovePayload,
    cost:     ResourceBundle,
}

impl MoveAction {
    fn plan(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> Result<MovePlan, ActionFailure> {
        let payload: MovePayload = parse_payload(payload)?;
        let fiefdom = owned_fiefdom(env, ctx)?;
        let building = fiefdom_building(env, &fiefdom, payload.building_id)?;
        let cfg = building_config(env.config, &building.building_type)?;

        if env.config.is_anchor(&building.building_type) {
            return reject("anchor_immutable", format!("The {} cannot be moved", building.building_type));
        }
        if !building.is_active() || building.is_constructing() {
            return reject("cannot_move_under_construction", format!("Building {} is under construction", building.id));
        }

        let buildings = env.store.buildings_for_fiefdom(fiefdom.id)?;
        check_site(env, &fiefdom, &buildings, &building.building_type, payload.x, payload.y, Some(building.id))?;

        let cost = scale_bundle(&cfg.cost_for_level(building.level), env.config.world.move_cost_fraction);
        require_resources(&fiefdom, &cost)?;
        Ok(MovePlan { fiefdom, building, payload, cost })
    }
}

impl ActionHandler for MoveAction {
    fn kind(&self) -> &'static str { "move" }

    fn description(&self) -> &'static str {
        "Move a building (10% of its current level cost)"
    }

    fn validate(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        self.plan(env, payload, ctx)?;
        Ok(ActionResult::ok(env.now()))
    }

    fn execute(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let MovePlan { mut fiefdom, building, payload, cost } = self.plan(env, payload, ctx)?;
        let now = env.now();
        let mut diffs = Vec::new();
        deduct_resources(env, &mut fiefdom, &cost, &mut diffs)?;

        env.store.update_building_position(building.id, payload.x, payload.y)?;
        diffs.push(FieldDiff::new(EntityKind::Building, building.id, "x", building.x, payload.x));
        diffs.push(FieldDiff::new(EntityKind::Building, building.id, "y", building.y, payload.y));

        Ok(ActionResult::ok(now)
            .with_result(json!({
                "building_id": building.id,
                "new_x":       payload.x,
                "new_y":       payload.y,
                "cost":        bundle_json(&cost),
            }))
            .with_diffs(diffs))
    }
}

// ── demolish ───────────────────────────────────────────────────────

/// Demolishes one building or a batch. A batch where only some items can be
/// demolished commits those and reports PARTIAL.
pub struct DemolishAction;

enum DemolishCheck {
    Ready(Building),
    Refused { building_id: BuildingId, code: &'static str, message: String },
}

impl DemolishAction {
    fn check_item(&self, env: &ActionEnv<'_>, fiefdom: &Fiefdom, building_id: BuildingId) -> Result<DemolishCheck, ActionFailure> {
        let building = match fiefdom_building(env, fiefdom, building_id) {
            Ok(b) => b,
            Err(ActionFailure::Rejected { code, message }) => {
                return Ok(DemolishCheck::Refused { building_id, code, message });
            }
            Err(other) => return Err(other),
        };
        if env.config.is_anchor(&building.building_type) {
            return Ok(DemolishCheck::Refused {
                building_id,
                code: "anchor_immutable",
                message: format!("The {} cannot be demolished", building.building_type),
            });
        }
        Ok(DemolishCheck::Ready(building))
    }

    fn plan(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> Result<(Fiefdom, Vec<DemolishCheck>), ActionFailure> {
        let payload: DemolishPayload = parse_payload(payload)?;
        let ids = payload.ids();
        if ids.is_empty() {
            return reject("invalid_payload", "building_id or building_ids is required");
        }
        let fiefdom = owned_fiefdom(env, ctx)?;
        let checks = ids
            .into_iter()
            .map(|id| self.check_item(env, &fiefdom, id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((fiefdom, checks))
    }
}

impl ActionHandler for DemolishAction {
    fn kind(&self) -> &'static str { "demolish" }

    fn description(&self) -> &'static str {
        "Demolish one or more buildings (80% refund of cumulative cost)"
    }

    /// Passes when at least one item can be demolished.
    fn validate(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let (_, checks) = self.plan(env, payload, ctx)?;
        if checks.iter().any(|c| matches!(c, DemolishCheck::Ready(_))) {
            return Ok(ActionResult::ok(env.now()));
        }
        match checks.into_iter().next() {
            Some(DemolishCheck::Refused { code, message, .. }) => reject(code, message),
            _ => reject("building_not_found", "No building could be demolished"),
        }
    }

    fn execute(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let (mut fiefdom, checks) = self.plan(env, payload, ctx)?;
        let now = env.now();
        let mut diffs = Vec::new();
        let mut demolished = Vec::new();
        let mut failed = Vec::new();
        let mut first_refusal = None;

        for check in checks {
            match check {
                DemolishCheck::Ready(building) => {
                    let refund = demolish_with_refund(env, &mut fiefdom, &building, &mut diffs)?;
                    demolished.push(json!({
                        "building_id":   building.id,
                        "building_type": building.building_type,
                        "refund":        bundle_json(&refund),
                    }));
                }
                DemolishCheck::Refused { building_id, code, message } => {
                    failed.push(json!({ "building_id": building_id, "error_code": code, "error_message": &message }));
                    first_refusal.get_or_insert((code, message));
                }
            }
        }

        if demolished.is_empty() {
            let (code, message) = first_refusal
                .unwrap_or(("building_not_found", "No building could be demolished".to_string()));
            return reject(code, message);
        }

        let result = ActionResult::ok(now)
            .with_result(json!({ "demolished": demolished, "failed": failed }))
            .with_diffs(diffs);
        Ok(if failed.is_empty() { result } else { result.partial() })
    }
}

/// Refund helper used by wall construction when it clears its ring.
pub(crate) fn clear_buildings(
    env: &ActionEnv<'_>,
    fiefdom: &mut Fiefdom,
    buildings: &[Building],
    diffs: &mut Vec<FieldDiff>,
) -> Result<Vec<Value>, ActionFailure> {
    let mut cleared = Vec::new();
    for building in buildings {
        let refund = demolish_with_refund(env, fiefdom, building, diffs)?;
        cleared.push(json!({
            "building_id":   building.id,
            "building_type": building.building_type,
            "refund":        bundle_json(&refund),
        }));
    }
    Ok(cleared)
}
