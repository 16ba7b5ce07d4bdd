//! Roster actions: training combatants and appointing officials.

use crate::{
    action::{reject, ActionContext, ActionEnv, ActionFailure, ActionHandler, ActionOutcome, ActionResult, EntityKind, FieldDiff},
    action_support::{bundle_json, deduct_resources, owned_fiefdom, require_resources},
    command::{parse_payload, AppointOfficialPayload, TrainTroopsPayload},
    config::{CombatantConfig, OfficialTemplateConfig},
    error::GameError,
    model::{Fiefdom, Official, OfficialRole, ResourceBundle},
    name_generator::NameGenerator,
    rng::RngSlot,
};
use serde_json::{json, Value};

/// Upper bound on one training order.
pub const MAX_TRAINING_BATCH: i64 = 100;

// ── train_troops ───────────────────────────────────────────────────

pub struct TrainTroopsAction;

struct TrainPlan<'c> {
    fiefdom:  Fiefdom,
    payload:  TrainTroopsPayload,
    cfg:      &'c CombatantConfig,
    duration: i64,
    cost:     ResourceBundle,
}

impl TrainTroopsAction {
    fn plan<'c>(&self, env: &ActionEnv<'c>, payload: &Value, ctx: &ActionContext) -> Result<TrainPlan<'c>, ActionFailure> {
        let payload: TrainTroopsPayload = parse_payload(payload)?;
        let fiefdom = owned_fiefdom(env, ctx)?;
        let Some(cfg) = env.config.combatants.get(&payload.combatant_type) else {
            return reject("unknown_combatant_type", format!("Unknown combatant type: {}", payload.combatant_type));
        };
        if payload.level < 1 || payload.level > cfg.max_level {
            return reject(
                "invalid_payload",
                format!("{} trains at levels 1..={}, not {}", payload.combatant_type, cfg.max_level, payload.level),
            );
        }
        if !(1..=MAX_TRAINING_BATCH).contains(&payload.quantity) {
            return reject("invalid_payload", format!("quantity must be 1..={MAX_TRAINING_BATCH}"));
        }
        let Some(duration) = cfg.training_time(payload.level) else {
            return Err(GameError::Config(format!("{} has no training times", payload.combatant_type)).into());
        };

        let cost: ResourceBundle = cfg
            .cost_for_level(payload.level)
            .into_iter()
            .map(|(res, amount)| (res, amount * payload.quantity))
            .collect();
        require_resources(&fiefdom, &cost)?;
        Ok(TrainPlan { fiefdom, payload, cfg, duration, cost })
    }
}

impl ActionHandler for TrainTroopsAction {
    fn kind(&self) -> &'static str { "train_troops" }

    fn description(&self) -> &'static str {
        "Queue combatants for training; they station when training completes"
    }

    fn validate(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        self.plan(env, payload, ctx)?;
        Ok(ActionResult::ok(env.now()))
    }

    fn execute(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let TrainPlan { mut fiefdom, payload, cfg, duration, cost } = self.plan(env, payload, ctx)?;
        let now = env.now();
        let mut diffs = Vec::new();
        deduct_resources(env, &mut fiefdom, &cost, &mut diffs)?;

        let mut job_ids = Vec::new();
        for _ in 0..payload.quantity {
            let job_id = env.store
                .insert_training_job(fiefdom.id, &payload.combatant_type, payload.level, now, duration)?;
            diffs.push(FieldDiff::new(EntityKind::TrainingJob, job_id, "combatant_type", None::<String>, payload.combatant_type.clone()));
            diffs.push(FieldDiff::new(EntityKind::TrainingJob, job_id, "level", None::<i64>, payload.level));
            diffs.push(FieldDiff::new(EntityKind::TrainingJob, job_id, "started_at", None::<i64>, now));
            job_ids.push(job_id);
        }

        Ok(ActionResult::ok(now)
            .with_result(json!({
                "combatant_type": payload.combatant_type,
                "name":           cfg.name,
                "level":          payload.level,
                "job_ids":        job_ids,
                "cost":           bundle_json(&cost),
                "completes_at":   now + duration,
            }))
            .with_diffs(diffs))
    }
}

// ── appoint_official ───────────────────────────────────────────────

/// Appoint an official to an empty role. Officials start at level 1 with
/// stats from their template's level tables.
pub struct AppointOfficialAction;

struct AppointPlan<'c> {
    fiefdom:    Fiefdom,
    role:       OfficialRole,
    /// Eligible templates; one entry when the payload pins a template.
    candidates: Vec<(&'c str, &'c OfficialTemplateConfig)>,
    seated:     usize,
}

impl AppointOfficialAction {
    fn plan<'c>(&self, env: &ActionEnv<'c>, payload: &Value, ctx: &ActionContext) -> Result<AppointPlan<'c>, ActionFailure> {
        let payload: AppointOfficialPayload = parse_payload(payload)?;
        let Some(role) = OfficialRole::parse(&payload.role) else {
            return reject("unknown_role", format!("Unknown official role: {}", payload.role));
        };
        let fiefdom = owned_fiefdom(env, ctx)?;

        let officials = env.store.officials_for_fiefdom(fiefdom.id)?;
        if officials.iter().any(|o| o.role == role) {
            return reject("role_occupied", format!("Fiefdom {} already has a {}", fiefdom.id, role.as_str()));
        }

        let mut candidates = env.config.officials_for_role(role);
        if let Some(pinned) = payload.template_id.as_deref() {
            candidates.retain(|(id, _)| *id == pinned);
        }
        if candidates.is_empty() {
            return reject("no_eligible_official", format!("No official template can serve as {}", role.as_str()));
        }
        Ok(AppointPlan { fiefdom, role, candidates, seated: officials.len() })
    }
}

impl ActionHandler for AppointOfficialAction {
    fn kind(&self) -> &'static str { "appoint_official" }

    fn description(&self) -> &'static str {
        "Appoint an official to a vacant role"
    }

    fn validate(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        self.plan(env, payload, ctx)?;
        Ok(ActionResult::ok(env.now()))
    }

    fn execute(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let AppointPlan { fiefdom, role, candidates, seated } = self.plan(env, payload, ctx)?;
        let now = env.now();

        // Keyed per (fiefdom, appointment) so draws never depend on other fiefdoms.
        let key = ((fiefdom.id as u64) << 16) | seated as u64;
        let mut template_rng = env.rng.stream(RngSlot::OfficialTemplates, key);
        let Some(&(template_id, template)) = template_rng.pick(&candidates) else {
            return reject("no_eligible_official", format!("No official template can serve as {}", role.as_str()));
        };
        let mut name_rng = env.rng.stream(RngSlot::OfficialNames, key);

        let level = 1;
        let mut official = Official {
            id:           0,
            fiefdom_id:   fiefdom.id,
            role,
            template_id:  template_id.to_string(),
            name:         NameGenerator::official_name(&mut name_rng, role),
            level,
            intelligence: template.stats.intelligence.value_at(level),
            charisma:     template.stats.charisma.value_at(level),
            wisdom:       template.stats.wisdom.value_at(level),
            diligence:    template.stats.diligence.value_at(level),
        };
        official.id = env.store.insert_official(&official)?;

        let id = official.id;
        let diffs = vec![
            FieldDiff::new(EntityKind::Official, id, "role", None::<String>, role.as_str()),
            FieldDiff::new(EntityKind::Official, id, "template_id", None::<String>, official.template_id.clone()),
            FieldDiff::new(EntityKind::Official, id, "name", None::<String>, official.name.clone()),
            FieldDiff::new(EntityKind::Official, id, "level", None::<i64>, level),
        ];

        Ok(ActionResult::ok(now)
            .with_result(serde_json::to_value(&official)?)
            .with_diffs(diffs))
    }
}
