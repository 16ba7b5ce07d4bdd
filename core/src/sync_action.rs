//! `sync`: run the time-advancement pass for the caller's fiefdom.

use crate::{
    action::{ActionContext, ActionEnv, ActionHandler, ActionOutcome, ActionResult},
    action_support::owned_fiefdom,
    command::{parse_payload, SyncPayload},
    time_engine::TimeEngine,
};
use serde_json::Value;

pub struct SyncAction;

impl ActionHandler for SyncAction {
    fn kind(&self) -> &'static str { "sync" }

    fn description(&self) -> &'static str {
        "Bring the fiefdom up to date and report what changed"
    }

    fn validate(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let _: SyncPayload = parse_payload(payload)?;
        owned_fiefdom(env, ctx)?;
        Ok(ActionResult::ok(env.now()))
    }

    /// Runs inside the registry's transaction. The pass's field changes are
    /// the diffs; the summary is the result.
    fn execute(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome {
        let _: SyncPayload = parse_payload(payload)?;
        let fiefdom = owned_fiefdom(env, ctx)?;
        let now = env.now();
        let mut summary = TimeEngine::new(env.config, env.store, env.clock)
            .advance(fiefdom.last_update_time.min(now), now, Some(fiefdom.id))?;
        let diffs = std::mem::take(&mut summary.diffs);
        Ok(ActionResult::ok(now)
            .with_result(serde_json::to_value(&summary)?)
            .with_diffs(diffs))
    }

    fn needs_catch_up(&self) -> bool {
        false
    }
}
