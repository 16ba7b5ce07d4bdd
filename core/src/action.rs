//! Action registry — validate / execute dispatch for every game command.
//!
//! RULES:
//!   - Handlers are registered once, at engine construction. A kind may be
//!     registered only once.
//!   - `validate` never mutates. `execute` re-checks everything it relies on.
//!   - `validate_and_execute` never executes after a FAIL, and runs both
//!     steps inside one store transaction.
//!   - A FAIL from execute rolls the transaction back. OK and PARTIAL commit,
//!     and the committed action is appended to the action log.
//!   - Errors never cross the registry boundary: storage problems come back
//!     as FAIL with code `storage_error`.

use crate::{
    clock::Clock,
    config::GameConfig,
    error::{GameError, GameResult},
    rng::RngBank,
    store::{ActionLogEntry, GameStore},
    types::{CharacterId, EntityId, FiefdomId, Timestamp},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ── Results ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Ok,
    Fail,
    Partial,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok      => "OK",
            Self::Fail    => "FAIL",
            Self::Partial => "PARTIAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Fiefdom,
    Building,
    Wall,
    Official,
    Hero,
    Combatant,
    TrainingJob,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fiefdom     => "fiefdom",
            Self::Building    => "building",
            Self::Wall        => "wall",
            Self::Official    => "official",
            Self::Hero        => "hero",
            Self::Combatant   => "combatant",
            Self::TrainingJob => "training_job",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiffValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl From<i64> for DiffValue {
    fn from(v: i64) -> Self { Self::Int(v) }
}

impl From<f64> for DiffValue {
    fn from(v: f64) -> Self { Self::Float(v) }
}

impl From<&str> for DiffValue {
    fn from(v: &str) -> Self { Self::Text(v.to_string()) }
}

impl From<String> for DiffValue {
    fn from(v: String) -> Self { Self::Text(v) }
}

impl<T: Into<DiffValue>> From<Option<T>> for DiffValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One field that an action changed. Creations have `old = Null`, deletions
/// have `new = Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field:       String,
    pub source_type: EntityKind,
    pub source_id:   EntityId,
    /// "<kind>:<id>", e.g. "building:12".
    pub entity_key:  String,
    pub old:         DiffValue,
    pub new:         DiffValue,
}

impl FieldDiff {
    pub fn new(
        source_type: EntityKind,
        source_id: EntityId,
        field: impl Into<String>,
        old: impl Into<DiffValue>,
        new: impl Into<DiffValue>,
    ) -> Self {
        Self {
            field: field.into(),
            source_type,
            source_id,
            entity_key: format!("{}:{source_id}", source_type.as_str()),
            old: old.into(),
            new: new.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status:        ActionStatus,
    pub error_code:    Option<String>,
    pub error_message: Option<String>,
    pub result:        Value,
    pub diffs:         Vec<FieldDiff>,
    pub timestamp:     Timestamp,
}

impl ActionResult {
    pub fn ok(timestamp: Timestamp) -> Self {
        Self {
            status: ActionStatus::Ok,
            error_code: None,
            error_message: None,
            result: Value::Null,
            diffs: Vec::new(),
            timestamp,
        }
    }

    pub fn fail(timestamp: Timestamp, code: &str, message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Fail,
            error_code: Some(code.to_string()),
            error_message: Some(message.into()),
            ..Self::ok(timestamp)
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    pub fn with_diffs(mut self, diffs: Vec<FieldDiff>) -> Self {
        self.diffs = diffs;
        self
    }

    pub fn partial(mut self) -> Self {
        self.status = ActionStatus::Partial;
        self
    }

    pub fn is_ok(&self) -> bool { self.status == ActionStatus::Ok }
    pub fn is_fail(&self) -> bool { self.status == ActionStatus::Fail }
    pub fn is_partial(&self) -> bool { self.status == ActionStatus::Partial }

    pub fn code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }
}

// ── Context ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    pub fiefdom_id:   FiefdomId,
    pub character_id: CharacterId,
    pub request_id:   String,
    /// Caller address, when the transport knows one.
    pub origin:       Option<String>,
}

impl ActionContext {
    /// A context with a fresh v4 request id.
    pub fn new(fiefdom_id: FiefdomId, character_id: CharacterId) -> Self {
        Self {
            fiefdom_id,
            character_id,
            request_id: Uuid::new_v4().to_string(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// Everything a handler may read or write.
pub struct ActionEnv<'a> {
    pub config: &'a GameConfig,
    pub store:  &'a GameStore,
    pub clock:  &'a dyn Clock,
    pub rng:    &'a RngBank,
}

impl ActionEnv<'_> {
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

// ── Handler contract ───────────────────────────────────────────────

/// Why a handler did not produce a result.
#[derive(Debug, Error)]
pub enum ActionFailure {
    /// A rule said no. Becomes FAIL with this code.
    #[error("{code}: {message}")]
    Rejected { code: &'static str, message: String },

    #[error(transparent)]
    Game(#[from] GameError),
}

impl From<rusqlite::Error> for ActionFailure {
    fn from(e: rusqlite::Error) -> Self {
        Self::Game(e.into())
    }
}

impl From<serde_json::Error> for ActionFailure {
    fn from(e: serde_json::Error) -> Self {
        Self::Game(e.into())
    }
}

impl ActionFailure {
    pub fn code(&self) -> &str {
        match self {
            Self::Rejected { code, .. } => *code,
            Self::Game(e) => e.code(),
        }
    }

    fn into_result(self, timestamp: Timestamp) -> ActionResult {
        match self {
            Self::Rejected { code, message } => ActionResult::fail(timestamp, code, message),
            Self::Game(e) => ActionResult::fail(timestamp, e.code(), e.to_string()),
        }
    }
}

pub type ActionOutcome = Result<ActionResult, ActionFailure>;

/// Shorthand for handlers: `return reject("not_owner", "...")`.
pub fn reject<T>(code: &'static str, message: impl Into<String>) -> Result<T, ActionFailure> {
    Err(ActionFailure::Rejected { code, message: message.into() })
}

/// The contract every action kind fulfils.
pub trait ActionHandler: Send + Sync {
    /// Stable kind name used for dispatch.
    fn kind(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Read-only. Returns OK or a rejection.
    fn validate(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome;

    /// Perform the mutation. Returns OK or PARTIAL with every field it changed.
    fn execute(&self, env: &ActionEnv<'_>, payload: &Value, ctx: &ActionContext) -> ActionOutcome;

    /// Whether the engine brings the fiefdom up to date before dispatching.
    /// Handlers that run the time pass themselves return false.
    fn needs_catch_up(&self) -> bool {
        true
    }
}

// ── Registry ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct ActionRegistry {
    handlers: BTreeMap<&'static str, Box<dyn ActionHandler>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("kinds", &self.registered_types())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Box<dyn ActionHandler>) -> GameResult<()> {
        let kind = handler.kind();
        if self.handlers.contains_key(kind) {
            return Err(GameError::DuplicateAction { kind: kind.to_string() });
        }
        debug!("registered action '{kind}'");
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn registered_types(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn has_type(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn description(&self, kind: &str) -> Option<&'static str> {
        self.handlers.get(kind).map(|h| h.description())
    }

    /// False for unknown kinds.
    pub fn needs_catch_up(&self, kind: &str) -> bool {
        self.handlers.get(kind).is_some_and(|h| h.needs_catch_up())
    }

    pub fn validate(
        &self,
        env: &ActionEnv<'_>,
        kind: &str,
        payload: &Value,
        ctx: &ActionContext,
    ) -> ActionResult {
        let now = env.now();
        let Some(handler) = self.handlers.get(kind) else {
            return unknown_action(now, kind);
        };
        match handler.validate(env, payload, ctx) {
            Ok(result) => result,
            Err(failure) => {
                debug!("{kind} rejected for fiefdom {}: {failure}", ctx.fiefdom_id);
                failure.into_result(now)
            }
        }
    }

    /// Execute without a prior validate, in its own transaction.
    pub fn execute(
        &self,
        env: &ActionEnv<'_>,
        kind: &str,
        payload: &Value,
        ctx: &ActionContext,
    ) -> ActionResult {
        let now = env.now();
        let Some(handler) = self.handlers.get(kind) else {
            return unknown_action(now, kind);
        };
        let tx = match env.store.begin_transaction() {
            Ok(tx) => tx,
            Err(e) => return ActionResult::fail(now, e.code(), e.to_string()),
        };
        let result = self.execute_handler(env, handler.as_ref(), payload, ctx);
        finish(env, tx, kind, ctx, result)
    }

    /// Validate, then execute only if validation passed. Both run inside one
    /// transaction so the execute sees exactly what the validate checked.
    pub fn validate_and_execute(
        &self,
        env: &ActionEnv<'_>,
        kind: &str,
        payload: &Value,
        ctx: &ActionContext,
    ) -> ActionResult {
        let now = env.now();
        let Some(handler) = self.handlers.get(kind) else {
            return unknown_action(now, kind);
        };
        let tx = match env.store.begin_transaction() {
            Ok(tx) => tx,
            Err(e) => return ActionResult::fail(now, e.code(), e.to_string()),
        };

        let validation = match handler.validate(env, payload, ctx) {
            Ok(result) => result,
            Err(failure) => failure.into_result(now),
        };
        if validation.is_fail() {
            warn!(
                "{kind} for fiefdom {} failed validation: {}",
                ctx.fiefdom_id,
                validation.code().unwrap_or("unknown")
            );
            return validation;
        }

        let result = self.execute_handler(env, handler.as_ref(), payload, ctx);
        finish(env, tx, kind, ctx, result)
    }

    fn execute_handler(
        &self,
        env: &ActionEnv<'_>,
        handler: &dyn ActionHandler,
        payload: &Value,
        ctx: &ActionContext,
    ) -> ActionResult {
        match handler.execute(env, payload, ctx) {
            Ok(result) => result,
            Err(failure) => failure.into_result(env.now()),
        }
    }
}

fn unknown_action(now: Timestamp, kind: &str) -> ActionResult {
    warn!("unknown action '{kind}'");
    ActionResult::fail(now, "unknown_action", format!("Unknown action type: {kind}"))
}

/// Commit a successful execute (logging it), or roll a failed one back.
fn finish(
    env: &ActionEnv<'_>,
    tx: rusqlite::Transaction<'_>,
    kind: &str,
    ctx: &ActionContext,
    result: ActionResult,
) -> ActionResult {
    if result.is_fail() {
        warn!(
            "{kind} for fiefdom {} failed during execute ({}); rolled back",
            ctx.fiefdom_id,
            result.code().unwrap_or("unknown")
        );
        drop(tx);
        return result;
    }

    let committed = log_action(env, kind, ctx, &result)
        .and_then(|()| tx.commit().map_err(GameError::from));
    match committed {
        Ok(()) => {
            info!(
                "{kind} {} for fiefdom {} ({} diff(s), request {})",
                result.status.as_str(),
                ctx.fiefdom_id,
                result.diffs.len(),
                ctx.request_id
            );
            result
        }
        Err(e) => {
            warn!("{kind} for fiefdom {} could not commit: {e}", ctx.fiefdom_id);
            ActionResult::fail(result.timestamp, e.code(), e.to_string())
        }
    }
}

fn log_action(env: &ActionEnv<'_>, kind: &str, ctx: &ActionContext, result: &ActionResult) -> GameResult<()> {
    env.store.append_action_log(&ActionLogEntry {
        id:           None,
        request_id:   ctx.request_id.clone(),
        fiefdom_id:   ctx.fiefdom_id,
        character_id: ctx.character_id,
        kind:         kind.to_string(),
        status:       result.status.as_str().to_string(),
        diffs:        serde_json::to_string(&result.diffs)?,
        created_at:   result.timestamp,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&ActionStatus::Partial).unwrap(), "\"PARTIAL\"");
    }

    #[test]
    fn diff_entity_key_and_values() {
        let diff = FieldDiff::new(EntityKind::Building, 12, "level", 1i64, 2i64);
        assert_eq!(diff.entity_key, "building:12");
        assert_eq!(diff.old, DiffValue::Int(1));
        let created = FieldDiff::new(EntityKind::Wall, 3, "generation", None::<i64>, 1i64);
        assert_eq!(created.old, DiffValue::Null);
        assert_eq!(serde_json::to_value(&created.old).unwrap(), Value::Null);
    }

    #[test]
    fn contexts_get_distinct_request_ids() {
        let a = ActionContext::new(1, 1);
        let b = ActionContext::new(1, 1);
        assert_ne!(a.request_id, b.request_id);
    }
}
