//! The game engine: owns the store, configuration, clock, RNG bank and the
//! action registry, and is the only entry point callers use.
//!
//! REGISTRATION ORDER (fixed, documented):
//!   1. build          4. demolish       7. appoint_official
//!   2. upgrade        5. build_wall     8. sync
//!   3. move           6. train_troops
//!
//! RULES:
//!   - Every action and every state read runs the catch-up pass for its
//!     fiefdom first (sync runs it itself). There is no background tick.
//!   - `validate` may advance time through that catch-up but never applies
//!     the action itself.
//!   - All randomness flows through the RngBank.
//!   - All committed actions are recorded in the action log.

use crate::{
    action::{ActionContext, ActionEnv, ActionRegistry, ActionResult},
    clock::{Clock, ManualClock},
    config::GameConfig,
    construction_actions::{BuildAction, DemolishAction, MoveAction, UpgradeAction},
    error::{GameError, GameResult},
    model::Resources,
    morale::{calculate_fiefdom_morale, MoraleInputs},
    rng::RngBank,
    roster_actions::{AppointOfficialAction, TrainTroopsAction},
    snapshot::FiefdomSnapshot,
    store::GameStore,
    sync_action::SyncAction,
    time_engine::{TimeEngine, TimeUpdateResult},
    types::{CharacterId, FiefdomId, Timestamp},
    wall_actions::BuildWallAction,
};
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;

/// Start time of the test clock: 2023-11-14T22:13:20Z.
pub const TEST_EPOCH: Timestamp = 1_700_000_000;

pub struct GameEngine {
    pub config:   GameConfig,
    pub store:    GameStore,
    pub rng_bank: RngBank,
    clock:        Arc<dyn Clock>,
    registry:     ActionRegistry,
}

impl GameEngine {
    /// An engine with an empty registry. Most callers want `build`.
    pub fn new(store: GameStore, config: GameConfig, clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            config,
            store,
            rng_bank: RngBank::new(seed),
            clock,
            registry: ActionRegistry::new(),
        }
    }

    /// Build a fully wired engine: schema migrated, every action registered.
    pub fn build(store: GameStore, config: GameConfig, clock: Arc<dyn Clock>, seed: u64) -> GameResult<Self> {
        store.migrate()?;
        let mut engine = Self::new(store, config, clock, seed);

        // REGISTRATION ORDER — fixed, documented.
        engine.registry.register(Box::new(BuildAction))?;
        engine.registry.register(Box::new(UpgradeAction))?;
        engine.registry.register(Box::new(MoveAction))?;
        engine.registry.register(Box::new(DemolishAction))?;
        engine.registry.register(Box::new(BuildWallAction))?;
        engine.registry.register(Box::new(TrainTroopsAction))?;
        engine.registry.register(Box::new(AppointOfficialAction))?;
        engine.registry.register(Box::new(SyncAction))?;

        info!(
            "engine ready: {} action kinds, seed {}",
            engine.registry.registered_types().len(),
            engine.rng_bank.master_seed()
        );
        Ok(engine)
    }

    /// In-memory store, test configuration and a manual clock at `TEST_EPOCH`.
    pub fn build_test(seed: u64) -> GameResult<(Self, Arc<ManualClock>)> {
        let clock = Arc::new(ManualClock::new(TEST_EPOCH));
        let engine = Self::build(
            GameStore::in_memory()?,
            GameConfig::default_test(),
            clock.clone(),
            seed,
        )?;
        Ok((engine, clock))
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Mutable access for registering extra handlers after `build`.
    pub fn registry_mut(&mut self) -> &mut ActionRegistry {
        &mut self.registry
    }

    fn env(&self) -> ActionEnv<'_> {
        ActionEnv {
            config: &self.config,
            store:  &self.store,
            clock:  self.clock.as_ref(),
            rng:    &self.rng_bank,
        }
    }

    fn time_engine(&self) -> TimeEngine<'_> {
        TimeEngine::new(&self.config, &self.store, self.clock.as_ref())
    }

    // ── Fiefdoms ───────────────────────────────────────────────

    /// Create a fiefdom with the configured starting stockpile.
    pub fn establish_fiefdom(&self, owner_id: CharacterId, name: &str, x: i64, y: i64) -> GameResult<FiefdomId> {
        let resources = Resources::from_bundle(&self.config.world.starting_resources);
        let id = self.store.insert_fiefdom(owner_id, name, x, y, &resources, self.now())?;
        info!("fiefdom {id} '{name}' established for character {owner_id} at ({x}, {y})");
        Ok(id)
    }

    // ── Time ───────────────────────────────────────────────────

    /// Advance every fiefdom in scope from `last_update_time` to now.
    pub fn update_state_since(
        &self,
        last_update_time: Timestamp,
        filter: Option<FiefdomId>,
    ) -> GameResult<TimeUpdateResult> {
        self.time_engine().update_state_since(last_update_time, filter)
    }

    /// Bring one fiefdom up to date from its own checkpoint.
    pub fn catch_up(&self, fiefdom_id: FiefdomId) -> GameResult<TimeUpdateResult> {
        let fiefdom = self.store
            .get_fiefdom(fiefdom_id)?
            .ok_or(GameError::FiefdomNotFound { id: fiefdom_id })?;
        let since = fiefdom.last_update_time.min(self.now());
        self.time_engine().update_state_since(since, Some(fiefdom_id))
    }

    /// Caught-up state of one fiefdom.
    pub fn fiefdom_snapshot(&self, fiefdom_id: FiefdomId) -> GameResult<FiefdomSnapshot> {
        self.catch_up(fiefdom_id)?;
        let fiefdom = self.store
            .get_fiefdom(fiefdom_id)?
            .ok_or(GameError::FiefdomNotFound { id: fiefdom_id })?;
        let buildings  = self.store.buildings_for_fiefdom(fiefdom_id)?;
        let walls      = self.store.walls_for_fiefdom(fiefdom_id)?;
        let officials  = self.store.officials_for_fiefdom(fiefdom_id)?;
        let heroes     = self.store.heroes_for_fiefdom(fiefdom_id)?;
        let combatants = self.store.combatants_for_fiefdom(fiefdom_id)?;
        let training   = self.store.training_jobs_for_fiefdom(fiefdom_id)?;
        let morale = calculate_fiefdom_morale(&self.config, &MoraleInputs {
            buildings:  &buildings,
            walls:      &walls,
            officials:  &officials,
            heroes:     &heroes,
            combatants: &combatants,
        });
        Ok(FiefdomSnapshot {
            taken_at: self.now(),
            fiefdom,
            buildings,
            walls,
            officials,
            heroes,
            combatants,
            training,
            morale,
        })
    }

    // ── Actions ────────────────────────────────────────────────

    pub fn validate(&self, kind: &str, payload: &Value, ctx: &ActionContext) -> ActionResult {
        if let Err(fail) = self.prepare(kind, ctx) {
            return fail;
        }
        self.registry.validate(&self.env(), kind, payload, ctx)
    }

    pub fn execute(&self, kind: &str, payload: &Value, ctx: &ActionContext) -> ActionResult {
        if let Err(fail) = self.prepare(kind, ctx) {
            return fail;
        }
        self.registry.execute(&self.env(), kind, payload, ctx)
    }

    pub fn validate_and_execute(&self, kind: &str, payload: &Value, ctx: &ActionContext) -> ActionResult {
        if let Err(fail) = self.prepare(kind, ctx) {
            return fail;
        }
        self.registry.validate_and_execute(&self.env(), kind, payload, ctx)
    }

    /// Catch the context fiefdom up before a known action touches it.
    /// Unknown kinds and missing fiefdoms are left to the registry and
    /// handlers to report.
    fn prepare(&self, kind: &str, ctx: &ActionContext) -> Result<(), ActionResult> {
        if !self.registry.needs_catch_up(kind) {
            return Ok(());
        }
        match self.catch_up(ctx.fiefdom_id) {
            Ok(_) | Err(GameError::FiefdomNotFound { .. }) => Ok(()),
            Err(e) => {
                warn!("catch-up for fiefdom {} failed before {kind}: {e}", ctx.fiefdom_id);
                Err(ActionResult::fail(self.now(), e.code(), e.to_string()))
            }
        }
    }
}
