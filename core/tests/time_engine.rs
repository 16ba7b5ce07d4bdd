//! Lazy time advancement: construction timers, production accrual,
//! idempotence and checkpoint handling.

use fiefdom_core::{
    action::{ActionContext, ActionResult},
    clock::ManualClock,
    engine::GameEngine,
    error::GameError,
    model::Resource,
    time_engine::CompletedJob,
    types::FiefdomId,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn setup() -> (GameEngine, Arc<ManualClock>, FiefdomId) {
    let (engine, clock) = GameEngine::build_test(7).expect("engine");
    let id = engine.establish_fiefdom(1, "Ashford", 0, 0).expect("fiefdom");
    (engine, clock, id)
}

fn act(engine: &GameEngine, fiefdom_id: FiefdomId, owner: i64, kind: &str, payload: Value) -> ActionResult {
    engine.validate_and_execute(kind, &payload, &ActionContext::new(fiefdom_id, owner))
}

fn build_manor(engine: &GameEngine, fiefdom_id: FiefdomId, owner: i64) {
    let r = act(engine, fiefdom_id, owner, "build", json!({ "building_type": "home_base", "x": 0, "y": 0 }));
    assert!(r.is_ok(), "manor build failed: {:?}", r.error_message);
}

fn gold(engine: &GameEngine, fiefdom_id: FiefdomId) -> i64 {
    engine.fiefdom_snapshot(fiefdom_id).expect("snapshot").fiefdom.resources.gold
}

#[test]
fn construction_completes_exactly_at_its_duration() {
    let (engine, clock, id) = setup();
    let placed_at = engine.now();
    build_manor(&engine, id, 1);

    clock.advance(59);
    let early = engine.fiefdom_snapshot(id).expect("snapshot");
    let manor = &early.buildings[0];
    assert_eq!(manor.level, 0, "manor finished a second early");
    assert!(manor.is_constructing());

    clock.advance(1);
    let done = engine.fiefdom_snapshot(id).expect("snapshot");
    let manor = &done.buildings[0];
    assert_eq!(manor.level, 1);
    assert_eq!(manor.construction_start, 0, "completed building still marked as constructing");
    assert_eq!(manor.last_updated, placed_at + 60);
}

#[test]
fn production_only_counts_time_after_completion() {
    let (engine, clock, id) = setup();
    build_manor(&engine, id, 1);
    assert_eq!(gold(&engine, id), 900);

    // 60s under construction, then one hour at level 1 (10 gold/h).
    clock.advance(60 + 3600);
    assert_eq!(gold(&engine, id), 910);
}

#[test]
fn fractional_output_carries_between_passes() {
    let (engine, clock, id) = setup();
    build_manor(&engine, id, 1);
    clock.advance(60);
    assert_eq!(gold(&engine, id), 900);

    // 15 minutes = 2.5 gold: 2 land, 0.5 waits.
    clock.advance(900);
    assert_eq!(gold(&engine, id), 902);
    let manor_id = engine.store.buildings_for_fiefdom(id).expect("buildings")[0].id;
    let carried = engine.store.production_remainder(manor_id, Resource::Gold).expect("remainder");
    assert!((carried - 0.5).abs() < 1e-9, "expected 0.5 carried, got {carried}");

    clock.advance(900);
    assert_eq!(gold(&engine, id), 905);
}

#[test]
fn many_small_passes_match_one_large_pass() {
    let (engine, clock, a) = setup();
    let b = engine.establish_fiefdom(2, "Brackenford", 100, 100).expect("second fiefdom");
    build_manor(&engine, a, 1);
    build_manor(&engine, b, 2);
    clock.advance(60);
    engine.catch_up(a).expect("catch up a");
    engine.catch_up(b).expect("catch up b");

    // 25 steps of 432s = 3h; each step is 1.2 gold.
    for _ in 0..25 {
        clock.advance(432);
        engine.catch_up(a).expect("step");
    }
    assert_eq!(gold(&engine, a), 930);
    assert_eq!(gold(&engine, b), 930, "single pass and stepped pass diverged");
}

#[test]
fn repeated_pass_over_the_same_window_is_a_no_op() {
    let (engine, clock, id) = setup();
    build_manor(&engine, id, 1);
    let since = engine.now();
    clock.advance(60 + 7200);

    let first = engine.update_state_since(since, None).expect("first pass");
    assert_eq!(first.produced(id, Resource::Gold), 20);
    assert_eq!(first.fiefdoms_updated, 1);

    let second = engine.update_state_since(since, None).expect("second pass");
    assert_eq!(second.produced(id, Resource::Gold), 0, "same window credited twice");
    assert!(second.completed.is_empty());
    assert_eq!(gold(&engine, id), 920);

    let chained = engine.update_state_since(first.new_timestamp, None).expect("chained pass");
    assert!(chained.elapsed_hours.abs() < 1e-9, "elapsed {}", chained.elapsed_hours);
    assert_eq!(chained.production_updates_applied, 0);
    assert!(chained.productions.is_empty());
    assert!(chained.completed.is_empty());
    assert!(chained.diffs.is_empty());
    assert_eq!(gold(&engine, id), 920);
}

#[test]
fn future_checkpoint_is_rejected_without_changes() {
    let (engine, _clock, id) = setup();
    let before = engine.store.get_fiefdom(id).expect("read").expect("fiefdom");

    let err = engine.update_state_since(engine.now() + 10, None).unwrap_err();
    assert!(
        matches!(err, GameError::FutureCheckpoint { .. }),
        "expected FutureCheckpoint, got {err:?}"
    );
    assert_eq!(err.code(), "future_checkpoint");

    let after = engine.store.get_fiefdom(id).expect("read").expect("fiefdom");
    assert_eq!(before, after);
}

#[test]
fn upgrade_splits_the_window_at_completion() {
    let (engine, clock, id) = setup();
    build_manor(&engine, id, 1);
    clock.advance(60);
    let manor_id = engine.fiefdom_snapshot(id).expect("snapshot").buildings[0].id;

    let r = act(&engine, id, 1, "upgrade", json!({ "building_id": manor_id }));
    assert!(r.is_ok(), "upgrade failed: {:?}", r.error_message);
    assert_eq!(gold(&engine, id), 400);

    // One hour still at level 1 (10), then one hour at level 2 (15).
    clock.advance(7200);
    let snap = engine.fiefdom_snapshot(id).expect("snapshot");
    assert_eq!(snap.buildings[0].level, 2);
    assert_eq!(snap.fiefdom.resources.gold, 425);
}

#[test]
fn completions_are_reported_with_their_true_time() {
    let (engine, clock, id) = setup();
    let placed_at = engine.now();
    build_manor(&engine, id, 1);
    clock.advance(500);

    let summary = engine.catch_up(id).expect("catch up");
    assert_eq!(summary.completed.len(), 1);
    match &summary.completed[0] {
        CompletedJob::Building { building_type, level, completed_at, .. } => {
            assert_eq!(building_type, "home_base");
            assert_eq!(*level, 1);
            assert_eq!(*completed_at, placed_at + 60);
        }
        other => panic!("unexpected completion {other:?}"),
    }
    assert_eq!(summary.new_timestamp, engine.now());
}

#[test]
fn sweep_covers_every_fiefdom() {
    let (engine, clock, a) = setup();
    let b = engine.establish_fiefdom(2, "Brackenford", 100, 100).expect("second fiefdom");
    build_manor(&engine, a, 1);
    build_manor(&engine, b, 2);
    let since = engine.now();
    clock.advance(60 + 3600);

    let result = engine.update_state_since(since, None).expect("sweep");
    assert_eq!(result.fiefdoms_updated, 2);
    assert_eq!(result.produced(a, Resource::Gold), 10);
    assert_eq!(result.produced(b, Resource::Gold), 10);
    assert!((result.elapsed_hours - (3660.0 / 3600.0)).abs() < 1e-9);

    let only_a = engine.update_state_since(since, Some(a)).expect("filtered");
    assert_eq!(only_a.fiefdoms_updated, 1);
}

#[test]
fn morale_is_stored_when_a_source_comes_online() {
    let (engine, clock, id) = setup();
    build_manor(&engine, id, 1);
    assert_eq!(engine.store.get_fiefdom(id).expect("read").expect("fiefdom").morale, 0.0);

    clock.advance(60);
    let summary = engine.catch_up(id).expect("catch up");
    assert_eq!(summary.morale_changes.len(), 1);
    let stored = engine.store.get_fiefdom(id).expect("read").expect("fiefdom").morale;
    assert_eq!(stored, 5.0);
}
