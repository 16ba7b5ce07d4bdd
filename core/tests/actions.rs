//! End-to-end behaviour of every registered action through the engine.

use fiefdom_core::{
    action::{ActionContext, ActionResult, DiffValue, EntityKind},
    clock::ManualClock,
    engine::GameEngine,
    model::{OfficialRole, Resource},
    types::FiefdomId,
};
use serde_json::{json, Value};
use std::sync::Arc;

const OWNER: i64 = 1;

/// A fiefdom with a completed manor at the origin. Stockpile afterwards:
/// 900 gold, 450 wood, 300 stone, 200 grain, 40 steel.
fn founded(seed: u64) -> (GameEngine, Arc<ManualClock>, FiefdomId) {
    let (engine, clock) = GameEngine::build_test(seed).expect("engine");
    let id = engine.establish_fiefdom(OWNER, "Ashford", 0, 0).expect("fiefdom");
    let r = act(&engine, id, "build", json!({ "building_type": "home_base", "x": 0, "y": 0 }));
    assert!(r.is_ok(), "manor build failed: {:?}", r.error_message);
    clock.advance(60);
    engine.catch_up(id).expect("catch up");
    (engine, clock, id)
}

fn act(engine: &GameEngine, id: FiefdomId, kind: &str, payload: Value) -> ActionResult {
    engine.validate_and_execute(kind, &payload, &ActionContext::new(id, OWNER))
}

fn stock(engine: &GameEngine, id: FiefdomId, resource: Resource) -> i64 {
    engine.store.get_fiefdom(id).expect("read").expect("fiefdom").resources.get(resource)
}

fn build_farm(engine: &GameEngine, id: FiefdomId, x: i64, y: i64) -> i64 {
    let r = act(engine, id, "build", json!({ "building_type": "farm", "x": x, "y": y }));
    assert!(r.is_ok(), "farm build failed: {:?}", r.error_message);
    r.result["building_id"].as_i64().expect("building_id")
}

// ── build ──────────────────────────────────────────────────────────

#[test]
fn build_charges_level_one_cost_and_starts_construction() {
    let (engine, _clock, id) = founded(1);
    let now = engine.now();

    let r = act(&engine, id, "build", json!({ "building_type": "farm", "x": 6, "y": 0 }));
    assert!(r.is_ok(), "build failed: {:?}", r.error_message);
    assert_eq!(r.result["completes_at"], now + 600);
    assert_eq!(stock(&engine, id, Resource::Gold), 850);
    assert_eq!(stock(&engine, id, Resource::Wood), 420);

    let farm_id = r.result["building_id"].as_i64().expect("id");
    let key = format!("building:{farm_id}");
    let level = r.diffs
        .iter()
        .find(|d| d.entity_key == key && d.field == "level")
        .expect("level diff");
    assert_eq!(level.old, DiffValue::Null);
    assert_eq!(level.new, DiffValue::Int(0));
    assert!(r.diffs.iter().any(|d| d.source_type == EntityKind::Fiefdom && d.field == "gold"));

    let farm = engine.store.get_building(farm_id).expect("read").expect("farm");
    assert_eq!(farm.level, 0);
    assert_eq!(farm.construction_start, now);
}

#[test]
fn anchor_rules_gate_building() {
    let (engine, clock) = GameEngine::build_test(2).expect("engine");
    let id = engine.establish_fiefdom(OWNER, "Ashford", 0, 0).expect("fiefdom");

    let early = act(&engine, id, "build", json!({ "building_type": "farm", "x": 6, "y": 0 }));
    assert_eq!(early.code(), Some("anchor_required"));

    let off_origin = act(&engine, id, "build", json!({ "building_type": "home_base", "x": 2, "y": 2 }));
    assert_eq!(off_origin.code(), Some("anchor_must_be_at_origin"));

    assert!(act(&engine, id, "build", json!({ "building_type": "home_base", "x": 0, "y": 0 })).is_ok());
    let second = act(&engine, id, "build", json!({ "building_type": "home_base", "x": 0, "y": 0 }));
    assert_eq!(second.code(), Some("anchor_exists"));

    // Still under construction: other buildings wait.
    let waiting = act(&engine, id, "build", json!({ "building_type": "farm", "x": 6, "y": 0 }));
    assert_eq!(waiting.code(), Some("anchor_required"));

    clock.advance(60);
    assert!(act(&engine, id, "build", json!({ "building_type": "farm", "x": 6, "y": 0 })).is_ok());
}

#[test]
fn build_rejections_leave_the_stockpile_alone() {
    let (engine, _clock, id) = founded(3);

    let overlap = act(&engine, id, "build", json!({ "building_type": "farm", "x": 2, "y": 2 }));
    assert_eq!(overlap.code(), Some("building_overlap"));

    let outside = act(&engine, id, "build", json!({ "building_type": "farm", "x": 63, "y": 0 }));
    assert_eq!(outside.code(), Some("invalid_position"));

    let unknown = act(&engine, id, "build", json!({ "building_type": "siege_tower", "x": 6, "y": 0 }));
    assert_eq!(unknown.code(), Some("unknown_building_type"));

    engine.store.set_resource(id, Resource::Gold, 10).expect("drain gold");
    let broke = act(&engine, id, "build", json!({ "building_type": "farm", "x": 6, "y": 0 }));
    assert_eq!(broke.code(), Some("insufficient_resources"));

    assert_eq!(stock(&engine, id, Resource::Gold), 10);
    assert_eq!(stock(&engine, id, Resource::Wood), 450);
    assert_eq!(engine.store.buildings_for_fiefdom(id).expect("buildings").len(), 1);
}

// ── upgrade ────────────────────────────────────────────────────────

#[test]
fn upgrade_runs_one_level_at_a_time() {
    let (engine, clock, id) = founded(4);
    let farm = build_farm(&engine, id, 6, 0);

    let busy = act(&engine, id, "upgrade", json!({ "building_id": farm }));
    assert_eq!(busy.code(), Some("upgrade_in_progress"));

    clock.advance(600);
    let gold_before = stock(&engine, id, Resource::Gold);
    let r = act(&engine, id, "upgrade", json!({ "building_id": farm }));
    assert!(r.is_ok(), "upgrade failed: {:?}", r.error_message);
    assert_eq!(r.result["upgrade_to_level"], 2);
    // catch-up inside the action credits the manor's 10 minutes first.
    assert_eq!(stock(&engine, id, Resource::Gold), gold_before + 1 - 100);

    let again = act(&engine, id, "upgrade", json!({ "building_id": farm }));
    assert_eq!(again.code(), Some("upgrade_in_progress"));

    clock.advance(1200);
    let farm_row = engine.fiefdom_snapshot(id).expect("snapshot").building(farm).cloned().expect("farm");
    assert_eq!(farm_row.level, 2);
    assert!(!farm_row.is_constructing());
}

#[test]
fn upgrade_stops_at_max_level_and_needs_one_target() {
    let (engine, clock, id) = founded(5);
    let r = act(&engine, id, "build", json!({ "building_type": "tavern", "x": 6, "y": 0 }));
    let tavern = r.result["building_id"].as_i64().expect("id");
    clock.advance(900);
    assert!(act(&engine, id, "upgrade", json!({ "building_id": tavern })).is_ok());
    clock.advance(1800);

    let maxed = act(&engine, id, "upgrade", json!({ "building_id": tavern }));
    assert_eq!(maxed.code(), Some("max_level_reached"));

    let both = act(&engine, id, "upgrade", json!({ "building_id": tavern, "wall_id": 1 }));
    assert_eq!(both.code(), Some("invalid_payload"));
    let neither = act(&engine, id, "upgrade", json!({}));
    assert_eq!(neither.code(), Some("invalid_payload"));

    let missing = act(&engine, id, "upgrade", json!({ "building_id": 4242 }));
    assert_eq!(missing.code(), Some("building_not_found"));
}

// ── move ───────────────────────────────────────────────────────────

#[test]
fn move_costs_a_tenth_of_the_current_level() {
    let (engine, clock, id) = founded(6);
    let farm = build_farm(&engine, id, 6, 0);

    let early = act(&engine, id, "move", json!({ "building_id": farm, "x": 20, "y": 20 }));
    assert_eq!(early.code(), Some("cannot_move_under_construction"));

    clock.advance(600);
    engine.catch_up(id).expect("catch up");
    let gold = stock(&engine, id, Resource::Gold);
    let wood = stock(&engine, id, Resource::Wood);

    let r = act(&engine, id, "move", json!({ "building_id": farm, "x": 20, "y": 20 }));
    assert!(r.is_ok(), "move failed: {:?}", r.error_message);
    assert_eq!(stock(&engine, id, Resource::Gold), gold - 5);
    assert_eq!(stock(&engine, id, Resource::Wood), wood - 3);

    let moved = engine.store.get_building(farm).expect("read").expect("farm");
    assert_eq!((moved.x, moved.y), (20, 20));
    let x = r.diffs.iter().find(|d| d.field == "x").expect("x diff");
    assert_eq!((x.old.clone(), x.new.clone()), (DiffValue::Int(6), DiffValue::Int(20)));

    // Shifting onto part of its own old footprint is fine.
    assert!(act(&engine, id, "move", json!({ "building_id": farm, "x": 21, "y": 20 })).is_ok());
}

#[test]
fn the_manor_never_moves() {
    let (engine, _clock, id) = founded(7);
    let manor = engine.store.buildings_for_fiefdom(id).expect("buildings")[0].id;
    let r = act(&engine, id, "move", json!({ "building_id": manor, "x": 10, "y": 10 }));
    assert_eq!(r.code(), Some("anchor_immutable"));
}

// ── demolish ───────────────────────────────────────────────────────

#[test]
fn batch_demolish_reports_partial_and_commits_what_it_can() {
    let (engine, _clock, id) = founded(8);
    let farm = build_farm(&engine, id, 6, 0);
    let manor = engine.store.buildings_for_fiefdom(id).expect("buildings")[0].id;
    let gold = stock(&engine, id, Resource::Gold);
    let wood = stock(&engine, id, Resource::Wood);

    let r = act(&engine, id, "demolish", json!({ "building_ids": [farm, manor] }));
    assert!(r.is_partial(), "expected PARTIAL, got {:?}", r.status);
    assert_eq!(r.result["demolished"].as_array().map(Vec::len), Some(1));
    assert_eq!(r.result["failed"][0]["error_code"], "anchor_immutable");

    // 80% of the farm's level-1 cost, even though it never finished.
    assert_eq!(stock(&engine, id, Resource::Gold), gold + 40);
    assert_eq!(stock(&engine, id, Resource::Wood), wood + 24);
    assert!(engine.store.get_building(farm).expect("read").is_none());
    assert!(engine.store.get_building(manor).expect("read").is_some());

    let log = engine.store.action_log_for_fiefdom(id).expect("log");
    assert_eq!(log.last().map(|e| e.status.as_str()), Some("PARTIAL"));
}

#[test]
fn demolish_with_nothing_demolishable_fails() {
    let (engine, _clock, id) = founded(9);
    let manor = engine.store.buildings_for_fiefdom(id).expect("buildings")[0].id;

    let anchor = act(&engine, id, "demolish", json!({ "building_id": manor }));
    assert_eq!(anchor.code(), Some("anchor_immutable"));

    let ghost = act(&engine, id, "demolish", json!({ "building_id": 999 }));
    assert_eq!(ghost.code(), Some("building_not_found"));

    let empty = act(&engine, id, "demolish", json!({}));
    assert_eq!(empty.code(), Some("invalid_payload"));
}

#[test]
fn demolishing_an_upgrade_in_progress_refunds_the_running_level() {
    let (engine, clock, id) = founded(10);
    let farm = build_farm(&engine, id, 6, 0);
    clock.advance(600);
    assert!(act(&engine, id, "upgrade", json!({ "building_id": farm })).is_ok());
    let gold = stock(&engine, id, Resource::Gold);

    let r = act(&engine, id, "demolish", json!({ "building_id": farm }));
    assert!(r.is_ok());
    // (50 + 100) * 0.8
    assert_eq!(stock(&engine, id, Resource::Gold), gold + 120);
}

// ── build_wall ─────────────────────────────────────────────────────

#[test]
fn wall_clears_its_ring_and_completes_over_time() {
    let (engine, clock, id) = founded(11);
    let doomed = build_farm(&engine, id, -10, 0);
    let safe = build_farm(&engine, id, 2, 6);
    assert_eq!(stock(&engine, id, Resource::Gold), 800);

    let r = act(&engine, id, "build_wall", json!({ "generation": 1 }));
    assert!(r.is_ok(), "wall failed: {:?}", r.error_message);
    let demolished = r.result["demolished_buildings"].as_array().expect("list");
    assert_eq!(demolished.len(), 1);
    assert_eq!(demolished[0]["building_id"], doomed);
    // 800 - 200 wall + 40 refund.
    assert_eq!(stock(&engine, id, Resource::Gold), 640);
    assert_eq!(stock(&engine, id, Resource::Stone), 200);

    let fiefdom = engine.store.get_fiefdom(id).expect("read").expect("fiefdom");
    assert_eq!(fiefdom.wall_count, 1);
    assert!(engine.store.get_building(safe).expect("read").is_some());

    let walls = engine.store.walls_for_fiefdom(id).expect("walls");
    assert_eq!((walls[0].level, walls[0].hp), (0, 0));

    // The ring blocks placement straight away.
    let blocked = act(&engine, id, "build", json!({ "building_type": "farm", "x": -10, "y": 0 }));
    assert_eq!(blocked.code(), Some("wall_overlap"));

    clock.advance(1800);
    let snap = engine.fiefdom_snapshot(id).expect("snapshot");
    assert_eq!((snap.walls[0].level, snap.walls[0].hp), (1, 100));
    // manor 5 + wall 5
    assert_eq!(snap.morale.score, 10.0);
}

#[test]
fn wall_generations_go_in_sequence_once_each() {
    let (engine, _clock, id) = founded(12);
    let skip = act(&engine, id, "build_wall", json!({ "generation": 2 }));
    assert_eq!(skip.code(), Some("generation_sequence_required"));

    let bogus = act(&engine, id, "build_wall", json!({ "generation": 9 }));
    assert_eq!(bogus.code(), Some("generation_invalid"));

    assert!(act(&engine, id, "build_wall", json!({ "generation": 1 })).is_ok());
    let twice = act(&engine, id, "build_wall", json!({ "generation": 1 }));
    assert_eq!(twice.code(), Some("generation_exists"));
}

#[test]
fn walls_upgrade_through_the_same_action() {
    let (engine, clock, id) = founded(13);
    let r = act(&engine, id, "build_wall", json!({ "generation": 1 }));
    let wall = r.result["wall_id"].as_i64().expect("wall id");

    let busy = act(&engine, id, "upgrade", json!({ "wall_id": wall }));
    assert_eq!(busy.code(), Some("upgrade_in_progress"));

    clock.advance(1800);
    engine.store.set_resource(id, Resource::Gold, 1000).expect("top up");
    assert!(act(&engine, id, "upgrade", json!({ "wall_id": wall })).is_ok());
    clock.advance(3600);
    let w = engine.store.get_wall(wall).expect("read").expect("wall");
    assert_eq!(w.level, 1, "upgrade completed without a catch-up");
    let snap = engine.fiefdom_snapshot(id).expect("snapshot");
    assert_eq!((snap.walls[0].level, snap.walls[0].hp), (2, 200));
}

// ── train_troops ───────────────────────────────────────────────────

#[test]
fn trained_troops_station_when_their_time_is_up() {
    let (engine, clock, id) = founded(14);
    let r = act(&engine, id, "train_troops", json!({ "combatant_type": "militia", "quantity": 3 }));
    assert!(r.is_ok(), "train failed: {:?}", r.error_message);
    assert_eq!(r.result["job_ids"].as_array().map(Vec::len), Some(3));
    assert_eq!(stock(&engine, id, Resource::Gold), 840);
    assert_eq!(stock(&engine, id, Resource::Grain), 170);

    clock.advance(299);
    let waiting = engine.fiefdom_snapshot(id).expect("snapshot");
    assert_eq!(waiting.training.len(), 3);
    assert!(waiting.combatants.is_empty());

    clock.advance(1);
    let done = engine.fiefdom_snapshot(id).expect("snapshot");
    assert!(done.training.is_empty());
    assert_eq!(done.combatants.len(), 3);
    // manor 5 + three militia at +1
    assert_eq!(done.fiefdom.morale, 8.0);
}

#[test]
fn training_orders_are_checked() {
    let (engine, _clock, id) = founded(15);
    let unknown = act(&engine, id, "train_troops", json!({ "combatant_type": "dragon" }));
    assert_eq!(unknown.code(), Some("unknown_combatant_type"));

    let none = act(&engine, id, "train_troops", json!({ "combatant_type": "militia", "quantity": 0 }));
    assert_eq!(none.code(), Some("invalid_payload"));

    let too_high = act(&engine, id, "train_troops", json!({ "combatant_type": "militia", "level": 4 }));
    assert_eq!(too_high.code(), Some("invalid_payload"));

    let broke = act(&engine, id, "train_troops", json!({ "combatant_type": "knight", "quantity": 3 }));
    assert_eq!(broke.code(), Some("insufficient_resources"));
}

// ── appoint_official ───────────────────────────────────────────────

#[test]
fn officials_fill_vacant_roles_from_eligible_templates() {
    let (engine, _clock, id) = founded(16);
    let r = act(&engine, id, "appoint_official", json!({ "role": "steward" }));
    assert!(r.is_ok(), "appoint failed: {:?}", r.error_message);
    assert_eq!(r.result["template_id"], "seasoned_steward");
    assert_eq!(r.result["level"], 1);
    assert_eq!(r.result["intelligence"], 40);

    let officials = engine.store.officials_for_fiefdom(id).expect("officials");
    assert_eq!(officials.len(), 1);
    assert_eq!(officials[0].role, OfficialRole::Steward);
    assert!(!officials[0].name.is_empty());

    let occupied = act(&engine, id, "appoint_official", json!({ "role": "Steward" }));
    assert_eq!(occupied.code(), Some("role_occupied"));

    let nobody = act(&engine, id, "appoint_official", json!({ "role": "architect" }));
    assert_eq!(nobody.code(), Some("no_eligible_official"));

    let jester = act(&engine, id, "appoint_official", json!({ "role": "jester" }));
    assert_eq!(jester.code(), Some("unknown_role"));

    let pinned = act(&engine, id, "appoint_official", json!({ "role": "wizard", "template_id": "seasoned_steward" }));
    assert_eq!(pinned.code(), Some("no_eligible_official"));
}

#[test]
fn same_seed_appoints_the_same_official() {
    let (a, _ca, fa) = founded(99);
    let (b, _cb, fb) = founded(99);
    let ra = act(&a, fa, "appoint_official", json!({ "role": "wizard" }));
    let rb = act(&b, fb, "appoint_official", json!({ "role": "wizard" }));
    assert!(ra.is_ok() && rb.is_ok());
    assert_eq!(ra.result["name"], rb.result["name"], "same seed drew different names");
    assert_eq!(ra.result["template_id"], "court_wizard");
}

// ── sync ───────────────────────────────────────────────────────────

#[test]
fn sync_reports_what_the_pass_applied() {
    let (engine, clock, id) = founded(17);
    clock.advance(3600);

    let r = act(&engine, id, "sync", Value::Null);
    assert!(r.is_ok(), "sync failed: {:?}", r.error_message);
    assert_eq!(r.result["new_timestamp"], engine.now());
    assert_eq!(r.result["fiefdoms_updated"], 1);
    assert_eq!(r.result["productions"][0]["resource"], "gold");
    assert_eq!(r.result["productions"][0]["amount"], 10);
    assert_eq!(stock(&engine, id, Resource::Gold), 910);

    let again = act(&engine, id, "sync", json!({}));
    assert_eq!(again.result["production_updates_applied"], 0);
    assert!(again.diffs.is_empty(), "idle sync reported diffs: {:?}", again.diffs);
}

#[test]
fn sync_diffs_describe_everything_the_pass_changed() {
    let (engine, clock) = GameEngine::build_test(18).expect("engine");
    let id = engine.establish_fiefdom(OWNER, "Ashford", 0, 0).expect("fiefdom");
    let placed = act(&engine, id, "build", json!({ "building_type": "home_base", "x": 0, "y": 0 }));
    let manor_id = placed.result["building_id"].as_i64().expect("building_id");
    let started = engine.now();
    let morale_before = engine.store.get_fiefdom(id).expect("read").expect("fiefdom").morale;
    clock.advance(3660);

    let r = act(&engine, id, "sync", Value::Null);
    assert!(r.is_ok(), "sync failed: {:?}", r.error_message);
    let diff = |key: &str, field: &str| {
        r.diffs
            .iter()
            .find(|d| d.entity_key == key && d.field == field)
            .unwrap_or_else(|| panic!("no {field} diff on {key}: {:?}", r.diffs))
            .clone()
    };

    let manor = format!("building:{manor_id}");
    assert_eq!((diff(&manor, "level").old, diff(&manor, "level").new), (DiffValue::Int(0), DiffValue::Int(1)));
    assert_eq!(diff(&manor, "construction_start").old, DiffValue::Int(started));
    assert_eq!(diff(&manor, "construction_start").new, DiffValue::Int(0));

    let fiefdom = format!("fiefdom:{id}");
    assert_eq!((diff(&fiefdom, "gold").old, diff(&fiefdom, "gold").new), (DiffValue::Int(900), DiffValue::Int(910)));
    assert_eq!(diff(&fiefdom, "morale").old, DiffValue::Float(morale_before));
    assert_eq!(diff(&fiefdom, "morale").new, DiffValue::Float(5.0));
    assert!(r.diffs.iter().all(|d| d.field != "wood"), "untouched resource reported");

    let log = engine.store.action_log_for_fiefdom(id).expect("log");
    let logged: Value = serde_json::from_str(&log.last().expect("sync logged").diffs).expect("diff json");
    assert_eq!(logged.as_array().map(Vec::len), Some(r.diffs.len()));
}

#[test]
fn sync_reports_finished_training_as_created_and_removed_rows() {
    let (engine, clock, id) = founded(19);
    let ordered = act(&engine, id, "train_troops", json!({ "combatant_type": "militia" }));
    assert!(ordered.is_ok(), "train failed: {:?}", ordered.error_message);
    clock.advance(300);

    let r = act(&engine, id, "sync", Value::Null);
    let created: Vec<_> = r.diffs
        .iter()
        .filter(|d| d.source_type == EntityKind::Combatant && d.field == "combatant_type")
        .collect();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].old, DiffValue::Null);
    assert_eq!(created[0].new, DiffValue::Text("militia".into()));

    let removed = r.diffs
        .iter()
        .find(|d| d.source_type == EntityKind::TrainingJob && d.field == "combatant_type")
        .expect("training job removal");
    assert_eq!(removed.new, DiffValue::Null);
}
