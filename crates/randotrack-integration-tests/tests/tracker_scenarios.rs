//! Integration test: tracker sessions driven by world documents.
//!
//! Each scenario loads a version-3 document through `randotrack-data`,
//! builds an engine for slot 1 and plays a short session against the
//! public mutation and query API.

mod common;

use common::{count, engine, event, exit, init_tracing, item, location, reach, slot};
use randotrack_core::dirty::CacheState;
use randotrack_core::engine::{Engine, PathEntry};
use randotrack_core::event::channel_sink;
use randotrack_core::query::WorldSnapshot;
use serde_json::json;
use std::sync::mpsc;
use std::thread;

fn entrances(path: &[PathEntry]) -> Vec<Option<&str>> {
    path.iter().map(|p| p.entrance.as_deref()).collect()
}

// ---------------------------------------------------------------------------
// Basic edges
// ---------------------------------------------------------------------------

#[test]
fn unconditional_edge_is_reachable_on_load() {
    let mut engine = engine(slot(json!({
        "Menu": {"exits": [exit("Menu -> Field", "Field", None)]},
        "Field": {}
    })));

    assert!(engine.inventory().is_empty());
    assert!(engine.is_region_reachable("Menu"));
    assert!(engine.is_region_reachable("Field"));
    assert!(engine.unreachable_regions().is_empty());
}

#[test]
fn gated_edge_opens_when_the_key_arrives() {
    let mut engine = engine(slot(json!({
        "Menu": {"exits": [exit("Menu -> Vault", "Vault", Some(item("Key")))]},
        "Vault": {"locations": [location("Chest", None, Some(("Bombs", 1)))]}
    })));

    assert!(!engine.is_region_reachable("Vault"));
    assert!(!engine.is_location_accessible("Chest"));

    assert!(engine.add_item_to_inventory("Key"));

    // No explicit recompute call: the mutation already refreshed the cache.
    assert_eq!(engine.cache_state(), CacheState::Clean);
    assert!(engine.is_region_reachable("Vault"));
    assert!(engine.is_location_accessible("Chest"));
}

#[test]
fn location_rule_is_checked_on_top_of_region_reachability() {
    let mut engine = engine(slot(json!({
        "Menu": {
            "locations": [location("Dark Corner", Some(item("Lamp")), Some(("Bombs", 1)))],
            "exits": [exit("Menu -> Attic", "Attic", Some(item("Hookshot")))]
        },
        "Attic": {"locations": [location("Attic Shelf", None, None)]}
    })));

    assert!(!engine.is_location_accessible("Dark Corner"));
    engine.add_item_to_inventory("Lamp");
    assert!(engine.is_location_accessible("Dark Corner"));
    assert!(!engine.is_location_accessible("Attic Shelf"));
    assert_eq!(engine.accessible_locations(), vec!["Dark Corner".to_string()]);
}

// ---------------------------------------------------------------------------
// Progressive items and saturation
// ---------------------------------------------------------------------------

#[test]
fn progressive_sword_resolves_tiers() {
    let mut engine = engine(slot(json!({
        "Menu": {"exits": [
            exit("Menu -> Curtains", "Curtains", Some(item("Fighter Sword"))),
            exit("Menu -> Pedestal", "Pedestal", Some(item("Master Sword"))),
            exit("Menu -> Beam Door", "Beam Door", Some(item("Sword Beam")))
        ]},
        "Curtains": {},
        "Pedestal": {},
        "Beam Door": {}
    })));

    engine.add_item_to_inventory("Sword");
    assert!(engine.inventory().has("Fighter Sword"));
    assert!(!engine.inventory().has("Master Sword"));
    assert!(engine.is_region_reachable("Curtains"));
    assert!(!engine.is_region_reachable("Pedestal"));

    engine.add_item_to_inventory("Sword");
    assert!(engine.inventory().has("Fighter Sword"));
    assert!(engine.inventory().has("Master Sword"));
    assert_eq!(engine.inventory().count("Sword"), 2);
    assert!(engine.is_region_reachable("Pedestal"));
    assert!(engine.is_region_reachable("Beam Door"));
}

#[test]
fn adding_at_max_count_is_a_no_op() {
    let mut engine = engine(slot(json!({"Menu": {}})));

    assert!(engine.add_item_to_inventory("Key"));
    let recomputes = engine.recompute_count();
    assert!(!engine.add_item_to_inventory("Key"));
    assert_eq!(engine.inventory().count("Key"), 1);
    assert_eq!(engine.recompute_count(), recomputes);

    // The progressive sword is capped at its tier count, not its max_count.
    for _ in 0..4 {
        engine.add_item_to_inventory("Sword");
    }
    assert_eq!(engine.inventory().count("Sword"), 2);
}

#[test]
fn count_check_reads_raw_counts() {
    let mut engine = engine(slot(json!({
        "Menu": {"exits": [exit("Menu -> Cracked Wall", "Cracked Wall", Some(count("Bombs", 3)))]},
        "Cracked Wall": {}
    })));

    engine.add_item_to_inventory("Bombs");
    engine.add_item_to_inventory("Bombs");
    assert!(!engine.is_region_reachable("Cracked Wall"));
    engine.add_item_to_inventory("Bombs");
    assert!(engine.is_region_reachable("Cracked Wall"));
}

#[test]
fn unknown_item_leaves_the_inventory_alone() {
    let mut engine = engine(slot(json!({"Menu": {}})));
    assert!(!engine.add_item_to_inventory("Moon Pearl"));
    assert!(!engine.remove_item_from_inventory("Moon Pearl"));
    assert!(engine.inventory().is_empty());
}

// ---------------------------------------------------------------------------
// Indirect connections
// ---------------------------------------------------------------------------

/// C -> D needs E, and E is only reached through a side path gated by the
/// Lamp. C -> D fails before E is reached and must be retried afterwards.
fn indirect_slot() -> serde_json::Value {
    slot(json!({
        "Menu": {"exits": [
            exit("Menu -> C", "C", None),
            exit("Menu -> X", "X", None)
        ]},
        "C": {"exits": [exit("C -> D", "D", Some(reach("E")))]},
        "X": {"exits": [exit("X -> E", "E", Some(item("Lamp")))]},
        "D": {},
        "E": {}
    }))
}

#[test]
fn indirect_dependency_is_reevaluated_in_the_same_computation() {
    let mut engine = engine(indirect_slot());
    assert!(!engine.is_region_reachable("E"));
    assert!(!engine.is_region_reachable("D"));

    let before = engine.recompute_count();
    engine.add_item_to_inventory("Lamp");
    assert_eq!(engine.recompute_count(), before + 1);

    assert!(engine.is_region_reachable("E"));
    assert!(engine.is_region_reachable("D"));
    assert_eq!(engine.recompute_count(), before + 1);

    let path = engine.get_path_to_region("D").unwrap();
    assert_eq!(entrances(&path), vec![None, Some("Menu -> C"), Some("C -> D")]);
}

#[test]
fn exit_accessibility_follows_the_indirect_rule() {
    let mut engine = engine(indirect_slot());
    assert!(!engine.is_exit_accessible("C", "C -> D"));
    engine.add_item_to_inventory("Lamp");
    assert!(engine.is_exit_accessible("C", "C -> D"));
    assert!(!engine.is_exit_accessible("C", "No Such Exit"));
}

#[test]
fn can_reach_location_references_register_the_owning_region() {
    let mut engine = engine(slot(json!({
        "Menu": {"exits": [
            exit("Menu -> Gate", "Gate", None),
            exit("Menu -> Shrine", "Shrine", Some(item("Hookshot")))
        ]},
        "Gate": {"exits": [exit("Gate -> Keep", "Keep", Some(json!({
            "type": "state_method", "method": "can_reach_location", "args": ["Altar"]
        })))]},
        "Shrine": {"locations": [location("Altar", Some(item("Lamp")), None)]},
        "Keep": {}
    })));

    engine.add_item_to_inventory("Lamp");
    assert!(!engine.is_region_reachable("Keep"));
    engine.add_item_to_inventory("Hookshot");
    assert!(engine.is_region_reachable("Keep"));
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[test]
fn event_location_without_rule_is_collected_automatically() {
    let mut engine = engine(slot(json!({
        "Menu": {"exits": [exit("Menu -> Tower", "Tower", None)]},
        "Tower": {"locations": [location("Agahnim", None, Some(("Beat Agahnim 1", 1)))]}
    })));

    assert!(engine.inventory().has("Beat Agahnim 1"));
    assert!(engine.is_location_checked("Agahnim"));
    assert!(engine.flags().has_event("Beat Agahnim 1"));
}

/// Menu -> Dungeon -> (needs Agahnim) Tower -> (needs Crystal 1) Pyramid.
/// The Agahnim fight itself needs the Master Sword.
fn event_chain_slot() -> serde_json::Value {
    slot(json!({
        "Menu": {"exits": [exit("Menu -> Dungeon", "Dungeon", None)]},
        "Dungeon": {
            "locations": [location("Agahnim", Some(item("Master Sword")), Some(("Beat Agahnim 1", 1)))],
            "exits": [exit("Dungeon -> Tower", "Tower", Some(event("Beat Agahnim 1")))]
        },
        "Tower": {
            "locations": [location("Tower Boss", None, Some(("Crystal 1", 1)))],
            "exits": [exit("Tower -> Pyramid", "Pyramid", Some(event("Crystal 1")))]
        },
        "Pyramid": {}
    }))
}

#[test]
fn events_chain_through_the_outer_loop() {
    let mut engine = engine(event_chain_slot());
    assert!(!engine.is_region_reachable("Tower"));
    assert!(engine.checked_locations().is_empty());

    engine.add_item_to_inventory("Sword");
    engine.add_item_to_inventory("Sword");

    assert!(engine.is_region_reachable("Tower"));
    assert!(engine.is_region_reachable("Pyramid"));
    assert!(engine.is_location_checked("Agahnim"));
    assert!(engine.is_location_checked("Tower Boss"));

    let snapshot = engine.get_snapshot();
    assert!(snapshot.events.contains("beat_agahnim_1"));
    assert!(snapshot.events.contains("crystal_1"));
}

#[test]
fn removal_recomputes_but_keeps_granted_events() {
    let mut engine = engine(event_chain_slot());
    engine.add_item_to_inventory("Sword");
    engine.add_item_to_inventory("Sword");
    assert!(engine.is_region_reachable("Pyramid"));

    engine.remove_item_from_inventory("Sword");
    assert!(!engine.inventory().has("Master Sword"));
    assert!(!engine.is_location_accessible("Agahnim"));
    // Granted events are not retracted, so the event-gated exits stay open.
    assert!(engine.inventory().has("Beat Agahnim 1"));
    assert!(engine.is_region_reachable("Pyramid"));
}

#[test]
fn other_players_event_items_are_not_collected() {
    let mut engine = engine(slot(json!({
        "Menu": {"locations": [
            location("Foreign Boss", None, Some(("Crystal 2", 2))),
            location("Own Boss", None, Some(("Crystal 1", 1)))
        ]}
    })));

    assert!(engine.inventory().has("Crystal 1"));
    assert!(!engine.inventory().has("Crystal 2"));
    assert!(!engine.is_location_checked("Foreign Boss"));
    let snapshot = engine.get_snapshot();
    assert!(!snapshot.locations["Foreign Boss"].is_event);
    assert!(snapshot.locations["Own Boss"].is_event);
}

// ---------------------------------------------------------------------------
// Settings, flags and helpers
// ---------------------------------------------------------------------------

#[test]
fn settings_and_helpers_gate_exits() {
    let mut body = slot(json!({
        "Menu": {"exits": [
            exit("Menu -> Pyramid", "Pyramid", Some(json!({
                "type": "state_method", "method": "setting_enabled", "args": ["open_pyramid"]
            }))),
            exit("Menu -> Ganon", "Ganon", Some(json!({
                "type": "helper", "name": "setting_is", "args": ["goal", "ganon"]
            }))),
            exit("Menu -> Swordless Room", "Swordless Room", Some(json!({
                "type": "helper", "name": "setting_is", "args": ["swordless"]
            }))),
            exit("Menu -> Fairy Fountain", "Fairy Fountain", Some(json!({
                "type": "helper", "name": "has_group", "args": ["Bottles", 2]
            })))
        ]},
        "Pyramid": {},
        "Ganon": {},
        "Swordless Room": {},
        "Fairy Fountain": {}
    }));
    body["settings"] = json!({"open_pyramid": true, "goal": "ganon", "swordless": false});
    let mut engine = engine(body);

    assert!(engine.is_region_reachable("Pyramid"));
    assert!(engine.is_region_reachable("Ganon"));
    assert!(!engine.is_region_reachable("Swordless Room"));
    assert!(engine.flags().has_flag("setting:open_pyramid"));
    assert!(!engine.flags().has_flag("setting:swordless"));

    engine.add_item_to_inventory("Bottle");
    assert!(!engine.is_region_reachable("Fairy Fountain"));
    engine.add_item_to_inventory("Bottle (Fairy)");
    assert!(engine.is_region_reachable("Fairy Fountain"));
}

#[test]
fn flags_gate_exits_and_clear_state_resets_them() {
    let mut engine = engine(slot(json!({
        "Menu": {"exits": [exit("Menu -> Garden", "Garden", Some(json!({
            "type": "helper", "name": "has_flag", "args": ["garden_gate"]
        })))]},
        "Garden": {"locations": [location("Garden Chest", None, None)]}
    })));

    assert!(!engine.is_region_reachable("Garden"));
    engine.set_flag("garden_gate");
    assert!(engine.is_region_reachable("Garden"));

    engine.check_location("Garden Chest");
    engine.add_item_to_inventory("Lamp");
    engine.clear_state();

    assert!(!engine.is_region_reachable("Garden"));
    assert!(engine.checked_locations().is_empty());
    assert!(engine.inventory().is_empty());
}

#[test]
fn malformed_rule_fails_closed_without_stopping_the_session() {
    init_tracing();
    let mut engine = engine(slot(json!({
        "Menu": {"exits": [
            exit("Menu -> Broken", "Broken", Some(json!({"type": "teleport"}))),
            exit("Menu -> Fine", "Fine", None)
        ]},
        "Broken": {},
        "Fine": {}
    })));

    assert!(!engine.is_region_reachable("Broken"));
    assert!(engine.is_region_reachable("Fine"));
    engine.add_item_to_inventory("Lamp");
    assert!(!engine.is_region_reachable("Broken"));
}

// ---------------------------------------------------------------------------
// Caching
// ---------------------------------------------------------------------------

#[test]
fn repeated_queries_do_not_recompute() {
    let mut engine = engine(indirect_slot());
    engine.add_item_to_inventory("Lamp");
    let recomputes = engine.recompute_count();

    let first: Vec<bool> = ["C", "D", "E", "X"]
        .iter()
        .map(|r| engine.is_region_reachable(r))
        .collect();
    let second: Vec<bool> = ["C", "D", "E", "X"]
        .iter()
        .map(|r| engine.is_region_reachable(r))
        .collect();

    assert_eq!(first, second);
    assert_eq!(engine.recompute_count(), recomputes);
}

#[test]
fn checking_locations_does_not_recompute() {
    let mut engine = engine(slot(json!({
        "Menu": {"locations": [location("Pot", None, None)]}
    })));
    let recomputes = engine.recompute_count();
    assert!(engine.check_location("Pot"));
    assert!(!engine.check_location("Pot"));
    assert!(!engine.check_location("Nowhere"));
    assert!(engine.uncheck_location("Pot"));
    assert_eq!(engine.recompute_count(), recomputes);
}

// ---------------------------------------------------------------------------
// Hosting in a worker thread
// ---------------------------------------------------------------------------

enum Command {
    Add(&'static str),
    Check(&'static str),
}

/// The engine runs in its own thread; commands arrive over one channel and
/// snapshots leave over another, as a tracker front end would host it.
#[test]
fn engine_hosted_in_a_worker_thread() {
    let mut engine: Engine = engine(event_chain_slot());
    let (snapshot_tx, snapshot_rx) = mpsc::channel::<WorldSnapshot>();
    let (command_tx, command_rx) = mpsc::channel::<Command>();
    engine.set_sink(channel_sink(snapshot_tx));

    let worker = thread::spawn(move || {
        for command in command_rx {
            match command {
                Command::Add(name) => engine.add_item_to_inventory(name),
                Command::Check(name) => engine.check_location(name),
            };
        }
        engine.snapshots_emitted()
    });

    command_tx.send(Command::Add("Sword")).unwrap();
    command_tx.send(Command::Add("Sword")).unwrap();
    command_tx.send(Command::Check("Tower Boss")).unwrap();
    drop(command_tx);
    let emitted = worker.join().unwrap();

    let snapshots: Vec<WorldSnapshot> = snapshot_rx.iter().collect();
    // Two recomputes; the check lands on a location the fixpoint already
    // checked, so it emits nothing.
    assert_eq!(emitted, 2);
    assert_eq!(snapshots.len(), 2);
    let last = snapshots.last().unwrap();
    assert_eq!(last.is_region_accessible("Pyramid"), Some(true));
    assert!(last.checked_locations.contains(&"Tower Boss".to_string()));
    assert_eq!(last.player_name.as_deref(), Some("Link"));
    assert_eq!(last.mode, "open");
}
