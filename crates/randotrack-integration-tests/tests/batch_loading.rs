//! Integration test: batched inventory updates.
//!
//! Loading a save or a starting kit grants many items at once. Inside a
//! batch the grants are staged and applied together, costing a single
//! fixpoint and a single snapshot instead of one per item.

mod common;

use common::{engine, engine_with, event, exit, item, location, slot};
use randotrack_core::batch::BatchOutcome;
use randotrack_core::config::EngineConfig;
use randotrack_core::dirty::CacheState;
use randotrack_core::engine::Engine;
use randotrack_core::query::WorldSnapshot;
use randotrack_core::test_utils::recording_sink;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

fn vault_slot() -> Value {
    slot(json!({
        "Menu": {"exits": [
            exit("Menu -> Vault", "Vault", Some(item("Key"))),
            exit("Menu -> Tower", "Tower", Some(item("Master Sword")))
        ]},
        "Vault": {"locations": [location("Vault Chest", None, Some(("Bombs", 1)))]},
        "Tower": {
            "locations": [location("Agahnim", None, Some(("Beat Agahnim 1", 1)))],
            "exits": [exit("Tower -> Roof", "Roof", Some(event("Beat Agahnim 1")))]
        },
        "Roof": {}
    }))
}

fn recorded(engine: &mut Engine) -> Arc<Mutex<Vec<WorldSnapshot>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.set_sink(recording_sink(Arc::clone(&log)));
    log
}

#[test]
fn starting_items_load_with_one_recompute() {
    let mut body = vault_slot();
    body["starting_items"] = json!(["Key", "Lamp", "Sword", "Sword", "Bombs", "Bombs"]);
    let mut engine = engine(body);

    assert_eq!(engine.recompute_count(), 1);
    assert_eq!(engine.inventory().count("Sword"), 2);
    assert_eq!(engine.inventory().count("Bombs"), 2);
    assert!(engine.is_region_reachable("Vault"));
    assert!(engine.is_region_reachable("Roof"));
    assert_eq!(engine.recompute_count(), 1);
}

#[test]
fn many_staged_grants_emit_one_snapshot() {
    let mut engine = engine(vault_slot());
    let log = recorded(&mut engine);
    let recomputes = engine.recompute_count();

    engine.begin_batch_update(true);
    assert!(engine.is_batching());
    for _ in 0..10 {
        engine.add_item_to_inventory("Bombs");
    }
    for name in ["Key", "Lamp", "Hookshot", "Sword", "Sword", "Bottle", "Bottle"] {
        engine.add_item_to_inventory(name);
    }
    assert!(log.lock().unwrap().is_empty());
    assert!(engine.inventory().is_empty());

    let outcome = engine.commit_batch_update();
    assert!(outcome.changed);
    assert_eq!(
        outcome.applied,
        vec!["Bombs", "Bottle", "Hookshot", "Key", "Lamp", "Sword"]
    );
    assert_eq!(engine.recompute_count(), recomputes + 1);

    let snapshots = log.lock().unwrap();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert_eq!(snapshot.inventory["Bombs"], 10);
    assert_eq!(snapshot.group_counts["Bottles"], 2);
    assert_eq!(snapshot.is_region_accessible("Roof"), Some(true));
}

#[test]
fn staged_grants_are_invisible_until_commit() {
    let mut engine = engine(vault_slot());
    engine.begin_batch_update(true);
    engine.add_item_to_inventory("Key");

    assert!(!engine.inventory().has("Key"));
    assert!(!engine.is_region_reachable("Vault"));

    engine.commit_batch_update();
    assert!(!engine.is_batching());
    assert!(engine.is_region_reachable("Vault"));
}

#[test]
fn staging_saturates_at_the_cap() {
    let mut engine = engine(vault_slot());
    engine.begin_batch_update(true);
    assert!(engine.add_item_to_inventory("Key"));
    assert!(!engine.add_item_to_inventory("Key"));
    assert!(engine.add_item_to_inventory("Sword"));
    assert!(engine.add_item_to_inventory("Sword"));
    assert!(!engine.add_item_to_inventory("Sword"));
    assert!(!engine.add_item_to_inventory("Not An Item"));
    engine.commit_batch_update();

    assert_eq!(engine.inventory().count("Key"), 1);
    assert_eq!(engine.inventory().count("Sword"), 2);
}

#[test]
fn commit_without_defer_leaves_the_recompute_to_the_next_query() {
    let mut engine = engine(vault_slot());
    let log = recorded(&mut engine);
    let recomputes = engine.recompute_count();

    engine.begin_batch_update(false);
    engine.add_item_to_inventory("Key");
    engine.commit_batch_update();

    assert_eq!(engine.cache_state(), CacheState::Dirty);
    assert_eq!(engine.recompute_count(), recomputes);
    assert!(log.lock().unwrap().is_empty());

    assert!(engine.is_region_reachable("Vault"));
    assert_eq!(engine.recompute_count(), recomputes + 1);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn empty_commit_changes_nothing() {
    let mut engine = engine(vault_slot());
    let log = recorded(&mut engine);
    let recomputes = engine.recompute_count();

    engine.begin_batch_update(true);
    let outcome = engine.commit_batch_update();
    assert!(!outcome.changed);
    assert_eq!(engine.recompute_count(), recomputes);
    assert!(log.lock().unwrap().is_empty());

    // Without an open batch a commit is a no-op as well.
    assert_eq!(engine.commit_batch_update(), BatchOutcome::default());
}

#[test]
fn cancel_discards_staged_grants() {
    let mut engine = engine(vault_slot());
    let recomputes = engine.recompute_count();

    engine.begin_batch_update(true);
    engine.add_item_to_inventory("Key");
    assert!(engine.cancel_batch_update());
    assert!(!engine.cancel_batch_update());

    assert!(!engine.inventory().has("Key"));
    assert!(!engine.is_region_reachable("Vault"));
    assert_eq!(engine.recompute_count(), recomputes);
}

#[test]
fn removal_inside_a_batch_applies_at_once_and_recomputes_on_commit() {
    let mut body = vault_slot();
    body["starting_items"] = json!(["Key"]);
    let mut engine = engine(body);
    let recomputes = engine.recompute_count();

    engine.begin_batch_update(true);
    assert!(engine.remove_item_from_inventory("Key"));
    assert!(!engine.inventory().has("Key"));
    assert_eq!(engine.recompute_count(), recomputes);
    assert_eq!(engine.cache_state(), CacheState::Dirty);

    engine.commit_batch_update();
    assert_eq!(engine.recompute_count(), recomputes + 1);
    assert!(!engine.is_region_reachable("Vault"));
}

#[test]
fn nested_begin_keeps_the_open_batch() {
    let mut engine = engine(vault_slot());
    engine.begin_batch_update(true);
    engine.add_item_to_inventory("Key");
    engine.begin_batch_update(false);
    engine.add_item_to_inventory("Lamp");

    let outcome = engine.commit_batch_update();
    assert_eq!(outcome.applied, vec!["Key", "Lamp"]);
    // The first batch asked for a recompute on commit; that still holds.
    assert_eq!(engine.cache_state(), CacheState::Clean);
    assert!(engine.is_region_reachable("Vault"));
}

#[test]
fn event_grants_inside_the_fixpoint_are_not_rescheduled() {
    let mut engine = engine(vault_slot());
    let ignored = engine.ignored_invalidations();
    let recomputes = engine.recompute_count();

    engine.begin_batch_update(true);
    engine.add_item_to_inventory("Sword");
    engine.add_item_to_inventory("Sword");
    engine.commit_batch_update();

    assert!(engine.inventory().has("Beat Agahnim 1"));
    assert!(engine.is_location_checked("Agahnim"));
    assert_eq!(engine.recompute_count(), recomputes + 1);
    assert!(engine.ignored_invalidations() > ignored);
    assert_eq!(engine.cache_state(), CacheState::Clean);
}

#[test]
fn check_emission_can_be_disabled() {
    let config = EngineConfig {
        emit_on_check: false,
        ..EngineConfig::default()
    };
    let mut engine = engine_with(vault_slot(), config);
    let log = recorded(&mut engine);

    engine.add_item_to_inventory("Key");
    assert_eq!(log.lock().unwrap().len(), 1);
    engine.check_location("Vault Chest");
    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(engine.get_snapshot().locations["Vault Chest"].is_checked);
}

#[test]
fn check_emission_carries_checked_state() {
    let mut engine = engine(vault_slot());
    let log = recorded(&mut engine);

    engine.check_location("Vault Chest");
    engine.uncheck_location("Vault Chest");

    let snapshots = log.lock().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots[0].locations["Vault Chest"].is_checked);
    assert!(!snapshots[1].locations["Vault Chest"].is_checked);
    assert!(snapshots[0].available_locations().next().is_none());
}
