//! Document builders shared by the integration tests.

#![allow(dead_code)]

use randotrack_core::config::EngineConfig;
use randotrack_core::engine::Engine;
use randotrack_core::helper::HelperRegistry;
use randotrack_data::{WorldDocument, load_engine, load_world_json};
use serde_json::{Value, json};

/// Route engine and loader events to the test output. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            "randotrack_core=debug,randotrack_data=debug",
        ))
        .with_test_writer()
        .try_init();
}

/// Wrap one slot body into a version-3 document for slot 1.
pub fn document(slot: Value) -> Value {
    json!({"schema_version": 3, "slots": {"1": slot}})
}

pub fn parse(slot: Value) -> WorldDocument {
    load_world_json(&document(slot).to_string()).unwrap()
}

pub fn engine(slot: Value) -> Engine {
    engine_with(slot, EngineConfig::default())
}

pub fn engine_with(slot: Value, config: EngineConfig) -> Engine {
    let doc = parse(slot);
    load_engine(&doc, 1, &HelperRegistry::with_builtins(), config).unwrap()
}

pub fn item(name: &str) -> Value {
    json!({"type": "item_check", "item": name})
}

pub fn count(name: &str, n: u32) -> Value {
    json!({"type": "count_check", "item": name, "count": n})
}

pub fn reach(region: &str) -> Value {
    json!({"type": "state_method", "method": "can_reach", "args": [region]})
}

pub fn event(name: &str) -> Value {
    json!({"type": "state_method", "method": "has_event", "args": [name]})
}

pub fn exit(name: &str, target: &str, rule: Option<Value>) -> Value {
    match rule {
        Some(rule) => json!({"name": name, "connected_region": target, "access_rule": rule}),
        None => json!({"name": name, "connected_region": target}),
    }
}

pub fn location(name: &str, rule: Option<Value>, placed: Option<(&str, u32)>) -> Value {
    let mut entry = json!({"name": name});
    if let Some(rule) = rule {
        entry["access_rule"] = rule;
    }
    if let Some((item, player)) = placed {
        entry["item"] = json!({"name": item, "player": player});
    }
    entry
}

/// The item table most scenarios share: a two-tier progressive sword,
/// single keys and tools, two bottle kinds and the canonical event items.
pub fn standard_items() -> Value {
    json!({
        "Sword": {"max_count": 4},
        "Key": {},
        "Lamp": {},
        "Hookshot": {},
        "Bombs": {"max_count": 10},
        "Bottle": {"max_count": 4, "groups": ["Bottles"]},
        "Bottle (Fairy)": {"max_count": 4, "groups": ["Bottles"]},
        "Beat Agahnim 1": {"event": true},
        "Crystal 1": {"event": true},
        "Crystal 2": {"event": true}
    })
}

pub fn sword_tiers() -> Value {
    json!({
        "Sword": [
            {"level": 1, "name": "Fighter Sword"},
            {"level": 2, "name": "Master Sword", "provides": ["Sword Beam"]}
        ]
    })
}

/// Slot body with the standard item table and the given regions.
pub fn slot(regions: Value) -> Value {
    json!({
        "player_name": "Link",
        "game_mode": "open",
        "items": standard_items(),
        "progression_mapping": sword_tiers(),
        "regions": regions
    })
}
