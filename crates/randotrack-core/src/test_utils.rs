//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::engine::Engine;
use crate::event::SnapshotSink;
use crate::flags::process_event_item;
use crate::graph::{PlacedItem, World, WorldBuilder};
use crate::helper::HelperRegistry;
use crate::query::WorldSnapshot;
use crate::registry::{ItemDef, ItemRegistry, ItemRegistryBuilder, ProgressiveTier};
use crate::rule::{Rule, RuleError, compile};
use crate::tri::Tri;
use crate::view::StateView;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

// ===========================================================================
// Registries
// ===========================================================================

/// Sword (progressive: Fighter Sword, Master Sword), Key, Lamp, Arrows x3,
/// two bottle kinds in group "Bottles".
pub fn sword_registry() -> Arc<ItemRegistry> {
    Arc::new(sword_registry_builder().build().unwrap())
}

fn sword_registry_builder() -> ItemRegistryBuilder {
    let mut b = ItemRegistryBuilder::new();
    b.register_item(ItemDef::new("Sword", 4)).unwrap();
    b.register_item(ItemDef::new("Key", 1)).unwrap();
    b.register_item(ItemDef::new("Lamp", 1)).unwrap();
    b.register_item(ItemDef::new("Arrows", 3)).unwrap();
    b.register_item(ItemDef::new("Bottle", 4).with_groups(&["Bottles"]))
        .unwrap();
    b.register_item(ItemDef::new("Bottle (Fairy)", 4).with_groups(&["Bottles"]))
        .unwrap();
    b.register_progression(
        "Sword",
        vec![
            ProgressiveTier::new(1, "Fighter Sword"),
            ProgressiveTier::new(2, "Master Sword"),
        ],
    )
    .unwrap();
    b
}

/// [`sword_registry`] plus the event items used by the event fixtures.
pub fn event_registry() -> Arc<ItemRegistry> {
    let mut b = sword_registry_builder();
    b.register_item(ItemDef::event("Beat Boss")).unwrap();
    b.register_item(ItemDef::event("Crystal 3")).unwrap();
    Arc::new(b.build().unwrap())
}

// ===========================================================================
// Rules
// ===========================================================================

/// Compile a JSON rule with the built-in helpers.
pub fn rule(value: Value) -> Option<Rule> {
    Some(compile(&value, &HelperRegistry::with_builtins()).unwrap())
}

pub fn item_check(item: &str) -> Option<Rule> {
    rule(json!({"type": "item_check", "item": item}))
}

pub fn can_reach(region: &str) -> Option<Rule> {
    rule(json!({"type": "state_method", "method": "can_reach", "args": [region]}))
}

fn placed(name: &str) -> Option<PlacedItem> {
    Some(PlacedItem {
        name: name.to_string(),
        owner_slot: 1,
    })
}

// ===========================================================================
// Worlds
// ===========================================================================

/// A (start) -> B with no rule.
pub fn open_world() -> Arc<World> {
    let mut b = WorldBuilder::new(sword_registry());
    let a = b.add_region("A").unwrap();
    b.add_region("B").unwrap();
    b.add_exit(a, "A to B", "B", None).unwrap();
    b.add_start_region("A");
    Arc::new(b.build().unwrap())
}

/// A (start, "Start Chest") -> B ("Chest"), the exit requires Key.
pub fn gated_world() -> Arc<World> {
    Arc::new(gated_builder().build().unwrap())
}

fn gated_builder() -> WorldBuilder {
    let mut b = WorldBuilder::new(sword_registry());
    let a = b.add_region("A").unwrap();
    let region_b = b.add_region("B").unwrap();
    b.add_location(a, "Start Chest", None, placed("Lamp")).unwrap();
    b.add_location(region_b, "Chest", None, placed("Arrows")).unwrap();
    b.add_exit(a, "A to B", "B", item_check("Key")).unwrap();
    b.add_start_region("A");
    b
}

/// [`gated_world`] with Key and Lamp as starting items.
pub fn starting_items_world() -> Arc<World> {
    let mut b = gated_builder();
    b.add_starting_item("Key");
    b.add_starting_item("Lamp");
    Arc::new(b.build().unwrap())
}

/// Menu -> Dungeon ("Boss Room" holds event "Beat Boss") -> Treasure,
/// the last exit requiring the event item.
pub fn event_world() -> Arc<World> {
    let mut b = WorldBuilder::new(event_registry());
    let menu = b.add_region("Menu").unwrap();
    let dungeon = b.add_region("Dungeon").unwrap();
    b.add_region("Treasure").unwrap();
    b.add_location(dungeon, "Boss Room", None, placed("Beat Boss"))
        .unwrap();
    b.add_exit(menu, "Enter Dungeon", "Dungeon", None).unwrap();
    b.add_exit(dungeon, "Treasure Door", "Treasure", item_check("Beat Boss"))
        .unwrap();
    Arc::new(b.build().unwrap())
}

/// Menu ("Altar" holds "Crystal 3") -> Tower, gated on the crystal event.
pub fn crystal_world() -> Arc<World> {
    let mut b = WorldBuilder::new(event_registry());
    let menu = b.add_region("Menu").unwrap();
    b.add_region("Tower").unwrap();
    b.add_location(menu, "Altar", None, placed("Crystal 3")).unwrap();
    b.add_exit(
        menu,
        "Tower Gate",
        "Tower",
        rule(json!({"type": "state_method", "method": "has_event", "args": ["crystal_3"]})),
    )
    .unwrap();
    Arc::new(b.build().unwrap())
}

/// Menu -> C, Menu -> F -> E, and C -> D gated on `can_reach(E)`. The
/// C -> D exit is evaluated (and fails) before E is reached.
pub fn indirect_world() -> Arc<World> {
    let mut b = WorldBuilder::new(sword_registry());
    let menu = b.add_region("Menu").unwrap();
    let c = b.add_region("C").unwrap();
    b.add_region("D").unwrap();
    b.add_region("E").unwrap();
    let f = b.add_region("F").unwrap();
    b.add_exit(menu, "Menu to C", "C", None).unwrap();
    b.add_exit(menu, "Menu to F", "F", None).unwrap();
    b.add_exit(c, "C to D", "D", can_reach("E")).unwrap();
    b.add_exit(f, "F to E", "E", None).unwrap();
    Arc::new(b.build().unwrap())
}

/// Menu -> Garden needs flag `open_gate`; Menu -> Pyramid needs setting
/// `open_pyramid`.
pub fn flag_world() -> Arc<World> {
    let mut b = WorldBuilder::new(sword_registry());
    let menu = b.add_region("Menu").unwrap();
    b.add_region("Garden").unwrap();
    b.add_region("Pyramid").unwrap();
    b.add_exit(
        menu,
        "Gate",
        "Garden",
        rule(json!({"type": "helper", "name": "has_flag", "args": ["open_gate"]})),
    )
    .unwrap();
    b.add_exit(
        menu,
        "Pyramid Hole",
        "Pyramid",
        rule(json!({"type": "state_method", "method": "setting_enabled", "args": ["open_pyramid"]})),
    )
    .unwrap();
    Arc::new(b.build().unwrap())
}

/// A chain `R0 -> R1 -> ... -> R{n-1}`. Each exit `Ri -> Ri+1` passes if
/// Lamp is held or `R{i-1}` is reachable, so every hop reads reachability.
pub fn linear_world(n: usize) -> Arc<World> {
    let mut b = WorldBuilder::new(sword_registry());
    let ids: Vec<_> = (0..n)
        .map(|i| b.add_region(&format!("R{i}")).unwrap())
        .collect();
    for i in 0..n.saturating_sub(1) {
        let previous = format!("R{}", i.saturating_sub(1));
        let gate = rule(json!({"type": "or", "conditions": [
            {"type": "item_check", "item": "Lamp"},
            {"type": "state_method", "method": "can_reach", "args": [previous]}
        ]}));
        b.add_exit(ids[i], &format!("R{i} to R{}", i + 1), &format!("R{}", i + 1), gate)
            .unwrap();
    }
    b.add_start_region("R0");
    Arc::new(b.build().unwrap())
}

pub fn new_engine(world: Arc<World>) -> Engine {
    Engine::new(world)
}

// ===========================================================================
// Sinks
// ===========================================================================

pub fn counting_sink(counter: Arc<Mutex<u32>>) -> SnapshotSink {
    Box::new(move |_| {
        *counter.lock().unwrap() += 1;
    })
}

pub fn recording_sink(log: Arc<Mutex<Vec<WorldSnapshot>>>) -> SnapshotSink {
    Box::new(move |snapshot| log.lock().unwrap().push(snapshot))
}

// ===========================================================================
// FixedView
// ===========================================================================

/// A hand-filled [`StateView`]. `live()` answers absent names definitely;
/// `partial()` answers them `Unknown`, like a snapshot would.
#[derive(Debug, Clone, Default)]
pub struct FixedView {
    partial: bool,
    items: BTreeMap<String, u32>,
    groups: BTreeMap<String, u32>,
    flags: BTreeSet<String>,
    events: BTreeSet<String>,
    regions: BTreeMap<String, bool>,
    locations: BTreeMap<String, bool>,
    settings: BTreeMap<String, Value>,
}

impl FixedView {
    pub fn live() -> Self {
        Self::default()
    }

    pub fn partial() -> Self {
        Self {
            partial: true,
            ..Self::default()
        }
    }

    pub fn with_item(mut self, name: &str, count: u32) -> Self {
        self.items.insert(name.to_string(), count);
        self
    }

    /// Known to the view, held zero times.
    pub fn without_item(self, name: &str) -> Self {
        self.with_item(name, 0)
    }

    pub fn with_group(mut self, group: &str, count: u32) -> Self {
        self.groups.insert(group.to_string(), count);
        self
    }

    pub fn with_flag(mut self, name: &str) -> Self {
        self.flags.insert(name.to_string());
        self
    }

    pub fn with_event(mut self, name: &str) -> Self {
        self.events.insert(name.to_string());
        self
    }

    pub fn with_region(mut self, name: &str, reachable: bool) -> Self {
        self.regions.insert(name.to_string(), reachable);
        self
    }

    pub fn with_location(mut self, name: &str, accessible: bool) -> Self {
        self.locations.insert(name.to_string(), accessible);
        self
    }

    pub fn with_setting(mut self, name: &str, value: Value) -> Self {
        self.settings.insert(name.to_string(), value);
        self
    }

    fn absent(&self) -> Tri {
        if self.partial { Tri::Unknown } else { Tri::False }
    }

    fn absent_count(&self) -> Option<u32> {
        if self.partial { None } else { Some(0) }
    }
}

impl StateView for FixedView {
    fn has(&self, item: &str) -> Tri {
        self.items
            .get(item)
            .map_or_else(|| self.absent(), |&n| (n > 0).into())
    }

    fn count(&self, item: &str) -> Option<u32> {
        self.items.get(item).copied().or_else(|| self.absent_count())
    }

    fn count_group(&self, group: &str) -> Option<u32> {
        self.groups.get(group).copied().or_else(|| self.absent_count())
    }

    fn has_flag(&self, name: &str) -> Tri {
        self.flags.contains(name).into()
    }

    fn has_event(&self, name: &str) -> Tri {
        let event = process_event_item(name).unwrap_or(name);
        self.events.contains(event).into()
    }

    fn setting_enabled(&self, name: &str) -> Tri {
        self.settings
            .get(name)
            .map_or_else(|| self.absent(), |v| crate::flags::setting_truthy(v).into())
    }

    fn setting_equals(&self, name: &str, expected: &Value) -> Tri {
        self.settings
            .get(name)
            .map_or_else(|| self.absent(), |v| (v == expected).into())
    }

    fn can_reach_region(&self, region: &str) -> Result<Tri, RuleError> {
        match self.regions.get(region) {
            Some(&b) => Ok(b.into()),
            None if self.partial => Ok(Tri::Unknown),
            None => Err(RuleError::UnknownRegion(region.to_string())),
        }
    }

    fn can_reach_location(&self, location: &str) -> Result<Tri, RuleError> {
        match self.locations.get(location) {
            Some(&b) => Ok(b.into()),
            None if self.partial => Ok(Tri::Unknown),
            None => Err(RuleError::UnknownLocation(location.to_string())),
        }
    }

    fn fallback(&self) -> Tri {
        self.absent()
    }
}
