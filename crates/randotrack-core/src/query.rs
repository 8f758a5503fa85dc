//! Read-only projection of engine state.
//!
//! [`WorldSnapshot`] aggregates inventory, flags, settings and the
//! reachability results into one denormalized structure. All types are
//! owned copies with no references into engine storage, so a snapshot can
//! cross a thread boundary or be encoded with [`crate::serialize`].

use crate::flags::{FlagStore, Shop, setting_truthy};
use crate::graph::{PlacedItem, World};
use crate::id::RegionId;
use crate::item::Inventory;
use crate::rule::{self, Rule};
use crate::tri::Tri;
use crate::view::{LiveView, SnapshotView};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ---------------------------------------------------------------------------
// Setting values
// ---------------------------------------------------------------------------

/// A setting value in a form every snapshot encoding can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<SettingValue>),
    Map(BTreeMap<String, SettingValue>),
}

impl From<&Value> for SettingValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SettingValue::Null,
            Value::Bool(b) => SettingValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SettingValue::Int(i),
                None => SettingValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SettingValue::Text(s.clone()),
            Value::Array(items) => SettingValue::List(items.iter().map(Self::from).collect()),
            Value::Object(map) => SettingValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&SettingValue> for Value {
    fn from(value: &SettingValue) -> Self {
        match value {
            SettingValue::Null => Value::Null,
            SettingValue::Bool(b) => Value::Bool(*b),
            SettingValue::Int(i) => Value::from(*i),
            SettingValue::Float(f) => Value::from(*f),
            SettingValue::Text(s) => Value::String(s.clone()),
            SettingValue::List(items) => Value::Array(items.iter().map(Value::from).collect()),
            SettingValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl SettingValue {
    pub fn is_truthy(&self) -> bool {
        setting_truthy(&Value::from(self))
    }

    /// Equality against a JSON value as it appears in a rule.
    pub fn matches(&self, expected: &Value) -> bool {
        Value::from(self) == *expected
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSnapshot {
    pub name: String,
    pub target: String,
    pub is_accessible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub is_accessible: bool,
    pub is_light_world: bool,
    pub is_dark_world: bool,
    pub exits: Vec<ExitSnapshot>,
    pub locations: Vec<String>,
    pub shop: Option<Shop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSnapshot {
    pub region: String,
    pub is_accessible: bool,
    pub is_checked: bool,
    pub item: Option<PlacedItem>,
    pub is_event: bool,
}

/// The full projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub player_slot: u32,
    pub player_name: Option<String>,
    pub mode: String,
    /// Raw counts for every defined item and tier name, zero included.
    pub inventory: BTreeMap<String, u32>,
    /// Whether each tier name is unlocked through its progressive base,
    /// regardless of direct grants.
    pub tier_unlocks: BTreeMap<String, bool>,
    pub group_counts: BTreeMap<String, u32>,
    pub flags: BTreeSet<String>,
    pub events: BTreeSet<String>,
    pub settings: BTreeMap<String, SettingValue>,
    pub shops: Vec<Shop>,
    pub regions: BTreeMap<String, RegionSnapshot>,
    pub locations: BTreeMap<String, LocationSnapshot>,
    pub checked_locations: Vec<String>,
    pub reachable_regions: Vec<String>,
}

impl WorldSnapshot {
    /// `None` for a region this snapshot does not know.
    pub fn is_region_accessible(&self, name: &str) -> Option<bool> {
        self.regions.get(name).map(|r| r.is_accessible)
    }

    pub fn is_location_accessible(&self, name: &str) -> Option<bool> {
        self.locations.get(name).map(|l| l.is_accessible)
    }

    /// Accessible locations not yet checked.
    pub fn available_locations(&self) -> impl Iterator<Item = &str> {
        self.locations
            .iter()
            .filter(|(_, l)| l.is_accessible && !l.is_checked)
            .map(|(name, _)| name.as_str())
    }

    /// Evaluate a rule against this snapshot with partial-context semantics.
    pub fn evaluate(&self, rule: &Rule) -> Tri {
        rule::evaluate(rule, &SnapshotView::new(self))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Build a snapshot from engine state. `reachable` must be the result of a
/// completed fixpoint.
pub fn project(
    world: &World,
    inventory: &Inventory,
    flags: &FlagStore,
    checked: &BTreeSet<String>,
    reachable: &HashSet<RegionId>,
    max_rule_depth: u32,
) -> WorldSnapshot {
    let view = LiveView::new(world, inventory, flags, reachable, max_rule_depth);
    let registry = inventory.registry();

    let inventory_counts = registry
        .items()
        .map(|def| def.name.as_str())
        .chain(registry.tier_names())
        .map(|name| (name.to_string(), inventory.raw_count(name)))
        .collect();
    let tier_unlocks = registry
        .tier_names()
        .filter(|name| !registry.is_progressive_base(name))
        .map(|name| (name.to_string(), inventory.unlocked_via_progression(name)))
        .collect();
    let groups: BTreeSet<&str> = registry
        .items()
        .flat_map(|def| def.groups.iter().map(String::as_str))
        .collect();
    let group_counts = groups
        .into_iter()
        .map(|g| (g.to_string(), inventory.count_group(g)))
        .collect();

    let region_name = |id: RegionId| {
        world
            .region(id)
            .map(|r| r.name.clone())
            .unwrap_or_default()
    };

    let mut regions = BTreeMap::new();
    let mut reachable_regions = Vec::new();
    for (id, region) in world.regions() {
        let is_accessible = reachable.contains(&id);
        if is_accessible {
            reachable_regions.push(region.name.clone());
        }
        let exits = region
            .exits
            .iter()
            .filter_map(|&e| world.exit(e))
            .map(|exit| ExitSnapshot {
                name: exit.name.clone(),
                target: region_name(exit.target),
                is_accessible: is_accessible
                    && exit
                        .rule
                        .as_ref()
                        .is_none_or(|r| rule::evaluate_definite(r, &view)),
            })
            .collect();
        let locations = region
            .locations
            .iter()
            .filter_map(|&l| world.location(l))
            .map(|l| l.name.clone())
            .collect();
        regions.insert(
            region.name.clone(),
            RegionSnapshot {
                is_accessible,
                is_light_world: region.is_light_world,
                is_dark_world: region.is_dark_world,
                exits,
                locations,
                shop: region.shop.clone(),
            },
        );
    }
    reachable_regions.sort();

    let locations = world
        .locations()
        .map(|(_, location)| {
            let is_accessible = reachable.contains(&location.region)
                && location
                    .rule
                    .as_ref()
                    .is_none_or(|r| rule::evaluate_definite(r, &view));
            (
                location.name.clone(),
                LocationSnapshot {
                    region: region_name(location.region),
                    is_accessible,
                    is_checked: checked.contains(&location.name),
                    item: location.item.clone(),
                    is_event: location.is_event,
                },
            )
        })
        .collect();

    WorldSnapshot {
        player_slot: world.player_slot(),
        player_name: world.player_name().map(str::to_string),
        mode: world.mode().to_string(),
        inventory: inventory_counts,
        tier_unlocks,
        group_counts,
        flags: flags.flags().map(str::to_string).collect(),
        events: flags.events().map(str::to_string).collect(),
        settings: flags
            .settings()
            .iter()
            .map(|(k, v)| (k.clone(), SettingValue::from(v)))
            .collect(),
        shops: flags.shops().to_vec(),
        regions,
        locations,
        checked_locations: checked.iter().cloned().collect(),
        reachable_regions,
    }
}
