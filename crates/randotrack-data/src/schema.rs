//! Serde schema types for world documents.
//!
//! These types map 1:1 to the on-disk document. Names are strings here;
//! the loader resolves them into a [`World`](randotrack_core::graph::World)
//! and compiles access rules.

use randotrack_core::flags::Shop;
use randotrack_core::registry::ProgressiveTier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn default_one() -> u32 {
    1
}

/// Top-level document: a schema version and one entry per player slot,
/// keyed by the slot number as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldDocument {
    pub schema_version: u32,
    pub slots: BTreeMap<String, SlotData>,
}

/// Read before the full parse so a wrong version is reported as such and
/// not as a confusing field error.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VersionProbe {
    #[serde(default)]
    pub schema_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotData {
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub game_mode: String,
    pub regions: BTreeMap<String, RegionEntry>,
    pub items: BTreeMap<String, ItemEntry>,
    /// Progressive base item -> tiers.
    #[serde(default)]
    pub progression_mapping: BTreeMap<String, Vec<ProgressiveTier>>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    /// Empty means "Menu".
    #[serde(default)]
    pub start_regions: Vec<String>,
    #[serde(default)]
    pub starting_items: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionEntry {
    #[serde(default)]
    pub locations: Vec<LocationEntry>,
    #[serde(default)]
    pub exits: Vec<ExitEntry>,
    #[serde(default)]
    pub is_light_world: bool,
    #[serde(default)]
    pub is_dark_world: bool,
    #[serde(default)]
    pub shop: Option<Shop>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    pub name: String,
    #[serde(default)]
    pub access_rule: Option<Value>,
    #[serde(default)]
    pub item: Option<ItemPlacement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPlacement {
    pub name: String,
    /// Owning player slot.
    pub player: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitEntry {
    pub name: String,
    pub connected_region: String,
    #[serde(default)]
    pub access_rule: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEntry {
    #[serde(default = "default_one")]
    pub max_count: u32,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub event: bool,
}
