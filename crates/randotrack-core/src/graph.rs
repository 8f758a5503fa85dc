//! The static world graph: regions, exits and locations for one player
//! slot, plus the index of exits whose rules read other regions.

use crate::flags::Shop;
use crate::id::*;
use crate::registry::ItemRegistry;
use crate::rule::{Rule, RuleTarget};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

/// Region tried when a world declares no start region.
pub const DEFAULT_START_REGION: &str = "Menu";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors found while assembling a [`World`].
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("duplicate region: {0}")]
    DuplicateRegion(String),
    #[error("duplicate location: {0}")]
    DuplicateLocation(String),
    #[error("duplicate exit '{exit}' in region '{region}'")]
    DuplicateExit { region: String, exit: String },
    #[error("exit '{exit}' leads to unknown region '{target}'")]
    UnknownExitTarget { exit: String, target: String },
    #[error("unknown start region: {0}")]
    UnknownStartRegion(String),
    #[error("no start region declared and no '{DEFAULT_START_REGION}' region exists")]
    NoStartRegion,
    #[error("unknown starting item: {0}")]
    UnknownStartingItem(String),
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// An item placed at a location, owned by some player slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedItem {
    pub name: String,
    pub owner_slot: u32,
}

#[derive(Debug, Clone)]
pub struct RegionData {
    pub name: String,
    pub locations: Vec<LocationId>,
    /// Outgoing exits.
    pub exits: Vec<ExitId>,
    pub is_light_world: bool,
    pub is_dark_world: bool,
    pub shop: Option<Shop>,
}

#[derive(Debug, Clone)]
pub struct ExitData {
    pub name: String,
    pub source: RegionId,
    pub target: RegionId,
    /// `None` means always passable.
    pub rule: Option<Rule>,
}

#[derive(Debug, Clone)]
pub struct LocationData {
    pub name: String,
    pub region: RegionId,
    pub rule: Option<Rule>,
    pub item: Option<PlacedItem>,
    /// Holds an event item owned by this world's slot.
    pub is_event: bool,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct PendingExit {
    source: RegionId,
    name: String,
    target: String,
    rule: Option<Rule>,
}

/// Assembles a [`World`]. Exit targets are resolved by name in
/// [`build`](WorldBuilder::build), so regions may be added in any order.
pub struct WorldBuilder {
    items: Arc<ItemRegistry>,
    regions: SlotMap<RegionId, RegionData>,
    region_names: HashMap<String, RegionId>,
    locations: SlotMap<LocationId, LocationData>,
    location_names: HashMap<String, LocationId>,
    exits: Vec<PendingExit>,
    start_regions: Vec<String>,
    starting_items: Vec<String>,
    settings: BTreeMap<String, Value>,
    player_slot: u32,
    player_name: Option<String>,
    mode: String,
}

impl WorldBuilder {
    /// Create an empty builder over an item registry.
    pub fn new(items: Arc<ItemRegistry>) -> Self {
        Self {
            items,
            regions: SlotMap::with_key(),
            region_names: HashMap::new(),
            locations: SlotMap::with_key(),
            location_names: HashMap::new(),
            exits: Vec::new(),
            start_regions: Vec::new(),
            starting_items: Vec::new(),
            settings: BTreeMap::new(),
            player_slot: 1,
            player_name: None,
            mode: String::new(),
        }
    }

    /// Set the player slot and display name.
    pub fn player(&mut self, slot: u32, name: Option<String>) -> &mut Self {
        self.player_slot = slot;
        self.player_name = name;
        self
    }

    /// Set the game mode string.
    pub fn mode(&mut self, mode: &str) -> &mut Self {
        self.mode = mode.to_string();
        self
    }

    /// Replace the slot settings.
    pub fn settings(&mut self, settings: BTreeMap<String, Value>) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Add a region. Names must be unique.
    pub fn add_region(&mut self, name: &str) -> Result<RegionId, WorldError> {
        if self.region_names.contains_key(name) {
            return Err(WorldError::DuplicateRegion(name.to_string()));
        }
        let id = self.regions.insert(RegionData {
            name: name.to_string(),
            locations: Vec::new(),
            exits: Vec::new(),
            is_light_world: false,
            is_dark_world: false,
            shop: None,
        });
        self.region_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Mark which world half a region belongs to.
    pub fn set_world_half(&mut self, region: RegionId, light: bool, dark: bool) {
        if let Some(data) = self.regions.get_mut(region) {
            data.is_light_world = light;
            data.is_dark_world = dark;
        }
    }

    /// Attach a shop to a region.
    pub fn set_shop(&mut self, region: RegionId, shop: Shop) {
        if let Some(data) = self.regions.get_mut(region) {
            data.shop = Some(shop);
        }
    }

    /// Add a location to a region. Names must be unique across the world.
    pub fn add_location(
        &mut self,
        region: RegionId,
        name: &str,
        rule: Option<Rule>,
        item: Option<PlacedItem>,
    ) -> Result<LocationId, WorldError> {
        if self.location_names.contains_key(name) {
            return Err(WorldError::DuplicateLocation(name.to_string()));
        }
        let id = self.locations.insert(LocationData {
            name: name.to_string(),
            region,
            rule,
            item,
            is_event: false,
        });
        self.location_names.insert(name.to_string(), id);
        if let Some(data) = self.regions.get_mut(region) {
            data.locations.push(id);
        }
        Ok(id)
    }

    /// Add an exit from `source` to the region named `target`. Exit names
    /// must be unique within their source region.
    pub fn add_exit(
        &mut self,
        source: RegionId,
        name: &str,
        target: &str,
        rule: Option<Rule>,
    ) -> Result<(), WorldError> {
        if self
            .exits
            .iter()
            .any(|e| e.source == source && e.name == name)
        {
            let region = self
                .regions
                .get(source)
                .map(|r| r.name.clone())
                .unwrap_or_default();
            return Err(WorldError::DuplicateExit {
                region,
                exit: name.to_string(),
            });
        }
        self.exits.push(PendingExit {
            source,
            name: name.to_string(),
            target: target.to_string(),
            rule,
        });
        Ok(())
    }

    /// Add a start region by name.
    pub fn add_start_region(&mut self, name: &str) -> &mut Self {
        self.start_regions.push(name.to_string());
        self
    }

    /// Queue an item granted when the engine loads.
    pub fn add_starting_item(&mut self, name: &str) -> &mut Self {
        self.starting_items.push(name.to_string());
        self
    }

    /// Look up a region added so far.
    pub fn region_id(&self, name: &str) -> Option<RegionId> {
        self.region_names.get(name).copied()
    }

    /// Resolve exits, validate references and build the indirect index.
    pub fn build(self) -> Result<World, WorldError> {
        let mut regions = self.regions;
        let mut locations = self.locations;

        let mut exits: SlotMap<ExitId, ExitData> = SlotMap::with_key();
        for pending in self.exits {
            let target = self.region_names.get(&pending.target).copied().ok_or_else(|| {
                WorldError::UnknownExitTarget {
                    exit: pending.name.clone(),
                    target: pending.target.clone(),
                }
            })?;
            let id = exits.insert(ExitData {
                name: pending.name,
                source: pending.source,
                target,
                rule: pending.rule,
            });
            if let Some(region) = regions.get_mut(pending.source) {
                region.exits.push(id);
            }
        }

        let start_regions = if self.start_regions.is_empty() {
            let menu = self
                .region_names
                .get(DEFAULT_START_REGION)
                .copied()
                .ok_or(WorldError::NoStartRegion)?;
            vec![menu]
        } else {
            self.start_regions
                .iter()
                .map(|name| {
                    self.region_names
                        .get(name)
                        .copied()
                        .ok_or_else(|| WorldError::UnknownStartRegion(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        if let Some(bad) = self
            .starting_items
            .iter()
            .find(|name| self.items.max_count(name).is_none())
        {
            return Err(WorldError::UnknownStartingItem(bad.clone()));
        }

        let mut event_locations = Vec::new();
        for (id, location) in locations.iter_mut() {
            location.is_event = location.item.as_ref().is_some_and(|item| {
                item.owner_slot == self.player_slot && self.items.is_event(&item.name)
            });
            if location.is_event {
                event_locations.push(id);
            }
        }

        // region -> exits whose rule reads that region's reachability
        let mut indirect: SecondaryMap<RegionId, Vec<ExitId>> = SecondaryMap::new();
        for (exit_id, exit) in &exits {
            let Some(rule) = &exit.rule else { continue };
            for target in rule.referenced_targets() {
                let region = match &target {
                    RuleTarget::Region(name) => self.region_names.get(name).copied(),
                    RuleTarget::Location(name) => self
                        .location_names
                        .get(name)
                        .and_then(|&l| locations.get(l))
                        .map(|l| l.region),
                };
                match region {
                    Some(region) => {
                        if let Some(list) = indirect.entry(region).map(|e| e.or_default()) {
                            if !list.contains(&exit_id) {
                                list.push(exit_id);
                            }
                        }
                    }
                    None => warn!(exit = %exit.name, ?target, "rule references unknown target"),
                }
            }
        }

        Ok(World {
            items: self.items,
            regions,
            region_names: self.region_names,
            exits,
            locations,
            location_names: self.location_names,
            start_regions,
            starting_items: self.starting_items,
            settings: self.settings,
            indirect,
            event_locations,
            player_slot: self.player_slot,
            player_name: self.player_name,
            mode: self.mode,
        })
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The static world graph for one player slot. Read-only after build;
/// replaced wholesale on reload.
#[derive(Debug)]
pub struct World {
    items: Arc<ItemRegistry>,
    regions: SlotMap<RegionId, RegionData>,
    region_names: HashMap<String, RegionId>,
    exits: SlotMap<ExitId, ExitData>,
    locations: SlotMap<LocationId, LocationData>,
    location_names: HashMap<String, LocationId>,
    start_regions: Vec<RegionId>,
    starting_items: Vec<String>,
    settings: BTreeMap<String, Value>,
    indirect: SecondaryMap<RegionId, Vec<ExitId>>,
    event_locations: Vec<LocationId>,
    player_slot: u32,
    player_name: Option<String>,
    mode: String,
}

impl World {
    /// The item registry this world was built against.
    pub fn items(&self) -> &Arc<ItemRegistry> {
        &self.items
    }

    // -- Regions --

    /// Get a region by id.
    pub fn region(&self, id: RegionId) -> Option<&RegionData> {
        self.regions.get(id)
    }

    /// Look up a region by name.
    pub fn region_id(&self, name: &str) -> Option<RegionId> {
        self.region_names.get(name).copied()
    }

    /// Iterate over all regions.
    pub fn regions(&self) -> impl Iterator<Item = (RegionId, &RegionData)> {
        self.regions.iter()
    }

    /// Total number of regions.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Regions reachable with an empty inventory.
    pub fn start_regions(&self) -> &[RegionId] {
        &self.start_regions
    }

    // -- Exits --

    /// Get an exit by id.
    pub fn exit(&self, id: ExitId) -> Option<&ExitData> {
        self.exits.get(id)
    }

    /// Find an exit by its source region and name.
    pub fn exit_id(&self, region: &str, exit: &str) -> Option<ExitId> {
        let region = self.regions.get(self.region_id(region)?)?;
        region
            .exits
            .iter()
            .copied()
            .find(|&id| self.exits.get(id).is_some_and(|e| e.name == exit))
    }

    /// Exits whose rule reads the reachability of `region` without having
    /// it as an endpoint.
    pub fn indirect_exits(&self, region: RegionId) -> &[ExitId] {
        self.indirect.get(region).map(Vec::as_slice).unwrap_or(&[])
    }

    // -- Locations --

    /// Get a location by id.
    pub fn location(&self, id: LocationId) -> Option<&LocationData> {
        self.locations.get(id)
    }

    /// Look up a location by name.
    pub fn location_id(&self, name: &str) -> Option<LocationId> {
        self.location_names.get(name).copied()
    }

    /// Get a location's data by name.
    pub fn location_by_name(&self, name: &str) -> Option<&LocationData> {
        self.locations.get(self.location_id(name)?)
    }

    /// Iterate over all locations.
    pub fn locations(&self) -> impl Iterator<Item = (LocationId, &LocationData)> {
        self.locations.iter()
    }

    /// Locations holding an event item owned by this slot.
    pub fn event_locations(&self) -> &[LocationId] {
        &self.event_locations
    }

    // -- Slot data --

    /// Items granted when the engine loads.
    pub fn starting_items(&self) -> &[String] {
        &self.starting_items
    }

    /// Slot settings as loaded.
    pub fn settings(&self) -> &BTreeMap<String, Value> {
        &self.settings
    }

    /// Shops attached to regions.
    pub fn shops(&self) -> impl Iterator<Item = &Shop> {
        self.regions.values().filter_map(|r| r.shop.as_ref())
    }

    /// The player slot this world describes.
    pub fn player_slot(&self) -> u32 {
        self.player_slot
    }

    /// The player's display name, if the document gave one.
    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    /// The game mode string.
    pub fn mode(&self) -> &str {
        &self.mode
    }
}
