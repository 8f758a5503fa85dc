//! Item definitions and progressive-tier tables.
//!
//! Built once per world load with [`ItemRegistryBuilder`] and frozen into an
//! immutable [`ItemRegistry`] shared by the inventory and the world graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// An item definition. Names are unique within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    /// Maximum number of copies the inventory will hold.
    pub max_count: u32,
    /// Group tags, summed by [`Inventory::count_group`](crate::item::Inventory::count_group).
    #[serde(default)]
    pub groups: Vec<String>,
    /// Event items are virtual: auto-granted by the fixpoint, never placed
    /// for a player to find.
    #[serde(default)]
    pub event: bool,
}

impl ItemDef {
    pub fn new(name: &str, max_count: u32) -> Self {
        Self {
            name: name.to_string(),
            max_count,
            groups: Vec::new(),
            event: false,
        }
    }

    pub fn event(name: &str) -> Self {
        Self {
            event: true,
            ..Self::new(name, 1)
        }
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }
}

/// One tier of a progressive item. Owning `level` copies of the base item
/// unlocks `name` and every name in `provides`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressiveTier {
    pub level: u32,
    pub name: String,
    #[serde(default)]
    pub provides: Vec<String>,
}

impl ProgressiveTier {
    pub fn new(level: u32, name: &str) -> Self {
        Self {
            level,
            name: name.to_string(),
            provides: Vec::new(),
        }
    }
}

/// A derived name unlocked by some progressive base item at `level`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSource {
    pub base: String,
    pub level: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate item name: {0}")]
    DuplicateItem(String),
    #[error("progression base item '{0}' is not a defined item")]
    UnknownBaseItem(String),
    #[error("progression for '{0}' is defined twice")]
    DuplicateProgression(String),
    #[error("progression for '{base}' has invalid tier level {level} (levels start at 1)")]
    InvalidTierLevel { base: String, level: u32 },
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Two-phase construction: register items and progressions, then
/// [`build`](ItemRegistryBuilder::build) validates and freezes.
#[derive(Debug, Default)]
pub struct ItemRegistryBuilder {
    items: Vec<ItemDef>,
    name_to_index: HashMap<String, usize>,
    progression: BTreeMap<String, Vec<ProgressiveTier>>,
}

impl ItemRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_item(&mut self, def: ItemDef) -> Result<(), RegistryError> {
        if self.name_to_index.contains_key(&def.name) {
            return Err(RegistryError::DuplicateItem(def.name));
        }
        self.name_to_index.insert(def.name.clone(), self.items.len());
        self.items.push(def);
        Ok(())
    }

    pub fn register_progression(
        &mut self,
        base: &str,
        tiers: Vec<ProgressiveTier>,
    ) -> Result<(), RegistryError> {
        if self.progression.contains_key(base) {
            return Err(RegistryError::DuplicateProgression(base.to_string()));
        }
        self.progression.insert(base.to_string(), tiers);
        Ok(())
    }

    pub fn build(self) -> Result<ItemRegistry, RegistryError> {
        let mut progression = self.progression;
        let mut tier_index: HashMap<String, Vec<TierSource>> = HashMap::new();

        for (base, tiers) in progression.iter_mut() {
            if !self.name_to_index.contains_key(base) {
                return Err(RegistryError::UnknownBaseItem(base.clone()));
            }
            if let Some(bad) = tiers.iter().find(|t| t.level == 0) {
                return Err(RegistryError::InvalidTierLevel {
                    base: base.clone(),
                    level: bad.level,
                });
            }
            tiers.sort_by_key(|t| t.level);

            for tier in tiers.iter() {
                for name in std::iter::once(&tier.name).chain(tier.provides.iter()) {
                    tier_index.entry(name.clone()).or_default().push(TierSource {
                        base: base.clone(),
                        level: tier.level,
                    });
                }
            }
        }

        Ok(ItemRegistry {
            items: self.items,
            name_to_index: self.name_to_index,
            progression,
            tier_index,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable item registry. Frozen after build; shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    items: Vec<ItemDef>,
    name_to_index: HashMap<String, usize>,
    progression: BTreeMap<String, Vec<ProgressiveTier>>,
    /// Tier or provided name -> the base items that unlock it.
    tier_index: HashMap<String, Vec<TierSource>>,
}

impl ItemRegistry {
    pub fn get(&self, name: &str) -> Option<&ItemDef> {
        self.name_to_index.get(name).map(|&i| &self.items[i])
    }

    pub fn is_event(&self, name: &str) -> bool {
        self.get(name).is_some_and(|def| def.event)
    }

    /// True if `name` is a tier name or provided name of some progressive item.
    pub fn is_tier_name(&self, name: &str) -> bool {
        self.tier_index.contains_key(name)
    }

    pub fn is_progressive_base(&self, name: &str) -> bool {
        self.progression.contains_key(name)
    }

    /// Tiers of a progressive base item, sorted by level.
    pub fn tiers(&self, base: &str) -> Option<&[ProgressiveTier]> {
        self.progression.get(base).map(Vec::as_slice)
    }

    /// Base items (with the level required) that unlock `name`.
    pub fn unlocked_by(&self, name: &str) -> &[TierSource] {
        self.tier_index.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The most copies of `name` an inventory may hold, or `None` for names
    /// that are neither defined items nor tier names.
    ///
    /// Progressive bases are capped at their tier count. Tier names that
    /// are not defined items may be granted directly, once.
    pub fn max_count(&self, name: &str) -> Option<u32> {
        if let Some(tiers) = self.progression.get(name) {
            let tier_cap = u32::try_from(tiers.len()).unwrap_or(u32::MAX);
            return Some(tier_cap);
        }
        if let Some(def) = self.get(name) {
            return Some(def.max_count);
        }
        self.is_tier_name(name).then_some(1)
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.iter()
    }

    pub fn items_in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a ItemDef> + 'a {
        self.items
            .iter()
            .filter(move |def| def.groups.iter().any(|g| g == group))
    }

    /// All names whose possession can be derived from a progressive base.
    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.tier_index.keys().map(String::as_str)
    }
}
