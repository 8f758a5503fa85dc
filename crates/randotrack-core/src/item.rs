//! The player inventory: owned-item counts with progressive-tier resolution.
//!
//! Counts are stored for the names that were actually granted. Progressive
//! base items are authoritative; their tier names are derived from the base
//! count unless they were granted directly, and both paths answer `has`.

use crate::registry::ItemRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("unknown item: {0}")]
    UnknownItem(String),
}

/// Item counts for one player slot.
#[derive(Debug, Clone)]
pub struct Inventory {
    registry: Arc<ItemRegistry>,
    counts: BTreeMap<String, u32>,
}

impl Inventory {
    pub fn new(registry: Arc<ItemRegistry>) -> Self {
        Self {
            registry,
            counts: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn max_count(&self, name: &str) -> Option<u32> {
        self.registry.max_count(name)
    }

    // -- Mutation --

    /// Add one copy. Returns `Ok(false)` when already at the cap.
    pub fn add_item(&mut self, name: &str) -> Result<bool, InventoryError> {
        let cap = self.cap(name)?;
        let current = self.raw_count(name);
        if current >= cap {
            return Ok(false);
        }
        self.counts.insert(name.to_string(), current + 1);
        Ok(true)
    }

    /// Remove one copy. Returns `Ok(false)` when none are held.
    pub fn remove_item(&mut self, name: &str) -> Result<bool, InventoryError> {
        self.cap(name)?;
        match self.counts.get_mut(name) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(name);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Set the raw count, clamped to the cap. Returns whether it changed.
    pub fn set_count(&mut self, name: &str, count: u32) -> Result<bool, InventoryError> {
        let count = count.min(self.cap(name)?);
        let previous = self.raw_count(name);
        if count == 0 {
            self.counts.remove(name);
        } else {
            self.counts.insert(name.to_string(), count);
        }
        Ok(previous != count)
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    fn cap(&self, name: &str) -> Result<u32, InventoryError> {
        self.registry
            .max_count(name)
            .ok_or_else(|| InventoryError::UnknownItem(name.to_string()))
    }

    // -- Queries --

    /// The stored count, without progressive resolution.
    pub fn raw_count(&self, name: &str) -> u32 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// True if held directly or unlocked through a progressive base whose
    /// count reaches the tier's level.
    pub fn has(&self, name: &str) -> bool {
        self.raw_count(name) > 0 || self.unlocked_via_progression(name)
    }

    /// For a base item: its raw count. For a tier name: 1 if unlocked through
    /// its base, otherwise whatever was granted directly.
    pub fn count(&self, name: &str) -> u32 {
        if !self.registry.is_progressive_base(name) && self.unlocked_via_progression(name) {
            return 1;
        }
        self.raw_count(name)
    }

    /// Sum of raw counts over items tagged with `group`.
    pub fn count_group(&self, group: &str) -> u32 {
        self.registry
            .items_in_group(group)
            .map(|def| self.raw_count(&def.name))
            .fold(0u32, u32::saturating_add)
    }

    pub fn has_any<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().any(|n| self.has(n.as_ref()))
    }

    pub fn has_all<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|n| self.has(n.as_ref()))
    }

    /// Raw counts of everything currently held, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(name, &count)| (name.as_str(), count))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// True if some progressive base's count reaches the level that
    /// unlocks `name`. Direct grants are not considered.
    pub fn unlocked_via_progression(&self, name: &str) -> bool {
        self.registry
            .unlocked_by(name)
            .iter()
            .any(|source| self.raw_count(&source.base) >= source.level)
    }
}
