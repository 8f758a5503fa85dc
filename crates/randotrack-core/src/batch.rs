//! Staging for multi-item inventory updates.
//!
//! While a batch is open, item grants accumulate a target count per item
//! instead of mutating the inventory. Committing diffs the targets against
//! the inventory and applies only net increases, so loading dozens of
//! starting items costs one recomputation instead of one per item.

use crate::item::{Inventory, InventoryError};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// What a commit did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Items whose count increased.
    pub applied: Vec<String>,
    /// Whether the inventory changed at all.
    pub changed: bool,
}

/// An open batch.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    defer_recompute: bool,
    staged: BTreeMap<String, u32>,
}

impl BatchCoordinator {
    pub fn new(defer_recompute: bool) -> Self {
        Self {
            defer_recompute,
            staged: BTreeMap::new(),
        }
    }

    /// Recompute once on commit (`true`), or only invalidate and leave the
    /// recomputation to the next query (`false`).
    pub fn defer_recompute(&self) -> bool {
        self.defer_recompute
    }

    /// Stage one more copy of `name`. The first stage of an item starts from
    /// the inventory's current raw count. Returns `Ok(false)` when the staged
    /// target is already at the cap.
    pub fn stage_add(&mut self, inventory: &Inventory, name: &str) -> Result<bool, InventoryError> {
        let cap = inventory
            .max_count(name)
            .ok_or_else(|| InventoryError::UnknownItem(name.to_string()))?;
        let target = self
            .staged
            .entry(name.to_string())
            .or_insert_with(|| inventory.raw_count(name));
        if *target >= cap {
            return Ok(false);
        }
        *target += 1;
        Ok(true)
    }

    pub fn staged_count(&self, name: &str) -> Option<u32> {
        self.staged.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Apply staged targets that exceed the current count. Decreases (the
    /// inventory grew past a target mid-batch) are skipped.
    pub fn commit(self, inventory: &mut Inventory) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (name, target) in self.staged {
            let current = inventory.raw_count(&name);
            if target <= current {
                continue;
            }
            match inventory.set_count(&name, target) {
                Ok(true) => {
                    debug!(item = %name, from = current, to = target, "batch applied");
                    outcome.applied.push(name);
                    outcome.changed = true;
                }
                Ok(false) => {}
                Err(err) => warn!(error = %err, "batch item dropped"),
            }
        }
        outcome
    }
}
