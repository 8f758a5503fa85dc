//! The capability interface rules are evaluated against.
//!
//! [`LiveView`] borrows the engine's state and always answers definitely.
//! [`SnapshotView`] reads a frozen [`WorldSnapshot`] and answers
//! [`Tri::Unknown`] where the projection lacks the information.

use crate::flags::{FlagStore, setting_truthy};
use crate::graph::World;
use crate::id::RegionId;
use crate::item::Inventory;
use crate::query::{SettingValue, WorldSnapshot};
use crate::rule::{self, RuleError};
use crate::tri::Tri;
use serde_json::Value;
use std::cell::Cell;
use std::collections::HashSet;

/// Read-only state queries available to rules and helpers.
pub trait StateView {
    fn has(&self, item: &str) -> Tri;

    /// `None` when the count cannot be determined.
    fn count(&self, item: &str) -> Option<u32>;

    /// Sum of counts over a group tag. `None` when unknown.
    fn count_group(&self, group: &str) -> Option<u32>;

    fn has_flag(&self, name: &str) -> Tri;

    fn has_event(&self, name: &str) -> Tri;

    fn setting_enabled(&self, name: &str) -> Tri;

    fn setting_equals(&self, name: &str, expected: &Value) -> Tri;

    fn can_reach_region(&self, region: &str) -> Result<Tri, RuleError>;

    fn can_reach_location(&self, location: &str) -> Result<Tri, RuleError>;

    /// What malformed nodes and downgraded errors evaluate to.
    fn fallback(&self) -> Tri;
}

// ---------------------------------------------------------------------------
// LiveView
// ---------------------------------------------------------------------------

/// Full-context view over the engine's live state.
///
/// Reachability queries read `reachable`, which during a fixpoint is the
/// in-progress partial set.
pub struct LiveView<'a> {
    world: &'a World,
    inventory: &'a Inventory,
    flags: &'a FlagStore,
    reachable: &'a HashSet<RegionId>,
    max_depth: u32,
    depth: Cell<u32>,
}

impl<'a> LiveView<'a> {
    pub fn new(
        world: &'a World,
        inventory: &'a Inventory,
        flags: &'a FlagStore,
        reachable: &'a HashSet<RegionId>,
        max_depth: u32,
    ) -> Self {
        Self {
            world,
            inventory,
            flags,
            reachable,
            max_depth,
            depth: Cell::new(0),
        }
    }
}

impl StateView for LiveView<'_> {
    fn has(&self, item: &str) -> Tri {
        self.inventory.has(item).into()
    }

    fn count(&self, item: &str) -> Option<u32> {
        Some(self.inventory.count(item))
    }

    fn count_group(&self, group: &str) -> Option<u32> {
        Some(self.inventory.count_group(group))
    }

    fn has_flag(&self, name: &str) -> Tri {
        self.flags.has_flag(name).into()
    }

    fn has_event(&self, name: &str) -> Tri {
        self.flags.has_event(name).into()
    }

    fn setting_enabled(&self, name: &str) -> Tri {
        self.flags.setting(name).is_some_and(setting_truthy).into()
    }

    fn setting_equals(&self, name: &str, expected: &Value) -> Tri {
        self.flags.setting(name).is_some_and(|v| v == expected).into()
    }

    fn can_reach_region(&self, region: &str) -> Result<Tri, RuleError> {
        let id = self
            .world
            .region_id(region)
            .ok_or_else(|| RuleError::UnknownRegion(region.to_string()))?;
        Ok(self.reachable.contains(&id).into())
    }

    fn can_reach_location(&self, location: &str) -> Result<Tri, RuleError> {
        let data = self
            .world
            .location_by_name(location)
            .ok_or_else(|| RuleError::UnknownLocation(location.to_string()))?;
        if !self.reachable.contains(&data.region) {
            return Ok(Tri::False);
        }
        let Some(rule) = &data.rule else {
            return Ok(Tri::True);
        };

        let depth = self.depth.get();
        if depth >= self.max_depth {
            return Err(RuleError::DepthExceeded(self.max_depth));
        }
        self.depth.set(depth + 1);
        let result = rule::try_evaluate(rule, self);
        self.depth.set(depth);
        result
    }

    fn fallback(&self) -> Tri {
        Tri::False
    }
}

// ---------------------------------------------------------------------------
// SnapshotView
// ---------------------------------------------------------------------------

/// Partial-context view over a frozen projection.
pub struct SnapshotView<'a> {
    snapshot: &'a WorldSnapshot,
}

impl<'a> SnapshotView<'a> {
    pub fn new(snapshot: &'a WorldSnapshot) -> Self {
        Self { snapshot }
    }

    fn setting(&self, name: &str) -> Option<&SettingValue> {
        self.snapshot.settings.get(name)
    }
}

impl StateView for SnapshotView<'_> {
    fn has(&self, item: &str) -> Tri {
        let raw = self.snapshot.inventory.get(item).copied();
        let unlocked = self.snapshot.tier_unlocks.get(item).copied();
        match (raw, unlocked) {
            (Some(n), _) if n > 0 => Tri::True,
            (_, Some(true)) => Tri::True,
            (None, None) => Tri::Unknown,
            _ => Tri::False,
        }
    }

    fn count(&self, item: &str) -> Option<u32> {
        let raw = self.snapshot.inventory.get(item).copied();
        match self.snapshot.tier_unlocks.get(item) {
            Some(true) => Some(1),
            Some(false) => Some(raw.unwrap_or(0)),
            None => raw,
        }
    }

    fn count_group(&self, group: &str) -> Option<u32> {
        self.snapshot.group_counts.get(group).copied()
    }

    fn has_flag(&self, name: &str) -> Tri {
        self.snapshot.flags.contains(name).into()
    }

    fn has_event(&self, name: &str) -> Tri {
        let event = crate::flags::process_event_item(name).unwrap_or(name);
        self.snapshot.events.contains(event).into()
    }

    fn setting_enabled(&self, name: &str) -> Tri {
        self.setting(name)
            .map_or(Tri::Unknown, |v| v.is_truthy().into())
    }

    fn setting_equals(&self, name: &str, expected: &Value) -> Tri {
        self.setting(name)
            .map_or(Tri::Unknown, |v| v.matches(expected).into())
    }

    fn can_reach_region(&self, region: &str) -> Result<Tri, RuleError> {
        Ok(self
            .snapshot
            .regions
            .get(region)
            .map_or(Tri::Unknown, |r| r.is_accessible.into()))
    }

    fn can_reach_location(&self, location: &str) -> Result<Tri, RuleError> {
        Ok(self
            .snapshot
            .locations
            .get(location)
            .map_or(Tri::Unknown, |l| l.is_accessible.into()))
    }

    fn fallback(&self) -> Tri {
        Tri::Unknown
    }
}
