//! The tracker engine: owns the mutable player state and the reachability
//! cache over a static [`World`].
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - An [`Inventory`] and a [`FlagStore`]
//! - The set of checked locations
//! - A [`CacheTracker`] and the cached [`FixpointState`]
//! - An optional open [`BatchCoordinator`]
//! - An optional [`SnapshotSink`]
//!
//! # Recompute
//!
//! Every mutation invalidates the cache. Outside a batch the engine then
//! recomputes immediately and pushes one snapshot through the sink;
//! queries recompute lazily if they find the cache dirty. A recompute is a
//! joint fixpoint:
//!
//! 1. **Seed** -- start regions are reachable; their exits are blocked
//! 2. **Sweep** -- retry blocked exits until a full pass reaches nothing
//! 3. **Events** -- grant event items at reachable, passable locations
//! 4. Repeat 2-3 until an event scan grants nothing
//!
//! Reachability is always rebuilt from empty; nothing is retracted
//! incrementally.

use crate::batch::{BatchCoordinator, BatchOutcome};
use crate::config::EngineConfig;
use crate::dirty::{CacheState, CacheTracker};
use crate::event::SnapshotSink;
use crate::flags::FlagStore;
use crate::graph::World;
use crate::id::{ExitId, LocationId, RegionId};
use crate::item::Inventory;
use crate::query::{WorldSnapshot, project};
use crate::rule;
use crate::view::LiveView;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotmap::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

// ---------------------------------------------------------------------------
// Fixpoint state
// ---------------------------------------------------------------------------

/// How a region was first reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub entrance: ExitId,
    pub previous: RegionId,
}

/// One hop of a diagnostic path, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub region: String,
    /// `None` for a start region.
    pub entrance: Option<String>,
    pub previous: Option<String>,
}

/// What one [`FixpointState::sweep`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Regions newly reached.
    pub reached: usize,
    /// Passes over the blocked exits, the final empty pass included.
    pub passes: usize,
}

/// The reachability cache: reachable regions, first-discovered path edges
/// and the exits still waiting on their rules.
#[derive(Debug, Clone, Default)]
pub struct FixpointState {
    pub reachable: HashSet<RegionId>,
    pub paths: SecondaryMap<RegionId, PathStep>,
    blocked: Vec<ExitId>,
    /// Exits currently in `blocked` or pending in a sweep.
    queued: HashSet<ExitId>,
}

impl FixpointState {
    /// Start regions reachable, their exits blocked.
    pub fn seeded(world: &World) -> Self {
        let mut state = Self::default();
        let mut blocked = Vec::new();
        for &start in world.start_regions() {
            if state.reachable.insert(start) {
                state.enqueue_exits(world, start, &mut blocked);
            }
        }
        state.blocked = blocked;
        state
    }

    fn enqueue_exits<E: Extend<ExitId>>(&mut self, world: &World, region: RegionId, out: &mut E) {
        let Some(data) = world.region(region) else {
            return;
        };
        for &exit_id in &data.exits {
            let Some(exit) = world.exit(exit_id) else {
                continue;
            };
            if self.reachable.contains(&exit.target) || !self.queued.insert(exit_id) {
                continue;
            }
            out.extend(std::iter::once(exit_id));
        }
    }

    /// Retry blocked exits until one full pass reaches no new region.
    ///
    /// Within a pass, reaching a region immediately re-queues exits that
    /// already failed this pass if their rules read that region.
    pub fn sweep(
        &mut self,
        world: &World,
        inventory: &Inventory,
        flags: &FlagStore,
        max_rule_depth: u32,
    ) -> SweepStats {
        let mut stats = SweepStats::default();
        loop {
            stats.passes += 1;
            let mut pending: VecDeque<ExitId> = std::mem::take(&mut self.blocked).into();
            let mut still_blocked = Vec::new();
            let mut reached = 0;

            while let Some(exit_id) = pending.pop_front() {
                let Some(exit) = world.exit(exit_id) else {
                    self.queued.remove(&exit_id);
                    continue;
                };
                if self.reachable.contains(&exit.target) {
                    self.queued.remove(&exit_id);
                    continue;
                }

                let passes = match &exit.rule {
                    None => true,
                    Some(rule) => {
                        let view =
                            LiveView::new(world, inventory, flags, &self.reachable, max_rule_depth);
                        rule::evaluate_definite(rule, &view)
                    }
                };
                trace!(exit = %exit.name, passes, "exit evaluated");
                if !passes {
                    still_blocked.push(exit_id);
                    continue;
                }

                self.queued.remove(&exit_id);
                self.reachable.insert(exit.target);
                if !self.paths.contains_key(exit.target) {
                    self.paths.insert(
                        exit.target,
                        PathStep {
                            entrance: exit_id,
                            previous: exit.source,
                        },
                    );
                }
                reached += 1;

                self.enqueue_exits(world, exit.target, &mut pending);
                for &indirect in world.indirect_exits(exit.target) {
                    if let Some(pos) = still_blocked.iter().position(|&e| e == indirect) {
                        still_blocked.swap_remove(pos);
                        pending.push_back(indirect);
                    }
                }
            }

            self.blocked = still_blocked;
            stats.reached += reached;
            if reached == 0 {
                break;
            }
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Reachability tracker for one player slot.
pub struct Engine {
    world: Arc<World>,
    config: EngineConfig,
    inventory: Inventory,
    flags: FlagStore,
    checked: BTreeSet<String>,
    cache: CacheTracker,
    reach: FixpointState,
    batch: Option<BatchCoordinator>,
    sink: Option<SnapshotSink>,
    snapshots_emitted: u64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("inventory", &self.inventory)
            .field("checked", &self.checked)
            .field("cache", &self.cache)
            .field("reachable", &self.reach.reachable.len())
            .field("batching", &self.batch.is_some())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Engine {
    /// Create an engine with the default config.
    pub fn new(world: Arc<World>) -> Self {
        Self::with_config(world, EngineConfig::default())
    }

    /// Create an engine, load the world's settings and shops and grant its
    /// starting items in one batch.
    pub fn with_config(world: Arc<World>, config: EngineConfig) -> Self {
        let mut engine = Self {
            inventory: Inventory::new(Arc::clone(world.items())),
            flags: FlagStore::new(),
            checked: BTreeSet::new(),
            cache: CacheTracker::new(),
            reach: FixpointState::default(),
            batch: None,
            sink: None,
            snapshots_emitted: 0,
            world,
            config,
        };
        engine.load_world_state();
        engine
    }

    /// Replace the world wholesale. All player state is reset.
    pub fn reload(&mut self, world: Arc<World>) {
        self.inventory = Inventory::new(Arc::clone(world.items()));
        self.flags = FlagStore::new();
        self.checked.clear();
        self.batch = None;
        self.world = world;
        self.cache.invalidate();
        self.load_world_state();
    }

    fn load_world_state(&mut self) {
        self.flags.load_settings(self.world.settings().clone());
        self.flags.set_shops(self.world.shops().cloned().collect());
        self.cache.invalidate();

        let world = Arc::clone(&self.world);
        self.begin_batch_update(true);
        for item in world.starting_items() {
            self.add_item_to_inventory(item);
        }
        self.commit_batch_update();
        info!(
            regions = world.region_count(),
            starting_items = world.starting_items().len(),
            "world loaded"
        );
    }

    // -- Accessors --

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    pub fn checked_locations(&self) -> &BTreeSet<String> {
        &self.checked
    }

    pub fn is_location_checked(&self, name: &str) -> bool {
        self.checked.contains(name)
    }

    // -- Sink --

    /// Register the sink snapshots are pushed through, replacing any other.
    pub fn set_sink(&mut self, sink: SnapshotSink) {
        self.sink = Some(sink);
    }

    /// Detach the sink. Recomputes still run but emit nothing.
    pub fn clear_sink(&mut self) -> Option<SnapshotSink> {
        self.sink.take()
    }

    /// Snapshots pushed through the sink so far.
    pub fn snapshots_emitted(&self) -> u64 {
        self.snapshots_emitted
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Grant one copy of an item. Inside a batch the grant is staged.
    /// Returns `false` for unknown items and items already at their cap.
    pub fn add_item_to_inventory(&mut self, name: &str) -> bool {
        if let Some(batch) = self.batch.as_mut() {
            return match batch.stage_add(&self.inventory, name) {
                Ok(staged) => staged,
                Err(err) => {
                    warn!(error = %err, "item not staged");
                    false
                }
            };
        }
        match self.inventory.add_item(name) {
            Ok(true) => {
                debug!(item = name, "item added");
                self.state_changed();
                true
            }
            Ok(false) => {
                debug!(item = name, "item at max count");
                false
            }
            Err(err) => {
                warn!(error = %err, "item not added");
                false
            }
        }
    }

    /// Remove one copy of an item. Inside a batch this applies immediately
    /// and only invalidates.
    pub fn remove_item_from_inventory(&mut self, name: &str) -> bool {
        match self.inventory.remove_item(name) {
            Ok(true) => {
                debug!(item = name, "item removed");
                self.state_changed();
                true
            }
            Ok(false) => false,
            Err(err) => {
                warn!(error = %err, "item not removed");
                false
            }
        }
    }

    /// Mark a location checked. Does not touch reachability.
    pub fn check_location(&mut self, name: &str) -> bool {
        if self.world.location_id(name).is_none() {
            warn!(location = name, "unknown location");
            return false;
        }
        let changed = self.checked.insert(name.to_string());
        if changed {
            self.checked_changed();
        }
        changed
    }

    pub fn uncheck_location(&mut self, name: &str) -> bool {
        let changed = self.checked.remove(name);
        if changed {
            self.checked_changed();
        }
        changed
    }

    pub fn set_flag(&mut self, name: &str) -> bool {
        let changed = self.flags.set_flag(name);
        if changed {
            self.state_changed();
        }
        changed
    }

    pub fn clear_flag(&mut self, name: &str) -> bool {
        let changed = self.flags.clear_flag(name);
        if changed {
            self.state_changed();
        }
        changed
    }

    pub fn set_event(&mut self, name: &str) -> bool {
        let changed = self.flags.set_event(name);
        if changed {
            self.state_changed();
        }
        changed
    }

    /// Replace the settings dictionary, re-deriving setting flags.
    pub fn load_settings(&mut self, settings: BTreeMap<String, Value>) {
        self.flags.load_settings(settings);
        self.state_changed();
    }

    /// Drop every item, including granted event items.
    pub fn clear_inventory(&mut self) {
        self.inventory.clear();
        self.state_changed();
    }

    /// Drop items, flags, events and checked locations. Settings, shops and
    /// the world are kept.
    pub fn clear_state(&mut self) {
        self.inventory.clear();
        self.flags.clear();
        self.checked.clear();
        self.batch = None;
        self.state_changed();
    }

    fn state_changed(&mut self) {
        self.cache.invalidate();
        if self.batch.is_none() {
            self.recompute();
        }
    }

    fn checked_changed(&mut self) {
        if self.config.emit_on_check && self.cache.is_clean() {
            self.emit();
        }
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    /// Start staging item grants. A batch already open is kept as is.
    pub fn begin_batch_update(&mut self, defer_recompute: bool) {
        if self.batch.is_some() {
            debug!("batch already open");
            return;
        }
        self.batch = Some(BatchCoordinator::new(defer_recompute));
    }

    /// Apply staged grants. With `defer_recompute` the engine recomputes
    /// and emits once if anything changed; otherwise it only invalidates.
    pub fn commit_batch_update(&mut self) -> BatchOutcome {
        let Some(batch) = self.batch.take() else {
            debug!("commit without an open batch");
            return BatchOutcome::default();
        };
        let recompute = batch.defer_recompute();
        let staged = batch.len();
        let outcome = batch.commit(&mut self.inventory);
        if outcome.changed {
            self.cache.invalidate();
        }
        info!(staged, applied = outcome.applied.len(), "batch committed");
        if recompute && !self.cache.is_clean() {
            self.recompute();
        }
        outcome
    }

    /// Discard staged grants. Removals made during the batch stay applied.
    pub fn cancel_batch_update(&mut self) -> bool {
        self.batch.take().is_some()
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_region_reachable(&mut self, name: &str) -> bool {
        self.ensure_fresh();
        self.world
            .region_id(name)
            .is_some_and(|id| self.reach.reachable.contains(&id))
    }

    /// Region reachable and the location's rule (if any) passes.
    pub fn is_location_accessible(&mut self, name: &str) -> bool {
        self.ensure_fresh();
        self.world
            .location_id(name)
            .is_some_and(|id| self.location_passes(id))
    }

    /// Source region reachable and the exit's rule (if any) passes.
    pub fn is_exit_accessible(&mut self, region: &str, exit: &str) -> bool {
        self.ensure_fresh();
        let Some(exit) = self.world.exit_id(region, exit).and_then(|id| self.world.exit(id))
        else {
            return false;
        };
        if !self.reach.reachable.contains(&exit.source) {
            return false;
        }
        exit.rule
            .as_ref()
            .is_none_or(|r| rule::evaluate_definite(r, &self.live_view()))
    }

    /// The first-discovered route from a start region, start first. `None`
    /// if the region is unknown or unreachable.
    pub fn get_path_to_region(&mut self, name: &str) -> Option<Vec<PathEntry>> {
        self.ensure_fresh();
        let target = self.world.region_id(name)?;
        if !self.reach.reachable.contains(&target) {
            return None;
        }
        let region_name = |id: RegionId| self.world.region(id).map(|r| r.name.clone());

        let mut entries = Vec::new();
        let mut current = target;
        for _ in 0..=self.world.region_count() {
            match self.reach.paths.get(current) {
                Some(step) => {
                    entries.push(PathEntry {
                        region: region_name(current)?,
                        entrance: self.world.exit(step.entrance).map(|e| e.name.clone()),
                        previous: region_name(step.previous),
                    });
                    current = step.previous;
                }
                None => {
                    entries.push(PathEntry {
                        region: region_name(current)?,
                        entrance: None,
                        previous: None,
                    });
                    break;
                }
            }
        }
        entries.reverse();
        Some(entries)
    }

    /// Reachable region names, sorted.
    pub fn reachable_regions(&mut self) -> Vec<String> {
        self.ensure_fresh();
        let mut names: Vec<String> = self
            .world
            .regions()
            .filter(|(id, _)| self.reach.reachable.contains(id))
            .map(|(_, r)| r.name.clone())
            .collect();
        names.sort();
        names
    }

    /// The complement of [`reachable_regions`](Self::reachable_regions).
    pub fn unreachable_regions(&mut self) -> Vec<String> {
        self.ensure_fresh();
        let mut names: Vec<String> = self
            .world
            .regions()
            .filter(|(id, _)| !self.reach.reachable.contains(id))
            .map(|(_, r)| r.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Accessible location names, sorted.
    pub fn accessible_locations(&mut self) -> Vec<String> {
        self.ensure_fresh();
        let mut names: Vec<String> = self
            .world
            .locations()
            .filter(|(id, _)| self.location_passes(*id))
            .map(|(_, l)| l.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn get_snapshot(&mut self) -> WorldSnapshot {
        self.ensure_fresh();
        self.project()
    }

    /// Recompute now if the cache is dirty.
    pub fn ensure_fresh(&mut self) {
        if self.cache.is_dirty() {
            self.recompute();
        }
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Completed recomputations.
    pub fn recompute_count(&self) -> u64 {
        self.cache.recomputes()
    }

    /// Invalidations dropped because they arrived mid-recompute.
    pub fn ignored_invalidations(&self) -> u64 {
        self.cache.ignored()
    }

    fn live_view(&self) -> LiveView<'_> {
        LiveView::new(
            &self.world,
            &self.inventory,
            &self.flags,
            &self.reach.reachable,
            self.config.max_rule_depth,
        )
    }

    fn location_passes(&self, id: LocationId) -> bool {
        let Some(location) = self.world.location(id) else {
            return false;
        };
        self.reach.reachable.contains(&location.region)
            && location
                .rule
                .as_ref()
                .is_none_or(|r| rule::evaluate_definite(r, &self.live_view()))
    }

    fn project(&self) -> WorldSnapshot {
        project(
            &self.world,
            &self.inventory,
            &self.flags,
            &self.checked,
            &self.reach.reachable,
            self.config.max_rule_depth,
        )
    }

    fn emit(&mut self) {
        if self.sink.is_none() {
            return;
        }
        let snapshot = self.project();
        if let Some(sink) = self.sink.as_mut() {
            sink(snapshot);
            self.snapshots_emitted += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Recompute
    // -----------------------------------------------------------------------

    fn recompute(&mut self) {
        if !self.cache.begin() {
            return;
        }
        let world = Arc::clone(&self.world);
        self.reach = FixpointState::seeded(&world);

        let mut rounds = 0u32;
        loop {
            rounds += 1;
            let sweep = self.reach.sweep(
                &world,
                &self.inventory,
                &self.flags,
                self.config.max_rule_depth,
            );
            let granted = self.collect_events(&world);
            debug!(
                round = rounds,
                reached = sweep.reached,
                passes = sweep.passes,
                granted,
                "fixpoint round"
            );
            if granted == 0 {
                break;
            }
            if rounds >= self.config.max_outer_iterations {
                warn!(rounds, "fixpoint stopped at iteration limit");
                break;
            }
        }

        self.cache.finish();
        info!(
            reachable = self.reach.reachable.len(),
            regions = world.region_count(),
            rounds,
            "reachability recomputed"
        );
        self.emit();
    }

    /// Grant event items at reachable locations whose rules pass. Returns
    /// how many grants changed state.
    fn collect_events(&mut self, world: &World) -> usize {
        let grants: Vec<LocationId> = {
            let view = self.live_view();
            world
                .event_locations()
                .iter()
                .copied()
                .filter(|&id| {
                    let Some(location) = world.location(id) else {
                        return false;
                    };
                    let Some(item) = &location.item else {
                        return false;
                    };
                    self.reach.reachable.contains(&location.region)
                        && !self.inventory.has(&item.name)
                        && location
                            .rule
                            .as_ref()
                            .is_none_or(|r| rule::evaluate_definite(r, &view))
                })
                .collect()
        };

        let mut granted = 0;
        for id in grants {
            let Some(location) = world.location(id) else {
                continue;
            };
            let Some(item) = &location.item else {
                continue;
            };
            let added = self.inventory.add_item(&item.name).unwrap_or(false);
            let (_, raised) = self.flags.collect(&item.name);
            self.checked.insert(location.name.clone());
            self.cache.invalidate();
            if added || raised {
                granted += 1;
                debug!(location = %location.name, item = %item.name, "event granted");
            }
        }
        granted
    }
}
