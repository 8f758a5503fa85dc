//! Randotrack Core -- the logic engine beneath a randomizer tracker.
//!
//! Given a randomized world (regions, exits, locations, items with
//! progressive tiers, settings) and a mutable player inventory, this crate
//! computes which regions and locations are reachable and which event
//! items unlock as a consequence. Access rules are data: a JSON rule-tree
//! DSL compiled once at load and interpreted against a [`view::StateView`].
//!
//! # Recompute Pipeline
//!
//! Every mutation through [`engine::Engine`] invalidates the reachability
//! cache. A recompute is a joint fixpoint over region reachability and
//! event items:
//!
//! 1. **Seed** -- Start regions are reachable; their exits are blocked.
//! 2. **Sweep** -- Blocked exits are retried until a pass reaches nothing.
//!    Exits whose rules read a newly reached region are re-queued at once.
//! 3. **Events** -- Event items at reachable, passable locations are granted.
//! 4. **Repeat** -- Sweep and scan again until nothing is granted.
//! 5. **Emit** -- One [`query::WorldSnapshot`] goes to the registered sink.
//!
//! # Tri-State Rules
//!
//! Rules evaluated against the live engine are definite. Rules evaluated
//! against a frozen snapshot (via [`view::SnapshotView`]) return
//! [`tri::Tri::Unknown`] where the projection lacks information, and
//! composite nodes follow Kleene logic so `Unknown` is never coerced.
//!
//! ```rust,ignore
//! let world = Arc::new(builder.build()?);
//! let mut engine = Engine::new(world);
//! engine.add_item_to_inventory("Hookshot");
//! assert!(engine.is_region_reachable("Swamp Palace"));
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Mutation and query API, cache owner.
//! - [`graph::World`] -- Static region graph, built by [`graph::WorldBuilder`].
//! - [`registry::ItemRegistry`] -- Item definitions and progressive tiers.
//! - [`item::Inventory`] -- Owned-item counts with tier resolution.
//! - [`flags::FlagStore`] -- Flags, events, settings and shops.
//! - [`rule::Rule`] -- Compiled access rule; [`helper::HelperRegistry`]
//!   resolves `helper` nodes.
//! - [`batch::BatchCoordinator`] -- Stages multi-item grants.
//! - [`serialize`] -- Versioned binary snapshot encoding via bitcode.

pub mod batch;
pub mod config;
pub mod dirty;
pub mod engine;
pub mod event;
pub mod flags;
pub mod graph;
pub mod helper;
pub mod id;
pub mod item;
pub mod query;
pub mod registry;
pub mod rule;
pub mod serialize;
pub mod tri;
pub mod view;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
