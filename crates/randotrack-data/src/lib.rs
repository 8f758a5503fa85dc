//! World document loading for randotrack.
//!
//! A world document (JSON, RON or TOML) carries one entry per player slot:
//! regions with their locations and exits, the item table with progressive
//! tiers, settings and start regions. [`loader::build_world`] turns one slot
//! into an immutable [`randotrack_core::graph::World`].

pub mod loader;
pub mod schema;

pub use loader::{
    build_world, load_engine, load_engine_config, load_world_dir, load_world_file,
    load_world_json, load_world_str, ConfigError, DataLoadError, Format, SchemaError,
    SCHEMA_VERSION,
};
pub use schema::WorldDocument;
