//! Loading pipeline: reads world documents and engine configs, checks the
//! schema version, compiles access rules and builds the immutable world.
//!
//! Format detection (RON/JSON/TOML) and file discovery work the same way
//! for every file kind; world documents add a version probe on top.

use crate::schema::{RegionEntry, SlotData, VersionProbe, WorldDocument};
use randotrack_core::config::EngineConfig;
use randotrack_core::engine::Engine;
use randotrack_core::graph::{PlacedItem, World, WorldBuilder, WorldError};
use randotrack_core::helper::HelperRegistry;
use randotrack_core::registry::{ItemDef, ItemRegistry, ItemRegistryBuilder, RegistryError};
use randotrack_core::rule::{self, Rule, RuleCompileError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The only world document schema this loader accepts.
pub const SCHEMA_VERSION: u32 = 3;

/// Base file names looked up by [`load_world_dir`].
pub const WORLD_FILE: &str = "world";
pub const CONFIG_FILE: &str = "engine";

/// Stand-in path for documents parsed from memory.
const IN_MEMORY: &str = "<memory>";

// ===========================================================================
// Errors
// ===========================================================================

/// File-level failures shared by every document kind.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A world document that parsed but cannot become a [`World`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("world document has no schema_version")]
    MissingVersion,

    #[error("unsupported schema_version {found} (expected {SCHEMA_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("player slot {0} is not present in the document")]
    UnknownSlot(u32),

    #[error("item table: {0}")]
    Items(#[from] RegistryError),

    #[error("world graph: {0}")]
    World(#[from] WorldError),

    #[error("access rule of {context}: {source}")]
    Rule {
        context: String,
        #[source]
        source: RuleCompileError,
    },

    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid engine config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Load(#[from] DataLoadError),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = &found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    origin: &Path,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_str(&content, format, path)
}

// ===========================================================================
// World documents
// ===========================================================================

fn check_version(version: Option<u32>) -> Result<(), SchemaError> {
    match version {
        None => Err(SchemaError::MissingVersion),
        Some(SCHEMA_VERSION) => Ok(()),
        Some(found) => Err(SchemaError::UnsupportedVersion { found }),
    }
}

fn parse_document(
    content: &str,
    format: Format,
    origin: &Path,
) -> Result<WorldDocument, SchemaError> {
    let probe: VersionProbe = parse_str(content, format, origin)?;
    check_version(probe.schema_version)?;
    let doc: WorldDocument = parse_str(content, format, origin)?;
    info!(
        origin = %origin.display(),
        slots = doc.slots.len(),
        "loaded world document"
    );
    Ok(doc)
}

/// Parse a world document held in memory.
pub fn load_world_str(content: &str, format: Format) -> Result<WorldDocument, SchemaError> {
    parse_document(content, format, Path::new(IN_MEMORY))
}

pub fn load_world_json(content: &str) -> Result<WorldDocument, SchemaError> {
    load_world_str(content, Format::Json)
}

/// Parse a world document from disk; the format comes from the extension.
pub fn load_world_file(path: &Path) -> Result<WorldDocument, SchemaError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path).map_err(DataLoadError::from)?;
    parse_document(&content, format, path)
}

/// Load `world.*` and the optional `engine.*` from a directory. A missing
/// engine file yields the default config.
pub fn load_world_dir(dir: &Path) -> Result<(WorldDocument, EngineConfig), SchemaError> {
    let world_path = require_data_file(dir, WORLD_FILE)?;
    let doc = load_world_file(&world_path)?;
    let config = match find_data_file(dir, CONFIG_FILE)? {
        Some(path) => load_engine_config(&path)?,
        None => EngineConfig::default(),
    };
    Ok((doc, config))
}

/// Read and validate an engine config file.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = deserialize_file(path)?;
    if config.max_rule_depth == 0 {
        return Err(ConfigError::Invalid {
            field: "max_rule_depth",
            reason: "must be at least 1".to_string(),
        });
    }
    if config.max_outer_iterations == 0 {
        return Err(ConfigError::Invalid {
            field: "max_outer_iterations",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(config)
}

// ===========================================================================
// World construction
// ===========================================================================

fn build_items(slot: &SlotData) -> Result<ItemRegistry, RegistryError> {
    let mut builder = ItemRegistryBuilder::new();
    for (name, entry) in &slot.items {
        builder.register_item(ItemDef {
            name: name.clone(),
            max_count: entry.max_count,
            groups: entry.groups.clone(),
            event: entry.event,
        })?;
    }
    for (base, tiers) in &slot.progression_mapping {
        builder.register_progression(base, tiers.clone())?;
    }
    builder.build()
}

fn compile_rule(
    value: Option<&Value>,
    helpers: &HelperRegistry,
    context: impl FnOnce() -> String,
) -> Result<Option<Rule>, SchemaError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => rule::compile(value, helpers)
            .map(Some)
            .map_err(|source| SchemaError::Rule {
                context: context(),
                source,
            }),
    }
}

/// Build the world for one player slot. Every rule is compiled here, so an
/// unregistered helper fails the load instead of a later evaluation.
pub fn build_world(
    doc: &WorldDocument,
    slot: u32,
    helpers: &HelperRegistry,
) -> Result<Arc<World>, SchemaError> {
    let data = doc
        .slots
        .get(&slot.to_string())
        .ok_or(SchemaError::UnknownSlot(slot))?;

    let items = Arc::new(build_items(data)?);
    let mut builder = WorldBuilder::new(items);
    builder
        .player(slot, data.player_name.clone())
        .mode(&data.game_mode)
        .settings(data.settings.clone());

    // Regions first so exits and locations can refer to any of them.
    let mut regions: Vec<(_, &RegionEntry)> = Vec::with_capacity(data.regions.len());
    for (name, entry) in &data.regions {
        let id = builder.add_region(name)?;
        builder.set_world_half(id, entry.is_light_world, entry.is_dark_world);
        if let Some(shop) = &entry.shop {
            let mut shop = shop.clone();
            shop.region.get_or_insert_with(|| name.clone());
            builder.set_shop(id, shop);
        }
        regions.push((id, entry));
    }

    for (id, entry) in regions {
        for location in &entry.locations {
            let rule = compile_rule(location.access_rule.as_ref(), helpers, || {
                format!("location '{}'", location.name)
            })?;
            let item = location.item.as_ref().map(|placed| PlacedItem {
                name: placed.name.clone(),
                owner_slot: placed.player,
            });
            builder.add_location(id, &location.name, rule, item)?;
        }
        for exit in &entry.exits {
            let rule = compile_rule(exit.access_rule.as_ref(), helpers, || {
                format!("exit '{}'", exit.name)
            })?;
            builder.add_exit(id, &exit.name, &exit.connected_region, rule)?;
        }
    }

    for name in &data.start_regions {
        builder.add_start_region(name);
    }
    for name in &data.starting_items {
        builder.add_starting_item(name);
    }

    let world = builder.build()?;
    debug!(
        slot,
        regions = world.region_count(),
        events = world.event_locations().len(),
        "built world"
    );
    Ok(Arc::new(world))
}

/// Build the world for `slot` and wrap it in a ready engine.
pub fn load_engine(
    doc: &WorldDocument,
    slot: u32,
    helpers: &HelperRegistry,
    config: EngineConfig,
) -> Result<Engine, SchemaError> {
    let world = build_world(doc, slot, helpers)?;
    Ok(Engine::with_config(world, config))
}

// ===========================================================================
// Tests
// ===========================================================================
