//! Flags, one-way events, the settings dictionary and shop data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Canonical item names that map onto event flags. Collecting one of these
/// items raises the event instead of a generic flag.
pub const EVENT_ITEMS: &[(&str, &str)] = &[
    ("Crystal 1", "crystal_1"),
    ("Crystal 2", "crystal_2"),
    ("Crystal 3", "crystal_3"),
    ("Crystal 4", "crystal_4"),
    ("Crystal 5", "crystal_5"),
    ("Crystal 6", "crystal_6"),
    ("Crystal 7", "crystal_7"),
    ("Green Pendant", "green_pendant"),
    ("Blue Pendant", "blue_pendant"),
    ("Red Pendant", "red_pendant"),
    ("Beat Agahnim 1", "beat_agahnim_1"),
    ("Beat Agahnim 2", "beat_agahnim_2"),
    ("Beat Ganon", "beat_ganon"),
    ("Triforce", "triforce"),
];

/// Prefix of flags derived from boolean settings.
pub const SETTING_FLAG_PREFIX: &str = "setting:";

/// Map a canonical item name to its event flag.
pub fn process_event_item(name: &str) -> Option<&'static str> {
    EVENT_ITEMS
        .iter()
        .find(|(item, _)| *item == name)
        .map(|(_, event)| *event)
}

/// Loose truthiness for setting values: `false`, `0`, `""`, `null` and empty
/// containers are off; everything else is on.
pub fn setting_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// An item offered by a shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSlot {
    pub item: String,
    pub price: u32,
}

/// Shop contents as shipped with the world data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub slots: Vec<ShopSlot>,
}

/// What [`FlagStore::collect`] did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collected {
    /// Raised a canonical event.
    Event(&'static str),
    /// Fell back to a generic flag named after the item.
    Flag,
}

/// Boolean flags and events plus the settings they are partly derived from.
#[derive(Debug, Clone, Default)]
pub struct FlagStore {
    flags: BTreeSet<String>,
    events: BTreeSet<String>,
    settings: BTreeMap<String, Value>,
    /// Flags currently derived from settings, removed on reload.
    derived: BTreeSet<String>,
    shops: Vec<Shop>,
}

impl FlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Flags --

    /// Returns true if the flag was newly set.
    pub fn set_flag(&mut self, name: &str) -> bool {
        self.flags.insert(name.to_string())
    }

    pub fn clear_flag(&mut self, name: &str) -> bool {
        self.flags.remove(name)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }

    // -- Events --

    /// Raise an event. Canonical item names are translated to their event
    /// flag first. Events are one-way until [`clear`](Self::clear).
    pub fn set_event(&mut self, name: &str) -> bool {
        let event = process_event_item(name).unwrap_or(name);
        self.events.insert(event.to_string())
    }

    pub fn has_event(&self, name: &str) -> bool {
        let event = process_event_item(name).unwrap_or(name);
        self.events.contains(event)
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }

    /// Record that `item` was obtained. Returns what was raised and whether
    /// it was new.
    pub fn collect(&mut self, item: &str) -> (Collected, bool) {
        match process_event_item(item) {
            Some(event) => (Collected::Event(event), self.events.insert(event.to_string())),
            None => (Collected::Flag, self.flags.insert(item.to_string())),
        }
    }

    // -- Settings --

    /// Replace the settings dictionary. Flags derived from a previous load
    /// are dropped and re-derived, so loading twice is the same as once.
    pub fn load_settings(&mut self, settings: BTreeMap<String, Value>) {
        for flag in std::mem::take(&mut self.derived) {
            self.flags.remove(&flag);
        }
        self.settings = settings;
        self.derive_setting_flags();
    }

    fn derive_setting_flags(&mut self) {
        for (key, value) in &self.settings {
            if matches!(value, Value::Bool(true)) {
                let flag = format!("{SETTING_FLAG_PREFIX}{key}");
                if self.flags.insert(flag.clone()) {
                    self.derived.insert(flag);
                }
            }
        }
    }

    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }

    /// The setting's value, or `default` when it is absent.
    pub fn get_setting<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
        self.settings.get(name).unwrap_or(default)
    }

    pub fn settings(&self) -> &BTreeMap<String, Value> {
        &self.settings
    }

    // -- Shops --

    pub fn set_shops(&mut self, shops: Vec<Shop>) {
        self.shops = shops;
    }

    pub fn shops(&self) -> &[Shop] {
        &self.shops
    }

    /// Drop all flags and events. Settings and shops are kept and the
    /// settings-derived flags are restored.
    pub fn clear(&mut self) {
        self.flags.clear();
        self.events.clear();
        self.derived.clear();
        self.derive_setting_flags();
    }
}
