use serde::{Deserialize, Serialize};

/// Engine tuning knobs. Every field has a default, so a config file only
/// needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nesting limit for `can_reach_location` chains inside rules.
    pub max_rule_depth: u32,
    /// Upper bound on inner-loop/event-scan rounds per recompute.
    pub max_outer_iterations: u32,
    /// Emit a snapshot when a location is checked or unchecked.
    pub emit_on_check: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rule_depth: 32,
            max_outer_iterations: 4096,
            emit_on_check: true,
        }
    }
}
