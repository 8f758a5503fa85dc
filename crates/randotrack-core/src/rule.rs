//! Access-rule trees: compilation from JSON and tri-state evaluation.
//!
//! Rule documents are tagged objects:
//!
//! ```json
//! {"type": "and", "conditions": [
//!     {"type": "item_check", "item": "Hookshot"},
//!     {"type": "count_check", "item": "Progressive Sword", "count": 2},
//!     {"type": "helper", "name": "has_any", "args": ["Lamp", "Fire Rod"]},
//!     {"type": "state_method", "method": "can_reach", "args": ["Dark World"]}
//! ]}
//! ```
//!
//! plus `or`, `not` and `constant`; a bare `true`/`false` is a constant.
//! Helper names are resolved against a [`HelperRegistry`] at compile time.
//! Anything else that cannot be understood compiles to
//! [`Rule::Malformed`], which evaluates to the view's fallback.

use crate::helper::{HelperFn, HelperRegistry};
use crate::tri::Tri;
use crate::view::StateView;
use serde_json::{Map, Value};
use tracing::warn;

/// A compiled access rule.
#[derive(Debug, Clone)]
pub enum Rule {
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    Constant(bool),
    ItemCheck {
        item: String,
    },
    CountCheck {
        item: String,
        count: u32,
    },
    Helper {
        name: String,
        func: HelperFn,
        args: Vec<Value>,
    },
    StateMethod {
        method: StateMethod,
        args: Vec<Value>,
    },
    Malformed {
        reason: String,
    },
}

/// Methods that need the engine's reachability state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMethod {
    /// `can_reach` and its alias `can_reach_region`.
    CanReach,
    CanReachLocation,
    HasEvent,
    HasFlag,
    SettingEnabled,
}

impl StateMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "can_reach" | "can_reach_region" => Some(Self::CanReach),
            "can_reach_location" => Some(Self::CanReachLocation),
            "has_event" => Some(Self::HasEvent),
            "has_flag" => Some(Self::HasFlag),
            "setting_enabled" => Some(Self::SettingEnabled),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CanReach => "can_reach",
            Self::CanReachLocation => "can_reach_location",
            Self::HasEvent => "has_event",
            Self::HasFlag => "has_flag",
            Self::SettingEnabled => "setting_enabled",
        }
    }
}

/// A region or location whose reachability a rule reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    Region(String),
    Location(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleCompileError {
    #[error("unregistered helper: {0}")]
    UnknownHelper(String),
}

/// Raised during evaluation. Never escapes [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("helper '{helper}': {reason}")]
    InvalidArgument { helper: String, reason: String },
    #[error("rule nesting exceeded depth {0}")]
    DepthExceeded(u32),
    #[error("unknown region: {0}")]
    UnknownRegion(String),
    #[error("unknown location: {0}")]
    UnknownLocation(String),
    #[error("helper '{helper}' failed: {reason}")]
    Helper { helper: String, reason: String },
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile a JSON rule document.
pub fn compile(value: &Value, helpers: &HelperRegistry) -> Result<Rule, RuleCompileError> {
    let obj = match value {
        Value::Bool(b) => return Ok(Rule::Constant(*b)),
        Value::Object(obj) => obj,
        other => return Ok(malformed(format!("expected an object, got {other}"))),
    };
    let Some(kind) = obj.get("type").and_then(Value::as_str) else {
        return Ok(malformed("missing 'type'".to_string()));
    };

    match kind {
        "and" | "or" => {
            let Some(conditions) = obj.get("conditions").and_then(Value::as_array) else {
                return Ok(malformed(format!("'{kind}' without 'conditions'")));
            };
            let children = conditions
                .iter()
                .map(|c| compile(c, helpers))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if kind == "and" {
                Rule::And(children)
            } else {
                Rule::Or(children)
            })
        }
        "not" => match obj.get("condition") {
            Some(inner) => Ok(Rule::Not(Box::new(compile(inner, helpers)?))),
            None => Ok(malformed("'not' without 'condition'".to_string())),
        },
        "constant" => match obj.get("value").and_then(Value::as_bool) {
            Some(b) => Ok(Rule::Constant(b)),
            None => Ok(malformed("'constant' without a boolean 'value'".to_string())),
        },
        "item_check" => match item_field(obj) {
            Some(item) => Ok(Rule::ItemCheck { item }),
            None => Ok(malformed("'item_check' without 'item'".to_string())),
        },
        "count_check" => {
            let Some(item) = item_field(obj) else {
                return Ok(malformed("'count_check' without 'item'".to_string()));
            };
            let count = match obj.get("count") {
                None => 1,
                Some(v) => match v.as_u64().and_then(|n| u32::try_from(n).ok()) {
                    Some(n) => n,
                    None => return Ok(malformed(format!("invalid count {v}"))),
                },
            };
            Ok(Rule::CountCheck { item, count })
        }
        "helper" => {
            let Some(name) = obj.get("name").and_then(Value::as_str) else {
                return Ok(malformed("'helper' without 'name'".to_string()));
            };
            let func = helpers
                .get(name)
                .ok_or_else(|| RuleCompileError::UnknownHelper(name.to_string()))?;
            Ok(Rule::Helper {
                name: name.to_string(),
                func,
                args: args_field(obj),
            })
        }
        "state_method" => {
            let Some(name) = obj.get("method").and_then(Value::as_str) else {
                return Ok(malformed("'state_method' without 'method'".to_string()));
            };
            match StateMethod::from_name(name) {
                Some(method) => Ok(Rule::StateMethod {
                    method,
                    args: args_field(obj),
                }),
                None => Ok(malformed(format!("unknown state method '{name}'"))),
            }
        }
        other => Ok(malformed(format!("unknown rule type '{other}'"))),
    }
}

fn malformed(reason: String) -> Rule {
    warn!(%reason, "malformed rule node");
    Rule::Malformed { reason }
}

fn item_field(obj: &Map<String, Value>) -> Option<String> {
    obj.get("item").and_then(Value::as_str).map(str::to_string)
}

fn args_field(obj: &Map<String, Value>) -> Vec<Value> {
    match obj.get("args") {
        Some(Value::Array(args)) => args.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    }
}

impl Rule {
    /// Regions and locations whose reachability this rule reads through
    /// `can_reach*` state methods with literal arguments.
    pub fn referenced_targets(&self) -> Vec<RuleTarget> {
        let mut out = Vec::new();
        self.collect_targets(&mut out);
        out
    }

    fn collect_targets(&self, out: &mut Vec<RuleTarget>) {
        match self {
            Rule::And(children) | Rule::Or(children) => {
                for child in children {
                    child.collect_targets(out);
                }
            }
            Rule::Not(inner) => inner.collect_targets(out),
            Rule::StateMethod { method, args } => {
                let names = args.iter().filter_map(Value::as_str);
                match method {
                    StateMethod::CanReach => {
                        out.extend(names.map(|n| RuleTarget::Region(n.to_string())));
                    }
                    StateMethod::CanReachLocation => {
                        out.extend(names.map(|n| RuleTarget::Location(n.to_string())));
                    }
                    _ => {}
                }
            }
            Rule::Helper { name, args, .. } if name == "can_reach_any" => {
                for arg in args {
                    match arg {
                        Value::String(s) => out.push(RuleTarget::Region(s.clone())),
                        Value::Array(items) => out.extend(
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(|s| RuleTarget::Region(s.to_string())),
                        ),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Rule::Malformed { .. })
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate a rule. Never fails: errors are logged and downgraded to
/// [`StateView::fallback`].
pub fn evaluate(rule: &Rule, view: &dyn StateView) -> Tri {
    match try_evaluate(rule, view) {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "rule evaluation failed");
            view.fallback()
        }
    }
}

/// Evaluate and collapse `Unknown` to `false`.
pub fn evaluate_definite(rule: &Rule, view: &dyn StateView) -> bool {
    let result = evaluate(rule, view);
    if result.is_unknown() {
        tracing::debug!("unknown rule result treated as false");
    }
    result.is_true()
}

/// Evaluate, propagating errors. Used for nested evaluation where the
/// caller decides how to downgrade.
pub fn try_evaluate(rule: &Rule, view: &dyn StateView) -> Result<Tri, RuleError> {
    match rule {
        Rule::And(children) => {
            let mut acc = Tri::True;
            for child in children {
                match try_evaluate(child, view)? {
                    Tri::False => return Ok(Tri::False),
                    Tri::Unknown => acc = Tri::Unknown,
                    Tri::True => {}
                }
            }
            Ok(acc)
        }
        Rule::Or(children) => {
            let mut acc = Tri::False;
            for child in children {
                match try_evaluate(child, view)? {
                    Tri::True => return Ok(Tri::True),
                    Tri::Unknown => acc = Tri::Unknown,
                    Tri::False => {}
                }
            }
            Ok(acc)
        }
        Rule::Not(inner) => Ok(!try_evaluate(inner, view)?),
        Rule::Constant(b) => Ok((*b).into()),
        Rule::ItemCheck { item } => Ok(view.has(item)),
        Rule::CountCheck { item, count } => Ok(view
            .count(item)
            .map_or(Tri::Unknown, |n| (n >= *count).into())),
        Rule::Helper { func, args, .. } => func(view, args),
        Rule::StateMethod { method, args } => eval_state_method(*method, args, view),
        Rule::Malformed { .. } => Ok(view.fallback()),
    }
}

fn eval_state_method(
    method: StateMethod,
    args: &[Value],
    view: &dyn StateView,
) -> Result<Tri, RuleError> {
    let name = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| RuleError::InvalidArgument {
            helper: method.name().to_string(),
            reason: "expected a name as the first argument".to_string(),
        })?;
    match method {
        StateMethod::CanReach => view.can_reach_region(name),
        StateMethod::CanReachLocation => view.can_reach_location(name),
        StateMethod::HasEvent => Ok(view.has_event(name)),
        StateMethod::HasFlag => Ok(view.has_flag(name)),
        StateMethod::SettingEnabled => Ok(view.setting_enabled(name)),
    }
}
