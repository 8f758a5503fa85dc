//! Named helper functions callable from `helper` rule nodes.
//!
//! Rules are shipped as data, so helpers are looked up by string key. The
//! lookup happens once, when a rule tree is compiled; an unregistered name
//! fails the load instead of failing every evaluation.

use crate::rule::RuleError;
use crate::tri::Tri;
use crate::view::StateView;
use serde_json::Value;
use std::collections::HashMap;

/// A pure helper: `(view, args) -> result`.
pub type HelperFn = fn(&dyn StateView, &[Value]) -> Result<Tri, RuleError>;

/// String key -> helper function.
#[derive(Debug, Clone, Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, HelperFn>,
}

impl HelperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in helpers below.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("has_any", has_any);
        registry.register("has_all", has_all);
        registry.register("has_group", has_group);
        registry.register("has_flag", has_flag);
        registry.register("has_event", has_event);
        registry.register("setting_is", setting_is);
        registry.register("can_reach_any", can_reach_any);
        registry
    }

    /// Register (or replace) a helper.
    pub fn register(&mut self, name: &str, func: HelperFn) {
        self.helpers.insert(name.to_string(), func);
    }

    pub fn get(&self, name: &str) -> Option<HelperFn> {
        self.helpers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Collect string arguments, flattening one level of arrays so both
/// `["A", "B"]` and `[["A", "B"]]` work.
pub fn string_args<'a>(helper: &str, args: &'a [Value]) -> Result<Vec<&'a str>, RuleError> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::String(s) => out.push(s.as_str()),
            Value::Array(items) => {
                for item in items {
                    out.push(item.as_str().ok_or_else(|| invalid(helper, item))?);
                }
            }
            other => return Err(invalid(helper, other)),
        }
    }
    Ok(out)
}

pub fn string_arg<'a>(helper: &str, args: &'a [Value], index: usize) -> Result<&'a str, RuleError> {
    let arg = args.get(index).ok_or_else(|| RuleError::InvalidArgument {
        helper: helper.to_string(),
        reason: format!("missing argument {index}"),
    })?;
    arg.as_str().ok_or_else(|| invalid(helper, arg))
}

fn invalid(helper: &str, value: &Value) -> RuleError {
    RuleError::InvalidArgument {
        helper: helper.to_string(),
        reason: format!("expected a string, got {value}"),
    }
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

fn has_any(view: &dyn StateView, args: &[Value]) -> Result<Tri, RuleError> {
    let names = string_args("has_any", args)?;
    Ok(Tri::any(names.into_iter().map(|n| view.has(n))))
}

fn has_all(view: &dyn StateView, args: &[Value]) -> Result<Tri, RuleError> {
    let names = string_args("has_all", args)?;
    Ok(Tri::all(names.into_iter().map(|n| view.has(n))))
}

/// `has_group(group, min = 1)`.
fn has_group(view: &dyn StateView, args: &[Value]) -> Result<Tri, RuleError> {
    let group = string_arg("has_group", args, 0)?;
    let min = match args.get(1) {
        None => 1,
        Some(v) => v.as_u64().ok_or_else(|| RuleError::InvalidArgument {
            helper: "has_group".to_string(),
            reason: format!("expected a count, got {v}"),
        })?,
    };
    Ok(view
        .count_group(group)
        .map_or(Tri::Unknown, |n| (u64::from(n) >= min).into()))
}

fn has_flag(view: &dyn StateView, args: &[Value]) -> Result<Tri, RuleError> {
    Ok(view.has_flag(string_arg("has_flag", args, 0)?))
}

fn has_event(view: &dyn StateView, args: &[Value]) -> Result<Tri, RuleError> {
    Ok(view.has_event(string_arg("has_event", args, 0)?))
}

/// `setting_is(name, expected)`.
fn setting_is(view: &dyn StateView, args: &[Value]) -> Result<Tri, RuleError> {
    let name = string_arg("setting_is", args, 0)?;
    let expected = args.get(1).unwrap_or(&Value::Bool(true));
    Ok(view.setting_equals(name, expected))
}

fn can_reach_any(view: &dyn StateView, args: &[Value]) -> Result<Tri, RuleError> {
    let mut acc = Tri::False;
    for region in string_args("can_reach_any", args)? {
        acc = acc | view.can_reach_region(region)?;
        if acc.is_true() {
            break;
        }
    }
    Ok(acc)
}
