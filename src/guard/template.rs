use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::{CaseflowError, Result, common::Vars};

/// Case variable template.
/// Format: `{{#name#}}` or `{{#name.key.subkey#}}`
static VARIABLE_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{#([^.#]+)(?:\.([^#]+))?#\}\}").expect("valid variable template pattern"));
/// Specification environment template.
/// Format: `{{$NAME$}}`
static ENV_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\$([^$]+)\$\}\}").expect("valid env template pattern"));

/// Looks up case variable `name`, descending into `path` (dot separated) if given.
pub fn lookup(
    data: &Vars,
    name: &str,
    path: Option<&str>,
) -> Option<Value> {
    let mut current = data.get_value(name)?.clone();
    for key in path.into_iter().flat_map(|p| p.split('.')) {
        current = match current {
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.into_iter().nth(i))?,
            other => other.get(key).cloned()?,
        };
    }
    Some(current)
}

/// Resolve `{{#name.path#}}` and `{{$NAME$}}` templates into a string.
/// Returns error if any template variable cannot be resolved.
pub fn resolve_template(
    data: &Vars,
    env: &HashMap<String, String>,
    template: &str,
) -> Result<String> {
    let mut result = template.to_string();
    let mut errors: Vec<String> = Vec::new();

    for caps in ENV_TEMPLATE.captures_iter(template) {
        match env.get(&caps[1]) {
            Some(value) => result = result.replace(&caps[0], value),
            None => errors.push(format!("env variable '{}' not found", &caps[1])),
        }
    }

    for caps in VARIABLE_TEMPLATE.captures_iter(template) {
        match lookup(data, &caps[1], caps.get(2).map(|m| m.as_str())) {
            Some(Value::String(s)) => result = result.replace(&caps[0], &s),
            Some(v) => result = result.replace(&caps[0], &v.to_string()),
            None => errors.push(format!("variable '{}' not found", &caps[0])),
        }
    }

    if !errors.is_empty() {
        return Err(CaseflowError::Convert(errors.join(", ")));
    }

    Ok(result)
}

/// Resolve a selector to a JSON value.
///
/// A selector consisting of exactly one variable template yields the raw
/// value (so numbers stay numbers); `None` when that variable is absent.
/// Anything else is resolved as a string template.
pub fn resolve_selector(
    data: &Vars,
    env: &HashMap<String, String>,
    selector: &str,
) -> Result<Option<Value>> {
    let trimmed = selector.trim();
    if let Some(caps) = VARIABLE_TEMPLATE.captures(trimmed) {
        if caps[0].len() == trimmed.len() {
            return Ok(lookup(data, &caps[1], caps.get(2).map(|m| m.as_str())));
        }
    }
    resolve_template(data, env, selector).map(|s| Some(Value::String(s)))
}
