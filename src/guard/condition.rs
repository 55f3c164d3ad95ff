use std::{collections::HashMap, sync::Arc};

use serde_json::Value;

use crate::{
    CaseflowError, Result,
    common::{MemCache, Vars},
    guard::{GuardEvaluator, template},
};

use super::models::*;

const GROUP_CACHE_SIZE: usize = 256;

/// Built-in predicate evaluator.
///
/// Understands three predicate forms:
/// - the literals `true` and `false`
/// - a bare (optionally dotted) variable name naming a boolean case variable
/// - a JSON [`ConditionGroup`]
#[derive(Clone)]
pub struct ConditionEvaluator {
    env: HashMap<String, String>,
    groups: MemCache<String, Arc<ConditionGroup>>,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl ConditionEvaluator {
    pub fn new(env: HashMap<String, String>) -> Self {
        Self {
            env,
            groups: MemCache::new(GROUP_CACHE_SIZE),
        }
    }

    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "logical_operator": { "type": "string", "enum": ["and", "or"] },
                "conditions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "variable_selector": { "type": "string" },
                            "comparison_operator": { "type": "string" },
                            "value": {}
                        },
                        "required": ["variable_selector", "comparison_operator"]
                    }
                }
            },
            "required": ["conditions"]
        })
    }

    /// Parses a condition group, reusing the cached parse of an identical predicate.
    fn group(
        &self,
        predicate: &str,
    ) -> Result<Arc<ConditionGroup>> {
        let key = predicate.to_string();
        if let Some(group) = self.groups.get(&key) {
            return Ok(group);
        }
        let params: Value = serde_json::from_str(predicate)?;
        jsonschema::validate(&Self::schema(), &params)?;
        let group = Arc::new(serde_json::from_value::<ConditionGroup>(params)?);
        self.groups.set(key, group.clone());
        Ok(group)
    }

    fn variable(
        &self,
        name: &str,
        data: &Vars,
    ) -> Result<bool> {
        let (head, path) = match name.split_once('.') {
            Some((head, path)) => (head, Some(path)),
            None => (name, None),
        };
        match template::lookup(data, head, path) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(other) => Err(CaseflowError::Convert(format!("variable '{}' is not a boolean: {}", name, other))),
        }
    }

    /// Evaluate a single comparison
    fn evaluate_comparison(
        &self,
        actual: &Option<Value>,
        operator: ComparisonOperator,
        expected: &Option<ConditionValue>,
    ) -> bool {
        match operator {
            ComparisonOperator::Null => actual.is_none() || matches!(actual, Some(Value::Null)),
            ComparisonOperator::NotNull => actual.is_some() && !matches!(actual, Some(Value::Null)),
            ComparisonOperator::Empty => match actual {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(Value::Array(arr)) => arr.is_empty(),
                Some(Value::Object(obj)) => obj.is_empty(),
                _ => false,
            },
            ComparisonOperator::NotEmpty => !self.evaluate_comparison(actual, ComparisonOperator::Empty, expected),
            _ => {
                let (Some(actual), Some(expected)) = (actual, expected) else {
                    return false;
                };
                self.evaluate_with_value(actual, operator, expected)
            }
        }
    }

    fn evaluate_with_value(
        &self,
        actual: &Value,
        operator: ComparisonOperator,
        expected: &ConditionValue,
    ) -> bool {
        match operator {
            ComparisonOperator::Contains => eval_contains(actual, expected),
            ComparisonOperator::NotContains => !eval_contains(actual, expected),
            ComparisonOperator::StartWith => matches!((actual, expected), (Value::String(s), ConditionValue::Str(e)) if s.starts_with(e.as_str())),
            ComparisonOperator::EndWith => matches!((actual, expected), (Value::String(s), ConditionValue::Str(e)) if s.ends_with(e.as_str())),
            ComparisonOperator::Is => eval_is(actual, expected),
            ComparisonOperator::IsNot => !eval_is(actual, expected),
            ComparisonOperator::In => eval_in(actual, expected),
            ComparisonOperator::NotIn => !eval_in(actual, expected),
            ComparisonOperator::AllOf => match (actual, expected) {
                (Value::Array(arr), ConditionValue::List(list)) => list.iter().all(|e| arr.iter().any(|v| v.as_str() == Some(e.as_str()))),
                _ => false,
            },
            ComparisonOperator::Eq => eval_eq(actual, expected),
            ComparisonOperator::Ne => !eval_eq(actual, expected),
            ComparisonOperator::Gt => eval_cmp(actual, expected, |a, b| a > b),
            ComparisonOperator::Lt => eval_cmp(actual, expected, |a, b| a < b),
            ComparisonOperator::Ge => eval_cmp(actual, expected, |a, b| a >= b),
            ComparisonOperator::Le => eval_cmp(actual, expected, |a, b| a <= b),
            _ => false,
        }
    }

    /// Process conditions for a group
    fn process_conditions(
        &self,
        group: &ConditionGroup,
        data: &Vars,
    ) -> Result<bool> {
        let mut results = Vec::with_capacity(group.conditions.len());
        for condition in group.conditions.iter() {
            let actual = template::resolve_selector(data, &self.env, &condition.variable_selector)?;
            results.push(self.evaluate_comparison(&actual, condition.comparison_operator, &condition.value));
        }

        Ok(match group.logical_operator {
            LogicalOperator::And => results.iter().all(|r| *r),
            LogicalOperator::Or => results.iter().any(|r| *r),
        })
    }
}

impl GuardEvaluator for ConditionEvaluator {
    fn evaluate(
        &self,
        predicate: &str,
        data: &Vars,
    ) -> Result<bool> {
        let predicate = predicate.trim();
        match predicate {
            "true" => Ok(true),
            "false" => Ok(false),
            p if p.starts_with('{') => {
                let group = self.group(p)?;
                self.process_conditions(&group, data)
            }
            p if is_variable_name(p) => self.variable(p, data),
            p => Err(CaseflowError::Convert(format!("unsupported predicate '{}'", p))),
        }
    }
}

fn is_variable_name(predicate: &str) -> bool {
    !predicate.is_empty() && predicate.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-'))
}

fn eval_contains(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    match (actual, expected) {
        (Value::String(s), ConditionValue::Str(e)) => s.contains(e.as_str()),
        (Value::Array(arr), ConditionValue::Str(e)) => arr.iter().any(|v| v.as_str() == Some(e.as_str())),
        (Value::Array(arr), ConditionValue::Number(n)) => arr.iter().any(|v| v.as_f64() == Some(*n)),
        _ => false,
    }
}

fn eval_is(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    match (actual, expected) {
        (Value::String(s), ConditionValue::Str(e)) => s == e,
        (Value::Bool(b), ConditionValue::Bool(e)) => b == e,
        (Value::Bool(b), ConditionValue::Str(e)) => (*b && e == "true") || (!*b && e == "false"),
        _ => false,
    }
}

fn eval_in(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    match expected {
        ConditionValue::List(list) => match actual {
            Value::String(s) => list.contains(s),
            Value::Number(n) => list.contains(&n.to_string()),
            _ => false,
        },
        ConditionValue::Str(s) => match actual {
            Value::String(a) => s.contains(a.as_str()),
            _ => false,
        },
        _ => false,
    }
}

fn eval_eq(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    match (actual, expected) {
        (Value::Number(n), e) => match (n.as_f64(), e.as_f64()) {
            (Some(a), Some(e)) => a == e,
            _ => false,
        },
        (Value::String(a), ConditionValue::Str(e)) => a == e,
        (Value::Bool(a), ConditionValue::Bool(e)) => a == e,
        _ => false,
    }
}

fn eval_cmp<F>(
    actual: &Value,
    expected: &ConditionValue,
    cmp: F,
) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    let actual = match actual {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    match (actual, expected.as_f64()) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}
