//! Predicate evaluation for split guards, OR-split flows and skip conditions.
//!
//! The runner never interprets predicates; it hands them to a [`GuardEvaluator`]
//! together with the case data. [`ConditionEvaluator`] is the built-in one.

mod condition;
mod models;
pub mod template;

pub use condition::ConditionEvaluator;
pub use models::{ComparisonOperator, Condition, ConditionGroup, ConditionValue, LogicalOperator};

use crate::{Result, common::Vars};

/// Evaluates a guard predicate against case data.
pub trait GuardEvaluator: Send + Sync {
    fn evaluate(
        &self,
        predicate: &str,
        data: &Vars,
    ) -> Result<bool>;
}

impl<F> GuardEvaluator for F
where
    F: Fn(&str, &Vars) -> Result<bool> + Send + Sync,
{
    fn evaluate(
        &self,
        predicate: &str,
        data: &Vars,
    ) -> Result<bool> {
        self(predicate, data)
    }
}
