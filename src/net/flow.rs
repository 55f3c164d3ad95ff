//! Flows connecting conditions and tasks.
//!
//! A flow leaving a task may carry a guard predicate, an ordering index used
//! as the tie-break for OR/XOR evaluation, and a default flag marking the
//! fallback taken when no guard holds.

use serde::{Deserialize, Serialize};

use crate::{model::FlowModel, net::element::ElementId};

/// Edge weight of the net graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Flow {
    /// ID of the source element.
    pub source: ElementId,
    /// ID of the target element.
    pub target: ElementId,
    /// Guard evaluated by OR/XOR splits.
    pub predicate: Option<String>,
    /// Evaluation order, ascending.
    pub ordering: u32,
    /// Fallback when no guard holds.
    pub default: bool,
}

impl Flow {
    pub fn new(
        source: &str,
        target: &str,
    ) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            predicate: None,
            ordering: 0,
            default: false,
        }
    }

    /// Copies the guard attributes of `model` onto a flow between `source` and `target`.
    pub fn from_model(
        model: &FlowModel,
        source: &str,
        target: &str,
    ) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            predicate: model.predicate.clone(),
            ordering: model.ordering,
            default: model.default,
        }
    }

    pub fn is_guarded(&self) -> bool {
        self.predicate.is_some()
    }

    /// Sort key giving the deterministic tie-break order of flows.
    pub(crate) fn order_key(&self) -> (u32, &str, &str) {
        (self.ordering, self.target.as_str(), self.source.as_str())
    }
}
