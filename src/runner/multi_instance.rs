//! Multi-instance bookkeeping.
//!
//! A multi-instance task holds one busy token while its instances run. The
//! instances themselves are work items; this module decides how many to
//! create, when the task may synchronize, and what the joined output is.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    FireError,
    common::Vars,
    net::{CreationMode, MultiInstanceTask, Task},
    runner::{WorkItem, WorkItemId, WorkItemStatus},
};

/// Instance work items of one busy multi-instance task.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InstanceSet {
    pub items: Vec<WorkItemId>,
    pub threshold: usize,
    pub max: usize,
    pub creation: CreationMode,
}

/// Instance counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct InstanceCounts {
    pub live: usize,
    pub completed: usize,
}

impl InstanceSet {
    pub fn new(
        mi: &MultiInstanceTask,
        count: usize,
    ) -> Self {
        let threshold = match mi.creation {
            CreationMode::Static => mi.threshold.min(count),
            CreationMode::Dynamic => mi.threshold,
        };
        Self {
            items: Vec::with_capacity(count),
            threshold,
            max: mi.max,
            creation: mi.creation,
        }
    }

    pub fn counts(
        &self,
        work_items: &BTreeMap<WorkItemId, WorkItem>,
    ) -> InstanceCounts {
        let mut counts = InstanceCounts::default();
        for item in self.items.iter().filter_map(|id| work_items.get(id)) {
            match item.status {
                WorkItemStatus::Enabled | WorkItemStatus::Started => counts.live += 1,
                WorkItemStatus::Completed => counts.completed += 1,
                _ => {}
            }
        }
        counts
    }

    /// Completed instances have met the threshold.
    pub fn ready(
        &self,
        work_items: &BTreeMap<WorkItemId, WorkItem>,
    ) -> bool {
        self.counts(work_items).completed >= self.threshold
    }

    /// A static set whose live and completed instances together fall short of the threshold.
    pub fn unreachable(
        &self,
        work_items: &BTreeMap<WorkItemId, WorkItem>,
    ) -> bool {
        let counts = self.counts(work_items);
        self.creation == CreationMode::Static && counts.completed + counts.live < self.threshold
    }

    pub fn live(
        &self,
        work_items: &BTreeMap<WorkItemId, WorkItem>,
    ) -> Vec<WorkItemId> {
        self.items.iter().filter(|id| work_items.get(*id).map(|w| w.is_live()).unwrap_or(false)).cloned().collect()
    }
}

/// Input data of each instance to create when `task` starts.
///
/// The splitting variable, if any, must hold a JSON array with one element
/// per instance; a scalar counts as a single element. The instance count is
/// padded up to `min` with empty inputs and may not exceed `max`.
pub(crate) fn instance_inputs(
    task: &Task,
    mi: &MultiInstanceTask,
    data: &Vars,
) -> Result<Vec<Vars>, FireError> {
    let mut inputs: Vec<Vars> = match mi.splitting.as_deref() {
        Some(var) => match data.get_value(var) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(|item| Vars::new().with(var, item)).collect(),
            Some(item) => vec![Vars::new().with(var, item)],
        },
        None => Vec::new(),
    };

    if inputs.len() > mi.max {
        return Err(FireError::InstanceBound {
            task: task.id.clone(),
            requested: inputs.len(),
            max: mi.max,
        });
    }
    while inputs.len() < mi.min {
        inputs.push(Vars::new());
    }
    Ok(inputs)
}

/// Output of the completed instances collected for the joining variable.
///
/// Each instance contributes its value of the variable, or its whole output
/// when it did not set the variable.
pub(crate) fn joined_output(
    var: &str,
    set: &InstanceSet,
    work_items: &BTreeMap<WorkItemId, WorkItem>,
) -> Value {
    let values = set
        .items
        .iter()
        .filter_map(|id| work_items.get(id))
        .filter(|item| item.status == WorkItemStatus::Completed)
        .map(|item| item.outputs.get_value(var).cloned().unwrap_or_else(|| Value::from(item.outputs.clone())))
        .collect();
    Value::Array(values)
}
