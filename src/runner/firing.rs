//! Firing results and split evaluation.

use serde::{Deserialize, Serialize};

use crate::{
    FireError, GuardOutcome,
    common::Vars,
    guard::GuardEvaluator,
    net::{Flow, Net, SplitType, Task},
    runner::{EnableMode, WorkItemId},
};

/// Record of one firing.
///
/// Token accounting always balances:
/// `after = before - consumed.len() + produced.len() - cancelled_tokens`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FiringResult {
    pub task: String,
    pub mode: EnableMode,
    /// work item completed by this firing
    pub work_item: Option<WorkItemId>,
    /// one entry per consumed token
    pub consumed: Vec<String>,
    /// one entry per produced token
    pub produced: Vec<String>,
    /// places of the cancellation set that held tokens
    pub cancelled: Vec<String>,
    pub cancelled_tokens: usize,
    /// work items cancelled by the cancellation set or withdrawn because their task lost enablement
    pub cancelled_work_items: Vec<WorkItemId>,
    /// guards evaluated by the split, in evaluation order
    pub guards: Vec<GuardOutcome>,
    /// the net reached its output condition
    pub completed: bool,
    /// sub-net delegated to, for composite tasks
    pub decomposition: Option<String>,
    pub timestamp: i64,
}

/// Selects the outgoing flows of `task` by split type.
///
/// Returns the targets to mark and the guards evaluated on the way. XOR
/// evaluates non-default flows in ascending ordering and stops at the first
/// true one; OR evaluates all of them. Either falls back to the default flow
/// when nothing holds. An unguarded non-default flow counts as true.
pub(crate) fn split_targets(
    net: &Net,
    task: &Task,
    guard: &dyn GuardEvaluator,
    data: &Vars,
) -> Result<(Vec<String>, Vec<GuardOutcome>), FireError> {
    let postset = net.postset(&task.id);
    if task.split == SplitType::And {
        return Ok((postset.iter().map(|f| f.target.clone()).collect(), Vec::new()));
    }

    let mut targets = Vec::new();
    let mut evaluated = Vec::new();
    for flow in postset.iter().filter(|f| !f.default) {
        let value = evaluate(task, flow, guard, data)?;
        evaluated.push(GuardOutcome {
            target: flow.target.clone(),
            predicate: flow.predicate.clone(),
            value,
        });
        if value {
            targets.push(flow.target.clone());
            if task.split == SplitType::Xor {
                break;
            }
        }
    }

    if targets.is_empty() {
        match postset.iter().find(|f| f.default) {
            Some(flow) => targets.push(flow.target.clone()),
            None => {
                return Err(FireError::NoMatchingFlow {
                    task: task.id.clone(),
                    evaluated,
                });
            }
        }
    }
    Ok((targets, evaluated))
}

fn evaluate(
    task: &Task,
    flow: &Flow,
    guard: &dyn GuardEvaluator,
    data: &Vars,
) -> Result<bool, FireError> {
    let Some(predicate) = flow.predicate.as_deref() else {
        return Ok(true);
    };
    guard.evaluate(predicate, data).map_err(|e| FireError::Guard {
        task: task.id.clone(),
        predicate: predicate.to_string(),
        message: e.to_string(),
    })
}

/// Copies `outputs` into `data` through the task's output bindings. A task
/// without bindings passes every output through.
pub(crate) fn bind_outputs(
    task: &Task,
    data: &mut Vars,
    outputs: &Vars,
) {
    if task.outputs.is_empty() {
        data.extend(outputs);
        return;
    }
    for name in task.outputs.iter() {
        if let Some(value) = outputs.get_value(name) {
            data.set(name, value);
        }
    }
}

/// Case data visible to a work item of `task` through its input bindings.
/// A task without bindings sees the whole case.
pub(crate) fn bind_inputs(
    task: &Task,
    data: &Vars,
) -> Vars {
    if task.inputs.is_empty() {
        return data.clone();
    }
    task.inputs.iter().filter_map(|name| data.get_value(name).map(|v| (name.clone(), v.clone()))).collect()
}
