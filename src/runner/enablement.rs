//! Enablement evaluation.
//!
//! A pure query over a net and a marking. Nothing here mutates, so the
//! evaluator may be called any number of times between firings and always
//! returns the same answer for the same inputs.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    net::{JoinType, Net, Task},
    runner::Marking,
};

/// How an enabled task fires.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EnableMode {
    /// consume join inputs
    Join,
    /// consume the busy token of a started task, or of a multi-instance task
    /// whose threshold is met
    Synchronize,
}

/// A task eligible to fire, with the places its firing will consume.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EnabledTask {
    pub task: String,
    /// places losing one token each when the task fires
    pub inputs: Vec<String>,
    pub mode: EnableMode,
}

/// Enabled tasks of `net` under `marking`, in declaration order.
///
/// No multi-instance task is ready to synchronize.
pub fn enabled_tasks(
    net: &Net,
    marking: &Marking,
) -> Vec<EnabledTask> {
    evaluate(net, marking, &BTreeSet::new())
}

/// Enabled tasks of `net` under `marking`; `ready` names the busy tasks
/// that may complete: started tasks, and multi-instance tasks whose
/// completion threshold has been met.
pub fn evaluate(
    net: &Net,
    marking: &Marking,
    ready: &BTreeSet<String>,
) -> Vec<EnabledTask> {
    net.tasks().filter_map(|task| evaluate_task(net, marking, ready, task)).collect()
}

/// Enablement of a single task.
pub fn evaluate_task(
    net: &Net,
    marking: &Marking,
    ready: &BTreeSet<String>,
    task: &Task,
) -> Option<EnabledTask> {
    // a busy task can only synchronize
    if marking.is_marked(&task.id) {
        return ready.contains(&task.id).then(|| EnabledTask {
            task: task.id.clone(),
            inputs: vec![task.id.clone()],
            mode: EnableMode::Synchronize,
        });
    }

    let presets: Vec<&str> = net.preset(&task.id).into_iter().map(|f| f.source.as_str()).collect();
    if presets.is_empty() {
        return None;
    }

    let inputs: Vec<String> = match task.join {
        JoinType::And => {
            if !presets.iter().all(|p| marking.is_marked(p)) {
                return None;
            }
            presets.iter().map(|p| p.to_string()).collect()
        }
        JoinType::Xor => vec![presets.iter().find(|p| marking.is_marked(p))?.to_string()],
        JoinType::Or => {
            if !or_join_enabled(net, marking, &task.id, &presets) {
                return None;
            }
            presets.iter().filter(|p| marking.is_marked(p)).map(|p| p.to_string()).collect()
        }
    };

    Some(EnabledTask {
        task: task.id.clone(),
        inputs,
        mode: EnableMode::Join,
    })
}

/// OR-join rule.
///
/// Enabled iff at least one preset is marked and no other marked place can
/// still deliver a token to an unmarked preset. The forward walk from each
/// other marked place may not pass through the join or its marked presets,
/// since a token consumed there can no longer arrive on another branch.
fn or_join_enabled(
    net: &Net,
    marking: &Marking,
    join: &str,
    presets: &[&str],
) -> bool {
    let (marked, unmarked): (Vec<&str>, Vec<&str>) = presets.iter().partition(|p| marking.is_marked(p));
    if marked.is_empty() {
        return false;
    }
    if unmarked.is_empty() {
        return true;
    }

    let targets: HashSet<&str> = unmarked.into_iter().collect();
    let mut blocked: HashSet<&str> = marked.into_iter().collect();
    blocked.insert(join);

    !marking.places().filter(|place| !blocked.contains(place)).any(|place| net.reaches_any(place, &targets, &blocked))
}
