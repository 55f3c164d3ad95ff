//! Specification-time verification of a built net.
//!
//! Every walk here is an explicit worklist over graph indices with a visited
//! set, so cyclic nets terminate.

use std::collections::HashSet;

use petgraph::Direction;

use crate::{
    VerificationError,
    net::{
        SplitType,
        element::{Element, Task},
        net::Net,
    },
};

/// Runs every semantic check on `net` and returns the problems found.
pub fn verify(net: &Net) -> Vec<VerificationError> {
    let mut errors = Vec::new();

    boundaries(net, &mut errors);
    reachability(net, &mut errors);
    for task in net.tasks() {
        task_shape(net, task, &mut errors);
        splits(net, task, &mut errors);
        multi_instance(task, &mut errors);
    }
    variables(net, &mut errors);

    errors
}

fn boundaries(
    net: &Net,
    errors: &mut Vec<VerificationError>,
) {
    if !net.preset(net.input()).is_empty() {
        errors.push(VerificationError::BoundaryFlow {
            net: net.id().to_string(),
            id: net.input().to_string(),
            role: "input".to_string(),
        });
    }
    if !net.postset(net.output()).is_empty() {
        errors.push(VerificationError::BoundaryFlow {
            net: net.id().to_string(),
            id: net.output().to_string(),
            role: "output".to_string(),
        });
    }
}

fn reachability(
    net: &Net,
    errors: &mut Vec<VerificationError>,
) {
    let forward = net.closure(net.input(), Direction::Outgoing);
    let backward = net.closure(net.output(), Direction::Incoming);

    for element in net.elements() {
        let id = element.id();
        if !forward.contains(id) {
            errors.push(VerificationError::Unreachable {
                net: net.id().to_string(),
                id: id.to_string(),
            });
        }
        if !backward.contains(id) {
            errors.push(VerificationError::CannotReachOutput {
                net: net.id().to_string(),
                id: id.to_string(),
            });
        }
    }
}

fn task_shape(
    net: &Net,
    task: &Task,
    errors: &mut Vec<VerificationError>,
) {
    if net.preset(&task.id).is_empty() || net.postset(&task.id).is_empty() {
        errors.push(VerificationError::DanglingTask {
            task: task.id.clone(),
        });
    }
    for id in task.cancellation_set.iter() {
        if !net.contains(id) {
            errors.push(VerificationError::UnknownCancellation {
                task: task.id.clone(),
                id: id.clone(),
            });
        }
    }
}

fn splits(
    net: &Net,
    task: &Task,
    errors: &mut Vec<VerificationError>,
) {
    let postset = net.postset(&task.id);
    let defaults = postset.iter().filter(|f| f.default).count();
    if defaults > 1 {
        errors.push(VerificationError::MultipleDefaults {
            task: task.id.clone(),
        });
    }

    if task.split != SplitType::And && postset.len() > 1 && defaults == 0 {
        let unsatisfiable = postset.iter().all(|f| f.predicate.as_deref().map(|p| p.trim() == "false").unwrap_or(false));
        if unsatisfiable {
            errors.push(VerificationError::UnsatisfiableSplit {
                task: task.id.clone(),
            });
        }
    }
}

fn multi_instance(
    task: &Task,
    errors: &mut Vec<VerificationError>,
) {
    let Some(mi) = task.multi_instance() else {
        return;
    };
    if mi.min < 1 || mi.min > mi.max || mi.threshold < 1 || mi.threshold > mi.max {
        errors.push(VerificationError::InstanceBounds {
            task: task.id.clone(),
            min: mi.min,
            max: mi.max,
            threshold: mi.threshold,
        });
    }
}

fn variables(
    net: &Net,
    errors: &mut Vec<VerificationError>,
) {
    let declared: HashSet<&str> = net.variables().iter().map(|v| v.name.as_str()).collect();
    let mut joining = HashSet::new();

    for task in net.tasks() {
        let mi_bindings = task.multi_instance().into_iter().flat_map(|mi| mi.splitting.iter().chain(mi.joining.iter()));
        for variable in task.inputs.iter().chain(task.outputs.iter()).chain(mi_bindings) {
            if !declared.contains(variable.as_str()) {
                errors.push(VerificationError::UnknownVariable {
                    task: task.id.clone(),
                    variable: variable.clone(),
                });
            }
        }
        if let Some(joined) = task.multi_instance().and_then(|mi| mi.joining.as_ref()) {
            joining.insert((task.id.as_str(), joined.as_str()));
        }
    }

    for task in net.tasks() {
        let reads = task.inputs.iter().chain(task.multi_instance().and_then(|mi| mi.splitting.as_ref()));
        for variable in reads {
            let initialised = net.variables().iter().any(|v| &v.name == variable && v.initial.is_some());
            if initialised || !declared.contains(variable.as_str()) {
                continue;
            }
            if reads_uninitialised(net, task, variable, &joining) {
                errors.push(VerificationError::UninitialisedVariable {
                    task: task.id.clone(),
                    variable: variable.clone(),
                });
            }
        }
    }
}

/// Walks backwards from `task` and reports whether the input condition can
/// be reached along a path on which no task writes `variable`.
fn reads_uninitialised(
    net: &Net,
    task: &Task,
    variable: &str,
    joining: &HashSet<(&str, &str)>,
) -> bool {
    let writes = |element: &Element| match element {
        Element::Task(t) => t.outputs.iter().any(|o| o == variable) || joining.contains(&(t.id.as_str(), variable)),
        Element::Condition(_) => false,
    };

    let mut visited: HashSet<&str> = HashSet::new();
    let mut worklist: Vec<&str> = net.neighbors(&task.id, Direction::Incoming);

    while let Some(id) = worklist.pop() {
        if !visited.insert(id) {
            continue;
        }
        if id == net.input() {
            return true;
        }
        match net.element(id) {
            Some(element) if writes(element) => continue,
            Some(_) => worklist.extend(net.neighbors(id, Direction::Incoming)),
            None => continue,
        }
    }
    false
}
