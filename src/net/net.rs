//! Immutable net representation using a directed graph.
//!
//! Conditions and tasks are stored in a petgraph arena and addressed by
//! integer index; an id map resolves element identifiers. A net never changes
//! after construction and is shared read-only by every case of its
//! specification.

use std::collections::{HashMap, HashSet};

use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use crate::{
    VerificationError,
    model::NetModel,
    net::{
        element::{Condition, ConditionKind, Element, ElementId, Task},
        flow::Flow,
    },
};

/// Net-local variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub initial: Option<serde_json::Value>,
}

/// The specification graph of one workflow level.
#[derive(Debug, Clone)]
pub struct Net {
    id: String,
    graph: DiGraph<Element, Flow>,
    index: HashMap<ElementId, NodeIndex>,
    input: NodeIndex,
    output: NodeIndex,
    variables: Vec<Variable>,
}

impl Net {
    /// Builds the graph for `model`, inserting implicit conditions between
    /// directly connected tasks. Structural problems are collected rather
    /// than reported one at a time.
    pub fn build(model: &NetModel) -> std::result::Result<Self, Vec<VerificationError>> {
        let mut errors = Vec::new();
        let mut graph: DiGraph<Element, Flow> = DiGraph::new();
        let mut index: HashMap<ElementId, NodeIndex> = HashMap::new();

        let mut insert = |graph: &mut DiGraph<Element, Flow>, element: Element, errors: &mut Vec<VerificationError>| {
            let id = element.id().to_string();
            if index.contains_key(&id) {
                errors.push(VerificationError::DuplicateElement {
                    net: model.id.clone(),
                    id,
                });
                return;
            }
            let idx = graph.add_node(element);
            index.insert(id, idx);
        };

        for condition in model.conditions.iter() {
            let kind = if condition.id == model.input {
                ConditionKind::Input
            } else if condition.id == model.output {
                ConditionKind::Output
            } else {
                ConditionKind::Internal
            };
            insert(&mut graph, Element::Condition(Condition::from_model(condition, kind)), &mut errors);
        }
        // the boundary conditions may be left implicit in the model
        let task_ids: HashSet<&str> = model.tasks.iter().map(|t| t.id.as_str()).collect();
        for (id, kind) in [(&model.input, ConditionKind::Input), (&model.output, ConditionKind::Output)] {
            if !model.conditions.iter().any(|c| &c.id == id) && !task_ids.contains(id.as_str()) {
                insert(&mut graph, Element::Condition(Condition::new(id, kind)), &mut errors);
            }
        }
        for task in model.tasks.iter() {
            match Task::try_from(task) {
                Ok(task) => insert(&mut graph, Element::Task(task), &mut errors),
                // only a multi-instance task without parameters fails to convert
                Err(_) => errors.push(VerificationError::InstanceBounds {
                    task: task.id.clone(),
                    min: 0,
                    max: 0,
                    threshold: 0,
                }),
            }
        }

        let net_id = model.id.clone();
        let lookup = |index: &HashMap<ElementId, NodeIndex>, id: &str, errors: &mut Vec<VerificationError>| {
            let found = index.get(id).copied();
            if found.is_none() {
                errors.push(VerificationError::UnknownElement {
                    net: net_id.clone(),
                    id: id.to_string(),
                });
            }
            found
        };

        for flow in model.flows.iter() {
            let source = lookup(&index, &flow.source, &mut errors);
            let target = lookup(&index, &flow.target, &mut errors);
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };

            match (graph[source].is_task(), graph[target].is_task()) {
                (false, false) => errors.push(VerificationError::ConditionToCondition {
                    from: flow.source.clone(),
                    to: flow.target.clone(),
                }),
                (true, true) => {
                    let implicit = implicit_condition_id(&flow.source, &flow.target);
                    if index.contains_key(&implicit) {
                        errors.push(VerificationError::DuplicateElement {
                            net: model.id.clone(),
                            id: implicit,
                        });
                        continue;
                    }
                    let idx = graph.add_node(Element::Condition(Condition::new(&implicit, ConditionKind::Implicit)));
                    index.insert(implicit.clone(), idx);
                    graph.add_edge(source, idx, Flow::from_model(flow, &flow.source, &implicit));
                    let mut inbound = Flow::new(&implicit, &flow.target);
                    inbound.ordering = flow.ordering;
                    graph.add_edge(idx, target, inbound);
                }
                _ => {
                    graph.add_edge(source, target, Flow::from_model(flow, &flow.source, &flow.target));
                }
            }
        }

        let input = boundary(&graph, &index, &model.id, &model.input, "input", &mut errors);
        let output = boundary(&graph, &index, &model.id, &model.output, "output", &mut errors);

        match (input, output) {
            (Some(input), Some(output)) if errors.is_empty() => Ok(Self {
                id: model.id.clone(),
                graph,
                index,
                input,
                output,
                variables: model
                    .variables
                    .iter()
                    .map(|v| Variable {
                        name: v.name.clone(),
                        initial: v.initial.clone(),
                    })
                    .collect(),
            }),
            _ => Err(errors),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// id of the input condition
    pub fn input(&self) -> &str {
        self.graph[self.input].id()
    }

    /// id of the output condition
    pub fn output(&self) -> &str {
        self.graph[self.output].id()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.index.contains_key(id)
    }

    pub fn element(
        &self,
        id: &str,
    ) -> Option<&Element> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn task(
        &self,
        id: &str,
    ) -> Option<&Task> {
        self.element(id).and_then(Element::as_task)
    }

    pub fn is_task(
        &self,
        id: &str,
    ) -> bool {
        self.task(id).is_some()
    }

    /// All elements in declaration order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// All tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.elements().filter_map(Element::as_task)
    }

    pub fn element_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn flow_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Incoming flows of `id`, in tie-break order.
    pub fn preset(
        &self,
        id: &str,
    ) -> Vec<&Flow> {
        self.flows(id, Direction::Incoming)
    }

    /// Outgoing flows of `id`, in tie-break order.
    pub fn postset(
        &self,
        id: &str,
    ) -> Vec<&Flow> {
        self.flows(id, Direction::Outgoing)
    }

    fn flows(
        &self,
        id: &str,
        direction: Direction,
    ) -> Vec<&Flow> {
        let Some(idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut flows: Vec<&Flow> = self.graph.edges_directed(*idx, direction).map(|e| e.weight()).collect();
        flows.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        flows
    }

    /// Ids of the direct successors (`Outgoing`) or predecessors (`Incoming`) of `id`.
    pub(crate) fn neighbors(
        &self,
        id: &str,
        direction: Direction,
    ) -> Vec<&str> {
        self.index
            .get(id)
            .map(|idx| self.graph.neighbors_directed(*idx, direction).map(|n| self.graph[n].id()).collect())
            .unwrap_or_default()
    }

    /// Returns true if a forward walk from `from` reaches any of `targets`
    /// without entering an element in `blocked`. `from` itself is never
    /// treated as a target.
    pub fn reaches_any(
        &self,
        from: &str,
        targets: &HashSet<&str>,
        blocked: &HashSet<&str>,
    ) -> bool {
        let Some(start) = self.index.get(from).copied() else {
            return false;
        };
        let mut visited = HashSet::new();
        let mut worklist = vec![start];
        visited.insert(start);

        while let Some(idx) = worklist.pop() {
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let id = self.graph[next].id();
                if targets.contains(id) {
                    return true;
                }
                if blocked.contains(id) || !visited.insert(next) {
                    continue;
                }
                worklist.push(next);
            }
        }
        false
    }

    /// Ids of every element reachable from `from` in `direction`, `from` included.
    pub(crate) fn closure(
        &self,
        from: &str,
        direction: Direction,
    ) -> HashSet<&str> {
        let mut visited = HashSet::new();
        let Some(start) = self.index.get(from).copied() else {
            return visited;
        };
        let mut worklist = vec![start];
        while let Some(idx) = worklist.pop() {
            if !visited.insert(self.graph[idx].id()) {
                continue;
            }
            worklist.extend(self.graph.neighbors_directed(idx, direction));
        }
        visited
    }

    /// Output a human-readable representation of the net
    pub fn schema(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("=== Net {} ===", self.id));
        lines.push(format!("Elements: {}, Flows: {}", self.graph.node_count(), self.graph.edge_count()));
        lines.push(String::new());

        lines.push("--- Elements ---".to_string());
        for element in self.elements() {
            match element {
                Element::Condition(c) => lines.push(format!("({}) {} [{}]", c.id, c.name, c.kind.as_ref())),
                Element::Task(t) => {
                    let mut line = format!("[{}] {} [{}, join: {}, split: {}]", t.id, t.name, t.task_type().as_ref(), t.join.as_ref(), t.split.as_ref());
                    if !t.cancellation_set.is_empty() {
                        line.push_str(&format!(" cancels {{{}}}", t.cancellation_set.join(", ")));
                    }
                    lines.push(line);
                }
            }
        }
        lines.push(String::new());

        lines.push("--- Flows ---".to_string());
        for idx in self.graph.edge_indices() {
            let flow = &self.graph[idx];
            let mut line = format!("{} --> {} (ordering: {})", flow.source, flow.target, flow.ordering);
            if let Some(predicate) = &flow.predicate {
                line.push_str(&format!(" when {}", predicate));
            }
            if flow.default {
                line.push_str(" default");
            }
            lines.push(line);
        }

        lines.join("\n")
    }
}

/// Identifier of the condition inserted on a task-to-task flow.
pub fn implicit_condition_id(
    source: &str,
    target: &str,
) -> String {
    format!("{}__{}", source, target)
}

fn boundary(
    graph: &DiGraph<Element, Flow>,
    index: &HashMap<ElementId, NodeIndex>,
    net: &str,
    id: &str,
    role: &str,
    errors: &mut Vec<VerificationError>,
) -> Option<NodeIndex> {
    match index.get(id) {
        Some(idx) if !graph[*idx].is_task() => Some(*idx),
        _ => {
            errors.push(VerificationError::InvalidBoundary {
                net: net.to_string(),
                id: id.to_string(),
                role: role.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn model(value: serde_json::Value) -> NetModel {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_build_inserts_implicit_conditions() {
        let net = Net::build(&model(json!({
            "id": "main", "input": "start", "output": "end",
            "tasks": [{ "id": "A" }, { "id": "B" }],
            "flows": [
                { "source": "start", "target": "A" },
                { "source": "A", "target": "B" },
                { "source": "B", "target": "end" }
            ]
        })))
        .unwrap();

        let implicit = implicit_condition_id("A", "B");
        assert_eq!(net.element(&implicit).and_then(Element::as_condition).map(|c| c.kind), Some(ConditionKind::Implicit));
        assert_eq!(net.postset("A")[0].target, implicit);
        assert_eq!(net.preset("B")[0].source, implicit);
        assert_eq!(net.input(), "start");
        assert_eq!(net.output(), "end");
        assert_eq!(net.tasks().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_build_collects_structural_errors() {
        let errors = Net::build(&model(json!({
            "id": "main", "input": "start", "output": "end",
            "conditions": [{ "id": "start" }, { "id": "c1" }, { "id": "c1" }],
            "tasks": [{ "id": "A" }],
            "flows": [
                { "source": "start", "target": "c1" },
                { "source": "A", "target": "ghost" }
            ]
        })))
        .unwrap_err();

        assert!(errors.contains(&VerificationError::DuplicateElement {
            net: "main".to_string(),
            id: "c1".to_string()
        }));
        assert!(errors.iter().any(|e| matches!(e, VerificationError::ConditionToCondition { .. })));
        assert!(errors.iter().any(|e| matches!(e, VerificationError::UnknownElement { id, .. } if id == "ghost")));
    }

    #[test]
    fn test_flows_sorted_by_ordering() {
        let net = Net::build(&model(json!({
            "id": "main", "input": "start", "output": "end",
            "conditions": [{ "id": "c1" }, { "id": "c2" }],
            "tasks": [{ "id": "A", "split": "xor" }],
            "flows": [
                { "source": "start", "target": "A" },
                { "source": "A", "target": "c2", "ordering": 2 },
                { "source": "A", "target": "c1", "ordering": 1 }
            ]
        })))
        .unwrap();
        let targets: Vec<_> = net.postset("A").iter().map(|f| f.target.clone()).collect();
        assert_eq!(targets, vec!["c1", "c2"]);
        assert!(net.schema().contains("[A] A [atomic, join: xor, split: xor]"));
    }

    #[test]
    fn test_reaches_any_respects_blocked() {
        let net = Net::build(&model(json!({
            "id": "main", "input": "start", "output": "end",
            "conditions": [{ "id": "c1" }],
            "tasks": [{ "id": "A" }, { "id": "B" }],
            "flows": [
                { "source": "start", "target": "A" },
                { "source": "A", "target": "c1" },
                { "source": "c1", "target": "B" },
                { "source": "B", "target": "end" }
            ]
        })))
        .unwrap();
        let targets: HashSet<&str> = ["end"].into_iter().collect();
        assert!(net.reaches_any("start", &targets, &HashSet::new()));
        let blocked: HashSet<&str> = ["c1"].into_iter().collect();
        assert!(!net.reaches_any("start", &targets, &blocked));
    }
}
