use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    CaseflowError, Result,
    model::{ConditionModel, TaskModel},
    resource::{Resourced, Resourcing},
};

/// Identifier of a condition or task, unique within a net.
pub type ElementId = String;

/// How a task consumes tokens from its incoming flows.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JoinType {
    And,
    Or,
    #[default]
    Xor,
}

/// How a task produces tokens onto its outgoing flows.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SplitType {
    #[default]
    And,
    Or,
    Xor,
}

/// Task variant tag as written in a specification.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::IntoStaticStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskType {
    #[default]
    Atomic,
    Composite,
    MultiInstance,
}

/// Whether instances of a multi-instance task may be added while it runs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CreationMode {
    #[default]
    Static,
    Dynamic,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConditionKind {
    Input,
    Output,
    #[default]
    Internal,
    /// inserted between two directly connected tasks
    Implicit,
}

/// A place of the net.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub id: ElementId,
    pub name: String,
    pub kind: ConditionKind,
}

impl Condition {
    pub fn new(
        id: &str,
        kind: ConditionKind,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind,
        }
    }

    pub fn from_model(
        model: &ConditionModel,
        kind: ConditionKind,
    ) -> Self {
        Self {
            id: model.id.clone(),
            name: if model.name.is_empty() { model.id.clone() } else { model.name.clone() },
            kind,
        }
    }
}

/// A transition of the net.
///
/// The shared record lives here; variant payloads live in [`TaskKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: ElementId,
    pub name: String,
    pub join: JoinType,
    pub split: SplitType,
    /// conditions and tasks voided when this task fires
    pub cancellation_set: Vec<ElementId>,
    /// variables read
    pub inputs: Vec<String>,
    /// variables written
    pub outputs: Vec<String>,
    pub kind: TaskKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    Atomic(AtomicTask),
    Composite(CompositeTask),
    MultiInstance(MultiInstanceTask),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomicTask {
    pub resourcing: Option<Resourcing>,
    pub timeout: Option<Duration>,
    pub skip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeTask {
    pub decomposition: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiInstanceTask {
    pub body: AtomicTask,
    /// sub-net each instance runs, when the body is composite
    pub decomposition: Option<String>,
    pub min: usize,
    pub max: usize,
    pub threshold: usize,
    pub creation: CreationMode,
    pub splitting: Option<String>,
    pub joining: Option<String>,
}

impl Resourced for AtomicTask {
    fn resourcing(&self) -> Option<&Resourcing> {
        self.resourcing.as_ref()
    }
}

impl Resourced for MultiInstanceTask {
    fn resourcing(&self) -> Option<&Resourcing> {
        self.body.resourcing.as_ref()
    }
}

impl Task {
    /// Atomic task with default join/split, mostly useful in tests.
    pub fn atomic(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            join: JoinType::default(),
            split: SplitType::default(),
            cancellation_set: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            kind: TaskKind::Atomic(AtomicTask::default()),
        }
    }

    pub fn task_type(&self) -> TaskType {
        match self.kind {
            TaskKind::Atomic(_) => TaskType::Atomic,
            TaskKind::Composite(_) => TaskType::Composite,
            TaskKind::MultiInstance(_) => TaskType::MultiInstance,
        }
    }

    pub fn multi_instance(&self) -> Option<&MultiInstanceTask> {
        match &self.kind {
            TaskKind::MultiInstance(mi) => Some(mi),
            _ => None,
        }
    }

    /// Sub-net id for composite tasks and composite-bodied multi-instance tasks.
    pub fn decomposition(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::Composite(c) => c.decomposition.as_deref(),
            TaskKind::MultiInstance(mi) => mi.decomposition.as_deref(),
            TaskKind::Atomic(_) => None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match &self.kind {
            TaskKind::Atomic(a) => a.timeout,
            TaskKind::MultiInstance(mi) => mi.body.timeout,
            TaskKind::Composite(_) => None,
        }
    }

    pub fn skip(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::Atomic(a) => a.skip.as_deref(),
            _ => None,
        }
    }

    /// Resourcing capability, absent for composite tasks.
    pub fn resourced(&self) -> Option<&dyn Resourced> {
        match &self.kind {
            TaskKind::Atomic(a) => Some(a),
            TaskKind::MultiInstance(mi) => Some(mi),
            TaskKind::Composite(_) => None,
        }
    }
}

impl TryFrom<&TaskModel> for Task {
    type Error = CaseflowError;

    fn try_from(model: &TaskModel) -> Result<Self> {
        let body = AtomicTask {
            resourcing: model.resourcing.clone(),
            timeout: model.timeout.map(Duration::from_millis),
            skip: model.skip.clone(),
        };
        let kind = match model.kind {
            TaskType::Atomic => TaskKind::Atomic(body),
            TaskType::Composite => TaskKind::Composite(CompositeTask {
                decomposition: model.decomposition.clone(),
            }),
            TaskType::MultiInstance => {
                let mi = model
                    .multi_instance
                    .as_ref()
                    .ok_or(CaseflowError::Net(format!("multi-instance task {} has no multi_instance parameters", model.id)))?;
                TaskKind::MultiInstance(MultiInstanceTask {
                    body,
                    decomposition: model.decomposition.clone(),
                    min: mi.min,
                    max: mi.max,
                    threshold: mi.threshold,
                    creation: mi.creation,
                    splitting: mi.splitting.clone(),
                    joining: mi.joining.clone(),
                })
            }
        };

        Ok(Self {
            id: model.id.clone(),
            name: if model.name.is_empty() { model.id.clone() } else { model.name.clone() },
            join: model.join,
            split: model.split,
            cancellation_set: model.cancels.clone(),
            inputs: model.inputs.clone(),
            outputs: model.outputs.clone(),
            kind,
        })
    }
}

/// Node weight of the net graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Condition(Condition),
    Task(Task),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Condition(c) => &c.id,
            Element::Task(t) => &t.id,
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Element::Task(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Element::Condition(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self, Element::Task(_))
    }

    pub fn kind_str(&self) -> &str {
        match self {
            Element::Condition(c) => c.kind.as_ref(),
            Element::Task(t) => t.task_type().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_task_from_model() {
        let model: TaskModel = serde_json::from_value(json!({
            "id": "review",
            "kind": "multi_instance",
            "join": "and",
            "split": "xor",
            "cancels": ["c2"],
            "timeout": 1500,
            "resourcing": { "offer": ["clerk"] },
            "multi_instance": { "max": 5, "threshold": 2, "creation": "dynamic" }
        }))
        .unwrap();
        let task = Task::try_from(&model).unwrap();
        assert_eq!(task.join, JoinType::And);
        assert_eq!(task.split, SplitType::Xor);
        assert_eq!(task.cancellation_set, vec!["c2".to_string()]);
        assert_eq!(task.timeout(), Some(Duration::from_millis(1500)));
        let mi = task.multi_instance().unwrap();
        assert_eq!((mi.min, mi.max, mi.threshold), (1, 5, 2));
        assert_eq!(mi.creation, CreationMode::Dynamic);
        assert_eq!(task.resourced().and_then(|r| r.resourcing()).map(|r| r.offer.clone()), Some(vec!["clerk".to_string()]));
    }

    #[test]
    fn test_multi_instance_requires_parameters() {
        let model: TaskModel = serde_json::from_value(json!({ "id": "m", "kind": "multi_instance" })).unwrap();
        assert!(Task::try_from(&model).is_err());
    }

    #[test]
    fn test_composite_is_not_resourced() {
        let model: TaskModel = serde_json::from_value(json!({ "id": "sub", "kind": "composite", "decomposition": "child" })).unwrap();
        let task = Task::try_from(&model).unwrap();
        assert!(task.resourced().is_none());
        assert_eq!(task.decomposition(), Some("child"));
        // defaults follow the usual xor-join / and-split convention
        assert_eq!(task.join, JoinType::Xor);
        assert_eq!(task.split, SplitType::And);
    }
}
