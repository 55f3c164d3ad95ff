use serde::{Deserialize, Serialize};

use crate::{
    net::{CreationMode, JoinType, SplitType, TaskType},
    resource::Resourcing,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: TaskType,
    #[serde(default)]
    pub join: JoinType,
    #[serde(default)]
    pub split: SplitType,
    /// cancellation set
    #[serde(default)]
    pub cancels: Vec<String>,
    /// work item deadline in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// skip predicate, evaluated when the task becomes enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resourcing: Option<Resourcing>,
    /// variables read by the task
    #[serde(default)]
    pub inputs: Vec<String>,
    /// variables written by the task
    #[serde(default)]
    pub outputs: Vec<String>,
    /// sub-net id, composite tasks only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decomposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_instance: Option<MultiInstanceModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiInstanceModel {
    #[serde(default = "one")]
    pub min: usize,
    pub max: usize,
    pub threshold: usize,
    #[serde(default)]
    pub creation: CreationMode,
    /// case variable holding a JSON array, one element per instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splitting: Option<String>,
    /// case variable receiving the array of instance outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joining: Option<String>,
}

fn one() -> usize {
    1
}
