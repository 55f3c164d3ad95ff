use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    CaseflowError, Result,
    model::{ConditionModel, FlowModel, TaskModel},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecificationModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// id of the net a case starts in
    pub root: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub nets: Vec<NetModel>,
}

impl SpecificationModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<SpecificationModel>(s).map_err(|e| CaseflowError::Convert(format!("invalid specification: {}", e)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetModel {
    pub id: String,
    /// id of the input condition
    pub input: String,
    /// id of the output condition
    pub output: String,
    #[serde(default)]
    pub conditions: Vec<ConditionModel>,
    #[serde(default)]
    pub tasks: Vec<TaskModel>,
    #[serde(default)]
    pub flows: Vec<FlowModel>,
    #[serde(default)]
    pub variables: Vec<VariableModel>,
}

/// Net-local variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<serde_json::Value>,
}
