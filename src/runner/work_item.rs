use serde::{Deserialize, Serialize};

use crate::{FireError, common::Vars, utils};

pub type WorkItemId = String;

/// Lifecycle state of a work item.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkItemStatus {
    Enabled,
    Started,
    Completed,
    Cancelled,
    Failed,
}

impl WorkItemStatus {
    /// Enabled or started.
    pub fn is_live(&self) -> bool {
        matches!(self, WorkItemStatus::Enabled | WorkItemStatus::Started)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }
}

/// The externally visible unit of work for one enabled task or one
/// multi-instance task instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: WorkItemId,
    /// owning case
    pub cid: String,
    pub task: String,
    /// instance index within a multi-instance task
    pub instance: Option<usize>,
    pub status: WorkItemStatus,
    /// input data bound from the case
    pub data: Vars,
    /// output data supplied on completion
    pub outputs: Vars,
    /// participant chosen by the resource allocator
    pub participant: Option<String>,
    /// deadline in milliseconds since the epoch
    pub deadline: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkItem {
    pub(crate) fn new(
        cid: &str,
        task: &str,
        instance: Option<usize>,
        status: WorkItemStatus,
        data: Vars,
    ) -> Self {
        let now = utils::time::time_millis();
        Self {
            id: utils::longid(),
            cid: cid.to_string(),
            task: task.to_string(),
            instance,
            status,
            data,
            outputs: Vars::new(),
            participant: None,
            deadline: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    pub fn is_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Moves the item to `status`, rejecting transitions the lifecycle does not allow.
    pub(crate) fn transition(
        &mut self,
        status: WorkItemStatus,
    ) -> Result<(), FireError> {
        let allowed = match status {
            WorkItemStatus::Started => self.status == WorkItemStatus::Enabled,
            WorkItemStatus::Completed | WorkItemStatus::Cancelled | WorkItemStatus::Failed => self.status.is_live(),
            WorkItemStatus::Enabled => false,
        };
        if !allowed {
            return Err(FireError::InvalidWorkItemState {
                id: self.id.clone(),
                status: self.status.to_string(),
                expected: match status {
                    WorkItemStatus::Started => WorkItemStatus::Enabled.to_string(),
                    _ => "enabled or started".to_string(),
                },
            });
        }
        self.status = status;
        self.updated_at = utils::time::time_millis();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut item = WorkItem::new("case", "A", None, WorkItemStatus::Enabled, Vars::new());
        assert!(item.is_live());
        item.transition(WorkItemStatus::Started).unwrap();
        assert!(item.transition(WorkItemStatus::Started).is_err());
        item.transition(WorkItemStatus::Completed).unwrap();
        assert!(item.status.is_terminal());

        let err = item.transition(WorkItemStatus::Cancelled).unwrap_err();
        assert!(matches!(err, FireError::InvalidWorkItemState { status, .. } if status == "completed"));
    }

    #[test]
    fn test_enabled_is_never_a_target() {
        let mut item = WorkItem::new("case", "A", Some(0), WorkItemStatus::Started, Vars::new());
        assert!(item.transition(WorkItemStatus::Enabled).is_err());
        item.transition(WorkItemStatus::Cancelled).unwrap();
    }
}
