use crate::runner::{WorkItem, WorkItemStatus};

/// A work item changed state; `item` is its state after the change.
#[derive(Debug, Clone)]
pub struct WorkItemEvent {
    pub item: WorkItem,
}

impl WorkItemEvent {
    pub fn status(&self) -> WorkItemStatus {
        self.item.status
    }

    pub fn str(&self) -> &str {
        match self.item.status {
            WorkItemStatus::Enabled => "Enabled",
            WorkItemStatus::Started => "Started",
            WorkItemStatus::Completed => "Completed",
            WorkItemStatus::Cancelled => "Cancelled",
            WorkItemStatus::Failed => "Failed",
        }
    }
}
