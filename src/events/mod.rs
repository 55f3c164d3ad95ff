//! Event types for case execution.
//!
//! Events are emitted by case runners to notify subscribers about case
//! status transitions, work-item lifecycle changes and firings.

mod case;
mod work_item;

pub use case::*;
pub use work_item::*;

use crate::runner::FiringResult;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Top-level event type for case events.
#[derive(Debug, Clone)]
pub enum CaseEvent {
    /// Case status transitions (started, completed, cancelled, failed).
    Case(CaseStatusEvent),
    /// Work-item lifecycle transitions.
    WorkItem(WorkItemEvent),
    /// A task fired.
    Fired(FiringResult),
}

/// Event message containing case and task context.
#[derive(Debug, Clone)]
pub struct Message {
    /// Case ID that generated this event.
    pub cid: String,
    /// Task ID that generated this event (empty for case events).
    pub tid: String,
    /// The actual event data.
    pub event: CaseEvent,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl CaseEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, CaseEvent::Case(CaseStatusEvent::Completed(_)))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CaseEvent::Case(CaseStatusEvent::Failed(_)))
    }

    /// Completed, cancelled or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseEvent::Case(CaseStatusEvent::Completed(_) | CaseStatusEvent::Cancelled(_) | CaseStatusEvent::Failed(_)))
    }

    pub fn str(&self) -> &str {
        match self {
            CaseEvent::Case(e) => e.str(),
            CaseEvent::WorkItem(e) => e.str(),
            CaseEvent::Fired(_) => "Fired",
        }
    }
}
