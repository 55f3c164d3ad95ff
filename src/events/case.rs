use crate::{FireError, common::Vars};

#[derive(Debug, Clone)]
pub enum CaseStatusEvent {
    Started(CaseStartedEvent),
    Completed(CaseCompletedEvent),
    Cancelled(CaseCancelledEvent),
    Failed(CaseFailedEvent),
}

impl CaseStatusEvent {
    pub fn str(&self) -> &str {
        match self {
            CaseStatusEvent::Started(_) => "Started",
            CaseStatusEvent::Completed(_) => "Completed",
            CaseStatusEvent::Cancelled(_) => "Cancelled",
            CaseStatusEvent::Failed(_) => "Failed",
        }
    }
}

/// Event emitted when a case seeds its input condition
#[derive(Debug, Clone)]
pub struct CaseStartedEvent {
    pub spec: String,
    /// net the case runs, the root net unless this is a sub-case
    pub net: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct CaseCompletedEvent {
    /// final case data
    pub data: Vars,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct CaseCancelledEvent {
    /// places that held tokens when the case was voided
    pub removed: Vec<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct CaseFailedEvent {
    pub error: FireError,
    pub timestamp: i64,
}
