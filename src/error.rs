//! Error types for Caseflow.
//!
//! Three families of errors exist:
//! - `VerificationError`: specification-time problems, raised before any case starts
//! - `FireError`: the tagged result of a rejected runtime command
//! - `CaseflowError`: the crate-wide error that wraps both plus engine plumbing failures

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Caseflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum CaseflowError {
    /// Engine-level errors (startup, shutdown, lookup).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Case lifecycle errors.
    #[error("{0}")]
    Case(String),

    /// Net construction errors.
    #[error("{0}")]
    Net(String),

    /// The specification failed verification; no case may run against it.
    #[error("verification failed: {}", join_errors(.0))]
    Verification(Vec<VerificationError>),

    /// A runtime command was rejected by the case runner.
    #[error(transparent)]
    Fire(#[from] FireError),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl CaseflowError {
    /// Returns the firing error if this error wraps one.
    pub fn as_fire(&self) -> Option<&FireError> {
        match self {
            CaseflowError::Fire(e) => Some(e),
            _ => None,
        }
    }
}

fn join_errors(errors: &[VerificationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

/// Outcome of one guard evaluated during a split.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    /// Target of the evaluated flow.
    pub target: String,
    /// Predicate text, `None` for unguarded flows.
    pub predicate: Option<String>,
    /// Evaluation result.
    pub value: bool,
}

/// Tagged result of a rejected runtime command.
///
/// Recoverable errors leave the case untouched and running. Fatal errors
/// leave the marking untouched but move the case to `Failed`.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum FireError {
    #[error("task {task} is not enabled")]
    NotEnabled {
        task: String,
    },

    #[error("task {task} not found")]
    UnknownTask {
        task: String,
    },

    #[error("work item {id} not found")]
    UnknownWorkItem {
        id: String,
    },

    #[error("work item {id} is {status}, expected {expected}")]
    InvalidWorkItemState {
        id: String,
        status: String,
        expected: String,
    },

    #[error("case is {status}")]
    CaseNotRunning {
        status: String,
    },

    #[error("task {task} already runs its maximum of {max} instances")]
    InstanceLimit {
        task: String,
        max: usize,
    },

    #[error("task {task} does not accept dynamic instances")]
    NotDynamic {
        task: String,
    },

    #[error("no outgoing flow of task {task} matched and no default flow exists")]
    NoMatchingFlow {
        task: String,
        evaluated: Vec<GuardOutcome>,
    },

    #[error("composite task {task} has no decomposition '{decomposition}'")]
    MissingDecomposition {
        task: String,
        decomposition: String,
    },

    #[error("guard '{predicate}' of task {task} failed: {message}")]
    Guard {
        task: String,
        predicate: String,
        message: String,
    },

    #[error("task {task} requested {requested} instances, maximum is {max}")]
    InstanceBound {
        task: String,
        requested: usize,
        max: usize,
    },

    #[error("task {task} can no longer reach its completion threshold of {threshold}")]
    ThresholdUnreachable {
        task: String,
        threshold: usize,
    },

    #[error("case deadlocked with tokens on {places:?}")]
    Deadlocked {
        places: Vec<String>,
    },
}

impl FireError {
    /// Fatal errors terminate the case; the rest can be retried or dropped by the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FireError::NoMatchingFlow { .. }
                | FireError::MissingDecomposition { .. }
                | FireError::Guard { .. }
                | FireError::InstanceBound { .. }
                | FireError::ThresholdUnreachable { .. }
                | FireError::Deadlocked { .. }
        )
    }
}

/// Specification-time error found while verifying a net.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("root net '{root}' is not defined")]
    MissingRootNet {
        root: String,
    },

    #[error("net '{net}' is defined more than once")]
    DuplicateNet {
        net: String,
    },

    #[error("element '{id}' is defined more than once in net '{net}'")]
    DuplicateElement {
        net: String,
        id: String,
    },

    #[error("net '{net}' references unknown element '{id}'")]
    UnknownElement {
        net: String,
        id: String,
    },

    #[error("flow {from} -> {to} connects two conditions")]
    ConditionToCondition {
        from: String,
        to: String,
    },

    #[error("{role} '{id}' of net '{net}' is not a condition")]
    InvalidBoundary {
        net: String,
        id: String,
        role: String,
    },

    #[error("{role} condition '{id}' of net '{net}' has a flow on the wrong side")]
    BoundaryFlow {
        net: String,
        id: String,
        role: String,
    },

    #[error("element '{id}' is not reachable from the input of net '{net}'")]
    Unreachable {
        net: String,
        id: String,
    },

    #[error("element '{id}' cannot reach the output of net '{net}'")]
    CannotReachOutput {
        net: String,
        id: String,
    },

    #[error("task '{task}' needs at least one incoming and one outgoing flow")]
    DanglingTask {
        task: String,
    },

    #[error("cancellation set of task '{task}' names unknown element '{id}'")]
    UnknownCancellation {
        task: String,
        id: String,
    },

    #[error("task '{task}' has more than one default flow")]
    MultipleDefaults {
        task: String,
    },

    #[error("split of task '{task}' has no default flow and only unsatisfiable guards")]
    UnsatisfiableSplit {
        task: String,
    },

    #[error("multi-instance task '{task}' has invalid bounds min={min} max={max} threshold={threshold}")]
    InstanceBounds {
        task: String,
        min: usize,
        max: usize,
        threshold: usize,
    },

    #[error("task '{task}' binds undeclared variable '{variable}'")]
    UnknownVariable {
        task: String,
        variable: String,
    },

    #[error("task '{task}' may read variable '{variable}' before it is initialised")]
    UninitialisedVariable {
        task: String,
        variable: String,
    },
}

impl From<CaseflowError> for String {
    fn from(val: CaseflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for CaseflowError {
    fn from(error: std::io::Error) -> Self {
        CaseflowError::IoError(error.to_string())
    }
}

impl From<CaseflowError> for std::io::Error {
    fn from(val: CaseflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for CaseflowError {
    fn from(_: FromUtf8Error) -> Self {
        CaseflowError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for CaseflowError {
    fn from(error: serde_json::Error) -> Self {
        CaseflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for CaseflowError {
    fn from(error: toml::de::Error) -> Self {
        CaseflowError::Config(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for CaseflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        CaseflowError::Convert(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(
            !FireError::NotEnabled {
                task: "A".to_string()
            }
            .is_fatal()
        );
        assert!(
            FireError::NoMatchingFlow {
                task: "A".to_string(),
                evaluated: vec![],
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_verification_display_lists_all_errors() {
        let err = CaseflowError::Verification(vec![
            VerificationError::MissingRootNet {
                root: "main".to_string(),
            },
            VerificationError::DanglingTask {
                task: "A".to_string(),
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("root net 'main'"));
        assert!(text.contains("task 'A'"));
    }
}
