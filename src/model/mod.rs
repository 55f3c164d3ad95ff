//! Serde models of a workflow specification.
//!
//! These are the structures an external specification loader hands to the
//! engine. They carry no invariants; `net::Specification` turns them into a
//! verified, immutable graph.

mod flow;
mod specification;
mod task;

pub use flow::{ConditionModel, FlowModel};
pub use specification::{NetModel, SpecificationModel, VariableModel};
pub use task::{MultiInstanceModel, TaskModel};
