//! The immutable specification graph.
//!
//! A [`Specification`] is the verified form of a `SpecificationModel`: one
//! [`Net`] per workflow level, each an arena of conditions and tasks joined by
//! flows. Nets are shared read-only across every case of the specification.

mod element;
mod flow;
#[allow(clippy::module_inception)]
mod net;
mod specification;
mod verify;

pub use element::{AtomicTask, CompositeTask, Condition, ConditionKind, CreationMode, Element, ElementId, JoinType, MultiInstanceTask, SplitType, Task, TaskKind, TaskType};
pub use flow::Flow;
pub use net::{Net, Variable, implicit_condition_id};
pub use specification::Specification;
pub use verify::verify;
