//! Case execution runtime.
//!
//! - [`Marking`]: tokens per place of one case
//! - [`enabled_tasks`]: the pure enablement query for AND/OR/XOR joins
//! - [`CaseRunner`]: the single-writer state machine firing tasks of one case
//! - [`cancel`]: reset-net cancellation of a region

mod cancellation;
mod case;
mod enablement;
mod firing;
mod marking;
mod multi_instance;
mod work_item;

#[cfg(test)]
mod properties;

pub use cancellation::{cancel, removable};
pub use case::{CaseRunner, CaseSnapshot, CaseStatus};
pub use enablement::{EnableMode, EnabledTask, enabled_tasks, evaluate, evaluate_task};
pub use firing::FiringResult;
pub use marking::Marking;
pub use work_item::{WorkItem, WorkItemId, WorkItemStatus};
