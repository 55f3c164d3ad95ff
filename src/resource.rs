//! Resourcing capability.
//!
//! Who may perform a task is static specification data; who actually gets
//! the work is decided by an external allocator, consulted once per enabled
//! work item.

use serde::{Deserialize, Serialize};

use crate::runner::WorkItem;

/// Resourcing specification of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resourcing {
    /// roles or participants the work is offered to
    #[serde(default)]
    pub offer: Vec<String>,
    /// participant the work is allocated to up front, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocate: Option<String>,
}

/// Capability of task variants that are performed by participants.
pub trait Resourced {
    fn resourcing(&self) -> Option<&Resourcing>;
}

/// External allocation decision, made when a work item becomes enabled.
pub trait ResourceAllocator: Send + Sync {
    /// Returns the participant the work item is allocated to, or `None` to leave it on offer.
    fn allocate(
        &self,
        item: &WorkItem,
        resourcing: &Resourcing,
    ) -> Option<String>;
}

/// Allocator honouring only the specification's up-front allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAllocation;

impl ResourceAllocator for NoAllocation {
    fn allocate(
        &self,
        _item: &WorkItem,
        resourcing: &Resourcing,
    ) -> Option<String> {
        resourcing.allocate.clone()
    }
}

/// Allocates every work item to the first offered participant.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOffered;

impl ResourceAllocator for FirstOffered {
    fn allocate(
        &self,
        _item: &WorkItem,
        resourcing: &Resourcing,
    ) -> Option<String> {
        resourcing.allocate.clone().or_else(|| resourcing.offer.first().cloned())
    }
}
