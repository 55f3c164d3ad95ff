//! # Caseflow
//!
//! Caseflow is an embeddable, Petri-net based workflow case runtime written in Rust.
//! It interprets a verified workflow specification (conditions, tasks and flows)
//! and drives running cases through it by moving tokens, firing tasks and
//! computing which downstream tasks become enabled.
//!
//! ## Core Features
//!
//! - **Token semantics**: AND/OR/XOR joins and splits, arbitrary cycles
//! - **Multi-instance tasks**: static and dynamic instance creation with partial joins
//! - **Cancellation regions**: reset-net style token removal on firing
//! - **Serialized case execution**: one single-writer dispatcher per case, cases run in parallel
//! - **Event-Driven**: work-item lifecycle, firing results and case status on a broadcast channel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use caseflow::{EngineBuilder, SpecificationModel, Vars};
//!
//! let engine = EngineBuilder::new().build()?;
//! engine.launch();
//!
//! let spec = SpecificationModel::from_json(json_str)?;
//! engine.deploy(&spec)?;
//!
//! let case = engine.create_case(&spec.id, Vars::new())?;
//! engine.start_case(&case)?;
//!
//! for enabled in case.enabled()? {
//!     case.fire(&enabled.task)?;
//! }
//! ```

mod builder;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
mod events;
mod model;
mod utils;

pub mod guard;
pub mod net;
pub mod resource;
pub mod runner;
pub mod runtime;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use common::Vars;
pub use config::{Config, RunnerConfig};
pub use engine::{CaseRecord, Engine, WorkItemRecord};
pub use error::{CaseflowError, FireError, GuardOutcome, VerificationError};
pub use events::*;
pub use model::*;
pub use runtime::{Case, CaseCommand, CaseId, Channel, ChannelEvent, ChannelOptions, Reply};

/// Result type alias for Caseflow operations.
pub type Result<T> = std::result::Result<T, CaseflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
