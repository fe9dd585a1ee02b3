//! stack-sweep - cleanup orchestrator for cloud projects
//!
//! Given a set of project names, this crate deletes every resource the
//! projects own while respecting cross-type dependency ordering (router
//! interfaces before routers, pool members before pools, and so on).
//! Within one resource type all deletions fire in parallel; per-item
//! failures are isolated and recorded, never raised. The run always
//! drains to completion and ends in a structured [`report::SweepReport`].
//!
//! The actual REST calls are behind the narrow [`api::ControlPlane`]
//! trait; this crate contains no HTTP code. Callers construct a
//! `ControlPlane` implementation, a [`config::SweepOptions`], and a
//! [`cleaner::Cleaner`], then call [`cleaner::Cleaner::run`].

pub mod api;
pub mod barrier;
pub mod cleaner;
pub mod config;
pub mod graph;
pub mod node;
pub mod project;
pub mod registry;
pub mod report;
pub mod testing;

pub use api::{ApiError, ControlPlane, ProjectId, ResourceInstance};
pub use cleaner::Cleaner;
pub use config::SweepOptions;
pub use graph::{DependencyGraph, GraphError};
pub use project::ProjectRunner;
pub use report::{ProjectReport, SweepReport};
pub use stack_sweep_common::{DeletionOutcome, ResourceKind, ResultSink};
