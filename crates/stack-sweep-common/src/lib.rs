//! stack-sweep-common - Shared types for the stack-sweep cleanup orchestrator
//!
//! This crate provides the leaf types shared by the orchestrator and by
//! control-plane implementations, without any async or HTTP dependencies
//! to keep it lightweight.
//!
//! ## Modules
//!
//! - [`resource_kind`]: Cloud resource types and their deletion ordering
//! - [`outcome`]: Per-item deletion outcomes and the fixed-capacity result sink

pub mod outcome;
pub mod resource_kind;

pub use outcome::{DeletionOutcome, ResultSink};
pub use resource_kind::ResourceKind;
