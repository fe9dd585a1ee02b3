//! Control-plane collaborator interface and error classification
//!
//! The orchestrator never talks HTTP itself; it consumes the narrow
//! [`ControlPlane`] trait. Errors carry enough classification for the
//! deleter to decide between retry, treat-as-gone, and record-as-failed,
//! mirroring how cloud APIs signal not-found/conflict/throttling.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use stack_sweep_common::ResourceKind;
use thiserror::Error;

/// Control-plane error categories for retry and cleanup logic.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource was not found (safe to treat as already deleted)
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Resource still has dependents on the server side (retryable)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded (retryable with backoff)
    #[error("rate limit exceeded")]
    Throttled,

    /// Non-2xx status that fits no other category
    #[error("unexpected status {code}: {message}")]
    Status { code: u16, message: String },

    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Check if this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Conflict(_) | ApiError::Throttled)
    }
}

/// Internal identifier of a resolved project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One deletable item of some resource kind, as discovered by `list`.
///
/// Composite listings are flattened by the control plane: a router with
/// two interfaces lists as two `RouterInterface` instances, a floating
/// IP with three forwardings as three `PortForwarding` instances with
/// `parent` set to the floating IP, and a QoS policy's rules as one
/// instance per rule with `parent` set to the policy.
#[derive(Debug, Clone, Default)]
pub struct ResourceInstance {
    pub id: String,
    /// Owning object for nested resources (floating IP for a port
    /// forwarding, QoS policy for a rule, router for a route).
    pub parent: Option<String>,
    /// Attachments that must be detached before the delete call
    /// (volume attachments).
    pub attachments: Vec<String>,
    /// Extra identifying parameters carried into the outcome, e.g.
    /// `subnet_id` for a router interface.
    pub parameters: BTreeMap<String, String>,
}

impl ResourceInstance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_attachment(mut self, attachment: impl Into<String>) -> Self {
        self.attachments.push(attachment.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// The narrow interface the orchestrator needs from the cloud API client.
///
/// Implementations own endpoints, auth tokens, and body construction;
/// they are immutable after construction and shared across tasks.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Resolve a project name to its internal id, `None` if it does not exist.
    async fn resolve_project(&self, name: &str) -> Result<Option<ProjectId>, ApiError>;

    /// List every instance of `kind` owned by `project`.
    async fn list(
        &self,
        project: &ProjectId,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceInstance>, ApiError>;

    /// Delete one instance. Returns the opaque response on success.
    async fn delete(
        &self,
        project: &ProjectId,
        kind: ResourceKind,
        instance: &ResourceInstance,
    ) -> Result<String, ApiError>;

    /// Detach a prerequisite object from an instance before deletion
    /// (volume attachments).
    async fn detach(
        &self,
        project: &ProjectId,
        kind: ResourceKind,
        instance_id: &str,
        attachment_id: &str,
    ) -> Result<(), ApiError>;
}
