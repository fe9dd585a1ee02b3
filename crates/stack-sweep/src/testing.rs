//! In-memory control plane for tests
//!
//! Serves seeded resources, injects faults by instance id or kind, and
//! records every call with a timestamp so tests can assert ordering
//! between kinds.

use crate::api::{ApiError, ControlPlane, ProjectId, ResourceInstance};
use async_trait::async_trait;
use stack_sweep_common::ResourceKind;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOp {
    List,
    DeleteStart,
    DeleteEnd,
    Detach,
}

#[derive(Debug, Clone)]
pub struct ApiCall {
    pub kind: ResourceKind,
    pub op: ApiOp,
    pub id: String,
    pub at: Instant,
}

/// Builder-style fake. Seed projects and resources, then hand it to a
/// runner behind an `Arc`.
#[derive(Default)]
pub struct MockControlPlane {
    projects: HashMap<String, String>,
    resources: Mutex<HashMap<ResourceKind, Vec<ResourceInstance>>>,
    fail_ids: HashSet<String>,
    panic_ids: HashSet<String>,
    gone_ids: HashSet<String>,
    conflict_budget: Mutex<HashMap<String, u32>>,
    detach_fail_ids: HashSet<String>,
    list_error_kinds: HashSet<ResourceKind>,
    hang_kinds: HashSet<ResourceKind>,
    delete_delay: HashMap<ResourceKind, Duration>,
    unresolvable: HashSet<String>,
    calls: Mutex<Vec<ApiCall>>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, name: &str, id: &str) -> Self {
        self.projects.insert(name.to_string(), id.to_string());
        self
    }

    pub fn with_instance(self, kind: ResourceKind, instance: ResourceInstance) -> Self {
        self.resources
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(instance);
        self
    }

    /// Delete always fails with a non-retryable status for this id.
    pub fn failing(mut self, id: &str) -> Self {
        self.fail_ids.insert(id.to_string());
        self
    }

    /// Delete panics for this id.
    pub fn panicking(mut self, id: &str) -> Self {
        self.panic_ids.insert(id.to_string());
        self
    }

    /// Delete returns `NotFound` for this id.
    pub fn gone(mut self, id: &str) -> Self {
        self.gone_ids.insert(id.to_string());
        self
    }

    /// Delete returns `Conflict` the first `times` calls for this id,
    /// then succeeds.
    pub fn conflicting(self, id: &str, times: u32) -> Self {
        self.conflict_budget
            .lock()
            .unwrap()
            .insert(id.to_string(), times);
        self
    }

    pub fn detach_failing(mut self, attachment_id: &str) -> Self {
        self.detach_fail_ids.insert(attachment_id.to_string());
        self
    }

    /// List fails with a server error for this kind.
    pub fn list_erroring(mut self, kind: ResourceKind) -> Self {
        self.list_error_kinds.insert(kind);
        self
    }

    /// Deletes of this kind never return.
    pub fn hanging(mut self, kind: ResourceKind) -> Self {
        self.hang_kinds.insert(kind);
        self
    }

    pub fn with_delete_delay(mut self, kind: ResourceKind, delay: Duration) -> Self {
        self.delete_delay.insert(kind, delay);
        self
    }

    /// `resolve_project` fails with a transport error for this name.
    pub fn unresolvable(mut self, name: &str) -> Self {
        self.unresolvable.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn first_call(&self, kind: ResourceKind, op: ApiOp) -> Option<Instant> {
        self.calls()
            .iter()
            .filter(|c| c.kind == kind && c.op == op)
            .map(|c| c.at)
            .min()
    }

    pub fn last_call(&self, kind: ResourceKind, op: ApiOp) -> Option<Instant> {
        self.calls()
            .iter()
            .filter(|c| c.kind == kind && c.op == op)
            .map(|c| c.at)
            .max()
    }

    pub fn call_count(&self, kind: ResourceKind, op: ApiOp) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.kind == kind && c.op == op)
            .count()
    }

    fn record(&self, kind: ResourceKind, op: ApiOp, id: &str) {
        self.calls.lock().unwrap().push(ApiCall {
            kind,
            op,
            id: id.to_string(),
            at: Instant::now(),
        });
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn resolve_project(&self, name: &str) -> Result<Option<ProjectId>, ApiError> {
        if self.unresolvable.contains(name) {
            return Err(ApiError::Transport(format!(
                "connection reset resolving {name}"
            )));
        }
        Ok(self.projects.get(name).map(ProjectId::new))
    }

    async fn list(
        &self,
        _project: &ProjectId,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceInstance>, ApiError> {
        self.record(kind, ApiOp::List, "");
        if self.list_error_kinds.contains(&kind) {
            return Err(ApiError::Status {
                code: 500,
                message: format!("listing {kind} failed"),
            });
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(
        &self,
        _project: &ProjectId,
        kind: ResourceKind,
        instance: &ResourceInstance,
    ) -> Result<String, ApiError> {
        self.record(kind, ApiOp::DeleteStart, &instance.id);
        if self.hang_kinds.contains(&kind) {
            futures::future::pending::<()>().await;
        }
        if let Some(delay) = self.delete_delay.get(&kind) {
            tokio::time::sleep(*delay).await;
        }
        if self.panic_ids.contains(&instance.id) {
            panic!("injected deleter fault for {}", instance.id);
        }
        let result = if self.gone_ids.contains(&instance.id) {
            Err(ApiError::NotFound(instance.id.clone()))
        } else if self.fail_ids.contains(&instance.id) {
            Err(ApiError::Status {
                code: 500,
                message: format!("deleting {} failed", instance.id),
            })
        } else {
            let mut budgets = self.conflict_budget.lock().unwrap();
            match budgets.get_mut(&instance.id) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    Err(ApiError::Conflict(format!("{} still in use", instance.id)))
                }
                _ => Ok("204 No Content".to_string()),
            }
        };
        self.record(kind, ApiOp::DeleteEnd, &instance.id);
        result
    }

    async fn detach(
        &self,
        _project: &ProjectId,
        kind: ResourceKind,
        instance_id: &str,
        attachment_id: &str,
    ) -> Result<(), ApiError> {
        self.record(kind, ApiOp::Detach, attachment_id);
        if self.detach_fail_ids.contains(attachment_id) {
            return Err(ApiError::Conflict(format!(
                "attachment {attachment_id} busy on {instance_id}"
            )));
        }
        Ok(())
    }
}
