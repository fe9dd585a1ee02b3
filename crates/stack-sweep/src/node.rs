//! Dependency nodes
//!
//! One node per resource kind in the graph. A node blocks until every
//! prerequisite kind has finished, runs the kind's deletion routine
//! under an optional deadline, stores the result sink, then notifies
//! its dependents and the runner's completion channel. A node always
//! completes, degraded if necessary, so the graph always drains.

use crate::api::{ControlPlane, ProjectId};
use crate::config::SweepOptions;
use crate::registry;
use stack_sweep_common::{DeletionOutcome, ResourceKind, ResultSink};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Node lifecycle, in order. A node never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Idle,
    WaitingOnPrerequisites,
    Executing,
    NotifyingDependents,
    Done,
}

/// Shared store of finished sinks, frozen once the runner observes
/// every node's completion.
pub(crate) type SinkRegistry = Arc<Mutex<HashMap<ResourceKind, ResultSink>>>;

pub(crate) struct DependencyNode {
    kind: ResourceKind,
    prereq_count: usize,
    prereq_rx: mpsc::Receiver<()>,
    dependents: Vec<(ResourceKind, mpsc::Sender<()>)>,
    completion_tx: mpsc::Sender<ResourceKind>,
    api: Arc<dyn ControlPlane>,
    project: ProjectId,
    opts: SweepOptions,
    sinks: SinkRegistry,
}

impl DependencyNode {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        kind: ResourceKind,
        prereq_count: usize,
        prereq_rx: mpsc::Receiver<()>,
        dependents: Vec<(ResourceKind, mpsc::Sender<()>)>,
        completion_tx: mpsc::Sender<ResourceKind>,
        api: Arc<dyn ControlPlane>,
        project: ProjectId,
        opts: SweepOptions,
        sinks: SinkRegistry,
    ) -> Self {
        Self {
            kind,
            prereq_count,
            prereq_rx,
            dependents,
            completion_tx,
            api,
            project,
            opts,
            sinks,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut state = NodeState::Idle;
        debug!(
            kind = %self.kind,
            prerequisites = self.prereq_count,
            dependents = self.dependents.len(),
            "node launched"
        );
        self.transition(&mut state, NodeState::WaitingOnPrerequisites);

        for received in 0..self.prereq_count {
            if self.prereq_rx.recv().await.is_none() {
                // A prerequisite's sender dropped without notifying.
                // The graph must still drain, so count it as satisfied.
                warn!(
                    kind = %self.kind,
                    received,
                    expected = self.prereq_count,
                    "prerequisite channel closed early"
                );
                break;
            }
        }

        self.transition(&mut state, NodeState::Executing);
        let sink = self.execute().await;

        self.transition(&mut state, NodeState::NotifyingDependents);
        self.sinks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(self.kind, sink);
        for (dependent, tx) in &self.dependents {
            // A dependent that already gave up has a closed channel;
            // nothing left to gate there.
            let _ = tx.send(()).await;
            debug!(kind = %self.kind, dependent = %dependent, "notified dependent");
        }
        let _ = self.completion_tx.send(self.kind).await;

        self.transition(&mut state, NodeState::Done);
    }

    /// Run the deletion routine on its own task so a panic or an
    /// overrun deadline degrades this node instead of killing it.
    async fn execute(&self) -> ResultSink {
        let Some(routine) = registry::deleter(self.kind) else {
            // Graph validation rejects kinds without a routine.
            return degraded_sink(self.kind, "no deletion routine registered");
        };
        info!(kind = %self.kind, project = %self.project, "node executing");

        let mut exec = tokio::spawn(routine(
            Arc::clone(&self.api),
            self.project.clone(),
            self.opts.clone(),
        ));

        let joined = match self.opts.node_deadline() {
            Some(deadline) => match timeout(deadline, &mut exec).await {
                Ok(joined) => joined,
                Err(_) => {
                    exec.abort();
                    warn!(
                        kind = %self.kind,
                        timeout_secs = self.opts.node_timeout_secs,
                        "node deadline exceeded, completing degraded"
                    );
                    return degraded_sink(
                        self.kind,
                        format!(
                            "node deadline of {}s exceeded",
                            self.opts.node_timeout_secs
                        ),
                    );
                }
            },
            None => (&mut exec).await,
        };

        match joined {
            Ok(Ok(sink)) => sink,
            Ok(Err(e)) => {
                warn!(kind = %self.kind, error = %e, "discovery failed, completing degraded");
                degraded_sink(self.kind, format!("discovery failed: {e}"))
            }
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "deletion routine panicked, completing degraded");
                degraded_sink(self.kind, format!("deletion routine panicked: {e}"))
            }
        }
    }

    fn transition(&self, state: &mut NodeState, next: NodeState) {
        debug!(kind = %self.kind, from = ?*state, to = ?next, "node state");
        *state = next;
    }
}

/// A one-entry sink recording a node-level fault so the report shows
/// why the kind produced no per-item outcomes.
fn degraded_sink(kind: ResourceKind, response: impl Into<String>) -> ResultSink {
    let mut sink = ResultSink::with_capacity(kind, 1);
    sink.push(DeletionOutcome::failed(
        BTreeMap::from([("resource_type".to_string(), kind.as_str().to_string())]),
        response,
    ));
    sink
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_sink_is_full_with_one_failure() {
        let sink = degraded_sink(ResourceKind::Network, "node deadline of 1s exceeded");
        assert!(sink.is_full());
        assert_eq!(sink.failures().count(), 1);
        let failure = sink.failures().next().unwrap();
        assert!(failure.response.contains("deadline"));
        assert_eq!(
            failure.parameters.get("resource_type").map(String::as_str),
            Some("network")
        );
    }
}
