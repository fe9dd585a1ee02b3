//! Per-project sweep runner
//!
//! Launches every dependency node of the graph up front and wires the
//! topology with channels: each node owns a countdown receiver whose
//! capacity is its prerequisite count, and every node reports on a
//! shared completion channel sized to the node count. The runner waits
//! for as many completion messages as there are nodes, then freezes
//! the sink registry into a report.

use crate::api::{ControlPlane, ProjectId};
use crate::config::SweepOptions;
use crate::graph::{DependencyGraph, GraphError};
use crate::node::{DependencyNode, SinkRegistry};
use crate::report::ProjectReport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct ProjectRunner {
    project_name: String,
    project_id: ProjectId,
    api: Arc<dyn ControlPlane>,
    graph: DependencyGraph,
    opts: SweepOptions,
}

impl ProjectRunner {
    /// A runner over the standard full-sweep topology.
    pub fn new(
        project_name: impl Into<String>,
        project_id: ProjectId,
        api: Arc<dyn ControlPlane>,
        opts: SweepOptions,
    ) -> Result<Self, GraphError> {
        Self::with_graph(project_name, project_id, api, opts, DependencyGraph::standard())
    }

    /// A runner over a caller-supplied topology. The graph is validated
    /// here; an invalid graph never launches.
    pub fn with_graph(
        project_name: impl Into<String>,
        project_id: ProjectId,
        api: Arc<dyn ControlPlane>,
        opts: SweepOptions,
        graph: DependencyGraph,
    ) -> Result<Self, GraphError> {
        graph.validate()?;
        Ok(Self {
            project_name: project_name.into(),
            project_id,
            api,
            graph,
            opts,
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Sweep the project and return its report. Always returns: every
    /// node completes, degraded if its routine faulted or timed out.
    pub async fn run(self) -> ProjectReport {
        let kinds = self.graph.nodes().to_vec();
        info!(
            project = %self.project_name,
            nodes = kinds.len(),
            "sweeping project"
        );

        let (completion_tx, mut completion_rx) = mpsc::channel(kinds.len().max(1));

        // One countdown channel per node, capacity = prerequisite count
        // so notifications never block the sender.
        let mut countdown_tx = HashMap::new();
        let mut countdown_rx = HashMap::new();
        for kind in &kinds {
            let (tx, rx) = mpsc::channel(self.graph.in_degree(*kind).max(1));
            countdown_tx.insert(*kind, tx);
            countdown_rx.insert(*kind, rx);
        }

        let sinks: SinkRegistry = Arc::new(Mutex::new(HashMap::new()));
        let mut nodes = JoinSet::new();
        for kind in &kinds {
            let dependents = self
                .graph
                .dependents(*kind)
                .into_iter()
                .map(|dependent| (dependent, countdown_tx[&dependent].clone()))
                .collect();
            let rx = countdown_rx
                .remove(kind)
                .expect("one countdown receiver per node");
            nodes.spawn(
                DependencyNode::new(
                    *kind,
                    self.graph.in_degree(*kind),
                    rx,
                    dependents,
                    completion_tx.clone(),
                    Arc::clone(&self.api),
                    self.project_id.clone(),
                    self.opts.clone(),
                    Arc::clone(&sinks),
                )
                .run(),
            );
        }
        // Nodes hold the only remaining senders.
        drop(countdown_tx);
        drop(completion_tx);

        let mut completed = 0;
        while completed < kinds.len() {
            match completion_rx.recv().await {
                Some(kind) => {
                    completed += 1;
                    debug!(
                        project = %self.project_name,
                        kind = %kind,
                        completed,
                        total = kinds.len(),
                        "node completed"
                    );
                }
                None => {
                    // Every node sends exactly once before dropping its
                    // sender, so this only happens if a node task died.
                    warn!(
                        project = %self.project_name,
                        completed,
                        total = kinds.len(),
                        "completion channel closed early"
                    );
                    break;
                }
            }
        }
        while nodes.join_next().await.is_some() {}

        let sinks = {
            let mut guard = sinks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        info!(project = %self.project_name, "project sweep complete");
        ProjectReport::from_sinks(&self.project_name, &sinks)
    }
}
