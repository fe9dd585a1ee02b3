//! Multi-project cleaner
//!
//! Resolves each requested project name, skips the ones the control
//! plane does not know, and sweeps the rest concurrently. One bad
//! project never aborts the run.

use crate::api::ControlPlane;
use crate::config::SweepOptions;
use crate::graph::DependencyGraph;
use crate::project::ProjectRunner;
use crate::report::{ProjectReport, SweepReport};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub struct Cleaner {
    api: Arc<dyn ControlPlane>,
    opts: SweepOptions,
    graph: DependencyGraph,
}

impl Cleaner {
    pub fn new(api: Arc<dyn ControlPlane>, opts: SweepOptions) -> Self {
        Self {
            api,
            opts,
            graph: DependencyGraph::standard(),
        }
    }

    /// Replace the standard topology. Validation happens when each
    /// project runner is built.
    pub fn with_graph(mut self, graph: DependencyGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Sweep every named project. Unknown names, resolution errors and
    /// panicked runners are reported, never fatal; the only hard error
    /// is a topology that fails validation.
    pub async fn run(&self, project_names: &[&str]) -> anyhow::Result<SweepReport> {
        let mut skipped = Vec::new();
        let mut runners = Vec::new();
        for name in project_names {
            match self.api.resolve_project(name).await {
                Ok(Some(project_id)) => {
                    let runner = ProjectRunner::with_graph(
                        *name,
                        project_id,
                        Arc::clone(&self.api),
                        self.opts.clone(),
                        self.graph.clone(),
                    )?;
                    runners.push(runner);
                }
                Ok(None) => {
                    warn!(project = %name, "project not found, skipping");
                    skipped.push(name.to_string());
                }
                Err(e) => {
                    warn!(project = %name, error = %e, "project resolution failed, skipping");
                    skipped.push(name.to_string());
                }
            }
        }
        info!(
            projects = runners.len(),
            skipped = skipped.len(),
            "starting sweep"
        );

        let mut tasks = JoinSet::new();
        for runner in runners {
            tasks.spawn(runner.run());
        }
        let mut reports: Vec<ProjectReport> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    info!(
                        project = %report.project,
                        attempted = report.total_attempted(),
                        failed = report.total_failed(),
                        "project report ready"
                    );
                    reports.push(report);
                }
                Err(e) => {
                    // The runner itself panicked; its project has no
                    // report but the others still complete.
                    warn!(error = %e, "project runner panicked");
                }
            }
        }

        Ok(SweepReport::new(reports, skipped))
    }
}
