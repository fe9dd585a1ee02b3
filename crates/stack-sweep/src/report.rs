//! Sweep reports
//!
//! Built once from frozen result sinks and immutable afterwards, so
//! rendering the same report twice yields identical output. Rendered
//! as tables for humans and as JSON for machines.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use serde::Serialize;
use stack_sweep_common::{DeletionOutcome, ResourceKind, ResultSink};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Per-kind subtotal within one project.
#[derive(Debug, Clone, Serialize)]
pub struct KindReport {
    pub kind: ResourceKind,
    pub attempted: usize,
    /// Identifying parameters of each deleted item.
    pub succeeded: Vec<BTreeMap<String, String>>,
    pub failed: Vec<DeletionOutcome>,
}

impl KindReport {
    fn empty(kind: ResourceKind) -> Self {
        Self {
            kind,
            attempted: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn from_sink(sink: &ResultSink) -> Self {
        let mut succeeded: Vec<_> = sink.successes().map(|o| o.parameters.clone()).collect();
        let mut failed: Vec<_> = sink.failures().cloned().collect();
        // Sink order is fan-in arrival order; sort for stable output.
        succeeded.sort();
        failed.sort_by(|a, b| a.parameters.cmp(&b.parameters));
        Self {
            kind: sink.kind(),
            attempted: sink.capacity(),
            succeeded,
            failed,
        }
    }
}

/// Everything swept (or attempted) in one project, in canonical
/// deletion order. Kinds with no sink show a zero row.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub project: String,
    pub kinds: Vec<KindReport>,
}

impl ProjectReport {
    pub(crate) fn from_sinks(project: &str, sinks: &HashMap<ResourceKind, ResultSink>) -> Self {
        let kinds = ResourceKind::ALL
            .iter()
            .map(|kind| match sinks.get(kind) {
                Some(sink) => KindReport::from_sink(sink),
                None => KindReport::empty(*kind),
            })
            .collect();
        Self {
            project: project.to_string(),
            kinds,
        }
    }

    pub fn kind(&self, kind: ResourceKind) -> &KindReport {
        // ALL covers every kind, so the row always exists.
        &self.kinds[kind.display_order()]
    }

    pub fn total_attempted(&self) -> usize {
        self.kinds.iter().map(|k| k.attempted).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.kinds.iter().map(|k| k.failed.len()).sum()
    }

    fn render_into(&self, out: &mut String) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Resource", "Attempted", "Succeeded", "Failed"]);
        for kind in &self.kinds {
            table.add_row(vec![
                Cell::new(kind.kind),
                Cell::new(kind.attempted),
                Cell::new(kind.succeeded.len()),
                Cell::new(kind.failed.len()),
            ]);
        }
        out.push_str(&format!("project {}\n{table}\n", self.project));

        for kind in &self.kinds {
            for params in &kind.succeeded {
                out.push_str(&format!(
                    "  deleted {} {}\n",
                    kind.kind,
                    format_parameters(params)
                ));
            }
            for failure in &kind.failed {
                out.push_str(&format!(
                    "  failed {} {}: {}\n",
                    kind.kind,
                    format_parameters(&failure.parameters),
                    failure.response
                ));
            }
        }
    }
}

/// Aggregated result of one `Cleaner` run across projects.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub projects: Vec<ProjectReport>,
    /// Project names that could not be resolved and were not swept.
    pub skipped_projects: Vec<String>,
}

impl SweepReport {
    pub(crate) fn new(mut projects: Vec<ProjectReport>, skipped_projects: Vec<String>) -> Self {
        projects.sort_by(|a, b| a.project.cmp(&b.project));
        Self {
            projects,
            skipped_projects,
        }
    }

    pub fn project(&self, name: &str) -> Option<&ProjectReport> {
        self.projects.iter().find(|p| p.project == name)
    }

    /// Per-kind totals across all projects, in canonical order.
    pub fn totals(&self) -> Vec<(ResourceKind, usize, usize, usize)> {
        ResourceKind::ALL
            .iter()
            .map(|kind| {
                let rows = self.projects.iter().map(|p| p.kind(*kind));
                let (mut attempted, mut succeeded, mut failed) = (0, 0, 0);
                for row in rows {
                    attempted += row.attempted;
                    succeeded += row.succeeded.len();
                    failed += row.failed.len();
                }
                (*kind, attempted, succeeded, failed)
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for project in &self.projects {
            project.render_into(&mut out);
        }
        if !self.skipped_projects.is_empty() {
            out.push_str(&format!(
                "skipped projects: {}\n",
                self.skipped_projects.join(", ")
            ));
        }
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Resource", "Attempted", "Succeeded", "Failed"]);
        for (kind, attempted, succeeded, failed) in self.totals() {
            table.add_row(vec![
                Cell::new(kind),
                Cell::new(attempted),
                Cell::new(succeeded),
                Cell::new(failed),
            ]);
        }
        out.push_str(&format!("totals\n{table}\n"));
        out
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn format_parameters(params: &BTreeMap<String, String>) -> String {
    let joined = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{joined}}}")
}
