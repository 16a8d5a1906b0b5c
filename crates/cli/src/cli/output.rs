//! Output formatting for run summaries and health checks
//!
//! JSON and YAML serialize the same document; the human format is a short
//! report meant for a terminal.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::Write;
use svcgraph_core::model::{DependencyGraph, RunSummary};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub available: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn available(message: impl Into<String>) -> Self {
        Self {
            available: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary)
                .context("Failed to serialize run summary to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(summary).context("Failed to serialize run summary to YAML")
            }
            OutputFormat::Human => Ok(summary_human(summary)),
        }
    }

    pub fn format_health(&self, results: &BTreeMap<String, HealthStatus>) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(results)
                .context("Failed to serialize health status to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(results).context("Failed to serialize health status to YAML")
            }
            OutputFormat::Human => Ok(health_human(results)),
        }
    }
}

fn summary_human(summary: &RunSummary) -> String {
    let mut out = String::new();

    if summary.is_complete() {
        out.push_str("\u{2713} Dependency Graph Extracted\n");
    } else {
        out.push_str("\u{26A0} Dependency Graph Extracted (Incomplete)\n");
    }
    out.push_str(RULE);
    out.push_str("\n\n");

    let _ = writeln!(out, "Project:     {}", summary.project);
    let _ = writeln!(out, "Run:         {}", summary.run_id);
    let _ = writeln!(out, "Duration:    {:.1}s\n", summary.duration_ms as f64 / 1000.0);

    out.push_str("Services:\n");
    let _ = writeln!(out, "\u{251C}\u{2500} Found:      {}", summary.services_found);
    let _ = writeln!(out, "\u{251C}\u{2500} Analyzed:   {}", summary.services_analyzed);
    let _ = writeln!(out, "\u{2514}\u{2500} Candidates: {}\n", summary.candidates_generated);

    let counts = &summary.edges_by_status;
    out.push_str("Edges:\n");
    let _ = writeln!(out, "\u{251C}\u{2500} Confirmed:         {}", counts.confirmed);
    let _ = writeln!(out, "\u{251C}\u{2500} Conflicting:       {}", counts.conflicting);
    let _ = writeln!(out, "\u{2514}\u{2500} Unresolved target: {}", counts.unresolved_target);

    if let Some(written) = &summary.materialized {
        let _ = writeln!(
            out,
            "\nWritten: {} nodes, {} edges",
            written.nodes, written.edges
        );
    }

    if !summary.incomplete.is_empty() {
        out.push_str("\nIncomplete services:\n");
        for item in &summary.incomplete {
            let _ = writeln!(out, "  \u{2717} {}: {}", item.service, item.reason);
        }
    }

    if !summary.skipped_kinds.is_empty() {
        out.push_str("\nSkipped queries:\n");
        for item in &summary.skipped_kinds {
            let _ = writeln!(out, "  - {} / {}: {}", item.service, item.kind, item.reason);
        }
    }

    out
}

fn health_human(results: &BTreeMap<String, HealthStatus>) -> String {
    let mut out = String::new();
    out.push_str("Collaborator Health Status\n");
    out.push_str(RULE);
    out.push_str("\n\n");

    for (name, status) in results {
        let symbol = if status.available { "\u{2713}" } else { "\u{2717}" };
        let _ = writeln!(out, "{} {}", symbol, name);
        let _ = writeln!(
            out,
            "  Status: {}",
            if status.available { "Available" } else { "Unavailable" }
        );
        let _ = writeln!(out, "  Message: {}", status.message);
        if let Some(details) = &status.details {
            let _ = writeln!(out, "  Details: {}", details);
        }
        out.push('\n');
    }
    out
}

/// JSON document of a merged graph. Edges are listed instead of keyed,
/// since JSON object keys must be strings.
pub fn graph_document(graph: &DependencyGraph) -> Value {
    json!({
        "project": graph.project,
        "services": graph.services.values().collect::<Vec<_>>(),
        "edges": graph.edges.values().collect::<Vec<_>>(),
    })
}
