use super::dependency::DependencyKind;
use super::graph::StatusCounts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A service whose extraction did not finish. Its graph coverage is partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteService {
    pub service: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_kinds: Vec<DependencyKind>,
}

/// A dependency-kind query whose model response could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedKind {
    pub service: String,
    pub kind: DependencyKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeReport {
    pub nodes: usize,
    pub edges: usize,
    pub unresolved_references: usize,
}

/// Result of one analysis run, surfaced to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub project: String,
    pub started_at: DateTime<Utc>,
    pub services_found: usize,
    pub services_analyzed: usize,
    pub candidates_generated: usize,
    pub edges_by_status: StatusCounts,
    #[serde(default)]
    pub incomplete: Vec<IncompleteService>,
    #[serde(default)]
    pub skipped_kinds: Vec<SkippedKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materialized: Option<MaterializeReport>,
    pub duration_ms: u64,
}

/// Fresh identifier for one analysis run. Also scopes the run's vector collection.
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            project: project.into(),
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty() && self.skipped_kinds.is_empty()
    }

    pub fn is_incomplete(&self, service: &str) -> bool {
        self.incomplete.iter().any(|i| i.service == service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = new_run_id();
        let b = new_run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_incomplete_lookup() {
        let mut summary = RunSummary::new(new_run_id(), "shop");
        assert!(summary.is_complete());

        summary.incomplete.push(IncompleteService {
            service: "payments".to_string(),
            reason: "embedding service unavailable".to_string(),
            failed_kinds: vec![DependencyKind::HttpCall],
        });

        assert!(!summary.is_complete());
        assert!(summary.is_incomplete("payments"));
        assert!(!summary.is_incomplete("orders"));
    }
}
