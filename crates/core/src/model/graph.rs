use super::dependency::{Confidence, DependencyKind, Evidence};
use super::service::Service;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeStatus {
    Confirmed,
    Conflicting,
    UnresolvedTarget,
}

impl EdgeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeStatus::Confirmed => "confirmed",
            EdgeStatus::Conflicting => "conflicting",
            EdgeStatus::UnresolvedTarget => "unresolved-target",
        }
    }
}

impl fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dedup key of a canonical edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub kind: DependencyKind,
}

impl EdgeKey {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.kind, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEdge {
    pub source: String,
    pub target: String,
    pub kind: DependencyKind,
    pub status: EdgeStatus,
    pub evidence: BTreeSet<Evidence>,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub config_keys: BTreeSet<String>,
    /// Every owner claimed for the config keys of a conflicting edge.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub claimed_owners: BTreeSet<String>,
}

impl CanonicalEdge {
    pub fn new(key: &EdgeKey, status: EdgeStatus, confidence: Confidence) -> Self {
        Self {
            source: key.source.clone(),
            target: key.target.clone(),
            kind: key.kind,
            status,
            evidence: BTreeSet::new(),
            confidence,
            config_keys: BTreeSet::new(),
            claimed_owners: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.source.clone(), self.target.clone(), self.kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub confirmed: usize,
    pub conflicting: usize,
    pub unresolved_target: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.confirmed + self.conflicting + self.unresolved_target
    }
}

/// Services plus canonical edges, keyed so that no two edges share
/// `(source, target, kind)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub project: String,
    pub services: BTreeMap<String, Service>,
    pub edges: BTreeMap<EdgeKey, CanonicalEdge>,
}

impl DependencyGraph {
    pub fn new(project: impl Into<String>, services: impl IntoIterator<Item = Service>) -> Self {
        Self {
            project: project.into(),
            services: services.into_iter().map(|s| (s.id.clone(), s)).collect(),
            edges: BTreeMap::new(),
        }
    }

    pub fn has_service(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }

    pub fn edge(&self, source: &str, target: &str, kind: DependencyKind) -> Option<&CanonicalEdge> {
        self.edges.get(&EdgeKey::new(source, target, kind))
    }

    pub fn edges_with_status(&self, status: EdgeStatus) -> impl Iterator<Item = &CanonicalEdge> {
        self.edges.values().filter(move |e| e.status == status)
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for edge in self.edges.values() {
            match edge.status {
                EdgeStatus::Confirmed => counts.confirmed += 1,
                EdgeStatus::Conflicting => counts.conflicting += 1,
                EdgeStatus::UnresolvedTarget => counts.unresolved_target += 1,
            }
        }
        counts
    }

    /// Checks the structural invariants. Returns the offending edge keys.
    pub fn dangling_edges(&self) -> Vec<EdgeKey> {
        self.edges
            .iter()
            .filter(|(_, edge)| edge.status != EdgeStatus::UnresolvedTarget)
            .filter(|(_, edge)| !self.has_service(&edge.source) || !self.has_service(&edge.target))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> DependencyGraph {
        DependencyGraph::new(
            "shop",
            vec![Service::new("gateway"), Service::new("orders")],
        )
    }

    #[test]
    fn test_status_counts() {
        let mut g = graph();
        let confirmed = EdgeKey::new("orders", "gateway", DependencyKind::HttpCall);
        let unresolved = EdgeKey::new("orders", "billing", DependencyKind::HttpCall);
        g.edges.insert(
            confirmed.clone(),
            CanonicalEdge::new(&confirmed, EdgeStatus::Confirmed, Confidence::High),
        );
        g.edges.insert(
            unresolved.clone(),
            CanonicalEdge::new(&unresolved, EdgeStatus::UnresolvedTarget, Confidence::Low),
        );

        let counts = g.status_counts();
        assert_eq!(counts.confirmed, 1);
        assert_eq!(counts.unresolved_target, 1);
        assert_eq!(counts.total(), 2);
        assert!(g.dangling_edges().is_empty());
    }

    #[test]
    fn test_dangling_edge_detected() {
        let mut g = graph();
        let key = EdgeKey::new("orders", "ghost", DependencyKind::DatabaseAccess);
        g.edges.insert(
            key.clone(),
            CanonicalEdge::new(&key, EdgeStatus::Confirmed, Confidence::Medium),
        );
        assert_eq!(g.dangling_edges(), vec![key]);
    }

    #[test]
    fn test_edge_key_display() {
        let key = EdgeKey::new("orders", "gateway", DependencyKind::HttpCall);
        assert_eq!(key.to_string(), "orders -[http-call]-> gateway");
    }
}
