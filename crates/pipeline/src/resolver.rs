//! Normalizes, deduplicates and conflict-resolves dependency candidates
//!
//! `merge` depends only on the multiset of candidates: every accumulator is
//! ordered (`BTreeMap`/`BTreeSet`) and statuses combine through `max`.

use crate::catalog::ConfigCatalog;
use crate::extractor::CONFIG_SENTINEL;
use std::collections::{BTreeMap, BTreeSet};
use svcgraph_core::model::{
    CanonicalEdge, Confidence, DependencyFactCandidate, DependencyGraph, DependencyKind, EdgeKey,
    EdgeStatus, Evidence, Service, TargetRef,
};
use tracing::{debug, info, warn};

/// Suffixes dropped when a name does not match as written.
const NAME_SUFFIXES: &[&str] = &["-service", "_service", "-svc", "-api", "-server"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Service(String),
    /// Config key defined by these services.
    Owners { key: String, owners: BTreeSet<String> },
    Unresolved(String),
}

#[derive(Default)]
struct ConfigGroup {
    owners: BTreeSet<String>,
    evidence: BTreeSet<Evidence>,
    confidence: Option<Confidence>,
}

impl ConfigGroup {
    fn absorb(&mut self, owners: impl IntoIterator<Item = String>, candidate: &DependencyFactCandidate) {
        self.owners.extend(owners);
        self.evidence.extend(candidate.evidence.iter().cloned());
        self.confidence = self.confidence.max(Some(candidate.confidence));
    }
}

pub struct FactResolver<'a> {
    project: String,
    services: Vec<Service>,
    /// lowercased id or alias -> id
    lookup: BTreeMap<String, String>,
    catalog: &'a ConfigCatalog,
}

impl<'a> FactResolver<'a> {
    pub fn new(project: impl Into<String>, services: &[Service], catalog: &'a ConfigCatalog) -> Self {
        let mut lookup = BTreeMap::new();
        for (alias, id) in catalog.aliases() {
            lookup.insert(alias.to_lowercase(), id.clone());
        }
        for service in services {
            for alias in &service.aliases {
                lookup.insert(alias.to_lowercase(), service.id.clone());
            }
        }
        for service in services {
            lookup.insert(service.id.to_lowercase(), service.id.clone());
        }

        Self {
            project: project.into(),
            services: services.to_vec(),
            lookup,
            catalog,
        }
    }

    pub fn merge(&self, candidates: &[DependencyFactCandidate]) -> DependencyGraph {
        let mut graph = DependencyGraph::new(self.project.clone(), self.services.iter().cloned());
        let mut groups: BTreeMap<(String, String), ConfigGroup> = BTreeMap::new();
        let mut dropped_self_loops = 0usize;

        for candidate in candidates {
            if !graph.has_service(&candidate.source) {
                warn!(source = %candidate.source, "Dropping candidate from unknown service");
                continue;
            }
            if candidate.evidence.is_empty() {
                debug!(source = %candidate.source, target = %candidate.target.name(), "Dropping candidate without evidence");
                continue;
            }

            let (target, status) = match (self.resolve(candidate), config_key(candidate)) {
                (Resolution::Owners { key, mut owners }, _) => {
                    // A service reading a key it defines itself reads its own config.
                    if owners.contains(&candidate.source) {
                        owners = BTreeSet::from([candidate.source.clone()]);
                    }
                    groups
                        .entry((candidate.source.clone(), key))
                        .or_default()
                        .absorb(owners, candidate);
                    continue;
                }
                (Resolution::Service(id), Some(key)) => {
                    groups
                        .entry((candidate.source.clone(), key))
                        .or_default()
                        .absorb([id], candidate);
                    continue;
                }
                (Resolution::Service(id), None) => (id, EdgeStatus::Confirmed),
                (Resolution::Unresolved(name), _) => (name, EdgeStatus::UnresolvedTarget),
            };
            if target == candidate.source {
                dropped_self_loops += 1;
                continue;
            }

            let edge = upsert(
                &mut graph,
                EdgeKey::new(candidate.source.clone(), target, candidate.kind),
                status,
                candidate.confidence,
            );
            edge.evidence.extend(candidate.evidence.iter().cloned());
            if let Some(key) = config_key(candidate) {
                edge.config_keys.insert(key);
            }
        }

        for ((source, key), group) in groups {
            let others: BTreeSet<&String> = group.owners.iter().filter(|o| **o != source).collect();
            let Some(target) = others.first().map(|o| (*o).clone()) else {
                dropped_self_loops += 1;
                continue;
            };
            // Several distinct owners, none of them the reader, is a disagreement
            // nobody can settle here. The edge keeps every claim.
            let status = if group.owners.len() > 1 {
                EdgeStatus::Conflicting
            } else {
                EdgeStatus::Confirmed
            };
            if status == EdgeStatus::Conflicting {
                debug!(source = %source, key = %key, owners = ?group.owners, "Config key claimed by several owners");
            }

            let edge = upsert(
                &mut graph,
                EdgeKey::new(source, target, DependencyKind::ConfigReference),
                status,
                group.confidence.unwrap_or(Confidence::Low),
            );
            edge.evidence.extend(group.evidence);
            edge.config_keys.insert(key);
            if status == EdgeStatus::Conflicting {
                edge.claimed_owners.extend(group.owners);
            }
        }

        let counts = graph.status_counts();
        info!(
            candidates = candidates.len(),
            edges = graph.edges.len(),
            confirmed = counts.confirmed,
            conflicting = counts.conflicting,
            unresolved = counts.unresolved_target,
            self_loops = dropped_self_loops,
            "Merged dependency candidates"
        );
        graph
    }

    fn resolve(&self, candidate: &DependencyFactCandidate) -> Resolution {
        let raw = candidate.target.name().trim();

        if candidate.kind == DependencyKind::ConfigReference {
            if let Some(key) = raw.strip_prefix(CONFIG_SENTINEL) {
                let key = key.trim().to_string();
                let owners = self.catalog.owners(&key);
                return if owners.is_empty() {
                    Resolution::Unresolved(format!("{}{}", CONFIG_SENTINEL, key))
                } else {
                    Resolution::Owners { key, owners }
                };
            }
        }

        if let TargetRef::Resolved(id) = &candidate.target {
            if self.services.iter().any(|s| &s.id == id) {
                return Resolution::Service(id.clone());
            }
        }

        match self.lookup_name(raw) {
            Some(id) => Resolution::Service(id),
            None => Resolution::Unresolved(normalized_name(raw)),
        }
    }

    /// Exact id, then host of a URL, then case-insensitive id or alias, then
    /// the same with common suffixes removed.
    fn lookup_name(&self, raw: &str) -> Option<String> {
        if let Some(service) = self.services.iter().find(|s| s.id == raw) {
            return Some(service.id.clone());
        }

        let host = host_of(raw);
        let mut names = vec![raw.to_lowercase(), host.clone()];
        if let Some((label, _)) = host.split_once('.') {
            names.push(label.to_string());
        }
        for name in names.clone() {
            for suffix in NAME_SUFFIXES {
                if let Some(stripped) = name.strip_suffix(suffix) {
                    names.push(stripped.to_string());
                }
            }
        }

        names
            .iter()
            .filter(|n| !n.is_empty())
            .find_map(|n| self.lookup.get(n).cloned())
    }
}

fn config_key(candidate: &DependencyFactCandidate) -> Option<String> {
    if candidate.kind != DependencyKind::ConfigReference {
        return None;
    }
    candidate.config_key.clone().or_else(|| {
        candidate
            .target
            .name()
            .trim()
            .strip_prefix(CONFIG_SENTINEL)
            .map(|k| k.trim().to_string())
    })
}

fn upsert(
    graph: &mut DependencyGraph,
    key: EdgeKey,
    status: EdgeStatus,
    confidence: Confidence,
) -> &mut CanonicalEdge {
    let edge = graph
        .edges
        .entry(key.clone())
        .or_insert_with(|| CanonicalEdge::new(&key, status, confidence));
    edge.status = edge.status.max(status);
    edge.confidence = edge.confidence.max(confidence);
    edge
}

/// Lowercased host of a URL-like reference; the input itself otherwise.
fn host_of(raw: &str) -> String {
    let rest = raw.split_once("://").map(|(_, r)| r).unwrap_or(raw);
    let rest = rest.rsplit_once('@').map(|(_, r)| r).unwrap_or(rest);
    let end = rest.find(['/', '?', '#', ':']).unwrap_or(rest.len());
    rest[..end].trim().to_lowercase()
}

fn normalized_name(raw: &str) -> String {
    let host = host_of(raw);
    if host.is_empty() {
        raw.trim().to_lowercase()
    } else {
        host
    }
}
