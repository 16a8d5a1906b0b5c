//! Writes the canonical graph through the `GraphStore` collaborator

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use svcgraph_core::model::{
    CanonicalEdge, Confidence, DependencyGraph, DependencyKind, EdgeStatus, Evidence,
    MaterializeReport, Service,
};
use svcgraph_core::PersistenceError;
use svcgraph_store::{GraphStore, NodeRef, Props};
use tracing::{debug, info};

pub const PROJECT_LABEL: &str = "Project";
pub const SERVICE_LABEL: &str = "Service";
pub const CONFIG_CENTER_LABEL: &str = "ConfigCenter";
pub const CONTAINS: &str = "CONTAINS";

pub fn project_node_id(project: &str) -> String {
    format!("project:{}", project)
}

fn service_node<'a>(project: &'a str, id: &'a str) -> NodeRef<'a> {
    NodeRef::new(project, SERVICE_LABEL, id)
}

/// Entry of a service's `unresolved_references` property.
#[derive(Debug, Serialize)]
struct UnresolvedReference<'a> {
    target: &'a str,
    kind: DependencyKind,
    confidence: Confidence,
    evidence: Vec<&'a Evidence>,
}

pub struct GraphMaterializer {
    store: Arc<dyn GraphStore>,
}

impl GraphMaterializer {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Upserts every node and edge. Running it twice on the same graph leaves
    /// the store unchanged after the first pass.
    pub async fn materialize(
        &self,
        graph: &DependencyGraph,
    ) -> Result<MaterializeReport, PersistenceError> {
        let dangling = graph.dangling_edges();
        if !dangling.is_empty() {
            let keys: Vec<String> = dangling.iter().map(ToString::to_string).collect();
            return Err(PersistenceError::Rejected(format!(
                "edges reference unknown services: {}",
                keys.join(", ")
            )));
        }

        let start = Instant::now();
        let mut report = MaterializeReport::default();

        let mut unresolved: BTreeMap<&str, Vec<&CanonicalEdge>> = BTreeMap::new();
        for edge in graph.edges_with_status(EdgeStatus::UnresolvedTarget) {
            unresolved.entry(edge.source.as_str()).or_default().push(edge);
        }

        let project = graph.project.as_str();
        let project_id = project_node_id(project);
        let project_node = NodeRef::new(project, PROJECT_LABEL, &project_id);
        let mut project_props = Props::new();
        project_props.insert("name".to_string(), json!(project));
        self.store.upsert_node(project_node, &[], project_props).await?;
        report.nodes += 1;

        for service in graph.services.values() {
            let refs = unresolved.get(service.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            report.unresolved_references += refs.len();

            let node = service_node(project, &service.id);
            let extra_labels: &[&str] = if service.is_config_center {
                &[CONFIG_CENTER_LABEL]
            } else {
                &[]
            };
            self.store
                .upsert_node(node, extra_labels, service_props(project, service, refs))
                .await?;
            report.nodes += 1;

            self.store
                .upsert_edge(project_node, node, CONTAINS, Props::new())
                .await?;
            report.edges += 1;
        }

        for edge in graph.edges.values() {
            if edge.status == EdgeStatus::UnresolvedTarget {
                continue;
            }
            let rel_type = edge.kind.relationship_type();
            debug!(source = %edge.source, target = %edge.target, rel = %rel_type, "Writing edge");
            self.store
                .upsert_edge(
                    service_node(project, &edge.source),
                    service_node(project, &edge.target),
                    &rel_type,
                    edge_props(edge),
                )
                .await?;
            report.edges += 1;
        }

        info!(
            store = self.store.name(),
            nodes = report.nodes,
            edges = report.edges,
            unresolved = report.unresolved_references,
            duration_ms = start.elapsed().as_millis() as u64,
            "Materialized dependency graph"
        );
        Ok(report)
    }
}

fn service_props(project: &str, service: &Service, unresolved: &[&CanonicalEdge]) -> Props {
    let mut props = Props::new();
    props.insert("name".to_string(), json!(service.id));
    props.insert("project".to_string(), json!(project));
    props.insert(
        "source_root".to_string(),
        service
            .source_root
            .as_ref()
            .map(|p| json!(p.display().to_string()))
            .unwrap_or(Value::Null),
    );
    props.insert(
        "image".to_string(),
        service.image.as_ref().map(|i| json!(i)).unwrap_or(Value::Null),
    );
    props.insert("is_config_center".to_string(), json!(service.is_config_center));
    props.insert("aliases".to_string(), json!(service.aliases));
    props.insert("ports".to_string(), json!(service.ports));

    let references = if unresolved.is_empty() {
        Value::Null
    } else {
        let entries: Vec<UnresolvedReference> = unresolved
            .iter()
            .map(|edge| UnresolvedReference {
                target: &edge.target,
                kind: edge.kind,
                confidence: edge.confidence,
                evidence: edge.evidence.iter().collect(),
            })
            .collect();
        serde_json::to_string(&entries)
            .map(Value::String)
            .unwrap_or(Value::Null)
    };
    props.insert("unresolved_references".to_string(), references);
    props
}

fn edge_props(edge: &CanonicalEdge) -> Props {
    let evidence = serde_json::to_string(&edge.evidence).unwrap_or_else(|_| "[]".to_string());

    let mut props = Props::new();
    props.insert("kind".to_string(), json!(edge.kind));
    props.insert("status".to_string(), json!(edge.status.as_str()));
    props.insert("confidence".to_string(), json!(edge.confidence));
    props.insert("evidence".to_string(), json!(evidence));
    props.insert("config_keys".to_string(), json!(edge.config_keys));
    props.insert("claimed_owners".to_string(), json!(edge.claimed_owners));
    props
}
