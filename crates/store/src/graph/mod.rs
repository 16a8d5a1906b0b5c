mod memory;
mod neo4j;

pub use memory::{InMemoryGraphStore, StoredEdge, StoredNode};
pub use neo4j::Neo4jHttpStore;

use async_trait::async_trait;
use svcgraph_core::PersistenceError;

/// Property bag of a node or relationship.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// Natural key of a stored node. Ids are unique within one project and
/// primary label, so several projects can share a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef<'a> {
    pub project: &'a str,
    pub label: &'a str,
    pub id: &'a str,
}

impl<'a> NodeRef<'a> {
    pub fn new(project: &'a str, label: &'a str, id: &'a str) -> Self {
        Self { project, label, id }
    }
}

/// Sink for the materialized dependency graph. Both operations are
/// upserts keyed by natural identity, so replaying a write is harmless.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// `extra_labels` are added next to the node's primary label.
    async fn upsert_node(
        &self,
        node: NodeRef<'_>,
        extra_labels: &[&str],
        props: Props,
    ) -> Result<(), PersistenceError>;

    /// Keyed by `(source, target, rel_type)`; properties are replaced.
    async fn upsert_edge(
        &self,
        source: NodeRef<'_>,
        target: NodeRef<'_>,
        rel_type: &str,
        props: Props,
    ) -> Result<(), PersistenceError>;

    async fn ping(&self) -> Result<(), PersistenceError>;

    fn name(&self) -> &str;
}
