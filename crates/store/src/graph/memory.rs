use super::{GraphStore, NodeRef, Props};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use svcgraph_core::PersistenceError;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub labels: BTreeSet<String>,
    pub props: Props,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEdge {
    pub source: String,
    pub target: String,
    pub rel_type: String,
    pub props: Props,
}

/// Graph store held in memory. Used for dry runs and tests. It holds one
/// project, so nodes are looked up by id alone.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    nodes: RwLock<BTreeMap<String, StoredNode>>,
    edges: RwLock<BTreeMap<(String, String, String), Props>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with `PersistenceUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful upserts so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn node(&self, id: &str) -> Option<StoredNode> {
        self.nodes.read().await.get(id).cloned()
    }

    pub async fn nodes(&self) -> BTreeMap<String, StoredNode> {
        self.nodes.read().await.clone()
    }

    pub async fn edges(&self) -> Vec<StoredEdge> {
        self.edges
            .read()
            .await
            .iter()
            .map(|((source, target, rel_type), props)| StoredEdge {
                source: source.clone(),
                target: target.clone(),
                rel_type: rel_type.clone(),
                props: props.clone(),
            })
            .collect()
    }

    pub async fn edge(&self, source: &str, target: &str, rel_type: &str) -> Option<Props> {
        self.edges
            .read()
            .await
            .get(&(source.to_string(), target.to_string(), rel_type.to_string()))
            .cloned()
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::PersistenceUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_node(
        &self,
        node: NodeRef<'_>,
        extra_labels: &[&str],
        props: Props,
    ) -> Result<(), PersistenceError> {
        self.check_available()?;
        let mut nodes = self.nodes.write().await;
        let stored = nodes.entry(node.id.to_string()).or_insert_with(|| StoredNode {
            labels: BTreeSet::new(),
            props: Props::new(),
        });
        stored.labels.insert(node.label.to_string());
        stored.labels.extend(extra_labels.iter().map(|l| l.to_string()));
        for (key, value) in props {
            if value.is_null() {
                stored.props.remove(&key);
            } else {
                stored.props.insert(key, value);
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert_edge(
        &self,
        source: NodeRef<'_>,
        target: NodeRef<'_>,
        rel_type: &str,
        props: Props,
    ) -> Result<(), PersistenceError> {
        self.check_available()?;
        {
            let nodes = self.nodes.read().await;
            for endpoint in [source, target] {
                let known = nodes
                    .get(endpoint.id)
                    .is_some_and(|n| n.labels.contains(endpoint.label));
                if !known {
                    return Err(PersistenceError::Rejected(format!(
                        "edge endpoint {}:{} does not exist",
                        endpoint.label, endpoint.id
                    )));
                }
            }
        }
        self.edges.write().await.insert(
            (source.id.to_string(), target.id.to_string(), rel_type.to_string()),
            props,
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        self.check_available()
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: serde_json::Value) -> Props {
        value.as_object().cloned().unwrap_or_default()
    }

    fn service(id: &str) -> NodeRef<'_> {
        NodeRef::new("shop", "Service", id)
    }

    #[tokio::test]
    async fn test_upserts_are_idempotent() {
        let store = InMemoryGraphStore::new();
        for _ in 0..2 {
            store
                .upsert_node(service("orders"), &[], props(json!({"name": "orders"})))
                .await
                .unwrap();
            store
                .upsert_node(service("gateway"), &[], props(json!({"name": "gateway"})))
                .await
                .unwrap();
            store
                .upsert_edge(
                    service("orders"),
                    service("gateway"),
                    "HTTP_CALL",
                    props(json!({"status": "confirmed"})),
                )
                .await
                .unwrap();
        }

        assert_eq!(store.nodes().await.len(), 2);
        assert_eq!(store.edges().await.len(), 1);
        assert_eq!(store.write_count(), 6);
    }

    #[tokio::test]
    async fn test_null_property_removes_value() {
        let store = InMemoryGraphStore::new();
        store
            .upsert_node(service("orders"), &[], props(json!({"image": "orders:1"})))
            .await
            .unwrap();
        store
            .upsert_node(service("orders"), &[], props(json!({"image": null})))
            .await
            .unwrap();

        let node = store.node("orders").await.unwrap();
        assert!(!node.props.contains_key("image"));
    }

    #[tokio::test]
    async fn test_edge_requires_endpoints() {
        let store = InMemoryGraphStore::new();
        let result = store
            .upsert_edge(service("orders"), service("ghost"), "HTTP_CALL", Props::new())
            .await;
        assert!(matches!(result, Err(PersistenceError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_edge_endpoint_must_carry_label() {
        let store = InMemoryGraphStore::new();
        store
            .upsert_node(NodeRef::new("shop", "Project", "orders"), &[], Props::new())
            .await
            .unwrap();
        store
            .upsert_node(service("gateway"), &["ConfigCenter"], Props::new())
            .await
            .unwrap();

        let result = store
            .upsert_edge(service("orders"), service("gateway"), "HTTP_CALL", Props::new())
            .await;
        assert!(matches!(result, Err(PersistenceError::Rejected(_))));

        let gateway = store.node("gateway").await.unwrap();
        assert!(gateway.labels.contains("Service"));
        assert!(gateway.labels.contains("ConfigCenter"));
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryGraphStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.ping().await,
            Err(PersistenceError::PersistenceUnavailable(_))
        ));
        assert_eq!(store.write_count(), 0);
    }
}
