use super::{cosine_similarity, ScoredChunk, VectorRecord, VectorStore};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use svcgraph_core::RetrievalError;
use tokio::sync::RwLock;

/// Brute-force cosine index kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub async fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, collection: &str) -> Result<(), RetrievalError> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), RetrievalError> {
        let mut collections = self.collections.write().await;
        let entries = collections.get_mut(collection).ok_or_else(|| {
            RetrievalError::VectorStore(format!("unknown collection {}", collection))
        })?;
        for record in records {
            entries.insert(record.chunk.id.clone(), record);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        service: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let collections = self.collections.read().await;
        let entries = collections.get(collection).ok_or_else(|| {
            RetrievalError::VectorStore(format!("unknown collection {}", collection))
        })?;

        let mut scored: Vec<ScoredChunk> = entries
            .values()
            .filter(|r| service.map_or(true, |s| r.chunk.service == s))
            .map(|r| ScoredChunk {
                chunk: r.chunk.clone(),
                score: cosine_similarity(query, &r.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), RetrievalError> {
        self.collections.write().await.remove(collection);
        Ok(())
    }
}
