mod memory;

pub use memory::InMemoryVectorStore;

use async_trait::async_trait;
use svcgraph_core::model::CodeChunk;
use svcgraph_core::RetrievalError;

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk: CodeChunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: CodeChunk,
    pub score: f32,
}

/// Similarity index over code chunks, partitioned into named collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, collection: &str) -> Result<(), RetrievalError>;

    /// Inserts or replaces records by chunk id.
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>)
        -> Result<(), RetrievalError>;

    /// Best `k` matches, most similar first. `service` restricts the search
    /// to chunks of that service.
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        service: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError>;

    async fn drop_collection(&self, collection: &str) -> Result<(), RetrievalError>;
}

/// Returns a value in [-1.0, 1.0]; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        identical = { &[1.0, 0.0], &[1.0, 0.0], 1.0 },
        orthogonal = { &[1.0, 0.0], &[0.0, 1.0], 0.0 },
        opposite = { &[1.0, 2.0], &[-1.0, -2.0], -1.0 },
        zero = { &[0.0, 0.0], &[1.0, 1.0], 0.0 },
        mismatched = { &[1.0], &[1.0, 0.0], 0.0 },
    )]
    fn test_cosine_similarity(a: &[f32], b: &[f32], expected: f32) {
        assert!((cosine_similarity(a, b) - expected).abs() < 1e-6);
    }
}
