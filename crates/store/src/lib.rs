//! Persistence collaborators: the per-run vector index and the output graph store

pub mod graph;
pub mod vector;

pub use graph::{
    GraphStore, InMemoryGraphStore, Neo4jHttpStore, NodeRef, Props, StoredEdge, StoredNode,
};
pub use vector::{cosine_similarity, InMemoryVectorStore, ScoredChunk, VectorRecord, VectorStore};
