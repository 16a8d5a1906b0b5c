//! Builds the run's collaborators from configuration

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use svcgraph_core::{EmbeddingBackend, RealFileSystem, RetryPolicy, SvcgraphConfig};
use svcgraph_llm::{
    EmbeddingClient, GenAIClient, HashingEmbedder, LLMClient, OpenAICompatibleEmbedder,
    RetryingLLMClient,
};
use svcgraph_pipeline::Collaborators;
use svcgraph_store::{GraphStore, InMemoryGraphStore, InMemoryVectorStore, Neo4jHttpStore};
use tracing::debug;

pub fn llm_client(config: &SvcgraphConfig) -> Arc<dyn LLMClient> {
    let client = GenAIClient::new(
        config.provider,
        config.model.clone(),
        Duration::from_secs(config.request_timeout_secs),
    );
    Arc::new(RetryingLLMClient::new(
        Arc::new(client),
        RetryPolicy::new(config.max_retries),
    ))
}

pub fn embedding_client(config: &SvcgraphConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.embedding_backend {
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::default())),
        EmbeddingBackend::OpenAiCompatible => {
            let embedder = OpenAICompatibleEmbedder::new(
                config.embedding_url.clone(),
                config.embedding_model.clone(),
                config.embedding_api_key.clone(),
                Duration::from_secs(config.request_timeout_secs),
                RetryPolicy::new(config.max_retries),
            )
            .context("Failed to initialize embedding client")?;
            Ok(Arc::new(embedder))
        }
    }
}

pub fn graph_store(config: &SvcgraphConfig) -> Result<Arc<dyn GraphStore>> {
    let store = Neo4jHttpStore::new(
        &config.graph,
        Duration::from_secs(config.request_timeout_secs),
        RetryPolicy::new(config.max_retries),
    )
    .context("Failed to initialize graph store")?;
    debug!(url = store.commit_url(), auth = config.graph.auth.mode(), "Graph store configured");
    Ok(Arc::new(store))
}

/// Collaborators for one run. A dry run keeps the graph in memory and
/// returns that store so the caller can inspect it.
pub fn build(
    config: &SvcgraphConfig,
    dry_run: bool,
) -> Result<(Collaborators, Option<Arc<InMemoryGraphStore>>)> {
    let (graph_store, memory): (Arc<dyn GraphStore>, _) = if dry_run {
        let memory = Arc::new(InMemoryGraphStore::new());
        (memory.clone(), Some(memory))
    } else {
        (graph_store(config)?, None)
    };

    let collaborators = Collaborators {
        fs: Arc::new(RealFileSystem::new()),
        llm: llm_client(config),
        embedder: embedding_client(config)?,
        vector_store: Arc::new(InMemoryVectorStore::new()),
        graph_store,
    };
    Ok((collaborators, memory))
}
