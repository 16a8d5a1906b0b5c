//! Per-run state shared by the workflow phases

use crate::catalog::ConfigCatalog;
use crate::extractor::{ExtractionOutcome, DEFAULT_MAX_TOKENS, DEFAULT_TOP_K};
use crate::locator::{ConfigCenterSpec, ServiceSet};
use crate::retriever::{CodeRetriever, DEFAULT_MAX_CHUNK_BYTES};
use anyhow::anyhow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use svcgraph_core::model::{DependencyGraph, RunSummary};
use svcgraph_core::{
    FileSystem, NoOpHandler, PipelineError, ProgressEvent, ProgressHandler, SvcgraphConfig,
};
use svcgraph_llm::{EmbeddingClient, LLMClient};
use svcgraph_store::{GraphStore, VectorStore};

/// External services a run talks to. Passed explicitly so tests can swap in
/// fakes and several runs can share nothing.
#[derive(Clone)]
pub struct Collaborators {
    pub fs: Arc<dyn FileSystem>,
    pub llm: Arc<dyn LLMClient>,
    pub embedder: Arc<dyn EmbeddingClient>,
    pub vector_store: Arc<dyn VectorStore>,
    pub graph_store: Arc<dyn GraphStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub top_k: usize,
    pub max_concurrency: usize,
    pub max_chunk_bytes: usize,
    pub max_tokens: u32,
    pub run_timeout: Option<Duration>,
    /// Keep the run's vector collection after the run.
    pub keep_index: bool,
    /// Embed model descriptions of chunks rather than raw text.
    pub interpret_chunks: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_concurrency: 10,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            max_tokens: DEFAULT_MAX_TOKENS,
            run_timeout: None,
            keep_index: false,
            interpret_chunks: false,
        }
    }
}

impl From<&SvcgraphConfig> for RunOptions {
    fn from(config: &SvcgraphConfig) -> Self {
        Self {
            top_k: config.top_k,
            max_concurrency: config.max_concurrency,
            max_chunk_bytes: config.max_chunk_bytes,
            max_tokens: config.max_tokens,
            run_timeout: config.run_timeout_secs.map(Duration::from_secs),
            keep_index: false,
            interpret_chunks: config.interpret_chunks,
        }
    }
}

pub struct AnalysisContext {
    pub project_root: PathBuf,
    pub config_center: ConfigCenterSpec,
    pub run_id: String,
    pub options: RunOptions,
    pub collaborators: Collaborators,
    pub progress: Arc<dyn ProgressHandler>,

    pub services: Option<ServiceSet>,
    pub catalog: Arc<ConfigCatalog>,
    pub retriever: Option<Arc<CodeRetriever>>,
    /// Services whose indexing failed, with the reason.
    pub index_failures: BTreeMap<String, String>,
    pub outcomes: Vec<ExtractionOutcome>,
    pub graph: Option<DependencyGraph>,
    pub summary: RunSummary,
}

impl AnalysisContext {
    pub fn new(
        project_root: impl Into<PathBuf>,
        config_center: ConfigCenterSpec,
        run_id: impl Into<String>,
        options: RunOptions,
        collaborators: Collaborators,
    ) -> Self {
        let project_root = project_root.into();
        let run_id = run_id.into();
        let project = project_root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string();

        Self {
            summary: RunSummary::new(run_id.clone(), project),
            project_root,
            config_center,
            run_id,
            options,
            collaborators,
            progress: Arc::new(NoOpHandler),
            services: None,
            catalog: Arc::new(ConfigCatalog::empty()),
            retriever: None,
            index_failures: BTreeMap::new(),
            outcomes: Vec::new(),
            graph: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn emit(&self, event: ProgressEvent) {
        self.progress.on_progress(&event);
    }

    /// Located services. Errors when called before the locate phase ran.
    pub fn services(&self) -> Result<&ServiceSet, PipelineError> {
        self.services
            .as_ref()
            .ok_or_else(|| PipelineError::Internal(anyhow!("services have not been located yet")))
    }

    pub fn retriever(&self) -> Result<Arc<CodeRetriever>, PipelineError> {
        self.retriever
            .clone()
            .ok_or_else(|| PipelineError::Internal(anyhow!("retrieval index has not been built yet")))
    }
}
