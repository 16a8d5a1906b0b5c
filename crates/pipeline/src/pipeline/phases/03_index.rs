use crate::pipeline::context::AnalysisContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::retriever::{ChunkInterpreter, CodeRetriever};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use svcgraph_core::{PipelineError, ProgressEvent};
use tokio::sync::Semaphore;
use tracing::warn;

/// Indexes every analyzable service. A failed service is recorded and
/// skipped by extraction; the run goes on.
pub struct IndexPhase;

#[async_trait]
impl WorkflowPhase for IndexPhase {
    fn name(&self) -> &'static str {
        "Index"
    }

    async fn execute(&self, context: &mut AnalysisContext) -> Result<(), PipelineError> {
        let project_root = context.services()?.root.clone();
        let collaborators = &context.collaborators;
        let mut retriever = CodeRetriever::new(
            collaborators.fs.clone(),
            collaborators.embedder.clone(),
            collaborators.vector_store.clone(),
            context.run_id.clone(),
        )
        .with_project_root(project_root)
        .with_max_chunk_bytes(context.options.max_chunk_bytes)
        .with_catalog(context.catalog.clone());
        if context.options.interpret_chunks {
            retriever =
                retriever.with_interpreter(Arc::new(ChunkInterpreter::new(collaborators.llm.clone())));
        }
        let retriever = Arc::new(retriever);

        let services: Vec<_> = context.services()?.analyzable().cloned().collect();

        if let Err(e) = retriever.prepare().await {
            warn!(collection = retriever.collection(), error = %e, "Cannot create vector collection");
            for service in &services {
                context.index_failures.insert(service.id.clone(), e.to_string());
            }
            context.retriever = Some(retriever);
            return Ok(());
        }

        let permits = Arc::new(Semaphore::new(context.options.max_concurrency.max(1)));
        let results = join_all(services.iter().map(|service| {
            let permits = permits.clone();
            let retriever = retriever.clone();
            async move {
                let _permit = permits.acquire().await;
                (service.id.clone(), retriever.index(service).await)
            }
        }))
        .await;

        for (service, result) in results {
            match result {
                Ok(chunks) => context.emit(ProgressEvent::ServiceIndexed { service, chunks }),
                Err(e) => {
                    warn!(service = %service, error = %e, "Indexing failed, service will be incomplete");
                    context.index_failures.insert(service, e.to_string());
                }
            }
        }

        context.retriever = Some(retriever);
        Ok(())
    }
}
