use crate::materializer::GraphMaterializer;
use crate::pipeline::context::AnalysisContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use anyhow::anyhow;
use async_trait::async_trait;
use svcgraph_core::PipelineError;

pub struct MaterializePhase;

#[async_trait]
impl WorkflowPhase for MaterializePhase {
    fn name(&self) -> &'static str {
        "Materialize"
    }

    async fn execute(&self, context: &mut AnalysisContext) -> Result<(), PipelineError> {
        let graph = context
            .graph
            .as_ref()
            .ok_or_else(|| PipelineError::Internal(anyhow!("dependency graph was not resolved")))?;

        let materializer = GraphMaterializer::new(context.collaborators.graph_store.clone());
        let report = materializer.materialize(graph).await?;
        context.summary.materialized = Some(report);
        Ok(())
    }
}
