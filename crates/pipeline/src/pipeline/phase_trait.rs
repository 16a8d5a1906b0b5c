use super::context::AnalysisContext;
use async_trait::async_trait;
use svcgraph_core::PipelineError;

/// One step of an analysis run. Phases run in order and communicate only
/// through the context.
#[async_trait]
pub trait WorkflowPhase: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, context: &mut AnalysisContext) -> Result<(), PipelineError>;
}
