use crate::pipeline::context::AnalysisContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::resolver::FactResolver;
use async_trait::async_trait;
use svcgraph_core::PipelineError;

pub struct ResolvePhase;

#[async_trait]
impl WorkflowPhase for ResolvePhase {
    fn name(&self) -> &'static str {
        "Resolve"
    }

    async fn execute(&self, context: &mut AnalysisContext) -> Result<(), PipelineError> {
        let services = context.services()?;
        let resolver = FactResolver::new(&services.project, &services.services, &context.catalog);

        let candidates: Vec<_> = context
            .outcomes
            .iter()
            .flat_map(|o| o.candidates.iter().cloned())
            .collect();
        let graph = resolver.merge(&candidates);

        context.summary.edges_by_status = graph.status_counts();
        context.graph = Some(graph);
        Ok(())
    }
}
