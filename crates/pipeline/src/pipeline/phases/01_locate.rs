use crate::locator::ServiceLocator;
use crate::pipeline::context::AnalysisContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use async_trait::async_trait;
use svcgraph_core::{PipelineError, ProgressEvent};

pub struct LocatePhase;

#[async_trait]
impl WorkflowPhase for LocatePhase {
    fn name(&self) -> &'static str {
        "Locate"
    }

    async fn execute(&self, context: &mut AnalysisContext) -> Result<(), PipelineError> {
        let locator = ServiceLocator::new(context.collaborators.fs.clone());
        let services = locator.locate(&context.project_root, &context.config_center)?;

        context.summary.project = services.project.clone();
        context.summary.services_found = services.len();
        context.emit(ProgressEvent::ServicesLocated {
            total: services.len(),
            prebuilt: services.prebuilt_count(),
        });

        context.services = Some(services);
        Ok(())
    }
}
