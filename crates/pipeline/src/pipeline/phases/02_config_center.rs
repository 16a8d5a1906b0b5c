use crate::catalog::ConfigCatalog;
use crate::pipeline::context::AnalysisContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use async_trait::async_trait;
use std::sync::Arc;
use svcgraph_core::PipelineError;
use tracing::debug;

/// Builds the config catalog when a config center was designated.
pub struct ConfigCenterPhase;

#[async_trait]
impl WorkflowPhase for ConfigCenterPhase {
    fn name(&self) -> &'static str {
        "ConfigCenter"
    }

    async fn execute(&self, context: &mut AnalysisContext) -> Result<(), PipelineError> {
        let services = context.services()?;
        let Some(config_root) = services.config_root.clone() else {
            debug!("No config center designated");
            return Ok(());
        };

        let catalog = ConfigCatalog::build(
            context.collaborators.fs.as_ref(),
            &config_root,
            &services.services,
        );
        context.catalog = Arc::new(catalog);
        Ok(())
    }
}
