use super::context::{AnalysisContext, Collaborators, RunOptions};
use super::phase_trait::WorkflowPhase;
use super::phases::{
    ConfigCenterPhase, ExtractPhase, IndexPhase, LocatePhase, MaterializePhase, ResolvePhase,
};
use crate::locator::ConfigCenterSpec;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use svcgraph_core::model::{new_run_id, DependencyGraph, RunSummary};
use svcgraph_core::{NoOpHandler, PipelineError, ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Summary of a finished run plus the graph it wrote.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub graph: DependencyGraph,
}

pub struct PipelineOrchestrator {
    collaborators: Collaborators,
    options: RunOptions,
    progress: Arc<dyn ProgressHandler>,
}

impl PipelineOrchestrator {
    pub fn new(collaborators: Collaborators, options: RunOptions) -> Self {
        Self {
            collaborators,
            options,
            progress: Arc::new(NoOpHandler),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Phases that end with the resolved graph. The run deadline covers these.
    fn analysis_phases() -> Vec<Box<dyn WorkflowPhase>> {
        vec![
            Box::new(LocatePhase),
            Box::new(ConfigCenterPhase),
            Box::new(IndexPhase),
            Box::new(ExtractPhase),
            Box::new(ResolvePhase),
        ]
    }

    /// Once started, materialization runs to completion.
    fn write_phases() -> Vec<Box<dyn WorkflowPhase>> {
        vec![Box::new(MaterializePhase)]
    }

    pub async fn run(
        &self,
        project_root: &Path,
        config_center: ConfigCenterSpec,
    ) -> Result<RunSummary, PipelineError> {
        self.analyze(project_root, config_center)
            .await
            .map(|report| report.summary)
    }

    /// Runs one analysis of `project_root`. The run either completes with a
    /// written graph or fails without a partial one. The deadline only applies
    /// until the graph is resolved, so it never interrupts a write in progress.
    pub async fn analyze(
        &self,
        project_root: &Path,
        config_center: ConfigCenterSpec,
    ) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let run_id = new_run_id();
        let mut context = AnalysisContext::new(
            project_root,
            config_center,
            run_id.clone(),
            self.options.clone(),
            self.collaborators.clone(),
        )
        .with_progress(self.progress.clone());

        info!(project_root = %project_root.display(), run_id = %run_id, "Starting analysis run");
        self.progress.on_progress(&ProgressEvent::Started {
            project: context.summary.project.clone(),
            run_id: run_id.clone(),
        });

        let analysis = Self::analysis_phases();
        let analyzed = match self.options.run_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.run_phases(&analysis, &mut context)).await {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::Cancelled(format!(
                        "run exceeded {}s deadline",
                        limit.as_secs()
                    ))),
                }
            }
            None => self.run_phases(&analysis, &mut context).await,
        };
        let result = match analyzed {
            Ok(()) => self.run_phases(&Self::write_phases(), &mut context).await,
            Err(e) => Err(e),
        };

        if let Some(retriever) = context.retriever.as_ref() {
            if !self.options.keep_index {
                if let Err(e) = retriever.cleanup().await {
                    warn!(collection = retriever.collection(), error = %e, "Failed to drop vector collection");
                }
            }
        }

        match result {
            Ok(()) => {
                let mut summary = context.summary;
                summary.duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    run_id = %summary.run_id,
                    services = summary.services_found,
                    candidates = summary.candidates_generated,
                    edges = summary.edges_by_status.total(),
                    incomplete = summary.incomplete.len(),
                    duration_ms = summary.duration_ms,
                    "Analysis run complete"
                );
                self.progress.on_progress(&ProgressEvent::Completed {
                    edges: summary.edges_by_status.total(),
                    total_time: start.elapsed(),
                });
                Ok(RunReport {
                    summary,
                    graph: context.graph.unwrap_or_default(),
                })
            }
            Err(e) => {
                self.progress.on_progress(&ProgressEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Runs every phase in order against an existing context, without a deadline.
    pub async fn execute(&self, context: &mut AnalysisContext) -> Result<(), PipelineError> {
        self.run_phases(&Self::analysis_phases(), context).await?;
        self.run_phases(&Self::write_phases(), context).await
    }

    async fn run_phases(
        &self,
        phases: &[Box<dyn WorkflowPhase>],
        context: &mut AnalysisContext,
    ) -> Result<(), PipelineError> {
        for phase in phases {
            let name = phase.name();
            info!(phase = name, "Starting phase");
            context.emit(ProgressEvent::PhaseStarted {
                phase: name.to_string(),
            });

            let phase_start = Instant::now();
            phase.execute(context).await?;

            context.emit(ProgressEvent::PhaseComplete {
                phase: name.to_string(),
                duration: phase_start.elapsed(),
            });
            debug!(
                phase = name,
                duration_ms = phase_start.elapsed().as_millis() as u64,
                "Phase complete"
            );
        }
        Ok(())
    }
}
