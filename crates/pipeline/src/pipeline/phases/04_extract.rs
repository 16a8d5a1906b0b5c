use crate::extractor::{ExtractionOutcome, FactExtractor};
use crate::pipeline::context::AnalysisContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use svcgraph_core::{PipelineError, ProgressEvent};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Dispatches one extraction task per service and waits until every task
/// has reported before anything is merged.
///
/// Tasks live in a `JoinSet`, so dropping the run future aborts them and the
/// outcomes collected so far are dropped with it.
pub struct ExtractPhase;

#[async_trait]
impl WorkflowPhase for ExtractPhase {
    fn name(&self) -> &'static str {
        "Extract"
    }

    async fn execute(&self, context: &mut AnalysisContext) -> Result<(), PipelineError> {
        let services = context.services()?;
        let known: Vec<String> = services.ids();
        let analyzable: Vec<_> = services.analyzable().cloned().collect();

        let extractor = Arc::new(
            FactExtractor::new(
                context.collaborators.llm.clone(),
                context.retriever()?,
                known,
                context.catalog.clone(),
            )
            .with_top_k(context.options.top_k)
            .with_max_tokens(context.options.max_tokens),
        );

        let mut outcomes = Vec::new();
        let mut to_dispatch = Vec::new();
        for service in analyzable {
            match context.index_failures.get(&service.id) {
                Some(reason) => outcomes.push(ExtractionOutcome::failed(&service.id, reason.clone())),
                None => to_dispatch.push(service),
            }
        }

        let total = to_dispatch.len();
        let permits = Arc::new(Semaphore::new(context.options.max_concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<ExtractionOutcome>(total.max(1));
        let mut tasks = JoinSet::new();

        for (index, service) in to_dispatch.iter().cloned().enumerate() {
            let extractor = extractor.clone();
            let permits = permits.clone();
            let tx = tx.clone();
            let progress = context.progress.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                progress.on_progress(&ProgressEvent::ServiceExtractionStarted {
                    service: service.id.clone(),
                    index: index + 1,
                    total,
                });
                let start = Instant::now();
                let outcome = extractor.extract(&service).await;
                progress.on_progress(&ProgressEvent::ServiceExtractionComplete {
                    service: service.id.clone(),
                    candidates: outcome.candidates.len(),
                    incomplete: outcome.is_incomplete(),
                    duration: start.elapsed(),
                });
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut received = Vec::with_capacity(total);
        while received.len() < total {
            match rx.recv().await {
                Some(outcome) => received.push(outcome),
                None => break,
            }
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Extraction task ended abnormally");
            }
        }

        if received.len() < total {
            let reported: BTreeSet<String> = received.iter().map(|o| o.service.clone()).collect();
            received.extend(
                to_dispatch
                    .iter()
                    .filter(|service| !reported.contains(&service.id))
                    .map(|service| ExtractionOutcome::failed(&service.id, "extraction task aborted")),
            );
        }
        outcomes.extend(received);
        outcomes.sort_by(|a, b| a.service.cmp(&b.service));

        let summary = &mut context.summary;
        summary.services_analyzed = total;
        summary.candidates_generated = outcomes.iter().map(|o| o.candidates.len()).sum();
        summary.incomplete = outcomes
            .iter()
            .filter_map(ExtractionOutcome::incomplete_service)
            .collect();
        summary.skipped_kinds = outcomes
            .iter()
            .flat_map(|o| o.malformed_kinds.iter().cloned())
            .collect();

        info!(
            services = total,
            candidates = summary.candidates_generated,
            incomplete = summary.incomplete.len(),
            "All extraction tasks reported"
        );
        context.outcomes = outcomes;
        Ok(())
    }
}
