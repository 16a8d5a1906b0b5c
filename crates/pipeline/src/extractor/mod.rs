//! Retrieval-augmented dependency extraction, one model call per kind

mod prompt;
mod response;

pub use prompt::{build_prompt, query_for, CONFIG_SENTINEL};
pub use response::{parse_response, ExtractionResponse, ReportedDependency};

use crate::catalog::ConfigCatalog;
use crate::retriever::CodeRetriever;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use svcgraph_core::model::{
    DependencyFactCandidate, DependencyKind, IncompleteService, Service, SkippedKind,
};
use svcgraph_core::ExtractionError;
use svcgraph_llm::{ChatMessage, LLMClient, LLMRequest};
use tracing::{debug, info, warn};

pub const DEFAULT_TOP_K: usize = 12;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Everything one service's extraction produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub service: String,
    pub candidates: Vec<DependencyFactCandidate>,
    /// Kinds whose provider call (or retrieval) failed after retries.
    pub failed_kinds: Vec<DependencyKind>,
    /// Kinds whose response could not be parsed; they yield no candidates.
    pub malformed_kinds: Vec<SkippedKind>,
    pub incomplete: Option<String>,
}

impl ExtractionOutcome {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Outcome for a service that could not be processed at all.
    pub fn failed(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            failed_kinds: DependencyKind::ALL.to_vec(),
            incomplete: Some(reason.into()),
            ..Self::new(service)
        }
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete.is_some()
    }

    pub fn incomplete_service(&self) -> Option<IncompleteService> {
        self.incomplete.as_ref().map(|reason| IncompleteService {
            service: self.service.clone(),
            reason: reason.clone(),
            failed_kinds: self.failed_kinds.clone(),
        })
    }
}

enum KindResult {
    Candidates(Vec<DependencyFactCandidate>),
    Malformed(ExtractionError),
    Failed(String),
}

pub struct FactExtractor {
    llm: Arc<dyn LLMClient>,
    retriever: Arc<CodeRetriever>,
    known_services: Vec<String>,
    catalog: Arc<ConfigCatalog>,
    top_k: usize,
    max_tokens: u32,
}

impl FactExtractor {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        retriever: Arc<CodeRetriever>,
        known_services: Vec<String>,
        catalog: Arc<ConfigCatalog>,
    ) -> Self {
        Self {
            llm,
            retriever,
            known_services,
            catalog,
            top_k: DEFAULT_TOP_K,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Runs every kind query concurrently. Never fails: provider problems
    /// end up in `failed_kinds`, unparseable answers in `malformed_kinds`.
    pub async fn extract(&self, service: &Service) -> ExtractionOutcome {
        let start = Instant::now();
        let mut outcome = ExtractionOutcome::new(&service.id);

        if service.is_prebuilt() || service.is_config_center {
            debug!(service = %service.id, "Not extracted");
            return outcome;
        }

        let results = join_all(
            DependencyKind::ALL
                .iter()
                .map(|kind| self.extract_kind(service, *kind)),
        )
        .await;

        let mut errors = Vec::new();
        for (kind, result) in DependencyKind::ALL.into_iter().zip(results) {
            match result {
                KindResult::Candidates(candidates) => outcome.candidates.extend(candidates),
                KindResult::Malformed(err) => {
                    warn!(service = %service.id, kind = %kind, error = %err, "Discarding malformed response");
                    outcome.malformed_kinds.push(SkippedKind {
                        service: service.id.clone(),
                        kind,
                        reason: err.to_string(),
                    });
                }
                KindResult::Failed(message) => {
                    warn!(service = %service.id, kind = %kind, error = %message, "Dependency query failed");
                    outcome.failed_kinds.push(kind);
                    errors.push(message);
                }
            }
        }

        if !outcome.failed_kinds.is_empty() {
            outcome.incomplete = Some(format!(
                "{} of {} dependency queries failed: {}",
                outcome.failed_kinds.len(),
                DependencyKind::ALL.len(),
                errors.first().map(String::as_str).unwrap_or("unknown error")
            ));
        }

        info!(
            service = %service.id,
            candidates = outcome.candidates.len(),
            failed = outcome.failed_kinds.len(),
            malformed = outcome.malformed_kinds.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Extracted dependency candidates"
        );
        outcome
    }

    async fn extract_kind(&self, service: &Service, kind: DependencyKind) -> KindResult {
        let chunks = match self
            .retriever
            .retrieve(query_for(kind), Some(&service.id), self.top_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => return KindResult::Failed(e.to_string()),
        };

        let prompt = build_prompt(service, kind, &chunks, &self.known_services, &self.catalog);
        let request = LLMRequest::new(vec![
            ChatMessage::system(prompt::system_prompt()),
            ChatMessage::user(prompt),
        ])
        .with_temperature(0.1)
        .with_max_tokens(self.max_tokens);

        let start = Instant::now();
        let response = match self.llm.chat(request).await {
            Ok(response) => response,
            Err(e) => return KindResult::Failed(e.to_string()),
        };
        debug!(
            service = %service.id,
            kind = %kind,
            chunks = chunks.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Model answered"
        );

        let parsed = match parse_response(&response.content) {
            Ok(parsed) => parsed,
            Err(e) => {
                return KindResult::Malformed(ExtractionError::MalformedResponse {
                    service: service.id.clone(),
                    kind: kind.to_string(),
                    message: e.to_string(),
                })
            }
        };

        KindResult::Candidates(
            parsed
                .dependencies
                .into_iter()
                .filter_map(|reported| {
                    response::to_candidate(&service.id, kind, reported, &chunks, &self.known_services)
                })
                .collect(),
        )
    }
}
