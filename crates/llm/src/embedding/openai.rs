use super::EmbeddingClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use svcgraph_core::{BackendError, RetryPolicy};
use tracing::debug;

const MAX_BATCH: usize = 64;

/// Client for any endpoint implementing the OpenAI `/embeddings` API.
#[derive(Debug)]
pub struct OpenAICompatibleEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedItem {
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedItem>,
}

impl OpenAICompatibleEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            timeout,
            retry,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::TimeoutError {
                seconds: self.timeout.as_secs(),
            }
        } else if err.is_decode() {
            BackendError::InvalidResponse {
                message: err.to_string(),
                raw_response: None,
            }
        } else {
            BackendError::NetworkError {
                message: err.to_string(),
            }
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        let mut request = self.client.post(self.endpoint()).json(&EmbedRequest {
            model: &self.model,
            input: batch,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(|e| self.map_reqwest_error(e))?;

        let status = res.status();
        if !status.is_success() {
            let retry_after = res
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = res.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => BackendError::AuthenticationError { message: body },
                429 => BackendError::RateLimitError { retry_after },
                code => BackendError::ApiError {
                    message: body,
                    status_code: Some(code),
                },
            });
        }

        let mut response: EmbedResponse =
            res.json().await.map_err(|e| self.map_reqwest_error(e))?;
        if response.data.len() != batch.len() {
            return Err(BackendError::InvalidResponse {
                message: format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.data.len()
                ),
                raw_response: None,
            });
        }
        response.data.sort_by_key(|item| item.index.unwrap_or(0));

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAICompatibleEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!(model = %self.model, batch = batch.len(), "Requesting embeddings");
            let embedded = self
                .retry
                .run("embed", || self.embed_batch(batch))
                .await?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}
