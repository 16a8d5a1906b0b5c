//! LLM client backed by the `genai` crate (Ollama, OpenAI, Claude, Gemini, Grok, Groq).

use crate::client::LLMClient;
use crate::types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
use async_trait::async_trait;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage as GenAIChatMessage, ChatOptions, ChatRequest as GenAIChatRequest};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use std::time::Duration;
use svcgraph_core::BackendError;
use tracing::{debug, error};

pub struct GenAIClient {
    client: Client,
    model: String,
    provider: AdapterKind,
    timeout: Duration,
}

impl GenAIClient {
    /// `SVCGRAPH_API_BASE_URL` overrides the provider's default endpoint.
    pub fn new(provider: AdapterKind, model: String, timeout: Duration) -> Self {
        let client = match std::env::var("SVCGRAPH_API_BASE_URL").ok() {
            Some(endpoint_url) => {
                debug!(
                    provider = provider.as_str(),
                    endpoint = %endpoint_url,
                    "Using custom LLM endpoint"
                );

                let model_clone = model.clone();
                let resolver = ServiceTargetResolver::from_resolver_fn(
                    move |_service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
                        let auth = match provider.default_key_env_name() {
                            Some(api_key_var) => AuthData::from_env(api_key_var),
                            None => AuthData::from_single(""),
                        };

                        Ok(ServiceTarget {
                            endpoint: Endpoint::from_owned(endpoint_url.clone()),
                            auth,
                            model: ModelIden::new(provider, &model_clone),
                        })
                    },
                );

                Client::builder()
                    .with_service_target_resolver(resolver)
                    .build()
            }
            None => Client::default(),
        };

        debug!(provider = provider.as_str(), model = %model, "Created GenAI client");

        Self {
            client,
            model,
            provider,
            timeout,
        }
    }

    fn convert_message(msg: &ChatMessage) -> GenAIChatMessage {
        match msg.role {
            MessageRole::System => GenAIChatMessage::system(&msg.content),
            MessageRole::User => GenAIChatMessage::user(&msg.content),
            MessageRole::Assistant => GenAIChatMessage::assistant(&msg.content),
        }
    }

    fn classify_error(&self, message: String) -> BackendError {
        if message.contains("401") || message.contains("403") {
            BackendError::AuthenticationError { message }
        } else if message.contains("429") {
            BackendError::RateLimitError { retry_after: None }
        } else {
            BackendError::ApiError {
                message: format!("{} request failed: {}", self.provider.as_str(), message),
                status_code: None,
            }
        }
    }
}

#[async_trait]
impl LLMClient for GenAIClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let start = std::time::Instant::now();

        let messages: Vec<GenAIChatMessage> =
            request.messages.iter().map(Self::convert_message).collect();
        let genai_request = GenAIChatRequest::new(messages);

        let mut options = ChatOptions::default();
        if let Some(temp) = request.temperature {
            options = options.with_temperature(temp as f64);
        }
        if let Some(max_tokens) = request.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        if let Some(ref sequences) = request.stop_sequences {
            options = options.with_stop_sequences(sequences.clone());
        }

        let response = match tokio::time::timeout(
            self.timeout,
            self.client
                .exec_chat(&self.model, genai_request, Some(&options)),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                error!(provider = self.provider.as_str(), error = %e, "LLM API error");
                return Err(self.classify_error(e.to_string()));
            }
            Err(_) => {
                error!(
                    provider = self.provider.as_str(),
                    timeout_secs = self.timeout.as_secs(),
                    "LLM request timed out"
                );
                return Err(BackendError::TimeoutError {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let content = response.first_text().unwrap_or_default().to_string();

        Ok(LLMResponse::text(content, start.elapsed()))
    }

    fn name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

impl std::fmt::Debug for GenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAIClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genai_client_creation() {
        let client = GenAIClient::new(
            AdapterKind::Ollama,
            "qwen2.5-coder:7b".to_string(),
            Duration::from_secs(30),
        );

        assert_eq!(client.name(), "Ollama");
        assert_eq!(client.model_info(), Some("qwen2.5-coder:7b".to_string()));
    }

    #[test]
    fn test_error_classification() {
        let client = GenAIClient::new(
            AdapterKind::OpenAI,
            "gpt-4o-mini".to_string(),
            Duration::from_secs(30),
        );

        assert!(matches!(
            client.classify_error("HTTP 401 Unauthorized".to_string()),
            BackendError::AuthenticationError { .. }
        ));
        assert!(client
            .classify_error("HTTP 429 Too Many Requests".to_string())
            .is_transient());
        assert!(client
            .classify_error("connection reset".to_string())
            .is_transient());
    }
}
