use crate::client::LLMClient;
use crate::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;
use std::sync::Arc;
use svcgraph_core::{BackendError, RetryPolicy};

/// Wraps another client and retries transient failures.
pub struct RetryingLLMClient {
    inner: Arc<dyn LLMClient>,
    policy: RetryPolicy,
}

impl RetryingLLMClient {
    pub fn new(inner: Arc<dyn LLMClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LLMClient for RetryingLLMClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        self.policy
            .run("chat", || self.inner.chat(request.clone()))
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model_info(&self) -> Option<String> {
        self.inner.model_info()
    }
}
