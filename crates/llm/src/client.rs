use crate::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;
use svcgraph_core::BackendError;

#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError>;

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }
}
