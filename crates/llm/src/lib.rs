mod client;
pub mod embedding;
mod genai;
mod json;
mod mock;
mod retry;
mod types;

pub use ::genai::adapter::AdapterKind;
pub use client::LLMClient;
pub use embedding::{
    EmbeddingClient, HashingEmbedder, MockEmbeddingClient, OpenAICompatibleEmbedder,
};
pub use genai::GenAIClient;
pub use json::extract_json_from_markdown;
pub use mock::{MockLLMClient, MockResponse};
pub use retry::RetryingLLMClient;
pub use svcgraph_core::RetryPolicy;
pub use svcgraph_core::BackendError;
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
