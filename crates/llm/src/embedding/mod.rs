//! Text embedding clients used to build the per-run retrieval index

mod hashing;
mod mock;
mod openai;

pub use hashing::HashingEmbedder;
pub use mock::MockEmbeddingClient;
pub use openai::OpenAICompatibleEmbedder;

use async_trait::async_trait;
use svcgraph_core::BackendError;

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embeds each text; the output has one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError>;

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }
}
