use super::{EmbeddingClient, HashingEmbedder};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use svcgraph_core::BackendError;

/// Deterministic embedder for tests. Fails any batch containing a text with
/// one of the registered markers, which lets a test break one service only.
#[derive(Debug, Default)]
pub struct MockEmbeddingClient {
    inner: HashingEmbedder,
    fail_markers: Mutex<Vec<String>>,
    calls: AtomicUsize,
    embedded: Mutex<Vec<String>>,
}

impl MockEmbeddingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when_contains(&self, marker: impl Into<String>) {
        self.fail_markers.lock().unwrap().push(marker.into());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text of every successful call, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let markers = self.fail_markers.lock().unwrap().clone();
        if let Some(marker) = markers
            .iter()
            .find(|m| texts.iter().any(|t| t.contains(m.as_str())))
        {
            return Err(BackendError::NetworkError {
                message: format!("mock embedding outage ({})", marker),
            });
        }

        let vectors = self.inner.embed(texts).await?;
        self.embedded.lock().unwrap().extend(texts.iter().cloned());
        Ok(vectors)
    }

    fn name(&self) -> &str {
        "mock-embedding"
    }
}
