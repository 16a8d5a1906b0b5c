use crate::client::LLMClient;
use crate::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use svcgraph_core::BackendError;

/// Scripted language model for tests.
///
/// Routed responses are matched first: every route whose needles all occur in
/// the request text is a candidate and the first registered one wins. Routes
/// answer any number of times. Requests matching no route consume the queue,
/// then fall back to the default response when one is set.
pub struct MockLLMClient {
    routes: Mutex<Vec<(Vec<String>, MockResponse)>>,
    responses: Mutex<VecDeque<MockResponse>>,
    fallback: Mutex<Option<MockResponse>>,
    requests: Mutex<Vec<LLMRequest>>,
    name: String,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub error: Option<BackendError>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self::text(value.to_string())
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            content: String::new(),
            error: Some(error),
        }
    }
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self::with_name("MockLLM")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            name: name.into(),
        }
    }

    pub fn add_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        self.responses.lock().unwrap().extend(responses);
    }

    /// Answers every request whose text contains all `needles`.
    pub fn route<I, S>(&self, needles: I, response: MockResponse)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let needles = needles.into_iter().map(Into::into).collect();
        self.routes.lock().unwrap().push((needles, response));
    }

    pub fn set_fallback(&self, response: MockResponse) {
        *self.fallback.lock().unwrap() = Some(response);
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self, text: &str) -> Option<MockResponse> {
        let routed = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(needles, _)| needles.iter().all(|n| text.contains(n.as_str())))
            .map(|(_, response)| response.clone());

        routed
            .or_else(|| self.responses.lock().unwrap().pop_front())
            .or_else(|| self.fallback.lock().unwrap().clone())
    }
}

impl Default for MockLLMClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let text = request.full_text();
        self.requests.lock().unwrap().push(request);

        let response = self.next_response(&text).ok_or_else(|| BackendError::Other {
            message: "MockLLMClient: No more responses in queue".to_string(),
        })?;

        if let Some(error) = response.error {
            return Err(error);
        }

        Ok(LLMResponse::text(response.content, Duration::from_millis(10)))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_info(&self) -> Option<String> {
        Some("mock-model".to_string())
    }
}

impl std::fmt::Debug for MockLLMClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLLMClient")
            .field("name", &self.name)
            .field("remaining_responses", &self.remaining_responses())
            .finish()
    }
}
