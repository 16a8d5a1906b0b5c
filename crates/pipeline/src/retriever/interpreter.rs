//! Optional model pass that describes each chunk before it is embedded

use std::sync::Arc;
use svcgraph_core::model::CodeChunk;
use svcgraph_core::BackendError;
use svcgraph_llm::{ChatMessage, LLMClient, LLMRequest};

pub const DEFAULT_INTERPRET_MAX_TOKENS: u32 = 400;

/// Files listed in the layout section of the prompt.
const MAX_LISTED_FILES: usize = 200;

fn system_prompt() -> &'static str {
    r#"You summarize source files of one service for a search index.
Describe what the code does and name every external system it talks to:
other services, hosts, URLs, queues, topics, databases, caches and configuration keys.
Reply in plain text, at most ten sentences."#
}

/// Turns a chunk into a natural-language description. The description is
/// what gets embedded; the chunk keeps its raw text.
pub struct ChunkInterpreter {
    llm: Arc<dyn LLMClient>,
    max_tokens: u32,
}

impl ChunkInterpreter {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self {
            llm,
            max_tokens: DEFAULT_INTERPRET_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// `layout` is the service's file list, which gives the model context
    /// about where the chunk sits.
    pub async fn interpret(
        &self,
        chunk: &CodeChunk,
        layout: &[String],
    ) -> Result<String, BackendError> {
        let request = LLMRequest::new(vec![
            ChatMessage::system(system_prompt()),
            ChatMessage::user(build_prompt(chunk, layout)),
        ])
        .with_temperature(0.1)
        .with_max_tokens(self.max_tokens);

        let response = self.llm.chat(request).await?;
        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(BackendError::InvalidResponse {
                message: format!("empty interpretation of {}", chunk.provenance()),
                raw_response: Some(response.content),
            });
        }
        Ok(summary.to_string())
    }
}

/// Embedded text: provenance first so path words stay searchable.
pub fn interpreted_text(chunk: &CodeChunk, summary: &str) -> String {
    format!("{}\n{}", chunk.provenance(), summary)
}

fn build_prompt(chunk: &CodeChunk, layout: &[String]) -> String {
    let mut files: Vec<&str> = layout.iter().take(MAX_LISTED_FILES).map(String::as_str).collect();
    if layout.len() > MAX_LISTED_FILES {
        files.push("...");
    }

    format!(
        r#"Summarize this part of service "{}".

Files of the service:
{}

Code ({}):
{}
"#,
        chunk.service,
        files.join("\n"),
        chunk.provenance(),
        chunk.text.trim_end()
    )
}
