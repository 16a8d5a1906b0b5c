use crate::error::BackendError;
use genai::adapter::AdapterKind;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5-coder:7b";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_MAX_CHUNK_BYTES: usize = 8 * 1024;
const DEFAULT_TOP_K: usize = 12;
const DEFAULT_MAX_CONCURRENCY: usize = 10;
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_NEO4J_DATABASE: &str = "neo4j";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: ollama, openai, claude, gemini, grok, groq")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    #[error("Backend initialization failed: {0}")]
    BackendInitError(#[from] BackendError),
}

pub fn parse_provider(s: &str) -> Result<AdapterKind, ConfigError> {
    match s.to_lowercase().as_str() {
        "ollama" => Ok(AdapterKind::Ollama),
        "openai" => Ok(AdapterKind::OpenAI),
        "claude" | "anthropic" => Ok(AdapterKind::Anthropic),
        "gemini" | "google" => Ok(AdapterKind::Gemini),
        "grok" => Ok(AdapterKind::Xai),
        "groq" => Ok(AdapterKind::Groq),
        other => Err(ConfigError::InvalidProvider(other.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Any endpoint speaking the OpenAI `/embeddings` protocol (OpenAI, Ollama, LM Studio).
    OpenAiCompatible,
    /// Local feature hashing, no network. Lower retrieval quality.
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(EmbeddingBackend::OpenAiCompatible),
            "hashing" | "local" => Ok(EmbeddingBackend::Hashing),
            other => Err(ConfigError::ParseError {
                field: "SVCGRAPH_EMBEDDING_BACKEND".to_string(),
                error: format!("unknown backend '{}'", other),
            }),
        }
    }
}

/// Authentication mode for the graph database.
#[derive(Clone, PartialEq, Eq)]
pub enum GraphAuth {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
    Kerberos { ticket: String },
}

impl fmt::Debug for GraphAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphAuth::None => write!(f, "None"),
            GraphAuth::Basic { username, .. } => write!(f, "Basic({}, ***)", username),
            GraphAuth::Bearer { .. } => write!(f, "Bearer(***)"),
            GraphAuth::Kerberos { .. } => write!(f, "Kerberos(***)"),
        }
    }
}

impl GraphAuth {
    pub fn mode(&self) -> &'static str {
        match self {
            GraphAuth::None => "none",
            GraphAuth::Basic { .. } => "basic",
            GraphAuth::Bearer { .. } => "bearer",
            GraphAuth::Kerberos { .. } => "kerberos",
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let mode = env::var("SVCGRAPH_NEO4J_AUTH").unwrap_or_else(|_| "basic".to_string());
        match mode.to_lowercase().as_str() {
            "none" => Ok(GraphAuth::None),
            "basic" => Ok(GraphAuth::Basic {
                username: env::var("SVCGRAPH_NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string()),
                password: env::var("SVCGRAPH_NEO4J_PASSWORD").unwrap_or_default(),
            }),
            "bearer" => Ok(GraphAuth::Bearer {
                token: env::var("SVCGRAPH_NEO4J_TOKEN").unwrap_or_default(),
            }),
            "kerberos" => Ok(GraphAuth::Kerberos {
                ticket: env::var("SVCGRAPH_NEO4J_TICKET").unwrap_or_default(),
            }),
            other => Err(ConfigError::ParseError {
                field: "SVCGRAPH_NEO4J_AUTH".to_string(),
                error: format!("unknown auth mode '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphStoreSettings {
    /// HTTP endpoint of the Neo4j server, e.g. `http://localhost:7474`.
    pub url: Option<String>,
    pub database: String,
    pub auth: GraphAuth,
}

#[derive(Debug, Clone)]
pub struct SvcgraphConfig {
    pub provider: AdapterKind,
    pub model: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub max_tokens: u32,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub max_chunk_bytes: usize,
    /// Embed a model-written description of each chunk instead of its raw text.
    pub interpret_chunks: bool,
    pub top_k: usize,
    pub max_concurrency: usize,
    pub run_timeout_secs: Option<u64>,
    pub graph: GraphStoreSettings,
    pub log_level: String,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Default for SvcgraphConfig {
    fn default() -> Self {
        let provider = env::var("SVCGRAPH_PROVIDER")
            .ok()
            .and_then(|s| parse_provider(&s).ok())
            .unwrap_or(AdapterKind::Ollama);

        let model = env::var("SVCGRAPH_MODEL")
            .ok()
            .unwrap_or_else(|| match provider {
                AdapterKind::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
                AdapterKind::OpenAI => "gpt-4o-mini".to_string(),
                AdapterKind::Anthropic => "claude-3-5-haiku-latest".to_string(),
                _ => "default-model".to_string(),
            });

        let embedding_backend = env::var("SVCGRAPH_EMBEDDING_BACKEND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(EmbeddingBackend::OpenAiCompatible);

        let graph = GraphStoreSettings {
            url: env::var("SVCGRAPH_NEO4J_URL").ok(),
            database: env::var("SVCGRAPH_NEO4J_DATABASE")
                .unwrap_or_else(|_| DEFAULT_NEO4J_DATABASE.to_string()),
            auth: GraphAuth::from_env().unwrap_or(GraphAuth::None),
        };

        Self {
            provider,
            model,
            request_timeout_secs: env_parse("SVCGRAPH_REQUEST_TIMEOUT")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: env_parse("SVCGRAPH_MAX_RETRIES").unwrap_or(DEFAULT_MAX_RETRIES),
            max_tokens: env_parse("SVCGRAPH_MAX_TOKENS").unwrap_or(DEFAULT_MAX_TOKENS),
            embedding_backend,
            embedding_url: env::var("SVCGRAPH_EMBEDDING_URL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_URL.to_string()),
            embedding_model: env::var("SVCGRAPH_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_api_key: env::var("SVCGRAPH_EMBEDDING_API_KEY")
                .or_else(|_| env::var("OPENAI_API_KEY"))
                .ok(),
            max_chunk_bytes: env_parse("SVCGRAPH_MAX_CHUNK_BYTES")
                .unwrap_or(DEFAULT_MAX_CHUNK_BYTES),
            interpret_chunks: env_parse("SVCGRAPH_INTERPRET_CHUNKS").unwrap_or(false),
            top_k: env_parse("SVCGRAPH_TOP_K").unwrap_or(DEFAULT_TOP_K),
            max_concurrency: env_parse("SVCGRAPH_MAX_CONCURRENCY")
                .unwrap_or(DEFAULT_MAX_CONCURRENCY),
            run_timeout_secs: env_parse("SVCGRAPH_RUN_TIMEOUT"),
            graph,
            log_level: env::var("SVCGRAPH_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

impl SvcgraphConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 3600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 1 hour".to_string(),
            ));
        }

        if self.max_retries > 10 {
            return Err(ConfigError::ValidationFailed(
                "Max retries cannot exceed 10".to_string(),
            ));
        }

        if self.max_chunk_bytes < 256 {
            return Err(ConfigError::ValidationFailed(
                "Max chunk size must be at least 256 bytes".to_string(),
            ));
        }
        if self.max_chunk_bytes > 1_048_576 {
            return Err(ConfigError::ValidationFailed(
                "Max chunk size cannot exceed 1MB".to_string(),
            ));
        }

        if self.top_k == 0 || self.top_k > 200 {
            return Err(ConfigError::ValidationFailed(
                "Top-k must be between 1 and 200".to_string(),
            ));
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max concurrency must be at least 1".to_string(),
            ));
        }

        if self.run_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "Run timeout must be at least 1 second when set".to_string(),
            ));
        }

        if self.max_tokens < 256 || self.max_tokens > 128_000 {
            return Err(ConfigError::ValidationFailed(
                "Max tokens must be between 256 and 128000".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if let GraphAuth::Kerberos { .. } = self.graph.auth {
            return Err(ConfigError::ValidationFailed(
                "Kerberos authentication is not supported by the HTTP graph store; use basic or bearer"
                    .to_string(),
            ));
        }

        if let Some(url) = &self.graph.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Graph store URL must use http or https: {}",
                    url
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for SvcgraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "svcgraph configuration:")?;
        writeln!(f, "  Provider: {:?}", self.provider)?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Max Retries: {}", self.max_retries)?;
        writeln!(f, "  Embedding: {:?} ({} @ {})", self.embedding_backend, self.embedding_model, self.embedding_url)?;
        writeln!(f, "  Max Chunk Size: {} bytes", self.max_chunk_bytes)?;
        writeln!(f, "  Interpret Chunks: {}", self.interpret_chunks)?;
        writeln!(f, "  Top-k: {}", self.top_k)?;
        writeln!(f, "  Max Concurrency: {}", self.max_concurrency)?;
        match self.run_timeout_secs {
            Some(secs) => writeln!(f, "  Run Timeout: {}s", secs)?,
            None => writeln!(f, "  Run Timeout: none")?,
        }
        match &self.graph.url {
            Some(url) => writeln!(
                f,
                "  Graph Store: {} (db: {}, auth: {})",
                url,
                self.graph.database,
                self.graph.auth.mode()
            )?,
            None => writeln!(f, "  Graph Store: in-memory")?,
        }
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = [
            EnvGuard::set("SVCGRAPH_PROVIDER", "ollama"),
            EnvGuard::set("SVCGRAPH_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        ];

        let config = SvcgraphConfig::default();

        assert!(matches!(config.provider, AdapterKind::Ollama));
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = [
            EnvGuard::set("SVCGRAPH_PROVIDER", "claude"),
            EnvGuard::set("SVCGRAPH_MODEL", "custom-model"),
            EnvGuard::set("SVCGRAPH_TOP_K", "7"),
            EnvGuard::set("SVCGRAPH_MAX_CONCURRENCY", "3"),
            EnvGuard::set("SVCGRAPH_RUN_TIMEOUT", "600"),
            EnvGuard::set("SVCGRAPH_EMBEDDING_BACKEND", "hashing"),
            EnvGuard::set("SVCGRAPH_NEO4J_URL", "http://localhost:7474"),
            EnvGuard::set("SVCGRAPH_NEO4J_AUTH", "bearer"),
            EnvGuard::set("SVCGRAPH_NEO4J_TOKEN", "secret"),
            EnvGuard::set("SVCGRAPH_INTERPRET_CHUNKS", "true"),
        ];

        let config = SvcgraphConfig::default();

        assert!(matches!(config.provider, AdapterKind::Anthropic));
        assert_eq!(config.model, "custom-model");
        assert_eq!(config.top_k, 7);
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.run_timeout_secs, Some(600));
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashing);
        assert!(config.interpret_chunks);
        assert_eq!(config.graph.url.as_deref(), Some("http://localhost:7474"));
        assert_eq!(
            config.graph.auth,
            GraphAuth::Bearer {
                token: "secret".to_string()
            }
        );
    }

    #[test]
    #[serial]
    fn test_validation_rejects_zero_top_k() {
        let config = SvcgraphConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_validation_rejects_kerberos() {
        let mut config = SvcgraphConfig::default();
        config.graph.auth = GraphAuth::Kerberos {
            ticket: "ticket".to_string(),
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Kerberos"));
    }

    #[test]
    #[serial]
    fn test_validation_rejects_bolt_url() {
        let mut config = SvcgraphConfig::default();
        config.graph.url = Some("bolt://localhost:7687".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_validation_rejects_invalid_log_level() {
        let config = SvcgraphConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_provider() {
        assert!(matches!(parse_provider("OpenAI"), Ok(AdapterKind::OpenAI)));
        assert!(matches!(
            parse_provider("anthropic"),
            Ok(AdapterKind::Anthropic)
        ));
        assert!(parse_provider("watson").is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let auth = GraphAuth::Basic {
            username: "neo4j".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("neo4j"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let config = SvcgraphConfig::default();
        let display = format!("{}", config);
        assert!(display.contains("svcgraph configuration:"));
        assert!(display.contains("Provider:"));
    }
}
