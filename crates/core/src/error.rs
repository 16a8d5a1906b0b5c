use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an external provider (language model, embedding endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackendError {
    ApiError {
        message: String,
        status_code: Option<u16>,
    },
    AuthenticationError {
        message: String,
    },
    TimeoutError {
        seconds: u64,
    },
    RateLimitError {
        retry_after: Option<u64>,
    },
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },
    ConfigurationError {
        message: String,
    },
    NetworkError {
        message: String,
    },
    ParseError {
        message: String,
        context: String,
    },
    Other {
        message: String,
    },
}

impl BackendError {
    /// Errors worth retrying: the provider may answer on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::TimeoutError { .. }
            | BackendError::RateLimitError { .. }
            | BackendError::NetworkError { .. } => true,
            BackendError::ApiError { status_code, .. } => {
                matches!(status_code, None | Some(500..=599))
            }
            _ => false,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::AuthenticationError { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            BackendError::TimeoutError { seconds } => {
                write!(f, "Request timed out after {} seconds", seconds)
            }
            BackendError::RateLimitError { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limit exceeded, retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            BackendError::InvalidResponse { message, .. } => {
                write!(f, "Invalid response from provider: {}", message)
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::ParseError { message, context } => {
                write!(f, "Parse error: {} (context: {})", message, context)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Bad inputs detected before any analysis work starts. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Project root {0:?} does not exist or is not a directory")]
    InvalidProjectRoot(PathBuf),

    #[error("No services found in deployment manifests under {0:?}")]
    NoServicesFound(PathBuf),

    #[error("Config center {0:?} does not match any deployed service")]
    ConfigCenterMismatch(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Embedding or vector-store failure. Fatal for the affected service only.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Embedding provider unavailable while processing {service}: {message}")]
    EmbeddingUnavailable { service: String, message: String },

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Failed to read source of {service}: {message}")]
    SourceUnreadable { service: String, message: String },
}

/// Malformed model output. Recovered inside the extractor.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Malformed {kind} response for {service}: {message}")]
    MalformedResponse {
        service: String,
        kind: String,
        message: String,
    },
}

/// The graph store could not be written. Fatal for the run.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("Graph store unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Graph store rejected statement: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Run cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::Retrieval(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::TimeoutError { seconds: 5 }.is_transient());
        assert!(BackendError::RateLimitError { retry_after: None }.is_transient());
        assert!(BackendError::ApiError {
            message: "bad gateway".to_string(),
            status_code: Some(502),
        }
        .is_transient());
        assert!(!BackendError::ApiError {
            message: "bad request".to_string(),
            status_code: Some(400),
        }
        .is_transient());
        assert!(!BackendError::AuthenticationError {
            message: "invalid key".to_string(),
        }
        .is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = ConfigurationError::ConfigCenterMismatch("config".to_string());
        assert!(err.to_string().contains("\"config\""));

        let err = RetrievalError::EmbeddingUnavailable {
            service: "payments".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("payments"));
    }

    #[test]
    fn test_fatality() {
        let retrieval: PipelineError = RetrievalError::VectorStore("x".to_string()).into();
        assert!(!retrieval.is_fatal());

        let persistence: PipelineError =
            PersistenceError::PersistenceUnavailable("down".to_string()).into();
        assert!(persistence.is_fatal());
    }
}
