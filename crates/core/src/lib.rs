pub mod config;
pub mod error;
pub mod fs;
pub mod model;
pub mod progress;
pub mod retry;

pub use config::{ConfigError, EmbeddingBackend, GraphAuth, GraphStoreSettings, SvcgraphConfig};
pub use error::{
    BackendError, ConfigurationError, ExtractionError, PersistenceError, PipelineError,
    RetrievalError,
};
pub use fs::{FileSystem, MockFileSystem, RealFileSystem};
pub use progress::{LoggingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
pub use retry::{RetryPolicy, Transient};
