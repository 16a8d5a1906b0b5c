pub mod blacklist;
pub mod catalog;
pub mod extractor;
pub mod locator;
pub mod materializer;
pub mod pipeline;
pub mod resolver;
pub mod retriever;

pub use catalog::ConfigCatalog;
pub use extractor::{ExtractionOutcome, FactExtractor};
pub use locator::{ConfigCenterSpec, ServiceLocator, ServiceSet};
pub use materializer::GraphMaterializer;
pub use pipeline::{
    AnalysisContext, Collaborators, PipelineOrchestrator, RunOptions, RunReport, WorkflowPhase,
};
pub use resolver::FactResolver;
pub use retriever::{ChunkInterpreter, CodeRetriever};
