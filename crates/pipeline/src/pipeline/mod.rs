pub mod context;
pub mod orchestrator;
pub mod phase_trait;
pub mod phases;

pub use context::{AnalysisContext, Collaborators, RunOptions};
pub use orchestrator::{PipelineOrchestrator, RunReport};
pub use phase_trait::WorkflowPhase;
