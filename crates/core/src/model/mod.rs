//! Domain model shared by every pipeline stage

mod dependency;
mod graph;
mod service;
mod summary;

pub use dependency::{
    CodeChunk, Confidence, DependencyFactCandidate, DependencyKind, Evidence, TargetRef,
};
pub use graph::{CanonicalEdge, DependencyGraph, EdgeKey, EdgeStatus, StatusCounts};
pub use service::Service;
pub use summary::{new_run_id, IncompleteService, MaterializeReport, RunSummary, SkippedKind};
