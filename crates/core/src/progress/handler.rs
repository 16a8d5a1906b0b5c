//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while an analysis run progresses
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { project: String, run_id: String },

    PhaseStarted { phase: String },

    PhaseComplete { phase: String, duration: Duration },

    /// Service boundaries identified
    ServicesLocated { total: usize, prebuilt: usize },

    ServiceIndexed { service: String, chunks: usize },

    ServiceExtractionStarted {
        service: String,
        index: usize,
        total: usize,
    },

    ServiceExtractionComplete {
        service: String,
        candidates: usize,
        incomplete: bool,
        duration: Duration,
    },

    Completed { edges: usize, total_time: Duration },

    Failed { error: String },
}

/// Trait for handling progress events during a run
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
