//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { project, run_id } => {
                info!(project = %project, run_id = %run_id, "Starting analysis");
            }
            ProgressEvent::PhaseStarted { phase } => {
                info!(phase = %phase, "Starting phase");
            }
            ProgressEvent::PhaseComplete { phase, duration } => {
                info!(
                    phase = %phase,
                    duration_ms = duration.as_millis(),
                    "Phase complete"
                );
            }
            ProgressEvent::ServicesLocated { total, prebuilt } => {
                info!(services = total, prebuilt, "Services located");
            }
            ProgressEvent::ServiceIndexed { service, chunks } => {
                debug!(service = %service, chunks, "Service indexed");
            }
            ProgressEvent::ServiceExtractionStarted {
                service,
                index,
                total,
            } => {
                info!(
                    service = %service,
                    progress = format!("{}/{}", index, total),
                    "Extracting dependencies"
                );
            }
            ProgressEvent::ServiceExtractionComplete {
                service,
                candidates,
                incomplete,
                duration,
            } => {
                if *incomplete {
                    warn!(
                        service = %service,
                        candidates,
                        duration_ms = duration.as_millis(),
                        "Extraction incomplete"
                    );
                } else {
                    info!(
                        service = %service,
                        candidates,
                        duration_ms = duration.as_millis(),
                        "Extraction complete"
                    );
                }
            }
            ProgressEvent::Completed { edges, total_time } => {
                info!(
                    edges,
                    total_time_ms = total_time.as_millis(),
                    "Analysis complete"
                );
            }
            ProgressEvent::Failed { error } => {
                warn!(error = %error, "Analysis failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_logging_all_events() {
        let handler = LoggingHandler;

        let events = vec![
            ProgressEvent::Started {
                project: "shop".to_string(),
                run_id: "r1".to_string(),
            },
            ProgressEvent::PhaseStarted {
                phase: "Locate".to_string(),
            },
            ProgressEvent::PhaseComplete {
                phase: "Locate".to_string(),
                duration: Duration::from_millis(3),
            },
            ProgressEvent::ServicesLocated {
                total: 3,
                prebuilt: 0,
            },
            ProgressEvent::ServiceIndexed {
                service: "orders".to_string(),
                chunks: 12,
            },
            ProgressEvent::ServiceExtractionStarted {
                service: "orders".to_string(),
                index: 1,
                total: 2,
            },
            ProgressEvent::ServiceExtractionComplete {
                service: "orders".to_string(),
                candidates: 4,
                incomplete: false,
                duration: Duration::from_millis(200),
            },
            ProgressEvent::ServiceExtractionComplete {
                service: "payments".to_string(),
                candidates: 0,
                incomplete: true,
                duration: Duration::from_millis(20),
            },
            ProgressEvent::Completed {
                edges: 2,
                total_time: Duration::from_secs(1),
            },
            ProgressEvent::Failed {
                error: "store unreachable".to_string(),
            },
        ];

        for event in events {
            handler.on_progress(&event);
        }
    }
}
