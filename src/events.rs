//! Pipeline observer interface.
//!
//! Orchestration code reports progress through [`PipelineObserver`]; the CLI
//! attaches a [`LoggingObserver`] and the run ledger records results for
//! checkpointing.

use crate::processor::ProcessingResult;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Summary of one dispatched batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files taken into the batch
    pub total: usize,
    /// Files with a derivative
    pub processed: usize,
    /// Files whose processing failed
    pub failed: usize,
    /// Files still unprocessed across the whole manifest
    pub remaining: usize,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Receives pipeline events. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// Called once per file, in completion order.
    fn on_file_processed(&self, _result: &ProcessingResult) {}

    /// Called before the conversion service is restarted.
    fn on_service_restart(&self, _reason: &str) {}

    /// Called after a batch has been dispatched and checkpointed.
    fn on_batch_complete(&self, _summary: &BatchSummary) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Logs every event and prints failures and summaries for the user.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl PipelineObserver for LoggingObserver {
    fn on_file_processed(&self, result: &ProcessingResult) {
        match &result.derivative {
            Some(derivative) => {
                info!("Processed {:?} -> {:?}", result.original, derivative);
            }
            None => {
                error!("Failed to process {:?}", result.original);
                eprintln!("Failed: {}", result.original.display());
            }
        }
    }

    fn on_service_restart(&self, reason: &str) {
        warn!("Restarting conversion service: {}", reason);
        eprintln!("Conversion service unreachable, restarting ({})", reason);
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        info!(
            "Batch complete: {}/{} processed, {} failed, {} remaining",
            summary.processed, summary.total, summary.failed, summary.remaining
        );
        println!("Processed {}/{} files", summary.processed, summary.total);
        if summary.remaining > 0 {
            println!("{} files remain unprocessed", summary.remaining);
        }
    }
}

/// Fan-out to several observers in registration order.
#[derive(Default, Clone)]
pub struct Observers {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn push(&mut self, observer: Arc<dyn PipelineObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl PipelineObserver for Observers {
    fn on_file_processed(&self, result: &ProcessingResult) {
        for observer in &self.observers {
            observer.on_file_processed(result);
        }
    }

    fn on_service_restart(&self, reason: &str) {
        for observer in &self.observers {
            observer.on_service_restart(reason);
        }
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        for observer in &self.observers {
            observer.on_batch_complete(summary);
        }
    }
}
