//! Batch orchestration.
//!
//! One invocation takes the next batch from the checkpoint, dispatches it,
//! and persists the outcome. Partial results are persisted before any error
//! is propagated.

use crate::checkpoint::BatchState;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::events::{BatchSummary, NoopObserver, Observers, PipelineObserver};
use crate::persist::{persist_run, InterruptHandle, PendingRun, RunLedger};
use crate::processor::{Processor, VideoToolkit};
use crate::scanner;
use crate::service::ConversionServiceManager;
use anyhow::{Context, Result};
use bitforge_common::paths::classify;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one batch.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: BatchSummary,
    pub state: BatchState,
    /// Snapshot written for this batch; `None` when there was nothing to do
    pub snapshot: Option<PathBuf>,
}

impl RunReport {
    /// Process exit code: 0 when everything is done, 1 when a file in the
    /// batch failed, 2 when the batch succeeded but files remain.
    pub fn exit_code(&self) -> u8 {
        if self.summary.has_failures() {
            1
        } else if !self.state.is_complete() {
            2
        } else {
            0
        }
    }
}

pub struct Pipeline {
    config: Config,
    input_dir: PathBuf,
    output_dir: PathBuf,
    service: Arc<ConversionServiceManager>,
    media: Arc<dyn VideoToolkit>,
    observer: Arc<dyn PipelineObserver>,
    interrupt: InterruptHandle,
}

impl Pipeline {
    /// Create a pipeline. The input directory must exist; the output
    /// directory is created if needed.
    pub fn new(
        config: Config,
        input_dir: &Path,
        output_dir: &Path,
        service: Arc<ConversionServiceManager>,
        media: Arc<dyn VideoToolkit>,
    ) -> Result<Self> {
        let input_dir = input_dir
            .canonicalize()
            .with_context(|| format!("Input directory not found: {:?}", input_dir))?;
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
        let output_dir = output_dir.canonicalize()?;

        Ok(Self {
            config,
            input_dir,
            output_dir,
            service,
            media,
            observer: Arc::new(NoopObserver),
            interrupt: InterruptHandle::new(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptHandle) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn state_dir(&self) -> &Path {
        &self.config.ingest.state_dir
    }

    pub fn scan(&self, manifest: &Path) -> Result<BTreeSet<PathBuf>> {
        scanner::scan(manifest, &self.input_dir, &self.config.ingest.bitstream_marker)
            .with_context(|| format!("Failed to scan manifest {:?}", manifest))
    }

    /// Scan `manifest` and process its next batch.
    pub fn process_manifest(&self, manifest: &Path) -> Result<RunReport> {
        let all_paths = self.scan(manifest)?;
        self.run_batch(&all_paths)
    }

    /// Process batches until nothing remains or a batch has failures.
    pub fn run_until_done(&self, all_paths: &BTreeSet<PathBuf>) -> Result<RunReport> {
        loop {
            let report = self.run_batch(all_paths)?;
            if report.snapshot.is_none() || report.exit_code() != 2 {
                return Ok(report);
            }
        }
    }

    /// Process the next batch of `all_paths` and persist the outcome.
    pub fn run_batch(&self, all_paths: &BTreeSet<PathBuf>) -> Result<RunReport> {
        let state_dir = self.state_dir();
        let prior = BatchState::load_verified(all_paths, state_dir)
            .context("Cannot resume from checkpoint")?;
        let batch = prior.next_batch(self.config.ingest.batch_size);

        if batch.is_empty() {
            info!("All {} files are processed", all_paths.len());
            return Ok(RunReport {
                summary: BatchSummary::default(),
                state: prior,
                snapshot: None,
            });
        }

        info!(
            "Processing batch of {} files ({} unprocessed of {})",
            batch.len(),
            prior.unprocessed.len(),
            all_paths.len()
        );

        let ledger = Arc::new(RunLedger::new());
        self.interrupt.arm(PendingRun {
            state_dir: state_dir.to_path_buf(),
            all_paths: Arc::new(all_paths.clone()),
            prior: prior.clone(),
            ledger: ledger.clone(),
        });

        let observers = Observers::new()
            .with(self.observer.clone())
            .with(ledger.clone());
        let dispatched = self.dispatch(&batch, Arc::new(observers));

        let results = ledger.results();
        let persisted = self
            .interrupt
            .settle(|_| persist_run(state_dir, all_paths, &prior, &results));

        let processed = results.iter().filter(|r| r.is_success()).count();
        let remaining = match &persisted {
            Ok(persisted) => persisted.state.unprocessed.len(),
            Err(_) => prior.unprocessed.len().saturating_sub(processed),
        };
        let summary = BatchSummary {
            total: batch.len(),
            processed,
            failed: batch.len() - processed,
            remaining,
        };
        self.observer.on_batch_complete(&summary);

        if let Err(e) = dispatched {
            if let Err(persist_error) = &persisted {
                warn!("Partial results were not saved: {}", persist_error);
            }
            return Err(e);
        }
        let persisted = persisted.context("Failed to write checkpoint")?;

        Ok(RunReport {
            summary,
            state: persisted.state,
            snapshot: Some(persisted.snapshot),
        })
    }

    /// Best-effort teardown of the conversion service.
    pub fn shutdown(&self) {
        if let Err(e) = self.service.stop_and_remove() {
            warn!("Failed to remove conversion service: {}", e);
        }
    }

    fn dispatch(&self, batch: &[PathBuf], observer: Arc<dyn PipelineObserver>) -> Result<()> {
        if batch.iter().any(|f| classify(f).needs_conversion_service()) {
            self.service
                .ensure_running(&self.input_dir, &self.output_dir)
                .context("Failed to start conversion service")?;
        }

        let processor = Processor::new(
            &self.output_dir,
            self.service.clone(),
            self.media.clone(),
            self.config.service.derivative_extension.as_str(),
        );
        let dispatcher = Dispatcher::new(
            self.config.ingest.worker_count(),
            self.config.ingest.chunk_size,
            self.service.clone(),
            observer,
        )?;

        dispatcher.run_to_completion(batch, &processor)?;
        Ok(())
    }
}
