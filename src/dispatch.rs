//! Parallel dispatcher.
//!
//! Fans files out over a bounded rayon pool, one chunk at a time, and
//! collects results in completion order. When a worker reports that the
//! conversion service is unreachable, pending work is cancelled, the service
//! is restarted and the unfinished files are handed back for requeueing.

use crate::events::PipelineObserver;
use crate::processor::{FileOutcome, ProcessingResult, Processor};
use crate::service::ConversionServiceManager;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tracing::{debug, error, info, warn};

/// Results of one dispatch round.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Completed files, in completion order
    pub results: Vec<ProcessingResult>,
    /// Files that must be dispatched again after a service restart
    pub requeued: Vec<PathBuf>,
}

/// Per-file work run by the dispatcher.
pub trait FileHandler: Sync {
    fn process(&self, file: &Path) -> FileOutcome;

    /// Remove whatever a result discarded after an outage left on disk.
    fn discard(&self, _result: &ProcessingResult) {}
}

impl<F> FileHandler for F
where
    F: Fn(&Path) -> FileOutcome + Sync,
{
    fn process(&self, file: &Path) -> FileOutcome {
        self(file)
    }
}

impl FileHandler for Processor {
    fn process(&self, file: &Path) -> FileOutcome {
        Processor::process(self, file)
    }

    fn discard(&self, result: &ProcessingResult) {
        Processor::discard(self, result)
    }
}

enum ChunkOutcome {
    Completed,
    Interrupted {
        reason: String,
        completed: HashSet<PathBuf>,
    },
}

pub struct Dispatcher {
    pool: rayon::ThreadPool,
    chunk_size: usize,
    service: Arc<ConversionServiceManager>,
    observer: Arc<dyn PipelineObserver>,
}

impl Dispatcher {
    pub fn new(
        workers: usize,
        chunk_size: usize,
        service: Arc<ConversionServiceManager>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("bitforge-worker-{}", i))
            .build()
            .context("Failed to create worker pool")?;

        Ok(Self {
            pool,
            chunk_size: chunk_size.max(1),
            service,
            observer,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Dispatch `files` chunk by chunk.
    ///
    /// Stops at the first chunk in which the service became unreachable; the
    /// service is running again when this returns with a non-empty `requeued`.
    pub fn run_batch(
        &self,
        files: &[PathBuf],
        handler: &dyn FileHandler,
    ) -> Result<BatchOutcome> {
        let mut results = Vec::with_capacity(files.len());
        let chunks: Vec<&[PathBuf]> = files.chunks(self.chunk_size).collect();

        for (index, chunk) in chunks.iter().enumerate() {
            debug!(
                "Dispatching chunk {}/{} ({} files)",
                index + 1,
                chunks.len(),
                chunk.len()
            );

            match self.run_chunk(chunk, handler, &mut results) {
                ChunkOutcome::Completed => {}
                ChunkOutcome::Interrupted { reason, completed } => {
                    let requeued: Vec<PathBuf> = chunk
                        .iter()
                        .filter(|file| !completed.contains(*file))
                        .chain(chunks[index + 1..].iter().flat_map(|c| c.iter()))
                        .cloned()
                        .collect();
                    warn!(
                        "Conversion service unreachable, requeueing {} files",
                        requeued.len()
                    );

                    self.observer.on_service_restart(&reason);
                    self.service
                        .restart()
                        .context("Failed to restart conversion service")?;
                    info!("Conversion service {} is {}", self.service.name(), self.service.state());

                    return Ok(BatchOutcome { results, requeued });
                }
            }
        }

        Ok(BatchOutcome {
            results,
            requeued: Vec::new(),
        })
    }

    /// Dispatch until nothing is requeued.
    pub fn run_to_completion(
        &self,
        files: &[PathBuf],
        handler: &dyn FileHandler,
    ) -> Result<Vec<ProcessingResult>> {
        let mut outcome = self.run_batch(files, handler)?;
        let mut results = std::mem::take(&mut outcome.results);

        while !outcome.requeued.is_empty() {
            outcome = self.run_batch(&outcome.requeued, handler)?;
            results.append(&mut outcome.results);
        }

        Ok(results)
    }

    fn run_chunk(
        &self,
        chunk: &[PathBuf],
        handler: &dyn FileHandler,
        results: &mut Vec<ProcessingResult>,
    ) -> ChunkOutcome {
        let cancelled = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<FileOutcome>();
        let mut completed = HashSet::new();
        let mut unreachable: Option<String> = None;

        self.pool.in_place_scope(|scope| {
            for file in chunk {
                let tx = tx.clone();
                let cancelled = &cancelled;
                scope.spawn(move |_| {
                    if cancelled.load(Ordering::SeqCst) {
                        return;
                    }
                    let outcome = catch_unwind(AssertUnwindSafe(|| handler.process(file)))
                        .unwrap_or_else(|_| {
                            error!("Worker panicked while processing {:?}", file);
                            FileOutcome::Finished(ProcessingResult::failed(file))
                        });
                    if matches!(outcome, FileOutcome::ServiceUnreachable { .. }) {
                        cancelled.store(true, Ordering::SeqCst);
                    }
                    let _ = tx.send(outcome);
                });
            }
            drop(tx);

            for outcome in rx.iter() {
                match outcome {
                    FileOutcome::Finished(result) if unreachable.is_none() => {
                        self.observer.on_file_processed(&result);
                        completed.insert(result.original.clone());
                        results.push(result);
                    }
                    FileOutcome::Finished(result) => {
                        debug!("Discarding late result for {:?}", result.original);
                        handler.discard(&result);
                    }
                    FileOutcome::ServiceUnreachable { file, reason } => {
                        debug!("{:?} hit an unreachable service: {}", file, reason);
                        cancelled.store(true, Ordering::SeqCst);
                        unreachable.get_or_insert(reason);
                    }
                }
            }
        });

        match unreachable {
            Some(reason) => ChunkOutcome::Interrupted { reason, completed },
            None => ChunkOutcome::Completed,
        }
    }
}
