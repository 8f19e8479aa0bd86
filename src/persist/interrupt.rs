//! Ctrl-C handling.
//!
//! While a batch is in flight the run is "armed": an interrupt persists the
//! results recorded so far, tears down the conversion service and exits
//! with code 1.

use super::{persist_run, PersistedRun, RunLedger};
use crate::checkpoint::BatchState;
use crate::service::ConversionServiceManager;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

/// Everything needed to persist a run that has not finished yet.
pub struct PendingRun {
    pub state_dir: PathBuf,
    pub all_paths: Arc<BTreeSet<PathBuf>>,
    pub prior: BatchState,
    pub ledger: Arc<RunLedger>,
}

impl PendingRun {
    /// Persist whatever the ledger holds.
    pub fn persist(&self) -> bitforge_common::Result<PersistedRun> {
        persist_run(
            &self.state_dir,
            &self.all_paths,
            &self.prior,
            &self.ledger.results(),
        )
    }
}

/// Shared slot between the main loop and the signal thread.
#[derive(Clone, Default)]
pub struct InterruptHandle {
    pending: Arc<Mutex<Option<PendingRun>>>,
}

impl InterruptHandle {
    /// Handle that is not connected to any signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the signal thread. It lives until the process exits.
    pub fn install(service: Arc<ConversionServiceManager>) -> Result<Self> {
        let handle = Self::new();
        let pending = handle.pending.clone();

        std::thread::Builder::new()
            .name("bitforge-signal".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start signal runtime: {}", e);
                        return;
                    }
                };
                if let Err(e) = runtime.block_on(tokio::signal::ctrl_c()) {
                    error!("Failed to listen for interrupts: {}", e);
                    return;
                }

                warn!("Interrupted, saving progress");
                // Waits for the main loop if it is persisting right now
                if let Some(run) = pending.lock().take() {
                    flush(&run);
                }
                if let Err(e) = service.stop_and_remove() {
                    warn!("Failed to remove conversion service: {}", e);
                }
                std::process::exit(1);
            })
            .context("Failed to spawn signal handler")?;

        Ok(handle)
    }

    /// Register the run to persist on interrupt.
    pub fn arm(&self, run: PendingRun) {
        *self.pending.lock() = Some(run);
    }

    /// Take the pending run back and hand it to `f` while holding the slot,
    /// so an interrupt arriving meanwhile waits for `f` to finish.
    pub fn settle<R>(&self, f: impl FnOnce(Option<PendingRun>) -> R) -> R {
        let mut slot = self.pending.lock();
        f(slot.take())
    }

    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}

/// Persist a pending run, logging instead of failing.
pub(crate) fn flush(run: &PendingRun) -> Option<PersistedRun> {
    match run.persist() {
        Ok(persisted) => {
            eprintln!(
                "Saved partial results: {} processed, {} unprocessed",
                persisted.state.processed.len(),
                persisted.state.unprocessed.len()
            );
            Some(persisted)
        }
        Err(e) => {
            error!("Failed to persist partial results: {}", e);
            None
        }
    }
}
