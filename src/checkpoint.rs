//! Batch checkpoint manager.
//!
//! Tracks which manifest files have been processed across invocations in two
//! line-delimited lists inside the state directory. The lists always
//! partition the manifest: together they cover every path and they never
//! overlap. A violation is reported, never repaired.

use crate::processor::ProcessingResult;
use bitforge_common::{Error, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const PROCESSED_FILE: &str = "processed_files.txt";
pub const UNPROCESSED_FILE: &str = "unprocessed_files.txt";

/// Default number of files per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Persisted processed/unprocessed partition of the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchState {
    pub processed: BTreeSet<PathBuf>,
    pub unprocessed: BTreeSet<PathBuf>,
}

impl BatchState {
    /// State before anything has been processed.
    pub fn fresh(all_paths: &BTreeSet<PathBuf>) -> Self {
        Self {
            processed: BTreeSet::new(),
            unprocessed: all_paths.clone(),
        }
    }

    /// Read both lists from `state_dir`.
    ///
    /// Returns `None` when neither list exists. Only one of them existing is
    /// an inconsistency.
    pub fn load(state_dir: &Path) -> Result<Option<Self>> {
        let processed_path = state_dir.join(PROCESSED_FILE);
        let unprocessed_path = state_dir.join(UNPROCESSED_FILE);

        match (processed_path.exists(), unprocessed_path.exists()) {
            (false, false) => Ok(None),
            (true, true) => Ok(Some(Self {
                processed: read_list(&processed_path)?,
                unprocessed: read_list(&unprocessed_path)?,
            })),
            (true, false) => Err(Error::inconsistent(format!(
                "{:?} exists without {:?}",
                processed_path, unprocessed_path
            ))),
            (false, true) => Err(Error::inconsistent(format!(
                "{:?} exists without {:?}",
                unprocessed_path, processed_path
            ))),
        }
    }

    /// Load the persisted state for `all_paths`, or a fresh one.
    pub fn load_verified(all_paths: &BTreeSet<PathBuf>, state_dir: &Path) -> Result<Self> {
        match Self::load(state_dir)? {
            Some(state) => {
                state.verify(all_paths)?;
                Ok(state)
            }
            None => Ok(Self::fresh(all_paths)),
        }
    }

    /// Check that the lists partition `all_paths` exactly.
    pub fn verify(&self, all_paths: &BTreeSet<PathBuf>) -> Result<()> {
        if let Some(path) = self.processed.intersection(&self.unprocessed).next() {
            return Err(Error::inconsistent(format!(
                "{:?} is both processed and unprocessed",
                path
            )));
        }
        if let Some(path) = self.processed.difference(all_paths).next() {
            return Err(Error::inconsistent(format!(
                "processed file {:?} is not in the manifest",
                path
            )));
        }

        let expected: BTreeSet<&PathBuf> = all_paths.difference(&self.processed).collect();
        let actual: BTreeSet<&PathBuf> = self.unprocessed.iter().collect();
        if let Some(path) = expected.difference(&actual).next() {
            return Err(Error::inconsistent(format!(
                "{:?} is neither processed nor unprocessed",
                path
            )));
        }
        if let Some(path) = actual.difference(&expected).next() {
            return Err(Error::inconsistent(format!(
                "unprocessed file {:?} is not in the manifest",
                path
            )));
        }

        Ok(())
    }

    /// State after `results` were produced on top of `self`.
    ///
    /// Successful files move to processed; failed files stay unprocessed.
    pub fn apply(&self, all_paths: &BTreeSet<PathBuf>, results: &[ProcessingResult]) -> Self {
        let mut processed = self.processed.clone();
        processed.extend(
            results
                .iter()
                .filter(|r| r.is_success())
                .map(|r| r.original.clone()),
        );
        let unprocessed = all_paths.difference(&processed).cloned().collect();
        Self {
            processed,
            unprocessed,
        }
    }

    /// Write both lists atomically.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(state_dir)?;
        write_list(state_dir, PROCESSED_FILE, &self.processed)?;
        write_list(state_dir, UNPROCESSED_FILE, &self.unprocessed)?;
        debug!(
            "Checkpoint saved: {} processed, {} unprocessed",
            self.processed.len(),
            self.unprocessed.len()
        );
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }

    /// The first `batch_size` unprocessed paths.
    pub fn next_batch(&self, batch_size: usize) -> Vec<PathBuf> {
        self.unprocessed.iter().take(batch_size).cloned().collect()
    }
}

/// Files to process next for `all_paths`, given the state in `state_dir`.
///
/// Empty once everything has been processed.
pub fn next_batch(
    all_paths: &BTreeSet<PathBuf>,
    state_dir: &Path,
    batch_size: usize,
) -> Result<Vec<PathBuf>> {
    let state = BatchState::load_verified(all_paths, state_dir)?;
    let batch = state.next_batch(batch_size);
    info!(
        "Next batch: {} of {} unprocessed files",
        batch.len(),
        state.unprocessed.len()
    );
    Ok(batch)
}

fn read_list(path: &Path) -> Result<BTreeSet<PathBuf>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

fn write_list(state_dir: &Path, name: &str, paths: &BTreeSet<PathBuf>) -> Result<()> {
    let mut file = NamedTempFile::new_in(state_dir)?;
    for path in paths {
        writeln!(file, "{}", path.display())?;
    }
    file.as_file().sync_all()?;
    file.persist(state_dir.join(name)).map_err(|e| e.error)?;
    Ok(())
}
