//! Result persistence.
//!
//! Every run leaves a timestamped NDJSON snapshot of its results next to the
//! checkpoint lists, whether or not all files succeeded.

mod interrupt;

pub use interrupt::{InterruptHandle, PendingRun};

use crate::checkpoint::BatchState;
use crate::events::PipelineObserver;
use crate::processor::ProcessingResult;
use bitforge_common::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const SNAPSHOT_FORMAT: &str = "bitforge-processing-result";
pub const SNAPSHOT_VERSION: u32 = 1;
pub const SNAPSHOT_PREFIX: &str = "processing_result_";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotHeader {
    format: String,
    version: u32,
}

/// Results recorded as files complete, in completion order.
#[derive(Debug, Default)]
pub struct RunLedger {
    results: Mutex<Vec<ProcessingResult>>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<ProcessingResult> {
        self.results.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }
}

impl PipelineObserver for RunLedger {
    fn on_file_processed(&self, result: &ProcessingResult) {
        self.results.lock().push(result.clone());
    }
}

/// Where a run's results were written.
#[derive(Debug, Clone)]
pub struct PersistedRun {
    pub state: BatchState,
    pub snapshot: PathBuf,
}

pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!(
        "{}{}.ndjson",
        SNAPSHOT_PREFIX,
        at.format("%Y-%m-%dT%H-%M-%S%.6fZ")
    )
}

/// Write `results` as a versioned NDJSON snapshot in `state_dir`.
pub fn write_snapshot(state_dir: &Path, results: &[ProcessingResult]) -> Result<PathBuf> {
    std::fs::create_dir_all(state_dir)?;
    let path = state_dir.join(snapshot_file_name(Utc::now()));

    let mut writer = BufWriter::new(std::fs::File::create(&path)?);
    let header = SnapshotHeader {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
    };
    serde_json::to_writer(&mut writer, &header)?;
    writeln!(writer)?;
    for result in results {
        serde_json::to_writer(&mut writer, result)?;
        writeln!(writer)?;
    }
    writer.flush()?;

    Ok(path)
}

/// Read a snapshot written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<Vec<ProcessingResult>> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut lines = reader.lines();

    let header: SnapshotHeader = match lines.next() {
        Some(line) => serde_json::from_str(&line?)?,
        None => return Err(Error::invalid_input(format!("{:?} is empty", path))),
    };
    if header.format != SNAPSHOT_FORMAT || header.version != SNAPSHOT_VERSION {
        return Err(Error::invalid_input(format!(
            "Unsupported snapshot {} v{}",
            header.format, header.version
        )));
    }

    let mut results = Vec::new();
    for line in lines {
        let line = line?;
        if !line.trim().is_empty() {
            results.push(serde_json::from_str(&line)?);
        }
    }
    Ok(results)
}

/// Persist the outcome of a run: snapshot first, then both checkpoint lists.
pub fn persist_run(
    state_dir: &Path,
    all_paths: &BTreeSet<PathBuf>,
    prior: &BatchState,
    results: &[ProcessingResult],
) -> Result<PersistedRun> {
    let snapshot = write_snapshot(state_dir, results)?;
    let state = prior.apply(all_paths, results);
    state.save(state_dir)?;

    info!(
        "Saved {} results to {:?} ({} processed, {} unprocessed)",
        results.len(),
        snapshot,
        state.processed.len(),
        state.unprocessed.len()
    );

    Ok(PersistedRun { state, snapshot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{PROCESSED_FILE, UNPROCESSED_FILE};
    use assert_matches::assert_matches;

    #[test]
    fn test_snapshot_format() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            ProcessingResult::succeeded("/in/a.txt", "/out/ab/cd/x.txt"),
            ProcessingResult::failed("/in/b.txt"),
        ];

        let path = write_snapshot(dir.path(), &results).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(SNAPSHOT_PREFIX));
        assert!(name.ends_with(".ndjson"));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            r#"{"format":"bitforge-processing-result","version":1}"#
        );
        assert_eq!(
            lines[2],
            r#"{"original":"/in/b.txt","derivative":null}"#
        );
        assert_eq!(read_snapshot(&path).unwrap(), results);
    }

    #[test]
    fn test_read_snapshot_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processing_result_x.ndjson");
        std::fs::write(&path, "{\"format\":\"bitforge-processing-result\",\"version\":9}\n").unwrap();

        assert_matches!(read_snapshot(&path), Err(Error::InvalidInput(_)));
    }

    #[test]
    fn test_persist_run_writes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let all: BTreeSet<PathBuf> = ["/in/a", "/in/b"].iter().map(PathBuf::from).collect();
        let results = vec![
            ProcessingResult::succeeded("/in/a", "/out/a"),
            ProcessingResult::failed("/in/b"),
        ];

        let run = persist_run(dir.path(), &all, &BatchState::fresh(&all), &results).unwrap();

        assert!(run.snapshot.is_file());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(PROCESSED_FILE)).unwrap(),
            "/in/a\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(UNPROCESSED_FILE)).unwrap(),
            "/in/b\n"
        );
    }

    #[test]
    fn test_ledger_records_in_order() {
        let ledger = RunLedger::new();
        ledger.on_file_processed(&ProcessingResult::failed("/in/b"));
        ledger.on_file_processed(&ProcessingResult::succeeded("/in/a", "/out/a"));

        let originals: Vec<PathBuf> = ledger.results().into_iter().map(|r| r.original).collect();
        assert_eq!(originals, vec![PathBuf::from("/in/b"), PathBuf::from("/in/a")]);
    }
}
