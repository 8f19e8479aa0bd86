//! Restart-and-requeue behaviour of the dispatcher.

mod common;

use bitforge::dispatch::Dispatcher;
use bitforge::events::PipelineObserver;
use bitforge::processor::{FileOutcome, ProcessingResult};
use bitforge::service::ServiceState;
use common::Harness;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct RestartLog {
    completed: AtomicUsize,
    reasons: Mutex<Vec<String>>,
}

impl PipelineObserver for RestartLog {
    fn on_file_processed(&self, _result: &ProcessingResult) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_service_restart(&self, reason: &str) {
        self.reasons.lock().push(reason.to_string());
    }
}

fn files(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("/in/{:02}.tif", i))).collect()
}

#[test]
fn unreachable_service_requeues_unfinished_files() {
    let h = Harness::new();
    h.service.ensure_running(&h.input, &h.output).unwrap();

    let log = Arc::new(RestartLog::default());
    let dispatcher = Dispatcher::new(1, 1000, h.service.clone(), log.clone()).unwrap();
    let files = files(10);
    let calls = AtomicUsize::new(0);

    let outcome = dispatcher
        .run_batch(&files, &|file: &Path| {
            if calls.fetch_add(1, Ordering::SeqCst) < 4 {
                FileOutcome::Finished(ProcessingResult::succeeded(file, file))
            } else {
                FileOutcome::ServiceUnreachable {
                    file: file.to_path_buf(),
                    reason: "connection refused".to_string(),
                }
            }
        })
        .unwrap();

    assert_eq!(outcome.results.len(), 4);
    assert_eq!(outcome.requeued.len(), 6);
    assert_eq!(log.completed.load(Ordering::SeqCst), 4);
    assert_eq!(*log.reasons.lock(), vec!["connection refused".to_string()]);

    // Completed and requeued files partition the submission
    let mut seen: BTreeSet<PathBuf> = outcome.results.iter().map(|r| r.original.clone()).collect();
    seen.extend(outcome.requeued.iter().cloned());
    assert_eq!(seen, files.iter().cloned().collect());

    assert_eq!(h.service.state(), ServiceState::Running);
    assert_eq!(h.runtime.restarts(), 1);
}

#[test]
fn requeued_files_complete_on_the_next_round() {
    let h = Harness::new();
    h.service.ensure_running(&h.input, &h.output).unwrap();

    let dispatcher = Dispatcher::new(3, 4, h.service.clone(), Arc::new(RestartLog::default())).unwrap();
    let files = files(10);
    let failed_once = AtomicUsize::new(0);

    let process = |file: &Path| {
        if file.ends_with("05.tif") && failed_once.fetch_add(1, Ordering::SeqCst) == 0 {
            FileOutcome::ServiceUnreachable {
                file: file.to_path_buf(),
                reason: "gone".to_string(),
            }
        } else {
            FileOutcome::Finished(ProcessingResult::succeeded(file, file))
        }
    };

    let first = dispatcher.run_batch(&files, &process).unwrap();
    assert!(!first.requeued.is_empty());
    // The first chunk never saw the outage
    assert!(first.results.len() >= 4);

    let second = dispatcher.run_batch(&first.requeued, &process).unwrap();
    assert!(second.requeued.is_empty());

    let total = first.results.len() + second.results.len();
    assert_eq!(total, 10);
}

#[test]
fn restart_limit_aborts_the_batch() {
    let h = Harness::new();
    h.service.ensure_running(&h.input, &h.output).unwrap();

    let dispatcher = Dispatcher::new(2, 10, h.service.clone(), Arc::new(RestartLog::default())).unwrap();
    let always_down = |file: &Path| FileOutcome::ServiceUnreachable {
        file: file.to_path_buf(),
        reason: "down".to_string(),
    };

    let err = dispatcher
        .run_to_completion(&files(3), &always_down)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("restarted more than 5 times"));
    assert_eq!(h.service.state(), ServiceState::Failed);
}
