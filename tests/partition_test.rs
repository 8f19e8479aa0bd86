//! Property tests for the processed/unprocessed partition and manifest dedup.

mod common;

use bitforge::checkpoint::BatchState;
use bitforge::scanner;
use common::Harness;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// After every batch the two lists cover the manifest exactly once, and
    /// files forced to fail never count as processed.
    #[test]
    fn prop_partition_holds_with_forced_failures(
        failures in proptest::collection::vec(any::<bool>(), 1..12),
        batch_size in 1usize..8,
        rounds in 1usize..4,
    ) {
        let h = Harness::new();
        let mut all = BTreeSet::new();
        let mut doomed = BTreeSet::new();
        for (i, fail) in failures.iter().enumerate() {
            // Unrecognized extensions always fail
            let name = if *fail { format!("f{:02}.bin", i) } else { format!("f{:02}.txt", i) };
            let path = h.input_file(&name, name.as_bytes());
            if *fail {
                doomed.insert(path.clone());
            }
            all.insert(path);
        }

        let mut config = h.config();
        config.ingest.batch_size = batch_size;
        let pipeline = h.pipeline(config);

        for _ in 0..rounds {
            let report = pipeline.run_batch(&all).unwrap();
            let state = BatchState::load(&h.state).unwrap().unwrap();

            prop_assert!(state.processed.is_disjoint(&state.unprocessed));
            let union: BTreeSet<PathBuf> = state.processed.union(&state.unprocessed).cloned().collect();
            prop_assert_eq!(&union, &all);
            prop_assert!(state.processed.is_disjoint(&doomed));
            prop_assert!(doomed.is_subset(&state.unprocessed));
            prop_assert_eq!(&report.state, &state);
        }
    }

    /// Scanning collapses repeated references to one entry per file.
    #[test]
    fn prop_scan_deduplicates(picks in proptest::collection::vec(0usize..5, 1..30)) {
        let h = Harness::new();
        let names: Vec<String> = (0..5).map(|i| format!("doc{}.pdf", i)).collect();
        for name in &names {
            h.input_file(name, b"%PDF");
        }

        // Alternate spellings of the same path
        let refs: Vec<String> = picks
            .iter()
            .enumerate()
            .map(|(n, &i)| if n % 2 == 0 { names[i].clone() } else { format!("./{}", names[i]) })
            .collect();
        let ref_strs: Vec<&str> = refs.iter().map(String::as_str).collect();
        let manifest = h.manifest(&ref_strs);

        let distinct: BTreeSet<usize> = picks.iter().copied().collect();
        let scanned = scanner::scan(&manifest, &h.input, "bitstream").unwrap();
        prop_assert_eq!(scanned.len(), distinct.len());
    }
}
