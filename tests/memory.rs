//! Peak resident memory stays flat while a batch repeatedly stores the same
//! large document. Kept in its own test binary so the high-water mark belongs
//! to this test alone.
#![cfg(target_os = "linux")]

use exp_series_bench::clock::ProcessClock;
use exp_series_bench::harness::measure;
use exp_series_bench::hooks::{HookRun, HookSet};
use exp_series_bench::payload::GeneratorId;
use exp_series_bench::store::{DocumentStore, MemoryStore};
use exp_series_bench::{Mode, COLLECTION_NAME};

const ITERATIONS: u64 = 4096;

fn peak_resident_mb() -> u64 {
    let status = std::fs::read_to_string("/proc/self/status").unwrap();
    let line = status.lines().find(|l| l.starts_with("VmHWM:")).unwrap();
    let kb: u64 = line.split_whitespace().nth(1).unwrap().parse().unwrap();
    kb / 1024
}

#[test]
fn large_batches_do_not_retain_a_copy_per_insert() {
    // 32 KiB string; one retained copy per call would hold ~128 MiB per batch.
    let payload = GeneratorId::ValueStringSize.generate(2, 15).unwrap();
    let clock = ProcessClock::new();
    let before = peak_resident_mb();

    for mode in [Mode::Native, Mode::Interpreted] {
        for hooks in [HookSet::INSERT_ONLY, HookSet::CURSOR_SCAN] {
            let mut store = MemoryStore::new("benchmark", mode);
            let mut run = HookRun::new(hooks, &mut store, COLLECTION_NAME, payload.document.clone());
            measure(&clock, &mut run, ITERATIONS).unwrap();
            drop(run);
            assert_eq!(store.count(COLLECTION_NAME), 0);
        }
    }

    let after = peak_resident_mb();
    assert!(
        after.saturating_sub(before) < 48,
        "peak resident grew from {before} MB to {after} MB"
    );
}
