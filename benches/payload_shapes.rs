//! Payload shape benchmark suite
//!
//! Criterion cross-check for the calibrated series:
//! - Document generation per shape
//! - Store insert in native and interpreted modes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use exp_series_bench::payload::GeneratorId;
use exp_series_bench::store::{DocumentStore, MemoryStore, ID_FIELD};
use exp_series_bench::Mode;

const SHAPES: [(GeneratorId, u32, u32); 4] = [
    (GeneratorId::ValueStringSize, 2, 10),
    (GeneratorId::HashSizeFixnum, 2, 8),
    (GeneratorId::ArrayNestFixnum, 4, 4),
    (GeneratorId::HashNestFixnum, 4, 4),
];

/// Benchmark document construction for each shape
fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");

    for (generator, base, power) in SHAPES {
        group.bench_with_input(
            BenchmarkId::new(generator.name(), format!("{base}^{power}")),
            &(base, power),
            |bencher, &(base, power)| {
                bencher.iter(|| generator.generate(black_box(base), black_box(power)).unwrap())
            },
        );
    }

    group.finish();
}

/// Benchmark repeated inserts of one reused document
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for mode in [Mode::Native, Mode::Interpreted] {
        for (generator, base, power) in SHAPES {
            let mut doc = generator.generate(base, power).unwrap().document;
            let mut store = MemoryStore::new("bench", mode);
            group.bench_function(
                BenchmarkId::new(mode.as_str(), generator.name()),
                |bencher| {
                    bencher.iter(|| {
                        doc.remove(ID_FIELD);
                        let id = store.insert_one("c", &mut doc).unwrap();
                        // Bound memory across criterion's sampling.
                        if store.count("c") >= 4096 {
                            store.remove_all("c").unwrap();
                        }
                        black_box(id)
                    })
                },
            );
            store.drop_database().unwrap();
        }
    }

    group.finish();
}

criterion_group!(benches, bench_generate, bench_insert);
criterion_main!(benches);
