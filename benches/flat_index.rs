use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use smartsearch::embeddings::normalize_rows;
use smartsearch::index::FlatIpIndex;
use std::hint::black_box;

const DIMENSION: usize = 512;

/// Deterministic pseudo-random matrix so runs are comparable
fn matrix(rows: usize) -> Vec<f32> {
    let mut state: u32 = 0x9E37_79B9;
    let mut data = Vec::with_capacity(rows * DIMENSION);
    for _ in 0..rows * DIMENSION {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        data.push((state % 2000) as f32 / 1000.0 - 1.0);
    }
    normalize_rows(&mut data, DIMENSION);
    data
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_ip_search");
    for rows in [1_000, 10_000] {
        let data = matrix(rows);
        let mut index = FlatIpIndex::new(DIMENSION).expect("non-zero dimension");
        index.add(&data).expect("matching dimension");
        let query = data[..DIMENSION].to_vec();

        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| index.search(black_box(&query), 10));
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
