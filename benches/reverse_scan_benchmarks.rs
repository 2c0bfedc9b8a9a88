use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use log_retriever::services::{
    collect_bulk, AccessLimits, FileAccessor, InMemorySource, KeywordFilter, ReverseScanner,
};
use std::fs;
use tempfile::TempDir;

fn create_log_content(lines: usize) -> Vec<u8> {
    (0..lines)
        .map(|i| {
            let level = if i % 17 == 0 { "ERROR" } else { "INFO" };
            format!("2024-01-01T00:00:{:02}Z {} worker-{} handled request {}\n", i % 60, level, i % 8, i)
        })
        .collect::<String>()
        .into_bytes()
}

fn bench_tail_in_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("tail_in_memory");
    let content = create_log_content(200_000);

    for max_entries in [10usize, 100, 1000, 10_000] {
        group.throughput(Throughput::Elements(max_entries as u64));
        group.bench_with_input(
            BenchmarkId::new("unfiltered", max_entries),
            &max_entries,
            |b, &max_entries| {
                b.iter(|| {
                    let scanner = ReverseScanner::new(
                        InMemorySource::new(content.clone()),
                        KeywordFilter::pass_all(),
                        8 * 1024,
                    );
                    black_box(collect_bulk(scanner, max_entries))
                })
            },
        );
    }

    group.bench_function("keyword_error_100", |b| {
        b.iter(|| {
            let scanner = ReverseScanner::new(
                InMemorySource::new(content.clone()),
                KeywordFilter::new(Some("error")).unwrap(),
                8 * 1024,
            );
            black_box(collect_bulk(scanner, 100))
        })
    });

    group.finish();
}

fn bench_access_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_strategy");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.log");
    fs::write(&path, create_log_content(500_000)).unwrap();

    for (name, threshold) in [("mmap", 0u64), ("positional", u64::MAX)] {
        let limits = AccessLimits {
            mmap_threshold: threshold,
            max_file_size: u64::MAX,
        };
        for window in [4 * 1024usize, 8 * 1024, 64 * 1024] {
            group.bench_with_input(
                BenchmarkId::new(name, window),
                &window,
                |b, &window| {
                    b.iter(|| {
                        let accessor = FileAccessor::open(&path, &limits).unwrap();
                        let scanner =
                            ReverseScanner::new(accessor, KeywordFilter::pass_all(), window);
                        black_box(collect_bulk(scanner, 1000))
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_tail_in_memory, bench_access_strategies);
criterion_main!(benches);
