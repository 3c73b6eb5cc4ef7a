//! Full-document merge and fingerprint benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shelfsync_bench::random_library;
use shelfsync_engine::{merge_backups, MergeOptions};
use shelfsync_model::{BackupDocument, Fingerprint};
use shelfsync_protocol::{ChangedItems, DeletedManga, UpdatedChapter};

/// Benchmark merging two independently generated libraries.
fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for manga_count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*manga_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(manga_count),
            manga_count,
            |b, &count| {
                let old = random_library(count, 20);
                let new = random_library(count, 20);
                let options = MergeOptions::default();
                let changes = ChangedItems::default();

                b.iter(|| {
                    let outcome =
                        merge_backups(black_box(&old), black_box(&new), &changes, &options);
                    black_box(outcome);
                });
            },
        );
    }
    group.finish();
}

/// Benchmark a merge that carries deletion and chapter intents.
fn bench_merge_with_intents(c: &mut Criterion) {
    let old = random_library(500, 20);
    let new = random_library(500, 20);
    let changes = ChangedItems {
        deleted_mangas: (1..=50).map(|manga_id| DeletedManga { manga_id }).collect(),
        deleted_categories: Vec::new(),
        updated_chapters: (51..=250)
            .map(|manga_id| UpdatedChapter {
                chapter_id: manga_id * shelfsync_bench::CHAPTER_STRIDE,
                manga_id,
                is_read: true,
                ..Default::default()
            })
            .collect(),
    };
    let options = MergeOptions::default();

    c.bench_function("merge_with_intents", |b| {
        b.iter(|| {
            let outcome = merge_backups(&old, &new, black_box(&changes), &options);
            black_box(outcome);
        });
    });
}

/// Benchmark fingerprinting documents of increasing size.
fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for manga_count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*manga_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(manga_count),
            manga_count,
            |b, &count| {
                let doc = random_library(count, 20);
                b.iter(|| {
                    let fingerprint = Fingerprint::of(black_box(&doc)).unwrap();
                    black_box(fingerprint);
                });
            },
        );
    }
    group.finish();
}

/// Benchmark parsing a stored document.
fn bench_parse(c: &mut Criterion) {
    let text = random_library(500, 20).to_json().unwrap();

    c.bench_function("parse_document", |b| {
        b.iter(|| {
            let doc = BackupDocument::from_json(black_box(&text)).unwrap();
            black_box(doc);
        });
    });
}

criterion_group!(
    benches,
    bench_merge,
    bench_merge_with_intents,
    bench_fingerprint,
    bench_parse,
);

criterion_main!(benches);
