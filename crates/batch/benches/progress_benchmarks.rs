use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use catalogsync_batch::{push_capped, BatchItem, ItemResult, ItemType, LogEntry, Progress};
use chrono::Utc;

/// Items with roughly two thirds finished, mixed outcomes.
fn sample_items(n: usize) -> Vec<BatchItem> {
    (0..n)
        .map(|i| {
            let mut item = BatchItem::new(format!("p-{i}"), ItemType::Product);
            match i % 3 {
                0 => item.record_success(ItemResult::ok("ok", serde_json::Value::Null), 2, Utc::now()),
                1 => item.record_failure("boom", 2, Utc::now()),
                _ => {}
            }
            item
        })
        .collect()
}

fn bench_progress_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("progress_compute");

    for size in [100usize, 1_000, 5_000].iter() {
        let items = sample_items(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| black_box(Progress::compute(items)));
        });
    }

    group.finish();
}

fn bench_log_append_at_cap(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_append");

    group.bench_function("append_past_cap", |b| {
        let mut logs = Vec::new();
        for i in 0..100 {
            push_capped(&mut logs, LogEntry::info(format!("entry {i}")));
        }
        b.iter(|| push_capped(&mut logs, LogEntry::info(black_box("next"))));
    });

    group.finish();
}

criterion_group!(benches, bench_progress_compute, bench_log_append_at_cap);
criterion_main!(benches);
