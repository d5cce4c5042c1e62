//! Capture and playback benchmark suite.
//!
//! Measures the per-sample hot path at different scales:
//! - Encoder: samples per batch window
//! - Reconstructor: remote participants replayed at once
//! - Resolver: element tree depth under the pointer
//!
//! Run with: cargo bench --bench playback
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use cursor_sync::{
    Batch, BatchPolicy, CommandLog, ElementSpec, MemoryDocument, ParticipantId, Point, Rect,
    Reconstructor, Rgb, SampleEncoder, resolve,
};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const SAMPLES_PER_WINDOW: &[usize] = &[10, 50, 200];
const PARTICIPANT_COUNTS: &[usize] = &[1, 10, 50];
const TREE_DEPTHS: &[usize] = &[4, 16, 64];

// ============================================================================
// Fixtures
// ============================================================================

fn nested_document(depth: usize) -> MemoryDocument {
    let doc = MemoryDocument::new(1920.0, 1080.0);
    let mut parent = doc.body();
    for level in 0..depth {
        let inset = level as f64 * 5.0;
        parent = doc.append(
            parent,
            ElementSpec::new("div").rect(Rect::new(
                inset,
                inset,
                1920.0 - 2.0 * inset,
                1080.0 - 2.0 * inset,
            )),
        );
    }
    doc
}

fn captured_batches(participants: usize, samples: usize) -> Vec<Batch> {
    let doc = nested_document(8);
    (0..participants)
        .map(|p| {
            let mut encoder = SampleEncoder::new(
                ParticipantId::new(format!("peer-{p}")),
                Rgb::default(),
                BatchPolicy {
                    interval_ms: u64::MAX,
                    size_limit: samples,
                },
            );
            for i in 0..samples {
                let point = Point::new(100.0 + i as f64, 200.0);
                encoder.push(i as u64, resolve(&doc, point, point));
            }
            encoder.flush().expect("window is full")
        })
        .collect()
}

// ============================================================================
// Benchmark: Encoder
// ============================================================================

fn bench_encoder(c: &mut Criterion) {
    let doc = nested_document(8);
    let mut group = c.benchmark_group("encoder");

    for &samples in SAMPLES_PER_WINDOW {
        let positions: Vec<_> = (0..samples)
            .map(|i| {
                let point = Point::new(50.0 + i as f64, 80.0);
                resolve(&doc, point, point)
            })
            .collect();

        group.throughput(Throughput::Elements(samples as u64));
        group.bench_with_input(BenchmarkId::new("window", samples), &positions, |b, positions| {
            b.iter(|| {
                let mut encoder = SampleEncoder::new(
                    ParticipantId::new("local"),
                    Rgb::default(),
                    BatchPolicy::default(),
                );
                for (i, position) in positions.iter().enumerate() {
                    encoder.push(i as u64, position.clone());
                }
                black_box(encoder.flush())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Reconstructor
// ============================================================================

fn bench_reconstructor(c: &mut Criterion) {
    let doc = nested_document(8);
    let mut group = c.benchmark_group("reconstructor");

    for &participants in PARTICIPANT_COUNTS {
        let batches = captured_batches(participants, 50);

        group.throughput(Throughput::Elements((participants * 50) as u64));
        group.bench_with_input(
            BenchmarkId::new("replay", participants),
            &batches,
            |b, batches| {
                b.iter(|| {
                    let mut renderer = CommandLog::new();
                    let mut reconstructor = Reconstructor::new(ParticipantId::new("local"));
                    for batch in batches {
                        reconstructor.on_batch_received(0, batch.clone(), &mut renderer);
                    }
                    black_box(reconstructor.advance(u64::MAX, &doc, &mut renderer))
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: Resolver
// ============================================================================

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for &depth in TREE_DEPTHS {
        let doc = nested_document(depth);
        let point = Point::new(960.0, 540.0);

        group.bench_with_input(BenchmarkId::new("depth", depth), &doc, |b, doc| {
            b.iter(|| black_box(resolve(doc, point, point)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encoder, bench_reconstructor, bench_resolve);
criterion_main!(benches);
