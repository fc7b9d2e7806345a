//! Criterion benchmarks for the sdrflow-core engine.
//!
//! - **Queue**: push/pop throughput on the bounded hand-off queue
//! - **Build**: wiring a chain (partition merges, type checks)
//! - **Lifecycle**: start/stop round trip, dominated by thread spawn and latches
//!
//! Run with: `cargo bench -p sdrflow-core`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sdrflow_core::{Graph, Input, Node, NodeResult, Output, PortMut, Queue};

const CHAIN_LENGTHS: &[usize] = &[4, 16, 64];

struct Pass {
    input: Input<Vec<f32>>,
    out: Output<Vec<f32>>,
}

impl Pass {
    fn new() -> Self {
        Self {
            input: Input::new(),
            out: Output::new(),
        }
    }
}

impl Node for Pass {
    fn port_count(&self) -> usize {
        2
    }

    fn port(&mut self, index: usize) -> Option<PortMut<'_>> {
        match index {
            0 => Some(PortMut::from(&mut self.input)),
            1 => Some(PortMut::from(&mut self.out)),
            _ => None,
        }
    }

    fn process(&mut self) -> NodeResult {
        if let Ok(block) = self.input.read() {
            self.out.store_shared(block)?;
        }
        Ok(())
    }
}

fn chain(length: usize) -> Graph {
    let mut graph = Graph::new();
    let mut prev = graph.add(Pass::new());
    for _ in 1..length {
        let next = graph.add(Pass::new());
        graph.connect(prev, next).unwrap();
        prev = next;
    }
    graph
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("Queue");

    for &capacity in &[16usize, 256] {
        group.bench_with_input(
            BenchmarkId::new("try_push_pop", capacity),
            &capacity,
            |b, &capacity| {
                let queue = Queue::new(capacity);
                b.iter(|| {
                    for i in 0..capacity {
                        black_box(queue.try_push(i));
                    }
                    while let Some(v) = queue.try_pop() {
                        black_box(v);
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("lossy_push", capacity),
            &capacity,
            |b, &capacity| {
                let queue = Queue::new(capacity);
                let mut i = 0usize;
                b.iter(|| {
                    i = i.wrapping_add(1);
                    black_box(queue.push(i))
                });
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("Build");

    for &length in CHAIN_LENGTHS {
        group.bench_with_input(BenchmarkId::new("chain", length), &length, |b, &length| {
            b.iter(|| black_box(chain(length)));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("Lifecycle");
    group.sample_size(20);

    for &length in CHAIN_LENGTHS {
        group.bench_with_input(
            BenchmarkId::new("start_stop", length),
            &length,
            |b, &length| {
                let mut graph = chain(length);
                b.iter(|| {
                    graph.start().unwrap();
                    graph.stop();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_queue, bench_build, bench_lifecycle);
criterion_main!(benches);
