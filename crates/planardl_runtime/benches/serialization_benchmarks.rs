//! Benchmarks for Planardl fact graph serialization (MessagePack).
//!
//! Run with: `cargo bench --package planardl_runtime`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use planardl_foundation::{FactId, NodeRef, Span, Value};
use planardl_graph::{FactGraph, FactGraphBuilder, FactSink};
use planardl_runtime::MsgPackSink;
use planardl_runtime::serialize::{from_bytes, to_bytes};

// =============================================================================
// Helper Functions
// =============================================================================

/// Creates a graph of `count` services, each using one image.
fn create_graph(count: usize) -> FactGraph {
    let mut builder = FactGraphBuilder::new();
    for i in 0..count {
        let origin = NodeRef::new(i as u64, Span::new(i * 40, i * 40 + 38, 1, 1));
        let service = builder
            .add_fact(
                "compose.Service".into(),
                vec![
                    ("name".into(), Value::from(format!("service_{i}"))),
                    ("port".into(), Value::Int(8000 + (i % 1000) as i64)),
                ],
                Some(origin),
            )
            .unwrap();
        let image = builder
            .add_fact(
                "compose.Image".into(),
                vec![("name".into(), Value::from("nginx:1.25"))],
                None,
            )
            .unwrap();
        builder.add_edge(service, image, Some("uses".into())).unwrap();
    }
    builder.build()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    for count in [100, 1_000, 10_000] {
        let graph = create_graph(count);
        group.throughput(Throughput::Elements(graph.len() as u64));
        group.bench_with_input(BenchmarkId::new("graph", count), &graph, |b, g| {
            b.iter(|| black_box(to_bytes(g).unwrap().len()));
        });
    }

    group.finish();
}

fn bench_deserialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("deserialize");

    for count in [100, 1_000, 10_000] {
        let bytes = to_bytes(&create_graph(count)).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("graph", count), &bytes, |b, bytes| {
            b.iter(|| {
                let graph = from_bytes(bytes).unwrap();
                black_box(graph.outgoing(FactId(0)).count())
            });
        });
    }

    group.finish();
}

fn bench_sink(c: &mut Criterion) {
    let mut group = c.benchmark_group("msgpack_sink");
    let graphs: Vec<FactGraph> = (0..32).map(|_| create_graph(100)).collect();

    group.throughput(Throughput::Elements(graphs.len() as u64));
    group.bench_function("32_files", |b| {
        b.iter(|| {
            let mut sink = MsgPackSink::new(Vec::new());
            for (i, graph) in graphs.iter().enumerate() {
                sink.accept(&format!("file_{i}.yaml"), graph).unwrap();
            }
            black_box(sink.into_inner().unwrap().len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_serialize, bench_deserialize, bench_sink);
criterion_main!(benches);
