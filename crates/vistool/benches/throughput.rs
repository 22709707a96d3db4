use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use vistool::{kv_conf, KvConf, Sample, ThreadedTransformer, Transformer, TransformerConfig};

/// Benchmarks for end-to-end transformer throughput.
///
/// This measures:
/// 1. Scaling: a decode + resize + flip + transpose chain across worker counts
/// 2. Chain cost: the same workload with progressively longer chains
///
/// To run these, use:
/// ```bash
/// cargo bench -p vistool --bench throughput
/// ```

const BATCH: u32 = 64;
const WORKER_COUNTS: [usize; 4] = [1, 2, 4, 8];

/// Helper function to encode a synthetic 256x256 RGB frame.
fn make_png() -> Vec<u8> {
    let img = RgbImage::from_fn(256, 256, |x, y| image::Rgb([x as u8, y as u8, (x ^ y) as u8]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encode benchmark image");
    buffer.into_inner()
}

fn start(worker_count: usize, ops: &[(&str, KvConf)]) -> ThreadedTransformer {
    let transformer = ThreadedTransformer::new();
    transformer
        .configure(
            TransformerConfig::builder()
                .worker_count(worker_count)
                .queue_capacity(BATCH as usize)
                .build(),
        )
        .expect("configure");
    for (name, conf) in ops {
        transformer.add_op(name, conf).expect("add op");
    }
    transformer.start().expect("start");
    transformer
}

/// Push a whole batch, then collect it.
fn run_batch(transformer: &ThreadedTransformer, png: &[u8]) {
    for id in 0..BATCH {
        transformer
            .put(Sample::new(id, png.to_vec()))
            .expect("put");
    }
    for _ in 0..BATCH {
        black_box(transformer.get().expect("get"));
    }
}

fn standard_chain() -> Vec<(&'static str, KvConf)> {
    vec![
        ("decode", kv_conf([("mode", "rgb")])),
        ("resize", kv_conf([("width", "224"), ("height", "224")])),
        ("flip", kv_conf([("probability", "0.5")])),
        ("transpose", KvConf::new()),
    ]
}

/// Measure scaling across worker counts
fn bench_worker_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("Worker Scaling");
    group.throughput(Throughput::Elements(BATCH as u64));
    let png = make_png();

    for &workers in &WORKER_COUNTS {
        let transformer = start(workers, &standard_chain());
        group.bench_with_input(BenchmarkId::from_parameter(workers), &png, |b, png| {
            b.iter(|| run_batch(&transformer, png))
        });
        transformer.stop().expect("stop");
    }
    group.finish();
}

/// Measure the cost of adding operations to the chain.
fn bench_chain_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("Chain Length");
    group.throughput(Throughput::Elements(BATCH as u64));
    let png = make_png();
    let chain = standard_chain();

    for len in 1..=chain.len() {
        let transformer = start(4, &chain[..len]);
        group.bench_with_input(BenchmarkId::new("ops", len), &png, |b, png| {
            b.iter(|| run_batch(&transformer, png))
        });
        transformer.stop().expect("stop");
    }
    group.finish();
}

criterion_group!(benches, bench_worker_scaling, bench_chain_length);
criterion_main!(benches);
