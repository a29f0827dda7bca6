// Write performance benchmarks for blocktable

use blocktable::{CompositedWriter, CompressionKind, Options, ShardingWriter, SingleWriter};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tempfile::TempDir;

fn benchmark_sequential_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_write");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let path = temp_dir.path().join("bench.sst");
                let mut writer = SingleWriter::new(&path, Options::default()).unwrap();

                for i in 0..size {
                    let key = format!("key{:08}", i);
                    let value = format!("value{:08}", i);
                    writer.add(key.as_bytes(), value.as_bytes()).unwrap();
                }

                writer.flush().unwrap();
                black_box(&path);
            });
        });
    }

    group.finish();
}

fn benchmark_random_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_write");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let path = temp_dir.path().join("bench.sst");
                let mut writer = SingleWriter::new(&path, Options::default()).unwrap();

                use rand::Rng;
                let mut rng = rand::rng();

                for _ in 0..size {
                    let key_num: u32 = rng.random();
                    let key = format!("key{:08}", key_num);
                    let value = format!("value{:08}", key_num);
                    writer.add(key.as_bytes(), value.as_bytes()).unwrap();
                }

                writer.flush().unwrap();
                black_box(&path);
            });
        });
    }

    group.finish();
}

fn benchmark_composited_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("composited_write");

    group.throughput(Throughput::Elements(10000));
    group.bench_function("spill_and_merge_10000", |b| {
        b.iter(|| {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join("bench.sst");
            // Small batch threshold to force spills.
            let opts = Options::default().batch_write_size(64 * 1024);
            let mut writer = CompositedWriter::new(&path, opts).unwrap();

            for i in (0..10000u32).rev() {
                let key = format!("key{:08}", i);
                let value = format!("value{:08}", i);
                writer.add(key.as_bytes(), value.as_bytes()).unwrap();
            }

            writer.flush().unwrap();
            black_box(&path);
        });
    });

    group.finish();
}

fn benchmark_sharded_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("sharded_write");

    for shards in [2, 8].iter() {
        group.throughput(Throughput::Elements(10000));
        group.bench_with_input(BenchmarkId::from_parameter(shards), shards, |b, &shards| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let path = temp_dir.path().join("bench.sst");
                let mut writer =
                    ShardingWriter::new(&path, shards, "fingerprint", Options::default()).unwrap();

                for i in 0..10000u32 {
                    let key = format!("key{:08}", i);
                    let value = format!("value{:08}", i);
                    writer.add(key.as_bytes(), value.as_bytes()).unwrap();
                }

                writer.flush().unwrap();
                black_box(&path);
            });
        });
    }

    group.finish();
}

fn benchmark_write_with_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_with_compression");

    for kind in [
        CompressionKind::None,
        CompressionKind::Snappy,
        CompressionKind::Lz4,
    ] {
        group.bench_function(kind.name(), |b| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let path = temp_dir.path().join("bench.sst");
                let opts = Options::default().compression(kind);
                let mut writer = SingleWriter::new(&path, opts).unwrap();

                for i in 0..1000 {
                    let key = format!("key{:08}", i);
                    let value = vec![b'x'; 100];
                    writer.add(key.as_bytes(), &value).unwrap();
                }

                writer.flush().unwrap();
                black_box(&path);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_sequential_write,
    benchmark_random_write,
    benchmark_composited_write,
    benchmark_sharded_write,
    benchmark_write_with_compression
);
criterion_main!(benches);
