use btoon::{decode, encode_with_options, from_slice, to_vec, to_value, Decimal, EncodeOptions, StreamReader, StreamWriter};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone)]
struct User {
    id: u32,
    name: String,
    email: String,
    active: bool,
}

#[derive(Serialize, Deserialize, Clone)]
struct Product {
    sku: String,
    name: String,
    price: Decimal,
    quantity: u32,
}

fn products(size: u32) -> Vec<Product> {
    (0..size)
        .map(|i| Product {
            sku: format!("SKU{}", i),
            name: format!("Product {}", i),
            price: Decimal::new(999 + i64::from(i), 2),
            quantity: i,
        })
        .collect()
}

fn benchmark_simple_struct(c: &mut Criterion) {
    let user = User {
        id: 123,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        active: true,
    };
    let bytes = to_vec(&user).unwrap();

    c.bench_function("serialize_simple_struct", |b| b.iter(|| to_vec(black_box(&user))));
    c.bench_function("deserialize_simple_struct", |b| {
        b.iter(|| from_slice::<User>(black_box(&bytes)))
    });
}

fn benchmark_tabular_vs_row_major(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_products");

    for size in [10, 50, 100, 500].iter() {
        let value = to_value(&products(*size)).unwrap();
        let columnar = EncodeOptions::new();
        let row_major = EncodeOptions::new().with_auto_tabular(false);

        group.bench_with_input(BenchmarkId::new("tabular", size), &value, |b, value| {
            b.iter(|| encode_with_options(black_box(value), &columnar))
        });
        group.bench_with_input(BenchmarkId::new("row_major", size), &value, |b, value| {
            b.iter(|| encode_with_options(black_box(value), &row_major))
        });
    }
    group.finish();
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_products");

    for size in [10, 50, 100, 500].iter() {
        let value = to_value(&products(*size)).unwrap();
        let bytes = encode_with_options(&value, &EncodeOptions::new()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| decode(black_box(bytes)))
        });
    }
    group.finish();
}

fn benchmark_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");
    let value = to_value(&products(500)).unwrap();
    let plain = EncodeOptions::new();
    let packed = EncodeOptions::new().with_compression(true);
    let packed_bytes = encode_with_options(&value, &packed).unwrap();

    group.bench_function("encode_plain", |b| b.iter(|| encode_with_options(black_box(&value), &plain)));
    group.bench_function("encode_compressed", |b| {
        b.iter(|| encode_with_options(black_box(&value), &packed))
    });
    group.bench_function("decode_compressed", |b| b.iter(|| decode(black_box(&packed_bytes))));
    group.finish();
}

fn benchmark_streaming(c: &mut Criterion) {
    let items = products(100);
    let mut writer = StreamWriter::new(Vec::new());
    for item in &items {
        writer.write_serialize(item).unwrap();
    }
    let stream = writer.close().unwrap();

    c.bench_function("stream_write_100_frames", |b| {
        b.iter(|| {
            let mut writer = StreamWriter::new(Vec::with_capacity(stream.len()));
            for item in &items {
                writer.write_serialize(black_box(item)).unwrap();
            }
            writer.close().unwrap()
        })
    });
    c.bench_function("stream_read_100_frames", |b| {
        b.iter(|| StreamReader::new(black_box(stream.as_slice())).count())
    });
}

criterion_group!(
    benches,
    benchmark_simple_struct,
    benchmark_tabular_vs_row_major,
    benchmark_decode,
    benchmark_compression,
    benchmark_streaming
);
criterion_main!(benches);
