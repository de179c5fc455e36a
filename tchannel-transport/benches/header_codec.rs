//! Header codec benchmarks
//!
//! Measures encode and decode cost of application headers for:
//! - The binary layout at several header counts
//! - The JSON layout used by the `json` format

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tchannel_transport::rpc::{HeaderCase, Headers};
use tchannel_transport::serialization::{
    decode_headers, decode_json_headers, encode_headers, encode_json_headers,
};

fn headers(count: usize) -> Headers {
    (0..count)
        .map(|i| (format!("X-Header-{i}"), format!("value-{i:04}")))
        .collect()
}

fn bench_binary(c: &mut Criterion) {
    let mut group = c.benchmark_group("headers_binary");

    for count in [0, 4, 32] {
        let headers = headers(count);
        let encoded = encode_headers(&headers, HeaderCase::Canonical).unwrap();
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", count), &headers, |b, headers| {
            b.iter(|| encode_headers(black_box(headers), HeaderCase::Canonical).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("decode", count), &encoded, |b, encoded| {
            b.iter(|| decode_headers(black_box(encoded)).unwrap());
        });
    }

    group.finish();
}

fn bench_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("headers_json");

    for count in [0, 4, 32] {
        let headers = headers(count);
        let encoded = encode_json_headers(&headers, HeaderCase::Original).unwrap();
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", count), &headers, |b, headers| {
            b.iter(|| encode_json_headers(black_box(headers), HeaderCase::Original).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("decode", count), &encoded, |b, encoded| {
            b.iter(|| decode_json_headers(black_box(encoded)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_binary, bench_json);
criterion_main!(benches);
