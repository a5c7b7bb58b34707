//! Performance benchmarks for the FMS wire codec.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::BytesMut;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ecrsim_core::TransactionType;
use ecrsim_protocol::{
    FmsFrameCodec, TransactionRequest, build_frame, compute_lrc, pack_request, parse_response,
};
use std::hint::black_box;
use tokio_util::codec::Decoder;

fn sample_request() -> TransactionRequest {
    TransactionRequest::new(TransactionType::Sale, "150000").with_invoice("123456")
}

fn sample_response() -> Vec<u8> {
    let mut payload = [0u8; 300];
    payload[0] = 0x01;
    payload[1..9].copy_from_slice(b"T1234567");
    payload[68..80].copy_from_slice(b"000015000000");
    payload[159..161].copy_from_slice(b"00");
    build_frame(&payload)
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_request");
    group.throughput(Throughput::Elements(1));

    let request = sample_request();
    group.bench_function("sale_with_invoice", |b| {
        b.iter(|| black_box(pack_request(black_box(&request), true).unwrap()));
    });

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_response");
    group.throughput(Throughput::Elements(1));

    let frame = sample_response();
    group.bench_function("full_frame", |b| {
        b.iter(|| black_box(parse_response(black_box(&frame)).unwrap()));
    });

    let mut with_trailer = sample_response();
    with_trailer.extend_from_slice(&[0x30; 120]);
    group.bench_function("frame_with_qr_trailer", |b| {
        b.iter(|| black_box(parse_response(black_box(&with_trailer)).unwrap()));
    });

    group.finish();
}

fn bench_lrc(c: &mut Criterion) {
    let mut group = c.benchmark_group("lrc");
    group.throughput(Throughput::Bytes(305));

    let frame = sample_response();
    group.bench_function("response_frame", |b| {
        b.iter(|| black_box(compute_lrc(black_box(&frame))));
    });

    group.finish();
}

fn bench_stream_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_decode");
    group.throughput(Throughput::Elements(1));

    let frame = sample_response();
    group.bench_function("single_frame", |b| {
        b.iter(|| {
            let mut codec = FmsFrameCodec::new();
            let mut buffer = BytesMut::from(&frame[..]);
            black_box(codec.decode(&mut buffer).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_pack, bench_parse, bench_lrc, bench_stream_decode);
criterion_main!(benches);
