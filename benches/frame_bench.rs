use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use dhip_client::core::assembler::FrameAssembler;
use dhip_client::core::codec::DhipCodec;
use dhip_client::core::frame::Frame;
use dhip_client::protocol::handshake::{digest_password, Credentials};
use dhip_client::protocol::message::{Request, Response};
use serde_json::json;
use tokio_util::codec::Encoder;

#[allow(clippy::unwrap_used)]
fn bench_frame_encode_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode_assemble");
    let body_sizes = [64usize, 512, 4096, 65536];

    for &size in &body_sizes {
        let body = json!({"id": 7, "session": 1234, "result": true, "params": {"pad": "x".repeat(size)}});
        let frame = Frame::json(1234, 7, &body).unwrap();
        let bytes = frame.to_bytes();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                || frame.clone(),
                |frame| {
                    let mut buf = BytesMut::with_capacity(bytes.len());
                    let mut codec = DhipCodec;
                    codec.encode(frame, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("assemble_{size}b"), |b| {
            b.iter(|| {
                let mut assembler = FrameAssembler::new();
                let response: Option<Response> = assembler.push(&bytes).unwrap();
                assert!(response.is_some());
            })
        });
        group.bench_function(format!("assemble_{size}b_in_1k_reads"), |b| {
            b.iter(|| {
                let mut assembler = FrameAssembler::new();
                let mut response: Option<Response> = None;
                for chunk in bytes.chunks(1024) {
                    response = assembler.push(chunk).unwrap();
                }
                assert!(response.is_some());
            })
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_request_and_digest(c: &mut Criterion) {
    c.bench_function("open_door_request_to_frame", |b| {
        let request = Request::open_door(json!("obj-1"), 0, "1234");
        b.iter(|| request.to_frame(1234, 4).unwrap())
    });

    c.bench_function("challenge_digest", |b| {
        let credentials = Credentials::default();
        b.iter(|| digest_password(&credentials, "Login to 7M0A1B2C3D4E5", "1234567890"))
    });
}

criterion_group!(benches, bench_frame_encode_assemble, bench_request_and_digest);
criterion_main!(benches);
