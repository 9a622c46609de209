use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gatehttpd_core::base64::{decode_into, decoded_capacity};
use gatehttpd_core::md5::{digest_in_place, padded_len};
use gatehttpd_core::parse_request;

fn request_with_headers(count: usize) -> Vec<u8> {
    let mut req = String::from(
        "GET /private/index.html HTTP/1.1\r\nHost: localhost:3490\r\nAuthorization: Basic dXNlcjp1c2Vy\r\n",
    );
    for i in 0..count {
        req.push_str(&format!("X-Header-{}: value-{}\r\n", i, i));
    }
    req.push_str("\r\n");
    req.into_bytes()
}

fn bench_parse_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_request");
    for count in [0usize, 10, 50] {
        let raw = request_with_headers(count);
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &raw, |b, raw| {
            b.iter(|| parse_request(black_box(raw)))
        });
    }
    group.finish();
}

fn bench_md5(c: &mut Criterion) {
    let mut group = c.benchmark_group("md5");
    for len in [4usize, 64, 1024] {
        let mut buf = vec![b'x'; padded_len(len)];
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_function(BenchmarkId::from_parameter(len), |b| {
            b.iter(|| digest_in_place(black_box(&mut buf), len))
        });
    }
    group.finish();
}

fn bench_base64(c: &mut Criterion) {
    let token = b"am9qbyBubyBraW15b3VuYSBib3VrZW4=";
    let mut dst = vec![0u8; decoded_capacity(token.len())];
    c.bench_function("base64_decode", |b| {
        b.iter(|| decode_into(black_box(token), &mut dst).map(|out| out.len()))
    });
}

criterion_group!(benches, bench_parse_request, bench_md5, bench_base64);
criterion_main!(benches);
