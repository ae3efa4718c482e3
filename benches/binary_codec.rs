// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Encode/decode throughput for the binary codec (§4.G), across a small
//! scalar value and a wider object with several named members, mirroring
//! the teacher's own per-shape benchmark functions.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use conduit_rt::codec::binary::BinaryCodec;
use conduit_rt::codec::{Formatter, Parser};
use conduit_rt::value::SerializationInfo;

fn small_scalar() -> SerializationInfo {
    42i64.into()
}

fn wide_object() -> SerializationInfo {
    let mut si = SerializationInfo::new_object();
    si.set_type_name("Telemetry");
    *si.add_member("sequence") = 1_234_567i64.into();
    *si.add_member("label") = "engine-bay-sensor".to_string().into();
    *si.add_member("temperature_c") = 87.5f64.into();
    *si.add_member("healthy") = true.into();
    let mut samples = SerializationInfo::new_array();
    for i in 0..16 {
        *samples.add_element() = (i as i64 * 3).into();
    }
    *si.add_member("samples") = samples;
    si
}

fn bench_encode_small_scalar(c: &mut Criterion) {
    let codec = BinaryCodec::new();
    let value = small_scalar();
    c.bench_function("binary_codec_encode_small_scalar", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            codec.encode(black_box(&value), &mut out).unwrap();
            black_box(out);
        });
    });
}

fn bench_encode_wide_object(c: &mut Criterion) {
    let codec = BinaryCodec::new();
    let value = wide_object();
    c.bench_function("binary_codec_encode_wide_object", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            codec.encode(black_box(&value), &mut out).unwrap();
            black_box(out);
        });
    });
}

fn bench_decode_wide_object(c: &mut Criterion) {
    let codec = BinaryCodec::new();
    let value = wide_object();
    let mut encoded = Vec::new();
    codec.encode(&value, &mut encoded).unwrap();

    c.bench_function("binary_codec_decode_wide_object", |b| {
        b.iter(|| {
            let (decoded, consumed) = codec.decode(black_box(&encoded)).unwrap();
            black_box((decoded, consumed));
        });
    });
}

fn bench_dictionary_reuse_across_repeated_objects(c: &mut Criterion) {
    let codec = BinaryCodec::new();
    let value = wide_object();
    c.bench_function("binary_codec_encode_wide_object_dictionary_warm", |b| {
        // The dictionary is per-instance and grows for the life of the
        // codec (§5's resource policy); after the first iteration every
        // subsequent encode hits dictionary references rather than
        // literal names, which is the steady-state case on a real
        // connection.
        let mut out = Vec::new();
        codec.encode(&value, &mut out).unwrap();
        b.iter(|| {
            let mut out = Vec::new();
            codec.encode(black_box(&value), &mut out).unwrap();
            black_box(out);
        });
    });
}

criterion_group!(
    benches,
    bench_encode_small_scalar,
    bench_encode_wide_object,
    bench_decode_wide_object,
    bench_dictionary_reuse_across_repeated_objects
);
criterion_main!(benches);
