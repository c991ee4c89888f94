use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use oscript::{compact, from_slice, is_valid, to_vec, Value};

fn sample_document() -> Vec<u8> {
    let node = Value::object([
        ("ID", Value::Int64Value(2000)),
        ("Name", Value::text("Enterprise Workspace")),
        ("CreateDate", Value::text("synthetic")),
        (
            "Children",
            Value::sequence((0..32).map(|i| {
                Value::object([
                    ("ID", Value::Int64Value(2000 + i)),
                    ("Name", Value::text(format!("node-{}", i))),
                    ("Size", Value::Float64Value(i as f64 * 1.5)),
                    ("Visible", Value::BooleanValue(i % 2 == 0)),
                ])
            })),
        ),
    ]);
    to_vec(&node).expect("sample encodes")
}

fn bench_codec(c: &mut Criterion) {
    let doc = sample_document();
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(doc.len() as u64));

    group.bench_function("validate", |b| {
        b.iter(|| is_valid(black_box(&doc)));
    });

    group.bench_function("compact", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(doc.len());
            compact(&mut out, black_box(&doc)).expect("compacts");
            out
        });
    });

    group.bench_function("decode_dynamic", |b| {
        b.iter(|| from_slice::<Value>(black_box(&doc)).expect("decodes"));
    });

    group.bench_function("encode_dynamic", |b| {
        let value: Value = from_slice(&doc).expect("decodes");
        b.iter(|| to_vec(black_box(&value)).expect("encodes"));
    });

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
