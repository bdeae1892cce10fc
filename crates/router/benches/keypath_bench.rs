//! 키 경로 추출 벤치마크

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Map, Value};

use logbridge_router::keypath::{PathSpec, extract_key};

fn root(json: &str) -> Map<String, Value> {
    serde_json::from_str(json).unwrap()
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_escaped_path", |b| {
        b.iter(|| PathSpec::compile(black_box(r"body.user\.profile.tags.#_3")))
    });
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_key");

    let flat = root(r#"{"hostname":"web-01","severity":3,"message":"disk full"}"#);
    let flat_path = PathSpec::compile("hostname");
    group.bench_function("flat_object", |b| {
        b.iter(|| extract_key(black_box(&flat), &flat_path))
    });

    let nested = root(r#"{"a":{"b":{"c":{"d":[1,2,{"e":"deep"}]}}}}"#);
    let nested_path = PathSpec::compile("a.b.c.d.#_2.e");
    group.bench_function("nested_object_and_list", |b| {
        b.iter(|| extract_key(black_box(&nested), &nested_path))
    });

    let json_string = root(r#"{"body":"{\"user\":{\"id\":42,\"name\":\"kim\"}}"}"#);
    let json_path = PathSpec::compile("body.user.id");
    group.bench_function("json_in_string", |b| {
        b.iter(|| extract_key(black_box(&json_string), &json_path))
    });

    let query_string = root(r#"{"q":"source=web&user=alice&tag=a&tag=b"}"#);
    let query_path = PathSpec::compile("q.tag");
    group.bench_function("query_in_string", |b| {
        b.iter(|| extract_key(black_box(&query_string), &query_path))
    });

    group.finish();
}

fn bench_payload_to_key(c: &mut Criterion) {
    let payload = br#"{"priority":34,"hostname":"mymachine","app_name":"su","message":"user=root&tty=pts/8"}"#;
    let path = PathSpec::compile("message.user");
    c.bench_function("payload_parse_and_extract", |b| {
        b.iter(|| {
            serde_json::from_slice::<Map<String, Value>>(black_box(payload))
                .ok()
                .and_then(|root| extract_key(&root, &path))
        })
    });
}

criterion_group!(benches, bench_compile, bench_extract, bench_payload_to_key);
criterion_main!(benches);
