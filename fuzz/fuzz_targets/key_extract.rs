#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use logbridge_router::{PathSpec, extract_key};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    path: &'a str,
    payload: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    let spec = PathSpec::compile(input.path);
    let Ok(serde_json::Value::Object(root)) = serde_json::from_slice(input.payload) else {
        return;
    };

    // 키가 있으면 비어 있지 않다
    if let Some(key) = extract_key(&root, &spec) {
        assert!(!key.is_empty());
    }
});
