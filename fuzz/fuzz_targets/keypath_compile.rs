#![no_main]

use libfuzzer_sys::fuzz_target;
use logbridge_router::PathSpec;

fuzz_target!(|raw: &str| {
    let spec = PathSpec::compile(raw);

    // 세그먼트 수는 점 개수 + 1을 넘지 않고, 문자는 늘어나지 않는다
    assert!(spec.len() <= raw.matches('.').count() + 1);
    let chars: usize = spec.segments().iter().map(|s| s.chars().count()).sum();
    assert!(chars <= raw.chars().count());
});
