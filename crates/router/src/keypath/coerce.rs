//! 스칼라 변환 -- 말단 값을 라우팅 키 문자열로 변환합니다.

use serde_json::{Number, Value};

/// 값을 정규 문자열 표현으로 변환합니다. 실패하지 않습니다.
///
/// - 문자열: 그대로
/// - 정수 / bool: 10진수 / `true`, `false`
/// - 실수: `f64`의 `Display` 출력. 왕복 가능한 최단 10진 표현이며 지수 표기를 쓰지 않음
/// - 그 외(객체, 배열, null): JSON 텍스트
pub fn to_key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(n),
        other => other.to_string(),
    }
}

fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        // f64 Display는 지수 표기 없이 최단 표현을 출력 (1.0 -> "1")
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}
