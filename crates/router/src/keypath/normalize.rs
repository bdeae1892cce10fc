//! 구조 정규화 -- 탐색 중간 값을 키-값 뷰로 변환
//!
//! | 값 | 뷰 |
//! |----|----|
//! | 객체 | 그대로 |
//! | 배열 | `#_0`, `#_1`, ... 인덱스 키 |
//! | JSON 객체 문자열 | 디코딩된 객체 |
//! | URL 쿼리 문자열 | 키별 값을 이어 붙인 객체 |
//! | 그 외 (숫자, bool, null) | 말단 값 (탐색 불가) |

use std::borrow::Cow;

use serde_json::{Map, Value};

/// 배열 원소 키 접두어
pub const LIST_INDEX_PREFIX: &str = "#_";

/// 정규화된 키-값 뷰
///
/// 원본 메시지를 빌려 쓰는 경우(`Borrowed`)와 문자열을 디코딩하여
/// 새로 만든 경우(`Owned`)를 모두 표현합니다. 한 번의 탐색 단계 동안만 존재합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingView<'a> {
    /// 문자열 키 객체
    Object(Cow<'a, Map<String, Value>>),
    /// 인덱스 키(`#_N`)로 접근하는 배열
    List(Cow<'a, [Value]>),
}

impl<'a> MappingView<'a> {
    /// 키에 해당하는 값을 참조로 반환합니다.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(map) => map.get(key),
            Self::List(items) => list_index(key).and_then(|idx| items.get(idx)),
        }
    }

    /// 뷰를 소비하여 키에 해당하는 값을 꺼냅니다.
    ///
    /// 빌린 뷰는 빌린 값을, 소유한 뷰는 값을 이동하여 반환합니다.
    pub fn take(self, key: &str) -> Option<Cow<'a, Value>> {
        match self {
            Self::Object(Cow::Borrowed(map)) => map.get(key).map(Cow::Borrowed),
            Self::Object(Cow::Owned(mut map)) => map.remove(key).map(Cow::Owned),
            Self::List(Cow::Borrowed(items)) => {
                list_index(key).and_then(|idx| items.get(idx)).map(Cow::Borrowed)
            }
            Self::List(Cow::Owned(mut items)) => {
                let idx = list_index(key).filter(|&idx| idx < items.len())?;
                Some(Cow::Owned(items.swap_remove(idx)))
            }
        }
    }

    /// 뷰의 키 개수를 반환합니다.
    pub fn len(&self) -> usize {
        match self {
            Self::Object(map) => map.len(),
            Self::List(items) => items.len(),
        }
    }

    /// 빈 뷰인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 값을 키-값 뷰로 정규화합니다. 말단 값이면 `None`을 반환합니다.
pub fn normalize(value: Cow<'_, Value>) -> Option<MappingView<'_>> {
    match value {
        Cow::Borrowed(Value::Object(map)) => Some(MappingView::Object(Cow::Borrowed(map))),
        Cow::Borrowed(Value::Array(items)) => {
            Some(MappingView::List(Cow::Borrowed(items.as_slice())))
        }
        Cow::Borrowed(Value::String(s)) => decode_string(s),
        Cow::Owned(Value::Object(map)) => Some(MappingView::Object(Cow::Owned(map))),
        Cow::Owned(Value::Array(items)) => Some(MappingView::List(Cow::Owned(items))),
        Cow::Owned(Value::String(s)) => decode_string(&s),
        _ => None,
    }
}

/// 문자열이 중첩 구조를 담고 있으면 디코딩합니다.
///
/// JSON 추정(`:`, `{`, `[` 포함 + 길이 > 2)이 맞으면 JSON 객체로 먼저 시도하고,
/// 실패하면 URL 쿼리 문자열로 시도합니다.
fn decode_string<'a>(s: &str) -> Option<MappingView<'a>> {
    if looks_like_json(s) {
        if let Ok(map) = serde_json::from_str::<Map<String, Value>>(s) {
            return Some(MappingView::Object(Cow::Owned(map)));
        }
    }
    parse_query(s).map(|map| MappingView::Object(Cow::Owned(map)))
}

fn looks_like_json(s: &str) -> bool {
    s.len() > 2 && s.contains([':', '{', '['])
}

/// URL 쿼리 문자열을 객체로 파싱합니다.
///
/// `;` 구분자와 잘못된 `%` 이스케이프는 거부합니다.
/// 같은 키의 값이 여러 개면 구분자 없이 이어 붙입니다.
fn parse_query(s: &str) -> Option<Map<String, Value>> {
    if s.contains(';') || !has_valid_escapes(s) {
        return None;
    }

    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(s).ok()?;
    let mut map = Map::with_capacity(pairs.len());
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::String(existing)) => existing.push_str(&value),
            _ => {
                map.insert(key, Value::String(value));
            }
        }
    }
    Some(map)
}

fn has_valid_escapes(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// `#_N` 키를 배열 인덱스로 해석합니다. `#_01`처럼 정규형이 아니면 거부합니다.
fn list_index(key: &str) -> Option<usize> {
    let digits = key.strip_prefix(LIST_INDEX_PREFIX)?;
    let idx = digits.parse::<usize>().ok()?;
    (idx.to_string() == digits).then_some(idx)
}
