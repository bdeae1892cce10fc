//! 탐색 엔진 -- 루트 객체에서 키 경로를 따라 말단 값을 찾습니다.
//!
//! 중간 키가 없거나 `null`이거나, 경로가 끝나기 전에 말단 값을 만나면
//! 에러가 아니라 "값 없음"(`None`)입니다.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::coerce::to_key_string;
use super::normalize::{MappingView, normalize};
use super::path_spec::PathSpec;

/// 경로를 따라 말단의 원시 값을 찾습니다.
///
/// 중간 값은 세그먼트마다 [`normalize`]로 정규화하고, 마지막 세그먼트의 값은
/// 정규화하지 않고 그대로 반환합니다. 빈 경로는 `None`입니다.
pub fn lookup<'a>(root: &'a Map<String, Value>, path: &PathSpec) -> Option<Cow<'a, Value>> {
    let (last, intermediate) = path.segments().split_last()?;

    let mut view = MappingView::Object(Cow::Borrowed(root));
    for segment in intermediate {
        let next = view.take(segment).filter(|value| !value.is_null())?;
        view = normalize(next)?;
    }

    view.take(last).filter(|value| !value.is_null())
}

/// 경로를 따라 라우팅 키 문자열을 추출합니다.
///
/// 말단 값이 빈 문자열로 변환되면 키가 없는 것으로 취급합니다.
pub fn extract_key(root: &Map<String, Value>, path: &PathSpec) -> Option<String> {
    let value = lookup(root, path)?;
    let key = to_key_string(&value);
    (!key.is_empty()).then_some(key)
}
