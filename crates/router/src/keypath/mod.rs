//! 키 경로 -- 구조가 정해지지 않은 메시지 안의 필드를 주소로 가리키는 작은 언어
//!
//! - [`PathSpec`]: `body.user\.id` 같은 문자열을 세그먼트 목록으로 컴파일
//! - [`normalize`]: 탐색 도중 만난 값을 키-값 뷰([`MappingView`])로 정규화
//! - [`lookup`]: 루트 객체에서 경로를 따라 말단 값을 찾음
//! - [`to_key_string`]: 말단 값을 라우팅 키 문자열로 변환
//!
//! # 예시
//! ```
//! use logbridge_router::keypath::{PathSpec, extract_key};
//! use serde_json::json;
//!
//! let path = PathSpec::compile("body.user.id");
//! let root = json!({"body": "{\"user\":{\"id\":42}}"});
//! let root = root.as_object().unwrap();
//! assert_eq!(extract_key(root, &path).as_deref(), Some("42"));
//! ```

mod coerce;
mod extract;
mod normalize;
mod path_spec;

pub use coerce::to_key_string;
pub use extract::{extract_key, lookup};
pub use normalize::{LIST_INDEX_PREFIX, MappingView, normalize};
pub use path_spec::PathSpec;
