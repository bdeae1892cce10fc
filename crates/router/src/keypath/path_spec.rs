//! 키 경로 컴파일러
//!
//! `.`은 세그먼트 구분자, `\.`은 세그먼트 안의 리터럴 점입니다.
//! 어떤 문자열이든 문법적으로 유효하므로 에러가 없습니다.

use std::fmt;

/// 컴파일된 키 경로 (세그먼트의 순서 있는 목록)
///
/// 목적지 설정 시 한 번 컴파일되며 이후 메시지마다 다시 파싱하지 않습니다.
/// 빈 경로는 "키 추출 없음"을 뜻합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathSpec {
    segments: Vec<String>,
}

impl PathSpec {
    /// 키 경로 문자열을 세그먼트 목록으로 컴파일합니다.
    ///
    /// - `\.`은 현재 세그먼트에 `.`을 추가합니다.
    /// - 이스케이프되지 않은 `.`은 현재 세그먼트를 닫습니다 (빈 세그먼트 포함).
    /// - 스캔 후 남은 버퍼는 비어 있지 않을 때만 마지막 세그먼트가 됩니다.
    ///
    /// ```
    /// use logbridge_router::keypath::PathSpec;
    ///
    /// assert_eq!(PathSpec::compile(r"a\.b.c").segments(), ["a.b", "c"]);
    /// assert!(PathSpec::compile("").is_empty());
    /// ```
    pub fn compile(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'.') => {
                    current.push('.');
                    chars.next();
                }
                '.' => segments.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }

        if !current.is_empty() {
            segments.push(current);
        }

        Self { segments }
    }

    /// 세그먼트 목록을 반환합니다.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// 키 추출이 설정되지 않은 빈 경로인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 세그먼트 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl From<&str> for PathSpec {
    fn from(raw: &str) -> Self {
        Self::compile(raw)
    }
}

/// 세그먼트 안의 `.`을 다시 `\.`으로 이스케이프하여 출력합니다.
impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.replace('.', r"\."))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn escaped_dot_stays_in_segment() {
        assert_eq!(PathSpec::compile(r"a\.b.c").segments(), ["a.b", "c"]);
    }

    #[test]
    fn empty_input_compiles_to_empty_path() {
        let path = PathSpec::compile("");
        assert!(path.is_empty());
        assert_eq!(path.len(), 0);
    }

    #[test]
    fn consecutive_dots_yield_empty_segment() {
        assert_eq!(PathSpec::compile("a..b").segments(), ["a", "", "b"]);
    }

    #[test]
    fn leading_dot_yields_empty_first_segment() {
        assert_eq!(PathSpec::compile(".a").segments(), ["", "a"]);
    }

    #[test]
    fn trailing_dot_drops_empty_tail() {
        assert_eq!(PathSpec::compile("a.").segments(), ["a"]);
        assert_eq!(PathSpec::compile(".").segments(), [""]);
    }

    #[test]
    fn lone_backslash_is_literal() {
        assert_eq!(PathSpec::compile(r"a\b.c\").segments(), [r"a\b", r"c\"]);
    }

    #[test]
    fn single_segment() {
        assert_eq!(PathSpec::compile("hostname").segments(), ["hostname"]);
    }

    #[test]
    fn multibyte_segments_are_preserved() {
        assert_eq!(PathSpec::compile("사용자.아이디").segments(), ["사용자", "아이디"]);
    }

    #[test]
    fn display_re_escapes_dots() {
        let path = PathSpec::compile(r"body.user\.id");
        assert_eq!(path.to_string(), r"body.user\.id");
    }

    proptest! {
        #[test]
        fn compile_inverts_escaped_join(segments in prop::collection::vec("[a-z0-9_.#-]{1,8}", 1..6)) {
            let raw = segments
                .iter()
                .map(|s| s.replace('.', r"\."))
                .collect::<Vec<_>>()
                .join(".");
            let path = PathSpec::compile(&raw);
            prop_assert_eq!(path.segments(), segments.as_slice());
        }

        #[test]
        fn compile_never_panics(raw in ".*") {
            let path = PathSpec::compile(&raw);
            prop_assert!(path.len() <= raw.len() + 1);
        }
    }
}
