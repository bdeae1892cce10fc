//! syslog 파서 모듈
//!
//! 설정된 형식(RFC3164, RFC5424, RFC6587)에 따라 원시 syslog 메시지를
//! 평탄한 필드 집합(`serde_json::Map`)으로 변환합니다.

pub mod syslog;

pub use syslog::SyslogParser;

use std::fmt;
use std::str::FromStr;

use crate::error::IngestError;

/// syslog 메시지 형식
///
/// 설정 값 `""`는 RFC5424로 취급합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyslogFormat {
    /// BSD syslog
    Rfc3164,
    /// IETF syslog
    #[default]
    Rfc5424,
    /// RFC5424 메시지 + octet-counting 전송 프레이밍
    Rfc6587,
}

impl SyslogFormat {
    /// 설정 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rfc3164 => "RFC3164",
            Self::Rfc5424 => "RFC5424",
            Self::Rfc6587 => "RFC6587",
        }
    }

    /// 메시지 본문이 저장되는 필드명 (`content` 또는 `message`)
    pub fn message_field(&self) -> &'static str {
        match self {
            Self::Rfc3164 => "content",
            Self::Rfc5424 | Self::Rfc6587 => "message",
        }
    }

    /// TCP에서 octet-counting 프레이밍을 사용하는지 여부
    pub fn uses_octet_counting(&self) -> bool {
        matches!(self, Self::Rfc6587)
    }
}

impl FromStr for SyslogFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "RFC5424" => Ok(Self::Rfc5424),
            "RFC3164" => Ok(Self::Rfc3164),
            "RFC6587" => Ok(Self::Rfc6587),
            other => Err(IngestError::UnsupportedFormat(other.to_owned())),
        }
    }
}

impl fmt::Display for SyslogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 데이터그램 앞의 octet count 접두사(`LEN SP`)를 제거합니다.
///
/// 접두사가 없거나 형식이 맞지 않으면 입력을 그대로 반환합니다.
/// 선언된 길이가 남은 바이트보다 짧으면 선언된 길이만큼만 취합니다.
pub fn strip_octet_count(raw: &[u8]) -> &[u8] {
    let digits = raw.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 || digits > 10 || raw.get(digits) != Some(&b' ') {
        return raw;
    }

    let Some(len) = std::str::from_utf8(&raw[..digits])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    else {
        return raw;
    };

    let rest = &raw[digits + 1..];
    &rest[..len.min(rest.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_format_means_rfc5424() {
        assert_eq!("".parse::<SyslogFormat>().unwrap(), SyslogFormat::Rfc5424);
        assert_eq!(
            "RFC3164".parse::<SyslogFormat>().unwrap(),
            SyslogFormat::Rfc3164
        );
        assert_eq!(
            "RFC6587".parse::<SyslogFormat>().unwrap(),
            SyslogFormat::Rfc6587
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = "rfc5424".parse::<SyslogFormat>().unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(ref f) if f == "rfc5424"));
    }

    #[test]
    fn message_field_per_format() {
        assert_eq!(SyslogFormat::Rfc3164.message_field(), "content");
        assert_eq!(SyslogFormat::Rfc5424.message_field(), "message");
        assert_eq!(SyslogFormat::Rfc6587.message_field(), "message");
    }

    #[test]
    fn strip_octet_count_removes_prefix() {
        assert_eq!(strip_octet_count(b"5 <1>1 "), b"<1>1 ");
        assert_eq!(strip_octet_count(b"3 abcdef"), b"abc");
    }

    #[test]
    fn strip_octet_count_leaves_plain_messages() {
        assert_eq!(strip_octet_count(b"<34>1 x"), b"<34>1 x");
        assert_eq!(strip_octet_count(b"12abc"), b"12abc");
        assert_eq!(strip_octet_count(b""), b"");
    }

    #[test]
    fn strip_octet_count_with_short_body_takes_what_is_there() {
        assert_eq!(strip_octet_count(b"100 short"), b"short");
    }
}
