//! syslog 파서 (RFC 3164 / RFC 5424 / RFC 6587)
//!
//! # RFC 5424 메시지 형식
//! ```text
//! <PRI>VERSION TIMESTAMP HOSTNAME APP-NAME PROCID MSGID STRUCTURED-DATA MSG
//! ```
//!
//! # RFC 3164 메시지 형식
//! ```text
//! <PRI>MMM DD HH:MM:SS HOSTNAME TAG[PID]: CONTENT
//! ```
//!
//! RFC 6587은 RFC 5424 메시지를 octet-counting으로 프레이밍한 것이므로
//! 길이 접두사를 제거한 뒤 RFC 5424 규칙으로 파싱합니다.
//!
//! # 사용 예시
//! ```
//! use logbridge_ingest::parser::{SyslogFormat, SyslogParser};
//!
//! let parser = SyslogParser::new(SyslogFormat::Rfc5424);
//! let record = parser
//!     .parse(b"<34>1 2024-01-15T12:00:00Z myhost sshd 1234 - - Failed password")
//!     .unwrap();
//! assert_eq!(record["hostname"], "myhost");
//! assert_eq!(record["app_name"], "sshd");
//! ```

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::{SyslogFormat, strip_octet_count};
use crate::error::IngestError;

/// 유효한 최대 PRI 값
/// facility 최댓값 23 * 8 + severity 최댓값 7 = 191
const MAX_SYSLOG_PRI: u8 = 191;

/// 기본 최대 입력 크기 (64KB)
pub const DEFAULT_MAX_INPUT_SIZE: usize = 64 * 1024;

/// 파싱 실패 레코드에 사유를 담는 필드명
pub const PARSE_ERROR_FIELD: &str = "parse_error";

/// syslog 파서
///
/// 형식별로 정해진 필드명을 가진 JSON 객체를 생성합니다.
/// 호출마다 새 맵을 만들므로 이전 메시지의 필드가 남지 않습니다.
#[derive(Debug, Clone)]
pub struct SyslogParser {
    format: SyslogFormat,
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl SyslogParser {
    /// 지정한 형식의 파서를 생성합니다.
    pub fn new(format: SyslogFormat) -> Self {
        Self {
            format,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
        }
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// 파서 형식을 반환합니다.
    pub fn format(&self) -> SyslogFormat {
        self.format
    }

    /// 원시 메시지를 필드 맵으로 파싱합니다.
    pub fn parse(&self, raw: &[u8]) -> Result<Map<String, Value>, IngestError> {
        if raw.len() > self.max_input_size {
            return Err(self.error(
                0,
                format!(
                    "input too large: {} bytes (max: {})",
                    raw.len(),
                    self.max_input_size
                ),
            ));
        }

        let raw = match self.format {
            SyslogFormat::Rfc6587 => strip_octet_count(raw),
            SyslogFormat::Rfc3164 | SyslogFormat::Rfc5424 => raw,
        };

        let input = String::from_utf8_lossy(raw);
        let input = input
            .trim_end_matches(['\r', '\n', '\0'])
            .trim_start();

        if input.is_empty() {
            return Err(self.error(0, "empty input"));
        }

        let (pri, remainder) = self.parse_pri(input)?;
        let (facility, severity) = decode_pri(pri);

        let mut record = Map::new();
        record.insert("priority".to_owned(), Value::from(pri));
        record.insert("facility".to_owned(), Value::from(facility));
        record.insert("severity".to_owned(), Value::from(severity));

        match self.format {
            SyslogFormat::Rfc3164 => parse_rfc3164_body(remainder, &mut record),
            SyslogFormat::Rfc5424 | SyslogFormat::Rfc6587 => {
                self.parse_rfc5424_body(remainder, &mut record)?
            }
        }

        Ok(record)
    }

    /// 파싱에 실패한 메시지를 위한 대체 레코드를 만듭니다.
    ///
    /// 원문은 형식의 메시지 필드(`content` 또는 `message`)에 담기고
    /// 실패 사유는 `parse_error`에 기록됩니다.
    pub fn fallback_record(&self, raw: &[u8], err: &IngestError) -> Map<String, Value> {
        let text = String::from_utf8_lossy(raw);
        let mut record = Map::new();
        record.insert(
            self.format.message_field().to_owned(),
            Value::String(text.trim_end_matches(['\r', '\n', '\0']).to_owned()),
        );
        record.insert(PARSE_ERROR_FIELD.to_owned(), Value::String(err.to_string()));
        record
    }

    /// `<NNN>` PRI 필드를 파싱하고 나머지 문자열을 반환합니다.
    fn parse_pri<'a>(&self, input: &'a str) -> Result<(u8, &'a str), IngestError> {
        let Some(rest) = input.strip_prefix('<') else {
            return Err(self.error(0, "missing PRI field (expected '<')"));
        };

        let pri_end = rest
            .char_indices()
            .take(4)
            .find(|(_, ch)| *ch == '>')
            .map(|(idx, _)| idx)
            .ok_or_else(|| self.error(0, "unterminated PRI field"))?;

        let pri_str = &rest[..pri_end];
        if pri_str.is_empty() || !pri_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.error(1, format!("invalid PRI value: '{pri_str}'")));
        }

        let pri: u8 = pri_str
            .parse()
            .map_err(|_| self.error(1, format!("invalid PRI value: '{pri_str}'")))?;

        if pri > MAX_SYSLOG_PRI {
            return Err(self.error(
                1,
                format!("PRI value {pri} out of valid range (0-{MAX_SYSLOG_PRI})"),
            ));
        }

        Ok((pri, &rest[pri_end + 1..]))
    }

    /// RFC 5424 VERSION 이후 본문을 파싱합니다.
    ///
    /// 형식: `VERSION TIMESTAMP HOSTNAME APP-NAME PROCID MSGID STRUCTURED-DATA MSG`
    fn parse_rfc5424_body(
        &self,
        remainder: &str,
        record: &mut Map<String, Value>,
    ) -> Result<(), IngestError> {
        let (version_str, body) = remainder
            .split_once(' ')
            .ok_or_else(|| self.error(0, "missing VERSION field"))?;

        let version: u16 = match version_str.parse() {
            Ok(v) if v > 0 && version_str.len() <= 3 => v,
            _ => return Err(self.error(0, format!("invalid VERSION: '{version_str}'"))),
        };

        // TIMESTAMP HOSTNAME APP-NAME PROCID MSGID 다음은 SD + MSG
        let parts: Vec<&str> = body.splitn(6, ' ').collect();
        if parts.len() < 5 {
            return Err(self.error(
                0,
                format!(
                    "RFC 5424 requires at least 5 header fields after version, got {}",
                    parts.len()
                ),
            ));
        }

        let timestamp = match nilvalue_to_empty(parts[0]) {
            "" => Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ts => self.parse_rfc3339(ts)?,
        };

        let (structured_data, message) = match parts.get(5).copied().unwrap_or("") {
            sd_and_msg if sd_and_msg.starts_with('[') => split_sd_and_message(sd_and_msg),
            "-" => ("", ""),
            sd_and_msg => match sd_and_msg.strip_prefix("- ") {
                Some(msg) => ("", msg),
                None => ("", sd_and_msg),
            },
        };
        let message = message.strip_prefix('\u{feff}').unwrap_or(message);

        record.insert("version".to_owned(), Value::from(version));
        record.insert("timestamp".to_owned(), Value::String(timestamp));
        record.insert("hostname".to_owned(), nil_field(parts[1]));
        record.insert("app_name".to_owned(), nil_field(parts[2]));
        record.insert("proc_id".to_owned(), nil_field(parts[3]));
        record.insert("msg_id".to_owned(), nil_field(parts[4]));
        record.insert(
            "structured_data".to_owned(),
            Value::String(structured_data.to_owned()),
        );
        record.insert("message".to_owned(), Value::String(message.to_owned()));
        Ok(())
    }

    /// RFC 3339 타임스탬프를 검증하고 원래 오프셋을 유지한 문자열로 반환합니다.
    ///
    /// 예: `2024-01-15T12:00:00Z` 또는 `2024-01-15T12:00:00.123+09:00`
    fn parse_rfc3339(&self, timestamp: &str) -> Result<String, IngestError> {
        let dt = DateTime::parse_from_rfc3339(timestamp).map_err(|e| {
            self.error(0, format!("invalid RFC 3339 timestamp '{timestamp}': {e}"))
        })?;
        Ok(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    fn error(&self, offset: usize, reason: impl Into<String>) -> IngestError {
        IngestError::Parse {
            format: self.format.as_str().to_owned(),
            offset,
            reason: reason.into(),
        }
    }
}

/// PRI 값에서 facility와 severity를 분리합니다.
///
/// PRI = facility * 8 + severity
fn decode_pri(pri: u8) -> (u8, u8) {
    (pri / 8, pri % 8)
}

/// RFC 3164 (BSD syslog) 본문을 최선 노력으로 파싱합니다.
///
/// 타임스탬프가 없거나 읽을 수 없으면 수신 시각을 사용합니다.
fn parse_rfc3164_body(body: &str, record: &mut Map<String, Value>) {
    let (timestamp, rest) = match body.get(..15).and_then(parse_bsd_timestamp) {
        Some(ts) => (ts, body[15..].trim_start()),
        None => match body.split_once(' ') {
            Some((token, rest)) => match DateTime::parse_from_rfc3339(token) {
                Ok(dt) => (dt.to_rfc3339_opts(SecondsFormat::AutoSi, true), rest),
                Err(_) => (Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true), body),
            },
            None => (Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true), body),
        },
    };

    let (hostname, tag_and_content) = match rest.split_once(' ') {
        Some((hostname, remainder)) => (hostname, remainder),
        None => ("", rest),
    };
    let (tag, content) = split_tag(tag_and_content);

    record.insert("timestamp".to_owned(), Value::String(timestamp));
    record.insert("hostname".to_owned(), Value::String(hostname.to_owned()));
    record.insert("tag".to_owned(), Value::String(tag.to_owned()));
    record.insert("content".to_owned(), Value::String(content.to_owned()));
}

/// BSD syslog 타임스탬프를 파싱합니다.
///
/// 형식: `MMM DD HH:MM:SS` (예: `Jan 15 12:00:00`, `Jan  5 12:00:00`)
/// 연도 정보가 없으므로 현재 연도를 가정합니다.
fn parse_bsd_timestamp(timestamp: &str) -> Option<String> {
    let current_year = Utc::now().year();
    let timestamp_with_year = format!("{current_year} {timestamp}");

    let dt = NaiveDateTime::parse_from_str(&timestamp_with_year, "%Y %b %e %H:%M:%S").ok()?;
    Some(
        DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
    )
}

/// `TAG[PID]: CONTENT`에서 태그와 내용을 분리합니다.
///
/// 태그는 영숫자 토큰 바로 뒤에 `:` 또는 `[`가 올 때만 인정합니다.
/// `[PID]`는 태그에 포함되지 않습니다.
fn split_tag(input: &str) -> (&str, &str) {
    let end = input
        .find([':', '[', ' '])
        .unwrap_or(input.len());
    let tag = &input[..end];
    if tag.is_empty() || tag.len() > 32 {
        return ("", input);
    }

    let after = &input[end..];
    if let Some(content) = after.strip_prefix(':') {
        return (tag, content.trim_start());
    }

    if after.starts_with('[') {
        if let Some(close) = after.find(']') {
            let content = &after[close + 1..];
            let content = content.strip_prefix(':').unwrap_or(content);
            return (tag, content.trim_start());
        }
    }

    ("", input)
}

/// NILVALUE (`-`)를 빈 문자열로 변환합니다.
fn nilvalue_to_empty(value: &str) -> &str {
    if value == "-" { "" } else { value }
}

fn nil_field(value: &str) -> Value {
    Value::String(nilvalue_to_empty(value).to_owned())
}

/// Structured Data 부분과 메시지 부분을 분리합니다.
///
/// SD는 연속된 하나 이상의 `[...]` 블록이며, 그 뒤 공백 하나 다음이 메시지입니다.
/// 닫히지 않은 SD는 전체를 SD로 간주합니다.
fn split_sd_and_message(input: &str) -> (&str, &str) {
    let mut depth = 0u32;
    let mut in_quote = false;
    let mut escaped = false;

    for (idx, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        match ch {
            '\\' if in_quote => escaped = true,
            '"' if depth > 0 => in_quote = !in_quote,
            '[' if !in_quote => depth += 1,
            ']' if !in_quote && depth > 0 => {
                depth -= 1;
                let next = &input[idx + 1..];
                if depth == 0 && !next.starts_with('[') {
                    let message = next.strip_prefix(' ').unwrap_or(next);
                    return (&input[..idx + 1], message);
                }
            }
            _ => {}
        }
    }

    (input, "")
}
