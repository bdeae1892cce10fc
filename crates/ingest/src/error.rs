//! 인제스트 에러 타입
//!
//! [`IngestError`]는 파싱, 리스너 바인드, TLS 설정, 라우팅 등 인바운드 경로에서
//! 발생하는 에러를 표현합니다. `From<IngestError> for LogbridgeError` 변환이
//! 구현되어 있어 데몬에서 `?`로 전파할 수 있습니다.

use logbridge_core::error::{ConfigError, LogbridgeError, PipelineError};
use logbridge_router::RouterError;

/// 인바운드 경로 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// syslog 파싱 실패
    #[error("parse error: {format} at offset {offset}: {reason}")]
    Parse {
        /// syslog 형식 (RFC3164, RFC5424, RFC6587)
        format: String,
        /// 실패 위치 (바이트 오프셋)
        offset: usize,
        /// 실패 사유
        reason: String,
    },

    /// 지원하지 않는 syslog 형식
    #[error("unsupported syslog format: {0}")]
    UnsupportedFormat(String),

    /// 지원하지 않는 전송 프로토콜
    #[error("unsupported syslog protocol: {0}")]
    UnsupportedProtocol(String),

    /// 리스너 에러 (바인드 실패 등)
    #[error("listener error: {listener}: {reason}")]
    Listener {
        /// 리스너 종류 (syslog_udp, syslog_tcp, syslog_unixgram, webhook)
        listener: String,
        /// 에러 사유
        reason: String,
    },

    /// TLS 설정 에러 (인증서/키 로딩 실패)
    #[error("tls error: {0}")]
    Tls(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 라우팅 에러
    #[error("route error: {0}")]
    Route(#[from] RouterError),

    /// 레코드 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestError> for LogbridgeError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Config { field, reason } => {
                LogbridgeError::Config(ConfigError::InvalidValue { field, reason })
            }
            IngestError::Io(e) => LogbridgeError::Io(e),
            IngestError::Route(e) => e.into(),
            other => LogbridgeError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = IngestError::Parse {
            format: "RFC5424".to_owned(),
            offset: 4,
            reason: "missing version".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("RFC5424"));
        assert!(msg.contains("4"));
        assert!(msg.contains("missing version"));
    }

    #[test]
    fn listener_error_converts_to_init_failed() {
        let err = IngestError::Listener {
            listener: "syslog_udp".to_owned(),
            reason: "address in use".to_owned(),
        };
        let top: LogbridgeError = err.into();
        assert!(matches!(
            top,
            LogbridgeError::Pipeline(PipelineError::InitFailed(ref msg)) if msg.contains("syslog_udp")
        ));
    }

    #[test]
    fn config_error_keeps_field() {
        let err = IngestError::Config {
            field: "webhook[0].tls.cert_file".to_owned(),
            reason: "required for https".to_owned(),
        };
        let top: LogbridgeError = err.into();
        assert!(matches!(top, LogbridgeError::Config(_)));
        assert!(top.to_string().contains("webhook[0].tls.cert_file"));
    }

    #[test]
    fn closed_queue_maps_to_channel_send() {
        let err = IngestError::Route(RouterError::QueueClosed("k1".to_owned()));
        let top: LogbridgeError = err.into();
        assert!(matches!(
            top,
            LogbridgeError::Pipeline(PipelineError::ChannelSend(_))
        ));
    }
}
