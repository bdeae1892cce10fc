//! 라우터 에러 타입
//!
//! [`RouterError`]는 라우팅 테이블 구성, 큐 적재, 싱크 전송에서 발생하는 에러를 표현합니다.
//! 키 경로 탐색 실패는 에러가 아니라 "키 없음"으로 처리되므로 여기에 없습니다.

use logbridge_core::error::{LogbridgeError, PipelineError};

/// 라우터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// 라우팅 테이블에 없는 목적지
    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    /// 같은 id의 목적지를 두 번 등록
    #[error("duplicate destination: {0}")]
    DuplicateDestination(String),

    /// 큐가 닫힘 (종료 중)
    #[error("queue closed for destination: {0}")]
    QueueClosed(String),

    /// 싱크 전송 실패
    #[error("sink error: {destination}: {reason}")]
    Sink {
        /// 목적지 id
        destination: String,
        /// 실패 사유
        reason: String,
    },

    /// Kafka 클라이언트 에러
    #[error("kafka error: {0}")]
    Kafka(#[from] rskafka::client::error::Error),

    /// 워커 태스크 join 실패
    #[error("worker error: {destination}: {reason}")]
    Worker {
        /// 목적지 id
        destination: String,
        /// 실패 사유
        reason: String,
    },
}

impl From<RouterError> for LogbridgeError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::QueueClosed(_) => {
                LogbridgeError::Pipeline(PipelineError::ChannelSend(err.to_string()))
            }
            other => LogbridgeError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_error_display() {
        let err = RouterError::Sink {
            destination: "k1".to_owned(),
            reason: "broker unavailable".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("k1"));
        assert!(msg.contains("broker unavailable"));
    }

    #[test]
    fn queue_closed_converts_to_channel_send() {
        let err: LogbridgeError = RouterError::QueueClosed("k1".to_owned()).into();
        assert!(matches!(
            err,
            LogbridgeError::Pipeline(PipelineError::ChannelSend(_))
        ));
    }

    #[test]
    fn duplicate_destination_converts_to_init_failed() {
        let err: LogbridgeError = RouterError::DuplicateDestination("k1".to_owned()).into();
        assert!(matches!(
            err,
            LogbridgeError::Pipeline(PipelineError::InitFailed(_))
        ));
        assert!(err.to_string().contains("duplicate destination: k1"));
    }
}
