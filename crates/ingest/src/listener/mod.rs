//! 인바운드 리스너 모듈
//!
//! # 리스너 종류
//! - [`SyslogUdpListener`]: UDP syslog 수신 (데이터그램 1개 = 메시지 1개)
//! - [`SyslogTcpListener`]: TCP syslog 수신 (newline / octet-counting 프레이밍)
//! - [`SyslogUnixListener`]: unix datagram 소켓 수신 (unix 전용)
//! - [`WebhookListener`]: HTTP(S) POST 수신
//!
//! # 아키텍처
//! 각 리스너는 [`Pipeline`]을 구현하며, `start`에서 소켓을 바인드한 뒤
//! 백그라운드 tokio 태스크에서 수신 루프를 실행합니다. 수신한 메시지는
//! [`Route`]를 통해 설정된 목적지 큐에 적재되며, 큐가 가득 차면 적재가
//! 끝날 때까지 수신 루프가 대기합니다.

pub mod framing;
pub mod syslog_tcp;
pub mod syslog_udp;
#[cfg(unix)]
pub mod syslog_unix;
pub mod tls;
pub mod webhook;

pub use syslog_tcp::{SyslogTcpConfig, SyslogTcpListener};
pub use syslog_udp::{SyslogUdpConfig, SyslogUdpListener};
#[cfg(unix)]
pub use syslog_unix::SyslogUnixListener;
pub use webhook::WebhookListener;

use std::future::Future;

use bytes::Bytes;
use logbridge_core::config::SyslogConfig;
use logbridge_core::error::{LogbridgeError, PipelineError};
use logbridge_core::metrics as m;
use logbridge_core::pipeline::{HealthStatus, Pipeline};
use logbridge_router::Route;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::IngestError;
use crate::parser::{SyslogFormat, SyslogParser};

/// 리스너 레이블: UDP syslog
pub const LISTENER_SYSLOG_UDP: &str = "syslog_udp";
/// 리스너 레이블: TCP syslog
pub const LISTENER_SYSLOG_TCP: &str = "syslog_tcp";
/// 리스너 레이블: unix datagram syslog
pub const LISTENER_SYSLOG_UNIX: &str = "syslog_unixgram";
/// 리스너 레이블: HTTP webhook
pub const LISTENER_WEBHOOK: &str = "webhook";

/// 파싱된 syslog 레코드를 목적지 큐로 보내는 공통 처리기
///
/// 메시지마다 새 필드 맵을 만들고 `client`, `tls_peer`를 덧붙여
/// JSON으로 직렬화한 뒤 큐에 적재합니다.
#[derive(Debug, Clone)]
pub struct SyslogHandler {
    parser: SyslogParser,
    route: Route,
    listener: &'static str,
}

impl SyslogHandler {
    /// 새 처리기를 생성합니다.
    pub fn new(parser: SyslogParser, route: Route, listener: &'static str) -> Self {
        Self {
            parser,
            route,
            listener,
        }
    }

    /// 원시 메시지를 JSON 레코드 바이트로 변환합니다.
    ///
    /// 파싱에 실패해도 대체 레코드를 만들어 반환합니다.
    pub fn encode(&self, raw: &[u8], client: &str) -> Result<Bytes, IngestError> {
        let mut record = match self.parser.parse(raw) {
            Ok(record) => record,
            Err(e) => {
                let format = self.parser.format().as_str();
                warn!(
                    listener = self.listener,
                    format,
                    client,
                    error = %e,
                    "failed to parse syslog message, forwarding raw text"
                );
                metrics::counter!(m::SYSLOG_PARSE_ERRORS_TOTAL, m::LABEL_FORMAT => format)
                    .increment(1);
                self.parser.fallback_record(raw, &e)
            }
        };

        record.insert("client".to_owned(), Value::String(client.to_owned()));
        record.insert("tls_peer".to_owned(), Value::String(String::new()));

        Ok(Bytes::from(serde_json::to_vec(&record)?))
    }

    /// 원시 메시지를 변환하여 목적지 큐에 적재합니다.
    ///
    /// 큐가 가득 차 있으면 빈 슬롯이 생길 때까지 대기합니다.
    pub async fn handle(&self, raw: &[u8], client: &str) -> Result<(), IngestError> {
        metrics::counter!(m::LISTENER_MESSAGES_RECEIVED_TOTAL, m::LABEL_LISTENER => self.listener)
            .increment(1);
        let payload = self.encode(raw, client)?;
        self.route.enqueue(payload).await?;
        Ok(())
    }

    /// 메시지가 적재되는 목적지 id
    pub fn destination(&self) -> &str {
        self.route.destination()
    }

    /// 리스너 레이블
    pub fn listener(&self) -> &'static str {
        self.listener
    }
}

/// 백그라운드 수신 태스크와 취소 토큰 묶음
///
/// 리스너마다 반복되는 시작/정지/상태 확인 로직을 모읍니다.
#[derive(Debug, Default)]
pub(crate) struct ListenerTask {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ListenerTask {
    /// 실행 중이면 에러를 반환합니다.
    pub(crate) fn ensure_stopped(&self) -> Result<(), LogbridgeError> {
        if self.task.is_some() {
            return Err(PipelineError::AlreadyRunning.into());
        }
        Ok(())
    }

    /// 새 취소 토큰으로 수신 루프를 띄웁니다.
    pub(crate) fn spawn<F, Fut>(&mut self, run: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel = CancellationToken::new();
        self.task = Some(tokio::spawn(run(self.cancel.clone())));
    }

    /// 수신 루프를 취소하고 종료될 때까지 기다립니다.
    pub(crate) async fn stop(&mut self, listener: &str) -> Result<(), LogbridgeError> {
        let task = self.task.take().ok_or(PipelineError::NotRunning)?;
        self.cancel.cancel();
        task.await.map_err(|e| {
            LogbridgeError::from(IngestError::Listener {
                listener: listener.to_owned(),
                reason: format!("receive task failed: {e}"),
            })
        })
    }

    /// 태스크 상태로 건강 상태를 판단합니다.
    pub(crate) fn health(&self) -> HealthStatus {
        match &self.task {
            None => HealthStatus::Unhealthy("not running".to_owned()),
            Some(task) if task.is_finished() => {
                HealthStatus::Unhealthy("receive loop exited".to_owned())
            }
            Some(_) => HealthStatus::Healthy,
        }
    }
}

/// 설정 프로토콜에 따라 선택되는 syslog 리스너
pub enum SyslogListener {
    /// UDP
    Udp(SyslogUdpListener),
    /// TCP
    Tcp(SyslogTcpListener),
    /// unix datagram
    #[cfg(unix)]
    Unix(SyslogUnixListener),
}

impl SyslogListener {
    /// syslog 설정 항목으로 리스너를 만듭니다.
    ///
    /// `format`과 `protocol`은 설정 검증을 통과한 값이어야 하며,
    /// 그렇지 않으면 `UnsupportedFormat` / `UnsupportedProtocol`을 반환합니다.
    pub fn from_config(config: &SyslogConfig, route: Route) -> Result<Self, IngestError> {
        let format: SyslogFormat = config.format.parse()?;

        match config.protocol.as_str() {
            "udp" => Ok(Self::Udp(SyslogUdpListener::new(
                SyslogUdpConfig {
                    bind_addr: config.listen.clone(),
                    ..Default::default()
                },
                format,
                route,
            ))),
            "tcp" => Ok(Self::Tcp(SyslogTcpListener::new(
                SyslogTcpConfig {
                    bind_addr: config.listen.clone(),
                    ..Default::default()
                },
                format,
                route,
            ))),
            #[cfg(unix)]
            "unixgram" => Ok(Self::Unix(SyslogUnixListener::new(
                config.listen.clone(),
                format,
                route,
            ))),
            other => Err(IngestError::UnsupportedProtocol(other.to_owned())),
        }
    }

    /// 리스너 레이블 (`syslog_udp`, `syslog_tcp`, `syslog_unixgram`)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Udp(_) => LISTENER_SYSLOG_UDP,
            Self::Tcp(_) => LISTENER_SYSLOG_TCP,
            #[cfg(unix)]
            Self::Unix(_) => LISTENER_SYSLOG_UNIX,
        }
    }
}

impl Pipeline for SyslogListener {
    async fn start(&mut self) -> Result<(), LogbridgeError> {
        match self {
            Self::Udp(l) => l.start().await,
            Self::Tcp(l) => l.start().await,
            #[cfg(unix)]
            Self::Unix(l) => l.start().await,
        }
    }

    async fn stop(&mut self) -> Result<(), LogbridgeError> {
        match self {
            Self::Udp(l) => l.stop().await,
            Self::Tcp(l) => l.stop().await,
            #[cfg(unix)]
            Self::Unix(l) => l.stop().await,
        }
    }

    async fn health_check(&self) -> HealthStatus {
        match self {
            Self::Udp(l) => l.health_check().await,
            Self::Tcp(l) => l.health_check().await,
            #[cfg(unix)]
            Self::Unix(l) => l.health_check().await,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::destination;
    use super::*;

    #[tokio::test]
    async fn handler_adds_client_and_tls_peer() {
        let (dest, mut rx) = destination();
        let handler = SyslogHandler::new(
            SyslogParser::new(SyslogFormat::Rfc5424),
            dest.route(),
            LISTENER_SYSLOG_UDP,
        );

        handler
            .handle(
                b"<34>1 2024-01-15T12:00:00Z host app - - - hi",
                "10.0.0.1:5140",
            )
            .await
            .unwrap();

        let payload = rx.recv().await.unwrap();
        let record: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(record["client"], "10.0.0.1:5140");
        assert_eq!(record["tls_peer"], "");
        assert_eq!(record["message"], "hi");
    }

    #[tokio::test]
    async fn handler_encodes_fallback_for_unparsable_input() {
        let (dest, _rx) = destination();
        let handler = SyslogHandler::new(
            SyslogParser::new(SyslogFormat::Rfc3164),
            dest.route(),
            LISTENER_SYSLOG_TCP,
        );

        let bytes = handler.encode(b"not syslog at all", "peer").unwrap();
        let record: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(record["content"], "not syslog at all");
        assert!(record["parse_error"].is_string());
        assert_eq!(record["client"], "peer");
    }

    #[tokio::test]
    async fn records_do_not_share_fields() {
        let (dest, _rx) = destination();
        let handler = SyslogHandler::new(
            SyslogParser::new(SyslogFormat::Rfc5424),
            dest.route(),
            LISTENER_SYSLOG_UDP,
        );

        let first = handler
            .encode(b"<34>1 2024-01-15T12:00:00Z h a - - [x a=\"1\"] m", "p")
            .unwrap();
        let second = handler.encode(b"garbage", "p").unwrap();

        let first: serde_json::Value = serde_json::from_slice(&first).unwrap();
        let second: serde_json::Value = serde_json::from_slice(&second).unwrap();
        assert_eq!(first["structured_data"], "[x a=\"1\"]");
        assert!(second.get("structured_data").is_none());
        assert!(second.get("hostname").is_none());
    }

    #[tokio::test]
    async fn from_config_selects_protocol() {
        let (dest, _rx) = destination();
        let mut config = SyslogConfig {
            listen: "127.0.0.1:0".to_owned(),
            format: "RFC3164".to_owned(),
            protocol: "udp".to_owned(),
            kafka_id: "test".to_owned(),
        };
        let listener = SyslogListener::from_config(&config, dest.route()).unwrap();
        assert_eq!(listener.kind(), LISTENER_SYSLOG_UDP);

        config.protocol = "tcp".to_owned();
        let listener = SyslogListener::from_config(&config, dest.route()).unwrap();
        assert_eq!(listener.kind(), LISTENER_SYSLOG_TCP);

        config.protocol = "sctp".to_owned();
        assert!(matches!(
            SyslogListener::from_config(&config, dest.route()),
            Err(IngestError::UnsupportedProtocol(_))
        ));

        config.protocol = "udp".to_owned();
        config.format = "RFC9999".to_owned();
        assert!(matches!(
            SyslogListener::from_config(&config, dest.route()),
            Err(IngestError::UnsupportedFormat(_))
        ));
    }
}
