//! TCP syslog 리스너
//!
//! 각 TCP 연결은 별도의 tokio 태스크에서 처리됩니다.
//! RFC 6587 형식은 octet-counting, 나머지 형식은 newline 프레이밍을 사용합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use logbridge_core::error::LogbridgeError;
use logbridge_core::metrics as m;
use logbridge_core::pipeline::{HealthStatus, Pipeline};
use logbridge_router::Route;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::framing::{TcpFraming, read_frame};
use super::{LISTENER_SYSLOG_TCP, ListenerTask, SyslogHandler};
use crate::error::IngestError;
use crate::parser::{SyslogFormat, SyslogParser};

/// TCP syslog 리스너 설정
#[derive(Debug, Clone)]
pub struct SyslogTcpConfig {
    /// 바인드 주소 (예: "0.0.0.0:601")
    pub bind_addr: String,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 최대 메시지 크기 (바이트)
    pub max_message_size: usize,
    /// 유휴 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
}

impl Default for SyslogTcpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:601".to_owned(),
            max_connections: 256,
            max_message_size: 1024 * 1024, // 1MB
            connection_timeout_secs: 300,  // 5 minutes
        }
    }
}

/// TCP syslog 리스너
pub struct SyslogTcpListener {
    config: SyslogTcpConfig,
    framing: TcpFraming,
    handler: SyslogHandler,
    task: ListenerTask,
    local_addr: Option<SocketAddr>,
}

impl SyslogTcpListener {
    /// 새 TCP 리스너를 생성합니다.
    pub fn new(config: SyslogTcpConfig, format: SyslogFormat, route: Route) -> Self {
        let framing = if format.uses_octet_counting() {
            TcpFraming::OctetCounting
        } else {
            TcpFraming::NewlineDelimited
        };
        let parser = SyslogParser::new(format).with_max_input_size(config.max_message_size);
        Self {
            config,
            framing,
            handler: SyslogHandler::new(parser, route, LISTENER_SYSLOG_TCP),
            task: ListenerTask::default(),
            local_addr: None,
        }
    }

    /// 바인드 주소 설정값을 반환합니다.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// 실제 바인드된 주소 (시작 후에만 `Some`)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 사용 중인 프레이밍 방식
    pub fn framing(&self) -> TcpFraming {
        self.framing
    }
}

impl Pipeline for SyslogTcpListener {
    async fn start(&mut self) -> Result<(), LogbridgeError> {
        self.task.ensure_stopped()?;

        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| IngestError::Listener {
                listener: LISTENER_SYSLOG_TCP.to_owned(),
                reason: format!("failed to bind to {}: {}", self.config.bind_addr, e),
            })?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        info!(
            listener = LISTENER_SYSLOG_TCP,
            addr = %local_addr,
            framing = ?self.framing,
            destination = self.handler.destination(),
            "syslog listener started"
        );

        let handler = self.handler.clone();
        let config = self.config.clone();
        let framing = self.framing;
        self.task.spawn(move |cancel| accept_loop(listener, handler, config, framing, cancel));

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogbridgeError> {
        self.task.stop(LISTENER_SYSLOG_TCP).await?;
        info!(listener = LISTENER_SYSLOG_TCP, addr = ?self.local_addr, "syslog listener stopped");
        self.local_addr = None;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        self.task.health()
    }
}

/// 연결 수락 루프
///
/// 종료 시 열린 연결 태스크가 모두 끝날 때까지 기다립니다.
async fn accept_loop(
    listener: TcpListener,
    handler: SyslogHandler,
    config: SyslogTcpConfig,
    framing: TcpFraming,
    cancel: CancellationToken,
) {
    // 연결 수 제한을 위한 세마포어
    let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, addr) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(listener = LISTENER_SYSLOG_TCP, error = %e, "accept failed");
                        continue;
                    }
                };

                let Ok(permit) = connection_semaphore.clone().try_acquire_owned() else {
                    warn!(
                        listener = LISTENER_SYSLOG_TCP,
                        peer = %addr,
                        max = config.max_connections,
                        "max connections reached, rejecting connection"
                    );
                    continue;
                };

                debug!(listener = LISTENER_SYSLOG_TCP, peer = %addr, "accepted connection");
                let handler = handler.clone();
                let config = config.clone();
                let cancel = cancel.clone();
                connections.spawn(async move {
                    metrics::gauge!(m::SYSLOG_TCP_ACTIVE_CONNECTIONS).increment(1.0);
                    if let Err(e) = handle_connection(stream, addr, &handler, &config, framing, cancel).await {
                        warn!(listener = LISTENER_SYSLOG_TCP, peer = %addr, error = %e, "connection closed with error");
                    }
                    metrics::gauge!(m::SYSLOG_TCP_ACTIVE_CONNECTIONS).decrement(1.0);
                    drop(permit);
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = cancel.cancelled() => {
                debug!(listener = LISTENER_SYSLOG_TCP, "received shutdown signal");
                break;
            }
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
}

/// 단일 TCP 연결을 처리합니다.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: &SyslogHandler,
    config: &SyslogTcpConfig,
    framing: TcpFraming,
    cancel: CancellationToken,
) -> Result<(), IngestError> {
    let client = peer.to_string();
    let mut reader = BufReader::new(stream);
    let mut frame = Vec::new();
    let idle_timeout = Duration::from_secs(config.connection_timeout_secs);

    loop {
        tokio::select! {
            result = timeout(idle_timeout, read_frame(&mut reader, framing, config.max_message_size, &mut frame)) => {
                match result {
                    Ok(Ok(true)) => handler.handle(&frame, &client).await?,
                    Ok(Ok(false)) => {
                        debug!(listener = LISTENER_SYSLOG_TCP, peer = %client, "connection closed by peer");
                        return Ok(());
                    }
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => {
                        return Err(IngestError::Listener {
                            listener: LISTENER_SYSLOG_TCP.to_owned(),
                            reason: format!("idle timeout from {client}"),
                        });
                    }
                }
            }
            _ = cancel.cancelled() => {
                debug!(listener = LISTENER_SYSLOG_TCP, peer = %client, "connection received shutdown signal");
                return Ok(());
            }
        }
    }
}
