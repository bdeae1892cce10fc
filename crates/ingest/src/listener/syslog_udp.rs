//! UDP syslog 리스너
//!
//! 각 UDP 데이터그램을 하나의 syslog 메시지로 취급합니다.

use std::net::SocketAddr;

use logbridge_core::error::LogbridgeError;
use logbridge_core::pipeline::{HealthStatus, Pipeline};
use logbridge_router::Route;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use super::{LISTENER_SYSLOG_UDP, ListenerTask, SyslogHandler};
use crate::error::IngestError;
use crate::parser::{SyslogFormat, SyslogParser};

/// UDP syslog 리스너 설정
#[derive(Debug, Clone)]
pub struct SyslogUdpConfig {
    /// 바인드 주소 (예: "0.0.0.0:514")
    pub bind_addr: String,
    /// 최대 메시지 크기 (바이트, UDP이므로 일반적으로 65535 이하)
    pub max_message_size: usize,
}

impl Default for SyslogUdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:514".to_owned(),
            max_message_size: 65535,
        }
    }
}

/// UDP syslog 리스너
pub struct SyslogUdpListener {
    config: SyslogUdpConfig,
    handler: SyslogHandler,
    task: ListenerTask,
    local_addr: Option<SocketAddr>,
}

impl SyslogUdpListener {
    /// 새 UDP 리스너를 생성합니다.
    pub fn new(config: SyslogUdpConfig, format: SyslogFormat, route: Route) -> Self {
        let parser = SyslogParser::new(format).with_max_input_size(config.max_message_size);
        Self {
            config,
            handler: SyslogHandler::new(parser, route, LISTENER_SYSLOG_UDP),
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
}

impl Pipeline for SyslogUdpListener {
    async fn start(&mut self) -> Result<(), LogbridgeError> {
        self.task.ensure_stopped()?;

        let socket = UdpSocket::bind(&self.config.bind_addr)
            .await
            .map_err(|e| IngestError::Listener {
                listener: LISTENER_SYSLOG_UDP.to_owned(),
                reason: format!("failed to bind to {}: {}", self.config.bind_addr, e),
            })?;
        let local_addr = socket.local_addr()?;
        self.local_addr = Some(local_addr);

        info!(
            listener = LISTENER_SYSLOG_UDP,
            addr = %local_addr,
            destination = self.handler.destination(),
            "syslog listener started"
        );

        let handler = self.handler.clone();
        let max_message_size = self.config.max_message_size;
        self.task.spawn(move |cancel| async move {
            let mut buf = vec![0u8; max_message_size];
            loop {
                tokio::select! {
                    result = socket.recv_from(&mut buf) => match result {
                        Ok((n, peer)) => {
                            if let Err(e) = handler.handle(&buf[..n], &peer.to_string()).await {
                                warn!(listener = LISTENER_SYSLOG_UDP, error = %e, "stopping receive loop");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(listener = LISTENER_SYSLOG_UDP, error = %e, "recv_from failed");
                        }
                    },
                    _ = cancel.cancelled() => {
                        debug!(listener = LISTENER_SYSLOG_UDP, "received shutdown signal");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogbridgeError> {
        self.task.stop(LISTENER_SYSLOG_UDP).await?;
        info!(listener = LISTENER_SYSLOG_UDP, addr = ?self.local_addr, "syslog listener stopped");
        self.local_addr = None;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        self.task.health()
    }
}
