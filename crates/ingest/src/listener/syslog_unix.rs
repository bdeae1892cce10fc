//! unix datagram syslog 리스너
//!
//! `/dev/log` 같은 unix datagram 소켓에서 메시지를 받습니다.
//! 시작 시 같은 경로에 남아 있는 소켓 파일은 지우고 새로 바인드하며,
//! 정지 시 소켓 파일을 제거합니다.

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use logbridge_core::error::LogbridgeError;
use logbridge_core::pipeline::{HealthStatus, Pipeline};
use logbridge_router::Route;
use tokio::net::UnixDatagram;
use tracing::{debug, info, warn};

use super::{LISTENER_SYSLOG_UNIX, ListenerTask, SyslogHandler};
use crate::error::IngestError;
use crate::parser::{SyslogFormat, SyslogParser};

/// unix datagram 최대 메시지 크기
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// unix datagram syslog 리스너
pub struct SyslogUnixListener {
    path: PathBuf,
    handler: SyslogHandler,
    task: ListenerTask,
}

impl SyslogUnixListener {
    /// 새 unix datagram 리스너를 생성합니다.
    pub fn new(path: impl Into<PathBuf>, format: SyslogFormat, route: Route) -> Self {
        let parser = SyslogParser::new(format).with_max_input_size(MAX_MESSAGE_SIZE);
        Self {
            path: path.into(),
            handler: SyslogHandler::new(parser, route, LISTENER_SYSLOG_UNIX),
            task: ListenerTask::default(),
        }
    }

    /// 소켓 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 이전 실행이 남긴 소켓 파일을 제거합니다. 소켓이 아닌 파일은 건드리지 않습니다.
fn remove_stale_socket(path: &Path) -> Result<(), IngestError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(IngestError::Listener {
            listener: LISTENER_SYSLOG_UNIX.to_owned(),
            reason: format!("{} exists and is not a socket", path.display()),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl Pipeline for SyslogUnixListener {
    async fn start(&mut self) -> Result<(), LogbridgeError> {
        self.task.ensure_stopped()?;

        remove_stale_socket(&self.path)?;
        let socket = UnixDatagram::bind(&self.path).map_err(|e| IngestError::Listener {
            listener: LISTENER_SYSLOG_UNIX.to_owned(),
            reason: format!("failed to bind to {}: {}", self.path.display(), e),
        })?;

        info!(
            listener = LISTENER_SYSLOG_UNIX,
            path = %self.path.display(),
            destination = self.handler.destination(),
            "syslog listener started"
        );

        let handler = self.handler.clone();
        self.task.spawn(move |cancel| async move {
            let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
            loop {
                tokio::select! {
                    result = socket.recv_from(&mut buf) => match result {
                        Ok((n, peer)) => {
                            let client = peer
                                .as_pathname()
                                .map(|p| p.display().to_string())
                                .unwrap_or_default();
                            if let Err(e) = handler.handle(&buf[..n], &client).await {
                                warn!(listener = LISTENER_SYSLOG_UNIX, error = %e, "stopping receive loop");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(listener = LISTENER_SYSLOG_UNIX, error = %e, "recv_from failed");
                        }
                    },
                    _ = cancel.cancelled() => {
                        debug!(listener = LISTENER_SYSLOG_UNIX, "received shutdown signal");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogbridgeError> {
        self.task.stop(LISTENER_SYSLOG_UNIX).await?;
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove socket file");
        }
        info!(listener = LISTENER_SYSLOG_UNIX, path = %self.path.display(), "syslog listener stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        self.task.health()
    }
}
