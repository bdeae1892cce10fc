//! HTTP(S) webhook 리스너
//!
//! 설정된 경로로 들어온 `POST` 요청 본문이 유효한 JSON이면
//! 원본 바이트 그대로 목적지 큐에 적재합니다.
//!
//! | 상황 | 응답 |
//! |------|------|
//! | 적재 성공 | 200 `Message received successfully` |
//! | JSON 문법 오류 | 400 `Invalid JSON format` |
//! | POST 이외 메서드 | 405 `Method not allowed` |
//! | 본문 크기 초과 | 413 |
//! | 종료 중 (큐 닫힘) | 503 `Service unavailable` |

use std::net::SocketAddr;

use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use logbridge_core::config::WebhookConfig;
use logbridge_core::error::LogbridgeError;
use logbridge_core::metrics as m;
use logbridge_core::pipeline::{HealthStatus, Pipeline};
use logbridge_router::Route;
use serde::de::IgnoredAny;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::tls::{serve_tls, tls_acceptor};
use super::{LISTENER_WEBHOOK, ListenerTask};
use crate::error::IngestError;

/// 성공 응답 본문
pub const MSG_RECEIVED: &str = "Message received successfully";
/// JSON 문법 오류 응답 본문
pub const MSG_INVALID_JSON: &str = "Invalid JSON format";
/// 허용되지 않은 메서드 응답 본문
pub const MSG_METHOD_NOT_ALLOWED: &str = "Method not allowed";
/// 종료 중 응답 본문
pub const MSG_UNAVAILABLE: &str = "Service unavailable";

/// webhook 라우터를 만듭니다.
///
/// `path`에 대한 `POST`만 처리하며, 본문 크기는 `max_body_bytes`로 제한합니다.
/// `path`는 [`WebhookConfig::has_literal_path`]를 만족해야 합니다.
pub fn router(path: &str, route: Route, max_body_bytes: usize) -> Router {
    Router::new()
        .route(path, post(receive).fallback(method_not_allowed))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(route)
}

async fn receive(State(route): State<Route>, body: Result<Bytes, BytesRejection>) -> Response {
    metrics::counter!(m::LISTENER_MESSAGES_RECEIVED_TOTAL, m::LABEL_LISTENER => LISTENER_WEBHOOK)
        .increment(1);

    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            reject();
            debug!(listener = LISTENER_WEBHOOK, error = %rejection, "rejected request body");
            return (rejection.status(), rejection.body_text()).into_response();
        }
    };

    if serde_json::from_slice::<IgnoredAny>(&body).is_err() {
        reject();
        return (StatusCode::BAD_REQUEST, MSG_INVALID_JSON).into_response();
    }

    match route.enqueue(body).await {
        Ok(()) => (StatusCode::OK, MSG_RECEIVED).into_response(),
        Err(e) => {
            warn!(listener = LISTENER_WEBHOOK, error = %e, "failed to enqueue webhook body");
            reject();
            (StatusCode::SERVICE_UNAVAILABLE, MSG_UNAVAILABLE).into_response()
        }
    }
}

async fn method_not_allowed() -> (StatusCode, &'static str) {
    reject();
    (StatusCode::METHOD_NOT_ALLOWED, MSG_METHOD_NOT_ALLOWED)
}

fn reject() {
    metrics::counter!(m::LISTENER_MESSAGES_REJECTED_TOTAL, m::LABEL_LISTENER => LISTENER_WEBHOOK)
        .increment(1);
}

/// HTTP(S) webhook 리스너
pub struct WebhookListener {
    config: WebhookConfig,
    route: Route,
    task: ListenerTask,
    local_addr: Option<SocketAddr>,
}

impl WebhookListener {
    /// 새 webhook 리스너를 생성합니다.
    pub fn new(config: WebhookConfig, route: Route) -> Self {
        Self {
            config,
            route,
            task: ListenerTask::default(),
            local_addr: None,
        }
    }

    /// 실제 바인드된 주소 (시작 후에만 `Some`)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 수신 경로
    pub fn path(&self) -> &str {
        &self.config.path
    }
}

impl Pipeline for WebhookListener {
    async fn start(&mut self) -> Result<(), LogbridgeError> {
        self.task.ensure_stopped()?;

        if !self.config.path.starts_with('/') || !self.config.has_literal_path() {
            return Err(IngestError::Config {
                field: "webhook.path".to_owned(),
                reason: format!("'{}' is not a literal path", self.config.path),
            }
            .into());
        }

        let acceptor = if self.config.is_https() {
            if !self.config.tls.enabled {
                return Err(IngestError::Config {
                    field: "webhook.tls.enabled".to_owned(),
                    reason: "TLS must be enabled for https".to_owned(),
                }
                .into());
            }
            Some(tls_acceptor(
                &self.config.tls.cert_file,
                &self.config.tls.key_file,
            )?)
        } else {
            None
        };

        let bind_addr = self.config.bind_addr();
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| IngestError::Listener {
                listener: LISTENER_WEBHOOK.to_owned(),
                reason: format!("failed to bind to {bind_addr}: {e}"),
            })?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        info!(
            listener = LISTENER_WEBHOOK,
            addr = %local_addr,
            path = %self.config.path,
            tls = acceptor.is_some(),
            destination = self.route.destination(),
            "webhook listener started"
        );

        let app = router(&self.config.path, self.route.clone(), self.config.max_body_bytes);
        match acceptor {
            Some(acceptor) => {
                self.task
                    .spawn(move |cancel| serve_tls(listener, acceptor, app, cancel));
            }
            None => {
                self.task.spawn(move |cancel| async move {
                    let shutdown = async move { cancel.cancelled().await };
                    if let Err(e) = axum::serve(listener, app)
                        .with_graceful_shutdown(shutdown)
                        .await
                    {
                        warn!(listener = LISTENER_WEBHOOK, error = %e, "HTTP server error");
                    }
                });
            }
        }

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogbridgeError> {
        self.task.stop(LISTENER_WEBHOOK).await?;
        info!(listener = LISTENER_WEBHOOK, addr = ?self.local_addr, "webhook listener stopped");
        self.local_addr = None;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        self.task.health()
    }
}
