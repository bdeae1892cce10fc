//! 목적지 -- bounded FIFO 큐 하나와 전용 워커 하나
//!
//! [`Route::enqueue`]는 큐가 가득 차면 워커가 한 건을 꺼낼 때까지 대기합니다.
//! 이것이 유일한 역압(backpressure) 수단이며, 느린 싱크는 해당 목적지로
//! 들어오는 리스너만 늦춥니다.
//!
//! 워커는 메시지마다 (키 경로가 있으면) 키를 추출한 뒤 싱크를 호출하고,
//! 싱크 호출이 끝나야 다음 메시지를 꺼냅니다. 전송 실패는 로그와 메트릭으로만
//! 남기며 재시도하지 않습니다.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::{Counter, Histogram};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logbridge_core::config::KafkaConfig;
use logbridge_core::metrics as m;
use logbridge_core::pipeline::HealthStatus;

use crate::error::RouterError;
use crate::keypath::{PathSpec, extract_key};
use crate::sink::Sink;

/// 큐 사용률이 이 값을 넘으면 Degraded로 보고합니다.
const DEGRADED_UTILIZATION: f64 = 0.9;

/// 목적지 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    /// 목적지 id
    pub id: String,
    /// 컴파일된 키 경로 (빈 경로면 키 없이 전송)
    pub key_path: PathSpec,
}

impl DestinationConfig {
    /// 키 경로 문자열을 컴파일하여 설정을 만듭니다.
    pub fn new(id: impl Into<String>, key_path: &str) -> Self {
        Self {
            id: id.into(),
            key_path: PathSpec::compile(key_path),
        }
    }

    /// core의 [`KafkaConfig`]에서 목적지 설정을 생성합니다.
    pub fn from_kafka(config: &KafkaConfig) -> Self {
        Self::new(config.id.clone(), &config.key)
    }
}

/// 목적지 하나로 메시지를 넣는 복제 가능한 핸들
///
/// 리스너는 시작 시 자기 목적지의 `Route`를 받아 보관합니다.
#[derive(Clone)]
pub struct Route {
    destination: Arc<str>,
    tx: mpsc::Sender<Bytes>,
    enqueued: Counter,
}

impl Route {
    /// 목적지 id를 반환합니다.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// 메시지를 큐에 넣습니다. 큐가 가득 차면 빈 슬롯이 생길 때까지 대기합니다.
    ///
    /// 큐가 닫혔으면(종료 중) [`RouterError::QueueClosed`]를 반환합니다.
    pub async fn enqueue(&self, payload: impl Into<Bytes>) -> Result<(), RouterError> {
        self.tx
            .send(payload.into())
            .await
            .map_err(|_| RouterError::QueueClosed(self.destination.to_string()))?;
        self.enqueued.increment(1);
        Ok(())
    }

    /// 큐가 닫혔는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("destination", &self.destination)
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

/// 목적지 -- bounded 큐와 그 큐의 유일한 소비자
pub struct Destination {
    id: Arc<str>,
    key_path: PathSpec,
    tx: mpsc::Sender<Bytes>,
    close: CancellationToken,
    worker: JoinHandle<()>,
    enqueued: Counter,
}

impl Destination {
    /// 큐를 만들고 워커 태스크를 시작합니다. tokio 런타임 안에서 호출해야 합니다.
    pub fn spawn<S>(config: DestinationConfig, capacity: usize, sink: S) -> Self
    where
        S: Sink + 'static,
    {
        let capacity = capacity.max(1);
        let id: Arc<str> = Arc::from(config.id.as_str());
        let (tx, rx) = mpsc::channel(capacity);
        let close = CancellationToken::new();
        let enqueued = metrics::counter!(
            m::ROUTER_MESSAGES_ENQUEUED_TOTAL,
            m::LABEL_DESTINATION => config.id.clone()
        );

        let worker = Worker {
            id: Arc::clone(&id),
            key_path: config.key_path.clone(),
            metrics: WorkerMetrics::new(&config.id),
        };
        let handle = tokio::spawn(worker.run(rx, close.clone(), sink));

        info!(
            destination = %id,
            capacity,
            key_path = %config.key_path,
            "destination worker started"
        );

        Self {
            id,
            key_path: config.key_path,
            tx,
            close,
            worker: handle,
            enqueued,
        }
    }

    /// 목적지 id를 반환합니다.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 컴파일된 키 경로를 반환합니다.
    pub fn key_path(&self) -> &PathSpec {
        &self.key_path
    }

    /// 이 목적지로 메시지를 넣는 핸들을 만듭니다.
    pub fn route(&self) -> Route {
        Route {
            destination: Arc::clone(&self.id),
            tx: self.tx.clone(),
            enqueued: self.enqueued.clone(),
        }
    }

    /// 큐 최대 슬롯 수
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// 현재 큐에 쌓인 메시지 수
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// 큐 사용률 (0.0 ~ 1.0)
    pub fn utilization(&self) -> f64 {
        self.queued() as f64 / self.capacity() as f64
    }

    /// 목적지 건강 상태를 반환합니다.
    pub fn health(&self) -> HealthStatus {
        if self.worker.is_finished() {
            return HealthStatus::Unhealthy(format!("destination '{}' worker exited", self.id));
        }
        let utilization = self.utilization();
        if utilization > DEGRADED_UTILIZATION {
            HealthStatus::Degraded(format!(
                "destination '{}' queue utilization high: {:.1}%",
                self.id,
                utilization * 100.0
            ))
        } else {
            HealthStatus::Healthy
        }
    }

    /// 큐 닫기를 요청합니다. 이미 들어온 메시지는 모두 전송됩니다.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// 큐를 닫고 남은 메시지를 모두 전송한 뒤 워커를 join합니다.
    ///
    /// 시간 제한이 없으므로 멈춘 싱크는 종료를 무기한 지연시킬 수 있습니다.
    pub async fn shutdown(self) -> Result<(), RouterError> {
        self.close.cancel();
        drop(self.tx);
        self.worker.await.map_err(|e| RouterError::Worker {
            destination: self.id.to_string(),
            reason: e.to_string(),
        })?;
        info!(destination = %self.id, "destination worker stopped");
        Ok(())
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("id", &self.id)
            .field("key_path", &self.key_path)
            .field("capacity", &self.capacity())
            .field("queued", &self.queued())
            .finish_non_exhaustive()
    }
}

/// 목적지별 메트릭 핸들 (워커 시작 시 한 번 생성)
struct WorkerMetrics {
    delivered: Counter,
    failures: Counter,
    key_misses: Counter,
    duration: Histogram,
}

impl WorkerMetrics {
    fn new(id: &str) -> Self {
        let label = id.to_owned();
        Self {
            delivered: metrics::counter!(
                m::ROUTER_MESSAGES_DELIVERED_TOTAL,
                m::LABEL_DESTINATION => label.clone()
            ),
            failures: metrics::counter!(
                m::ROUTER_DELIVERY_FAILURES_TOTAL,
                m::LABEL_DESTINATION => label.clone()
            ),
            key_misses: metrics::counter!(
                m::ROUTER_KEY_MISSES_TOTAL,
                m::LABEL_DESTINATION => label.clone()
            ),
            duration: metrics::histogram!(
                m::ROUTER_DELIVERY_DURATION_SECONDS,
                m::LABEL_DESTINATION => label
            ),
        }
    }
}

struct Worker {
    id: Arc<str>,
    key_path: PathSpec,
    metrics: WorkerMetrics,
}

impl Worker {
    async fn run<S: Sink>(
        self,
        mut rx: mpsc::Receiver<Bytes>,
        close: CancellationToken,
        sink: S,
    ) {
        let mut closing = false;
        loop {
            tokio::select! {
                biased;
                next = rx.recv() => match next {
                    Some(payload) => self.deliver(&sink, payload).await,
                    None => break,
                },
                _ = close.cancelled(), if !closing => {
                    // 새 적재를 막고 남은 메시지는 계속 꺼냄
                    closing = true;
                    rx.close();
                    debug!(destination = %self.id, "queue closed, draining");
                }
            }
        }

        if let Err(e) = sink.close().await {
            warn!(destination = %self.id, sink = sink.name(), error = %e, "sink close failed");
        }
    }

    async fn deliver<S: Sink>(&self, sink: &S, payload: Bytes) {
        let key = self.derive_key(&payload);

        let started = Instant::now();
        let result = sink.send(key, payload).await;
        self.metrics.duration.record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => self.metrics.delivered.increment(1),
            Err(e) => {
                self.metrics.failures.increment(1);
                error!(
                    destination = %self.id,
                    sink = sink.name(),
                    error = %e,
                    "delivery failed, message dropped"
                );
            }
        }
    }

    /// 키 경로가 있으면 페이로드를 객체로 파싱하여 키를 추출합니다.
    ///
    /// 파싱 실패, 탐색 실패, 빈 문자열은 모두 "키 없음"이며 전송은 계속됩니다.
    fn derive_key(&self, payload: &[u8]) -> Option<Bytes> {
        if self.key_path.is_empty() {
            return None;
        }

        let key = serde_json::from_slice::<Map<String, Value>>(payload)
            .ok()
            .and_then(|root| extract_key(&root, &self.key_path));

        if key.is_none() {
            self.metrics.key_misses.increment(1);
            debug!(destination = %self.id, key_path = %self.key_path, "key not found, sending unkeyed");
        }
        key.map(Bytes::from)
    }
}
