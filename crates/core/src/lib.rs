//! logbridge 공통 크레이트
//!
//! 모든 logbridge 크레이트가 공유하는 기반 타입을 제공합니다.
//!
//! - [`config`]: `logbridge.toml` / `config.yaml` 로딩, 환경변수 오버라이드, 검증
//! - [`error`]: 도메인별 에러 타입
//! - [`pipeline`]: 리스너 생명주기 trait ([`Pipeline`], [`DynPipeline`])
//! - [`metrics`]: Prometheus 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogbridgeError, PipelineError};

// 설정
pub use config::{
    GeneralConfig, KafkaConfig, LogbridgeConfig, MetricsConfig, SyslogConfig, WebhookConfig,
    WebhookTlsConfig,
};

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};
