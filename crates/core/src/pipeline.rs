//! 파이프라인 trait — 리스너/모듈 생명주기 정의
//!
//! 모든 인바운드 리스너(syslog, webhook)는 [`Pipeline`]을 구현하여
//! 데몬에서 동일한 start/stop/health_check 생명주기로 관리됩니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::LogbridgeError;

/// `Send` 가능한 박싱된 future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하 (사유 포함)
    Degraded(String),
    /// 비정상 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 생명주기를 가진 모듈이 구현하는 trait
///
/// `start`는 소켓 바인드 등 초기화 실패를 즉시 반환해야 하며,
/// 실제 수신 루프는 백그라운드 태스크에서 실행합니다.
/// `stop`은 수신을 중단하고 백그라운드 태스크가 끝날 때까지 기다립니다.
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogbridgeError>> + Send;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogbridgeError>> + Send;

    /// 모듈의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 파이프라인 trait
///
/// `Pipeline`은 RPITIT를 사용하므로 `dyn Pipeline`이 불가합니다.
/// `DynPipeline`은 `BoxFuture`를 반환하여 `Vec<Box<dyn DynPipeline>>`으로
/// 서로 다른 리스너를 한 레지스트리에서 관리할 수 있게 합니다.
pub trait DynPipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogbridgeError>>;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogbridgeError>>;

    /// 모듈의 건강 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// Pipeline을 구현한 타입은 자동으로 DynPipeline도 구현됩니다.
impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogbridgeError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogbridgeError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    struct Toggle {
        running: bool,
    }

    impl Pipeline for Toggle {
        async fn start(&mut self) -> Result<(), LogbridgeError> {
            if self.running {
                return Err(PipelineError::AlreadyRunning.into());
            }
            self.running = true;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), LogbridgeError> {
            if !self.running {
                return Err(PipelineError::NotRunning.into());
            }
            self.running = false;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("stopped".to_owned())
            }
        }
    }

    #[tokio::test]
    async fn dyn_pipeline_delegates_to_pipeline() {
        let mut boxed: Box<dyn DynPipeline> = Box::new(Toggle { running: false });
        assert!(boxed.health_check().await.is_unhealthy());

        boxed.start().await.unwrap();
        assert!(boxed.health_check().await.is_healthy());
        assert!(boxed.start().await.is_err());

        boxed.stop().await.unwrap();
        assert!(boxed.stop().await.is_err());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("queue 95%".to_owned()).to_string(),
            "degraded: queue 95%"
        );
    }

    #[test]
    fn health_status_serializes_with_reason() {
        let json = serde_json::to_string(&HealthStatus::Unhealthy("worker exited".to_owned()))
            .unwrap();
        assert_eq!(json, r#"{"status":"unhealthy","reason":"worker exited"}"#);
    }
}
