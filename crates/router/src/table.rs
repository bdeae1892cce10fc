//! 라우팅 테이블 -- 목적지 id에서 [`Destination`]으로의 읽기 전용 맵
//!
//! 시작 시 [`RoutingTableBuilder`]로 한 번 구성하며, 이후 목적지를
//! 추가하거나 제거하지 않습니다. 테이블 자체에는 잠금이 없고 큐만
//! 내부적으로 동기화됩니다.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::info;

use logbridge_core::pipeline::HealthStatus;

use crate::DEFAULT_QUEUE_CAPACITY;
use crate::destination::{Destination, DestinationConfig, Route};
use crate::error::RouterError;
use crate::sink::Sink;

/// 라우팅 테이블 빌더
///
/// # 사용 예시
/// ```ignore
/// let table = RoutingTable::builder(100)
///     .destination(DestinationConfig::new("k1", "host"), sink)?
///     .build();
/// let route = table.route_for("k1")?;
/// route.enqueue(payload).await?;
/// ```
pub struct RoutingTableBuilder {
    capacity: usize,
    destinations: HashMap<String, Destination>,
}

impl RoutingTableBuilder {
    /// 목적지별 큐 슬롯 수를 지정하여 빌더를 만듭니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            destinations: HashMap::new(),
        }
    }

    /// 목적지를 등록하고 워커를 시작합니다.
    ///
    /// 같은 id가 이미 있으면 [`RouterError::DuplicateDestination`]을 반환합니다.
    pub fn destination<S>(mut self, config: DestinationConfig, sink: S) -> Result<Self, RouterError>
    where
        S: Sink + 'static,
    {
        if self.destinations.contains_key(&config.id) {
            return Err(RouterError::DuplicateDestination(config.id));
        }
        let id = config.id.clone();
        let destination = Destination::spawn(config, self.capacity, sink);
        self.destinations.insert(id, destination);
        Ok(self)
    }

    /// 읽기 전용 라우팅 테이블을 만듭니다.
    pub fn build(self) -> RoutingTable {
        info!(
            destinations = self.destinations.len(),
            capacity = self.capacity,
            "routing table built"
        );
        RoutingTable {
            destinations: self.destinations,
        }
    }
}

impl Default for RoutingTableBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// 목적지 id → 목적지
pub struct RoutingTable {
    destinations: HashMap<String, Destination>,
}

impl RoutingTable {
    /// 빌더를 만듭니다.
    pub fn builder(capacity: usize) -> RoutingTableBuilder {
        RoutingTableBuilder::new(capacity)
    }

    /// 목적지로 메시지를 넣습니다. 큐가 가득 차면 대기합니다.
    pub async fn route(&self, id: &str, payload: impl Into<Bytes>) -> Result<(), RouterError> {
        self.get(id)?.route().enqueue(payload).await
    }

    /// 목적지의 [`Route`] 핸들을 반환합니다. 리스너는 시작 시 한 번 받아 보관합니다.
    pub fn route_for(&self, id: &str) -> Result<Route, RouterError> {
        Ok(self.get(id)?.route())
    }

    /// 목적지를 조회합니다.
    pub fn get(&self, id: &str) -> Result<&Destination, RouterError> {
        self.destinations
            .get(id)
            .ok_or_else(|| RouterError::UnknownDestination(id.to_owned()))
    }

    /// 등록된 목적지 id 목록 (정렬됨)
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.destinations.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// 등록된 목적지 수
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    /// 목적지가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// 목적지별 건강 상태 (id 순)
    pub fn health(&self) -> Vec<(String, HealthStatus)> {
        let mut statuses: Vec<(String, HealthStatus)> = self
            .destinations
            .iter()
            .map(|(id, dest)| (id.clone(), dest.health()))
            .collect();
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        statuses
    }

    /// 모든 큐를 닫고, 남은 메시지를 전송한 뒤 워커를 join합니다.
    ///
    /// 모든 목적지에 먼저 닫기 신호를 보내 동시에 비우고, 그 다음 차례로 join합니다.
    /// 첫 번째 워커 에러를 반환하지만 나머지 목적지도 끝까지 정리합니다.
    pub async fn shutdown(self) -> Result<(), RouterError> {
        info!(destinations = self.destinations.len(), "shutting down routing table");

        for destination in self.destinations.values() {
            destination.close();
        }

        let mut first_error = None;
        for (_, destination) in self.destinations {
            if let Err(e) = destination.shutdown().await {
                tracing::error!(error = %e, "destination shutdown failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("routing table shut down");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTable")
            .field("destinations", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;

    impl Sink for NullSink {
        fn name(&self) -> &str {
            "null"
        }

        async fn send(&self, _key: Option<Bytes>, _payload: Bytes) -> Result<(), RouterError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn duplicate_destination_is_rejected() {
        let result = RoutingTable::builder(4)
            .destination(DestinationConfig::new("k1", ""), NullSink)
            .unwrap()
            .destination(DestinationConfig::new("k1", "host"), NullSink);
        assert!(matches!(result, Err(RouterError::DuplicateDestination(id)) if id == "k1"));
    }

    #[tokio::test]
    async fn unknown_destination_is_an_error() {
        let table = RoutingTable::builder(4)
            .destination(DestinationConfig::new("k1", ""), NullSink)
            .unwrap()
            .build();

        assert!(matches!(
            table.route("nope", "{}").await,
            Err(RouterError::UnknownDestination(_))
        ));
        assert!(table.route_for("nope").is_err());
        table.route("k1", "{}").await.unwrap();
        table.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn ids_and_health_are_sorted() {
        let table = RoutingTable::builder(4)
            .destination(DestinationConfig::new("b", ""), NullSink)
            .unwrap()
            .destination(DestinationConfig::new("a", ""), NullSink)
            .unwrap()
            .build();

        assert_eq!(table.ids(), vec!["a", "b"]);
        assert_eq!(table.len(), 2);
        let health = table.health();
        assert_eq!(health[0].0, "a");
        assert!(health.iter().all(|(_, status)| status.is_healthy()));
        table.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn empty_table_shuts_down() {
        let table = RoutingTableBuilder::default().build();
        assert!(table.is_empty());
        table.shutdown().await.unwrap();
    }
}
