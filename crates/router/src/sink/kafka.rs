//! Kafka 싱크 -- 목적지 하나의 토픽으로 레코드를 동기 전송합니다.
//!
//! 연결 시 토픽 메타데이터를 조회하여 파티션마다 클라이언트를 만들어 두고,
//! 키가 있으면 murmur2 해시로, 없으면 라운드로빈으로 파티션을 고릅니다.
//! 토픽이 아직 없으면 파티션 0으로 보내며 브로커의 자동 생성을 기다립니다.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use chrono::Utc;
use rskafka::client::ClientBuilder;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::record::Record;
use tracing::{debug, info};

use logbridge_core::config::KafkaConfig;

use super::Sink;
use super::partitioner::partition_for_key;
use crate::error::RouterError;

/// Kafka 토픽 싱크
pub struct KafkaSink {
    /// 목적지 id
    id: String,
    /// 대상 토픽
    topic: String,
    /// 파티션 번호 순서의 클라이언트 (최소 1개)
    partitions: Vec<PartitionClient>,
    /// 키 없는 레코드의 라운드로빈 커서
    next_partition: AtomicUsize,
}

impl KafkaSink {
    /// 브로커에 연결하고 토픽의 파티션 클라이언트를 준비합니다.
    pub async fn connect(config: &KafkaConfig) -> Result<Self, RouterError> {
        let client = ClientBuilder::new(config.brokers.clone()).build().await?;

        let partition_count = client
            .list_topics()
            .await?
            .into_iter()
            .find(|topic| topic.name == config.topic)
            .map(|topic| topic.partitions.len())
            .unwrap_or(0);

        if partition_count == 0 {
            info!(
                destination = %config.id,
                topic = %config.topic,
                "topic not found in metadata, producing to partition 0"
            );
        }

        let mut partitions = Vec::with_capacity(partition_count.max(1));
        for partition in 0..partition_count.max(1) {
            let partition = i32::try_from(partition).map_err(|_| RouterError::Sink {
                destination: config.id.clone(),
                reason: format!("partition index {partition} out of range"),
            })?;
            let pc = client
                .partition_client(
                    config.topic.clone(),
                    partition,
                    UnknownTopicHandling::Retry,
                )
                .await?;
            partitions.push(pc);
        }

        info!(
            destination = %config.id,
            topic = %config.topic,
            brokers = ?config.brokers,
            partitions = partitions.len(),
            "kafka sink connected"
        );

        Ok(Self {
            id: config.id.clone(),
            topic: config.topic.clone(),
            partitions,
            next_partition: AtomicUsize::new(0),
        })
    }

    /// 대상 토픽을 반환합니다.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn select_partition(&self, key: Option<&[u8]>) -> usize {
        select_partition(key, self.partitions.len(), &self.next_partition)
    }
}

fn select_partition(key: Option<&[u8]>, partitions: usize, cursor: &AtomicUsize) -> usize {
    match key {
        Some(key) => partition_for_key(key, partitions),
        None => cursor.fetch_add(1, Ordering::Relaxed) % partitions.max(1),
    }
}

impl Sink for KafkaSink {
    fn name(&self) -> &str {
        &self.id
    }

    async fn send(&self, key: Option<Bytes>, payload: Bytes) -> Result<(), RouterError> {
        let idx = self.select_partition(key.as_deref());
        let client = self.partitions.get(idx).ok_or_else(|| RouterError::Sink {
            destination: self.id.clone(),
            reason: format!("no client for partition {idx}"),
        })?;

        let record = Record {
            key: key.map(|k| k.to_vec()),
            value: Some(payload.to_vec()),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        let offsets = client
            .produce(vec![record], Compression::NoCompression)
            .await?;
        debug!(
            destination = %self.id,
            topic = %self.topic,
            partition = idx,
            offset = ?offsets.first(),
            "record produced"
        );
        Ok(())
    }
}
