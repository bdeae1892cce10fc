//! 아웃바운드 싱크 -- 목적지 워커가 `(key, payload)`를 넘기는 경계
//!
//! 싱크는 와이어 인코딩(브로커 레코드 구성 등)과 전송 실패 보고를 책임집니다.
//! 워커는 `send`가 끝나기 전에 다음 메시지를 꺼내지 않습니다.

mod kafka;
mod partitioner;

pub use kafka::KafkaSink;
pub use partitioner::{murmur2, partition_for_key};

use std::future::Future;

use bytes::Bytes;

use crate::error::RouterError;

/// 메시지 전송 대상
///
/// RPITIT를 사용하므로 워커는 구체 타입으로 제네릭하게 받습니다.
pub trait Sink: Send + Sync {
    /// 로그와 메트릭에 쓰이는 싱크 이름
    fn name(&self) -> &str;

    /// 메시지 한 건을 전송합니다.
    fn send(
        &self,
        key: Option<Bytes>,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), RouterError>> + Send;

    /// 큐가 모두 비워진 뒤 연결을 정리합니다.
    fn close(&self) -> impl Future<Output = Result<(), RouterError>> + Send {
        async { Ok(()) }
    }
}
