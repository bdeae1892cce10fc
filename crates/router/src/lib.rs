//! logbridge 라우터 -- 키 경로 추출과 목적지별 라우팅 패브릭
//!
//! # 모듈 구성
//!
//! - [`keypath`]: 점(`.`) 구분 키 경로 컴파일, 구조 정규화, 탐색, 스칼라 변환
//! - [`destination`]: 목적지 하나의 bounded 큐와 전용 워커
//! - [`table`]: 시작 시 한 번 구성되는 읽기 전용 라우팅 테이블
//! - [`sink`]: 아웃바운드 전송 경계 ([`Sink`] trait, Kafka 구현)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Listener --Route::enqueue--> [bounded FIFO] --> worker --(key, payload)--> Sink
//!                                                   |
//!                                      PathSpec + Traversal + Coercion
//! ```

pub mod destination;
pub mod error;
pub mod keypath;
pub mod sink;
pub mod table;

// --- 주요 타입 re-export ---

// 라우팅
pub use destination::{Destination, DestinationConfig, Route};
pub use table::{RoutingTable, RoutingTableBuilder};

// 키 경로
pub use keypath::{MappingView, PathSpec, extract_key, lookup, normalize, to_key_string};

// 싱크
pub use sink::{KafkaSink, Sink};

// 에러
pub use error::RouterError;

/// 목적지별 기본 큐 슬롯 수
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
