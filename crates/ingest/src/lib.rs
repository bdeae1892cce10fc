//! logbridge 인바운드 리스너
//!
//! syslog(UDP/TCP/unixgram)와 HTTP(S) webhook으로 들어온 메시지를
//! 목적지 큐([`logbridge_router::Route`])에 적재합니다.
//!
//! # 모듈 구성
//!
//! - [`parser`]: RFC 3164 / RFC 5424 / RFC 6587 syslog 파서
//! - [`listener`]: syslog 및 webhook 리스너 ([`Pipeline`](logbridge_core::Pipeline) 구현)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! UDP/TCP/unixgram -> SyslogParser -> JSON record ┐
//!                                                 ├-> Route (bounded queue) -> worker -> Kafka
//! HTTP(S) POST ----------> JSON syntax check -----┘
//! ```

pub mod error;
pub mod listener;
pub mod parser;

// --- 주요 타입 re-export ---

// 에러
pub use error::IngestError;

// 파서
pub use parser::{SyslogFormat, SyslogParser};

// 리스너
pub use listener::{
    SyslogHandler, SyslogListener, SyslogTcpListener, SyslogUdpListener, WebhookListener,
};
#[cfg(unix)]
pub use listener::SyslogUnixListener;
