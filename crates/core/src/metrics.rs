//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logbridge_`
//! - 영역명: `listener_`, `syslog_`, `webhook_`, `router_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use logbridge_core::metrics as m;
//!
//! metrics::counter!(m::ROUTER_MESSAGES_DELIVERED_TOTAL, m::LABEL_DESTINATION => "k1").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 목적지 레이블 키 (kafka id)
pub const LABEL_DESTINATION: &str = "destination";

/// 리스너 종류 레이블 키 (syslog_udp, syslog_tcp, syslog_unixgram, webhook)
pub const LABEL_LISTENER: &str = "listener";

/// syslog 형식 레이블 키 (RFC3164, RFC5424, RFC6587)
pub const LABEL_FORMAT: &str = "format";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Listener 메트릭 ────────────────────────────────────────────────

/// Listener: 수신한 전체 메시지 수 (counter, label: listener)
pub const LISTENER_MESSAGES_RECEIVED_TOTAL: &str = "logbridge_listener_messages_received_total";

/// Listener: 거부된 메시지 수 (counter, label: listener)
pub const LISTENER_MESSAGES_REJECTED_TOTAL: &str = "logbridge_listener_messages_rejected_total";

/// Syslog: 파싱 실패 수 (counter, label: format)
pub const SYSLOG_PARSE_ERRORS_TOTAL: &str = "logbridge_syslog_parse_errors_total";

/// Syslog TCP: 현재 활성 연결 수 (gauge)
pub const SYSLOG_TCP_ACTIVE_CONNECTIONS: &str = "logbridge_syslog_tcp_active_connections";

// ─── Router 메트릭 ──────────────────────────────────────────────────

/// Router: 큐에 적재된 메시지 수 (counter, label: destination)
pub const ROUTER_MESSAGES_ENQUEUED_TOTAL: &str = "logbridge_router_messages_enqueued_total";

/// Router: 싱크 전송에 성공한 메시지 수 (counter, label: destination)
pub const ROUTER_MESSAGES_DELIVERED_TOTAL: &str = "logbridge_router_messages_delivered_total";

/// Router: 싱크 전송에 실패한 메시지 수 (counter, label: destination)
pub const ROUTER_DELIVERY_FAILURES_TOTAL: &str = "logbridge_router_delivery_failures_total";

/// Router: 키 경로가 설정되었지만 키를 얻지 못한 메시지 수 (counter, label: destination)
pub const ROUTER_KEY_MISSES_TOTAL: &str = "logbridge_router_key_misses_total";

/// Router: 싱크 호출 소요 시간 (histogram, 초, label: destination)
pub const ROUTER_DELIVERY_DURATION_SECONDS: &str = "logbridge_router_delivery_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logbridge_daemon_uptime_seconds";

/// Daemon: 등록된 리스너 수 (gauge)
pub const DAEMON_LISTENERS_REGISTERED: &str = "logbridge_daemon_listeners_registered";

/// Daemon: 등록된 목적지 수 (gauge)
pub const DAEMON_DESTINATIONS_REGISTERED: &str = "logbridge_daemon_destinations_registered";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "logbridge_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 싱크 전송 지연 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 30s 범위 (브로커 ack 대기 포함)
pub const DELIVERY_DURATION_BUCKETS: [f64; 10] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `logbridge-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Listener
    describe_counter!(
        LISTENER_MESSAGES_RECEIVED_TOTAL,
        "Total number of inbound messages received by listeners"
    );
    describe_counter!(
        LISTENER_MESSAGES_REJECTED_TOTAL,
        "Total number of inbound messages rejected before routing"
    );
    describe_counter!(
        SYSLOG_PARSE_ERRORS_TOTAL,
        "Total number of syslog records that failed to parse"
    );
    describe_gauge!(
        SYSLOG_TCP_ACTIVE_CONNECTIONS,
        "Number of open syslog TCP connections"
    );

    // Router
    describe_counter!(
        ROUTER_MESSAGES_ENQUEUED_TOTAL,
        "Total number of messages accepted into destination queues"
    );
    describe_counter!(
        ROUTER_MESSAGES_DELIVERED_TOTAL,
        "Total number of messages delivered to sinks"
    );
    describe_counter!(
        ROUTER_DELIVERY_FAILURES_TOTAL,
        "Total number of failed sink deliveries (not retried)"
    );
    describe_counter!(
        ROUTER_KEY_MISSES_TOTAL,
        "Messages forwarded without a key although a key path is configured"
    );
    describe_histogram!(
        ROUTER_DELIVERY_DURATION_SECONDS,
        "Time spent in a single sink call in seconds"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "logbridge daemon uptime in seconds");
    describe_gauge!(
        DAEMON_LISTENERS_REGISTERED,
        "Number of inbound listeners registered in the daemon"
    );
    describe_gauge!(
        DAEMON_DESTINATIONS_REGISTERED,
        "Number of destinations in the routing table"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
