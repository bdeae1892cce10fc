//! 설정 관리 — logbridge.toml / config.yaml 파싱 및 런타임 설정
//!
//! [`LogbridgeConfig`]는 목적지(kafka), 인바운드 리스너(syslog, webhook)와
//! 데몬 공통 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 데몬에서 적용)
//! 2. 환경변수 (`LOGBRIDGE_GENERAL_LOG_LEVEL=debug` 형식)
//! 3. 설정 파일 (`*.toml` 또는 `*.yaml` / `*.yml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logbridge_core::error::LogbridgeError> {
//! use logbridge_core::config::LogbridgeConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드 + 검증
//! let config = LogbridgeConfig::load("logbridge.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogbridgeConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogbridgeError};

/// 허용되는 syslog 형식 (빈 문자열은 RFC5424로 취급)
pub const SYSLOG_FORMATS: [&str; 4] = ["", "RFC3164", "RFC5424", "RFC6587"];

/// 허용되는 syslog 전송 프로토콜
pub const SYSLOG_PROTOCOLS: [&str; 3] = ["udp", "tcp", "unixgram"];

/// logbridge 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogbridgeConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Prometheus 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Kafka 목적지 목록
    #[serde(default)]
    pub kafka: Vec<KafkaConfig>,
    /// syslog 리스너 목록
    #[serde(default)]
    pub syslog: Vec<SyslogConfig>,
    /// webhook 리스너 목록
    #[serde(default)]
    pub webhook: Vec<WebhookConfig>,
}

impl LogbridgeConfig {
    /// 파일에서 설정을 로드하고 환경변수 오버라이드와 검증을 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogbridgeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일에서 설정을 읽습니다 (환경변수 오버라이드, 검증 없음).
    ///
    /// 확장자가 `yaml` 또는 `yml`이면 YAML로, 그 외에는 TOML로 해석합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogbridgeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogbridgeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogbridgeError::Io(e)
            }
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::parse_yaml(&content)
        } else {
            Self::parse(&content)
        }
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogbridgeError> {
        toml::from_str(toml_str).map_err(|e| {
            LogbridgeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// YAML 문자열에서 설정을 파싱합니다.
    pub fn parse_yaml(yaml_str: &str) -> Result<Self, LogbridgeError> {
        if yaml_str.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_str).map_err(|e| {
            LogbridgeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 스칼라 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGBRIDGE_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGBRIDGE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGBRIDGE_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "LOGBRIDGE_GENERAL_PID_FILE");
        override_usize(
            &mut self.general.queue_capacity,
            "LOGBRIDGE_GENERAL_QUEUE_CAPACITY",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGBRIDGE_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOGBRIDGE_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "LOGBRIDGE_METRICS_PORT");
    }

    /// kafka id로 목적지 설정을 찾습니다.
    pub fn kafka_by_id(&self, id: &str) -> Option<&KafkaConfig> {
        self.kafka.iter().find(|k| k.id == id)
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 첫 번째로 발견된 문제를 [`ConfigError::InvalidValue`]로 반환합니다.
    pub fn validate(&self) -> Result<(), LogbridgeError> {
        self.general.validate()?;
        self.metrics.validate()?;

        if self.kafka.is_empty() {
            return Err(invalid("kafka", "at least one kafka destination is required"));
        }

        let mut ids = HashSet::with_capacity(self.kafka.len());
        for (idx, kafka) in self.kafka.iter().enumerate() {
            kafka.validate(idx)?;
            if !ids.insert(kafka.id.as_str()) {
                return Err(invalid(
                    &format!("kafka[{idx}].id"),
                    &format!("duplicate kafka id '{}'", kafka.id),
                ));
            }
        }

        if self.syslog.is_empty() && self.webhook.is_empty() {
            return Err(invalid(
                "syslog",
                "at least one syslog or webhook listener is required",
            ));
        }

        for (idx, syslog) in self.syslog.iter().enumerate() {
            syslog.validate(idx)?;
            if !ids.contains(syslog.kafka_id.as_str()) {
                return Err(invalid(
                    &format!("syslog[{idx}].kafka_id"),
                    &format!("kafka id '{}' not found", syslog.kafka_id),
                ));
            }
        }

        for (idx, webhook) in self.webhook.iter().enumerate() {
            webhook.validate(idx)?;
            if !ids.contains(webhook.kafka_id.as_str()) {
                return Err(invalid(
                    &format!("webhook[{idx}].kafka_id"),
                    &format!("kafka id '{}' not found", webhook.kafka_id),
                ));
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
    /// 목적지별 큐 슬롯 수
    pub queue_capacity: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
            queue_capacity: 100,
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), LogbridgeError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                &format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                &format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(invalid("general.queue_capacity", "must be greater than 0"));
        }

        Ok(())
    }
}

/// Prometheus 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

impl MetricsConfig {
    fn validate(&self) -> Result<(), LogbridgeError> {
        if !self.enabled {
            return Ok(());
        }
        if self.listen_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(invalid(
                "metrics.listen_addr",
                &format!("'{}' is not an IP address", self.listen_addr),
            ));
        }
        if self.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Kafka 목적지 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// 목적지 식별자 (리스너의 `kafka_id`가 참조)
    pub id: String,
    /// 부트스트랩 브로커 목록 (`host:port`)
    pub brokers: Vec<String>,
    /// 대상 토픽
    pub topic: String,
    /// 메시지 키 경로 (`.` 구분, `\.`은 리터럴 점). 빈 문자열이면 키 없음.
    pub key: String,
}

impl KafkaConfig {
    fn validate(&self, idx: usize) -> Result<(), LogbridgeError> {
        if self.id.is_empty() {
            return Err(invalid(&format!("kafka[{idx}].id"), "id is required"));
        }
        if self.brokers.is_empty() || self.brokers.iter().any(|b| b.trim().is_empty()) {
            return Err(invalid(
                &format!("kafka[{idx}].brokers"),
                "at least one non-empty broker address is required",
            ));
        }
        if self.topic.is_empty() {
            return Err(invalid(&format!("kafka[{idx}].topic"), "topic is required"));
        }
        Ok(())
    }
}

/// syslog 리스너 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// 수신 주소 (`host:port`, unixgram은 소켓 경로)
    pub listen: String,
    /// 메시지 형식 (RFC3164, RFC5424, RFC6587)
    pub format: String,
    /// 전송 프로토콜 (udp, tcp, unixgram)
    pub protocol: String,
    /// 대상 kafka id
    pub kafka_id: String,
}

impl SyslogConfig {
    fn validate(&self, idx: usize) -> Result<(), LogbridgeError> {
        if self.listen.is_empty() {
            return Err(invalid(&format!("syslog[{idx}].listen"), "listen is required"));
        }
        if !SYSLOG_PROTOCOLS.contains(&self.protocol.as_str()) {
            return Err(invalid(
                &format!("syslog[{idx}].protocol"),
                &format!("must be one of: {}", SYSLOG_PROTOCOLS.join(", ")),
            ));
        }
        if !SYSLOG_FORMATS.contains(&self.format.as_str()) {
            return Err(invalid(
                &format!("syslog[{idx}].format"),
                "must be one of: RFC3164, RFC5424, RFC6587",
            ));
        }
        if self.kafka_id.is_empty() {
            return Err(invalid(
                &format!("syslog[{idx}].kafka_id"),
                "kafka_id is required",
            ));
        }
        Ok(())
    }
}

/// webhook 리스너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// 수신 URL (`http://host:port` 또는 `https://host:port`)
    pub listen: String,
    /// 요청 경로 (예: `/webhook`)
    pub path: String,
    /// 대상 kafka id
    pub kafka_id: String,
    /// 요청 본문 최대 크기 (바이트)
    pub max_body_bytes: usize,
    /// TLS 설정
    pub tls: WebhookTlsConfig,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            listen: String::new(),
            path: String::new(),
            kafka_id: String::new(),
            max_body_bytes: 2 * 1024 * 1024,
            tls: WebhookTlsConfig::default(),
        }
    }
}

impl WebhookConfig {
    /// `listen`이 `https://`로 시작하는지 확인합니다.
    pub fn is_https(&self) -> bool {
        self.listen.starts_with("https://")
    }

    /// `listen`에서 스킴을 제거한 `host:port`를 반환합니다.
    pub fn bind_addr(&self) -> &str {
        self.listen
            .strip_prefix("https://")
            .or_else(|| self.listen.strip_prefix("http://"))
            .unwrap_or(&self.listen)
            .trim_end_matches('/')
    }

    /// `path`가 라우터 패턴 문법 없이 그대로 매칭되는 경로인지 확인합니다.
    ///
    /// `{`, `}` 문자와 `:` 또는 `*`로 시작하는 세그먼트는 캡처로 해석되므로 허용하지 않습니다.
    pub fn has_literal_path(&self) -> bool {
        !self.path.contains(['{', '}'])
            && !self
                .path
                .split('/')
                .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    }

    fn validate(&self, idx: usize) -> Result<(), LogbridgeError> {
        if !self.listen.starts_with("http://") && !self.is_https() {
            return Err(invalid(
                &format!("webhook[{idx}].listen"),
                "must start with http:// or https://",
            ));
        }
        if self.bind_addr().is_empty() {
            return Err(invalid(
                &format!("webhook[{idx}].listen"),
                "host:port is required",
            ));
        }
        if !self.path.starts_with('/') {
            return Err(invalid(
                &format!("webhook[{idx}].path"),
                "path is required and must start with '/'",
            ));
        }
        if !self.has_literal_path() {
            return Err(invalid(
                &format!("webhook[{idx}].path"),
                "must not contain '{', '}' or segments starting with ':' or '*'",
            ));
        }
        if self.kafka_id.is_empty() {
            return Err(invalid(
                &format!("webhook[{idx}].kafka_id"),
                "kafka_id is required",
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(invalid(
                &format!("webhook[{idx}].max_body_bytes"),
                "must be greater than 0",
            ));
        }
        if self.is_https() {
            if !self.tls.enabled {
                return Err(invalid(
                    &format!("webhook[{idx}].tls.enabled"),
                    "TLS must be enabled for https",
                ));
            }
            if self.tls.cert_file.is_empty() || self.tls.key_file.is_empty() {
                return Err(invalid(
                    &format!("webhook[{idx}].tls"),
                    "cert_file and key_file are required for https",
                ));
            }
        }
        Ok(())
    }
}

/// webhook TLS 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookTlsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// PEM 인증서 체인 경로
    pub cert_file: String,
    /// PEM 개인키 경로
    pub key_file: String,
}

fn invalid(field: &str, reason: &str) -> LogbridgeError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
    .into()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}
