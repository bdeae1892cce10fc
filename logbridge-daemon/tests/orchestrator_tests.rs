//! Orchestrator lifecycle tests.
//!
//! Builds the daemon with in-memory sinks in place of Kafka and drives
//! real UDP/TCP/HTTP listeners on loopback ports.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{Notify, oneshot};

use logbridge_core::config::{KafkaConfig, LogbridgeConfig};
use logbridge_core::pipeline::HealthStatus;
use logbridge_daemon::health::ComponentKind;
use logbridge_daemon::orchestrator::Orchestrator;
use logbridge_router::{RouterError, Sink};

type Delivered = (String, Option<String>, Bytes);

/// Records `(topic, key, payload)` for every delivery.
#[derive(Clone, Default)]
struct MemorySink {
    topic: String,
    delivered: Arc<Mutex<Vec<Delivered>>>,
    notify: Arc<Notify>,
    delay: Duration,
}

impl MemorySink {
    fn for_topic(&self, topic: &str) -> Self {
        Self {
            topic: topic.to_owned(),
            ..self.clone()
        }
    }

    fn snapshot(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }

    async fn wait_for(&self, count: usize) -> Vec<Delivered> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.notify.notified();
                let snapshot = self.snapshot();
                if snapshot.len() >= count {
                    return snapshot;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for deliveries")
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.topic
    }

    async fn send(&self, key: Option<Bytes>, payload: Bytes) -> Result<(), RouterError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let key = key.map(|k| String::from_utf8_lossy(&k).into_owned());
        self.delivered
            .lock()
            .unwrap()
            .push((self.topic.clone(), key, payload));
        self.notify.notify_waiters();
        Ok(())
    }
}

async fn build(config: LogbridgeConfig, sink: &MemorySink) -> anyhow::Result<Orchestrator> {
    let sink = sink.clone();
    Orchestrator::build_with(config, move |kafka: KafkaConfig| {
        let sink = sink.for_topic(&kafka.topic);
        async move { Ok::<_, RouterError>(sink) }
    })
    .await
}

fn free_udp_addr() -> String {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().to_string()
}

fn free_tcp_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

fn config(toml: &str) -> LogbridgeConfig {
    LogbridgeConfig::parse(toml).expect("test config should parse")
}

fn single_udp_config(udp: &str) -> LogbridgeConfig {
    config(&format!(
        r#"
[[kafka]]
id = "events"
brokers = ["localhost:9092"]
topic = "syslog"
key = "hostname"

[[syslog]]
listen = "{udp}"
format = "RFC5424"
protocol = "udp"
kafka_id = "events"
"#
    ))
}

#[tokio::test]
async fn test_build_registers_listeners_and_destinations() {
    // Given: Two destinations, a syslog listener and a webhook listener
    let udp = free_udp_addr();
    let http = free_tcp_addr();
    let config = config(&format!(
        r#"
[[kafka]]
id = "syslog-events"
brokers = ["localhost:9092"]
topic = "syslog"

[[kafka]]
id = "webhook-events"
brokers = ["localhost:9092"]
topic = "webhook"

[[syslog]]
listen = "{udp}"
format = "RFC3164"
protocol = "udp"
kafka_id = "syslog-events"

[[webhook]]
listen = "http://{http}"
path = "/webhook"
kafka_id = "webhook-events"
"#
    ));

    // When: Building the orchestrator
    let mut orchestrator = build(config, &MemorySink::default()).await.unwrap();

    // Then: Syslog listeners come before webhook listeners
    assert_eq!(orchestrator.listeners().count(), 2);
    let names = orchestrator.listeners().names();
    assert_eq!(names[0], format!("syslog_udp:{udp}"));
    assert_eq!(names[1], format!("webhook:http://{http}/webhook"));
    assert_eq!(
        orchestrator.routing().unwrap().ids(),
        vec!["syslog-events", "webhook-events"]
    );

    orchestrator.shutdown().await.unwrap();
    assert!(orchestrator.routing().is_none());
}

#[tokio::test]
async fn test_build_fails_when_destination_cannot_connect() {
    let config = single_udp_config(&free_udp_addr());

    let result = Orchestrator::build_with(config, |kafka: KafkaConfig| async move {
        Err::<MemorySink, _>(RouterError::Sink {
            destination: kafka.id,
            reason: "broker unreachable".to_owned(),
        })
    })
    .await;

    let err = result.err().expect("build should fail").to_string();
    assert!(err.contains("failed to connect destination 'events'"), "got: {err}");
}

#[tokio::test]
async fn test_build_rejects_config_without_listeners() {
    let config = config(
        r#"
[[kafka]]
id = "events"
brokers = ["localhost:9092"]
topic = "syslog"
"#,
    );

    let result = build(config, &MemorySink::default()).await;
    let err = result.err().expect("build should fail").to_string();
    assert!(err.contains("config validation failed"), "got: {err}");
}

#[tokio::test]
async fn test_run_until_forwards_syslog_and_webhook_then_cleans_up() {
    // Given: UDP syslog keyed by hostname, webhook keyed by a nested JSON-string field
    let udp = free_udp_addr();
    let http = free_tcp_addr();
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("run").join("logbridge.pid");
    let mut config = config(&format!(
        r#"
[[kafka]]
id = "syslog-events"
brokers = ["localhost:9092"]
topic = "syslog"
key = "hostname"

[[kafka]]
id = "webhook-events"
brokers = ["localhost:9092"]
topic = "webhook"
key = 'payload.user\.id'

[[syslog]]
listen = "{udp}"
format = "RFC5424"
protocol = "udp"
kafka_id = "syslog-events"

[[webhook]]
listen = "http://{http}"
path = "/events"
kafka_id = "webhook-events"
"#
    ));
    config.general.pid_file = pid_file.display().to_string();

    let sink = MemorySink::default();
    let mut orchestrator = build(config, &sink).await.unwrap();

    // When: A client sends one datagram and one POST while the daemon runs
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let client_sink = sink.clone();
    let client_pid_file = pid_file.clone();
    let client = tokio::spawn(async move {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let datagram = b"<34>1 2024-01-15T12:00:00Z web01 sshd 42 - - login";

        // Listeners start asynchronously; resend until the first record lands.
        tokio::time::timeout(Duration::from_secs(5), async {
            while client_sink.snapshot().is_empty() {
                socket.send_to(datagram, &udp).await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("syslog record should be delivered");
        assert!(client_pid_file.exists(), "PID file should exist while running");

        let body = r#"{"payload":"{\"user.id\":\"u-17\"}"}"#;
        let mut stream = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match TcpStream::connect(&http).await {
                    Ok(stream) => return stream,
                    Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
                }
            }
        })
        .await
        .expect("webhook listener should accept connections");
        let request = format!(
            "POST /events HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        client_sink.wait_for(2).await;

        stop_tx.send(()).unwrap();
    });

    orchestrator
        .run_until(async move {
            let _ = stop_rx.await;
            Ok("test")
        })
        .await
        .unwrap();
    client.await.unwrap();

    // Then: Both records were delivered with their keys, and the PID file is gone
    let delivered = sink.snapshot();
    let syslog = delivered
        .iter()
        .find(|(topic, _, _)| topic == "syslog")
        .expect("syslog record");
    assert_eq!(syslog.1.as_deref(), Some("web01"));
    let record: serde_json::Value = serde_json::from_slice(&syslog.2).unwrap();
    assert_eq!(record["app_name"], "sshd");

    let webhook = delivered
        .iter()
        .find(|(topic, _, _)| topic == "webhook")
        .expect("webhook record");
    assert_eq!(webhook.1.as_deref(), Some("u-17"));

    assert!(!pid_file.exists(), "PID file should be removed after shutdown");
    assert!(orchestrator.routing().is_none());
}

#[tokio::test]
async fn test_shutdown_drains_queued_messages_in_order() {
    // Given: A slow sink and a small queue
    let mut config = single_udp_config(&free_udp_addr());
    config.general.queue_capacity = 4;
    let sink = MemorySink {
        delay: Duration::from_millis(5),
        ..Default::default()
    };
    let mut orchestrator = build(config, &sink).await.unwrap();

    // When: More messages than queue slots are routed, then the daemon shuts down
    let routing = orchestrator.routing().unwrap();
    for i in 0..10 {
        let payload = format!(r#"{{"hostname":"h{i}"}}"#);
        routing.route("events", payload).await.unwrap();
    }
    orchestrator.shutdown().await.unwrap();

    // Then: Every accepted message was delivered, in order
    let delivered = sink.snapshot();
    assert_eq!(delivered.len(), 10);
    for (i, (_, key, _)) in delivered.iter().enumerate() {
        assert_eq!(key.as_deref(), Some(format!("h{i}").as_str()));
    }
}

#[tokio::test]
async fn test_start_failure_rolls_back_and_removes_pid_file() {
    // Given: Two TCP listeners on the same address
    let tcp = free_tcp_addr();
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("logbridge.pid");
    let mut config = config(&format!(
        r#"
[[kafka]]
id = "events"
brokers = ["localhost:9092"]
topic = "syslog"

[[syslog]]
listen = "{tcp}"
format = "RFC5424"
protocol = "tcp"
kafka_id = "events"

[[syslog]]
listen = "{tcp}"
format = "RFC3164"
protocol = "tcp"
kafka_id = "events"
"#
    ));
    config.general.pid_file = pid_file.display().to_string();
    let mut orchestrator = build(config, &MemorySink::default()).await.unwrap();

    // When: Running the daemon
    let err = orchestrator
        .run_until(std::future::pending::<anyhow::Result<&'static str>>())
        .await
        .unwrap_err()
        .to_string();

    // Then: Startup fails, the first listener was stopped, and nothing is left behind
    assert!(err.contains("failed to start listener"), "got: {err}");
    assert!(!pid_file.exists());
    assert!(orchestrator.routing().is_none());
    assert!(std::net::TcpListener::bind(&tcp).is_ok());
    let health = orchestrator.health().await;
    assert!(health.status.is_unhealthy());
}

#[tokio::test]
async fn test_health_reflects_listener_and_destination_state() {
    let mut orchestrator = build(single_udp_config(&free_udp_addr()), &MemorySink::default())
        .await
        .unwrap();

    // Before start: listener not running
    let health = orchestrator.health().await;
    assert!(health.status.is_unhealthy());
    assert_eq!(health.components.len(), 2);

    // After start: everything healthy
    orchestrator.start().await.unwrap();
    let health = orchestrator.health().await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.components[0].kind, ComponentKind::Listener);
    assert_eq!(health.components[1].kind, ComponentKind::Destination);
    assert_eq!(health.components[1].name, "events");

    // After shutdown: destinations are gone, listener stopped
    orchestrator.shutdown().await.unwrap();
    let health = orchestrator.health().await;
    assert_eq!(health.components.len(), 1);
    assert!(health.status.is_unhealthy());
}
