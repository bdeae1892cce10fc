//! Listener and destination orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `logbridge-daemon`.
//! It connects one sink per `[[kafka]]` entry, builds the routing table,
//! binds every configured listener to its destination's route, and manages
//! startup/shutdown ordering.
//!
//! # Startup Order
//!
//! 1. Destinations (sink connect + queue worker spawn)
//! 2. Listeners (syslog entries, then webhook entries)
//!
//! # Shutdown Order (producers before consumers)
//!
//! 1. Listeners (stop accepting, finish in-flight enqueues)
//! 2. Routing table (close queues, drain, join workers, close sinks)

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use tokio::sync::broadcast;

use logbridge_core::config::{KafkaConfig, LogbridgeConfig};
use logbridge_router::{DestinationConfig, KafkaSink, RouterError, RoutingTable, Sink};

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status};
use crate::metrics_server;
use crate::modules::{self, ListenerRegistry};

/// The main daemon orchestrator.
///
/// Manages the complete lifecycle of logbridge: destination wiring,
/// listener startup with rollback, health reporting, and graceful shutdown.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogbridgeConfig,
    /// Destination queues and workers. `None` once shut down.
    routing: Option<RoutingTable>,
    /// All configured listeners.
    listeners: ListenerRegistry,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Any Kafka destination cannot be reached
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogbridgeConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration, connecting to Kafka.
    pub async fn build_from_config(config: LogbridgeConfig) -> Result<Self> {
        Self::build_with(config, |kafka| async move { KafkaSink::connect(&kafka).await }).await
    }

    /// Build from configuration using `connect` to create each destination's sink.
    ///
    /// `connect` is called once per `[[kafka]]` entry, in configuration order.
    pub async fn build_with<S, F, Fut>(config: LogbridgeConfig, mut connect: F) -> Result<Self>
    where
        S: Sink + 'static,
        F: FnMut(KafkaConfig) -> Fut,
        Fut: Future<Output = Result<S, RouterError>>,
    {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before any component records
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let mut builder = RoutingTable::builder(config.general.queue_capacity);
        for kafka in &config.kafka {
            tracing::info!(
                destination = %kafka.id,
                topic = %kafka.topic,
                brokers = ?kafka.brokers,
                key = %kafka.key,
                "connecting destination"
            );
            let sink = connect(kafka.clone()).await.map_err(|e| {
                anyhow::anyhow!("failed to connect destination '{}': {}", kafka.id, e)
            })?;
            builder = builder.destination(DestinationConfig::from_kafka(kafka), sink)?;
        }
        let routing = builder.build();
        warn_unused_destinations(&config);

        let listeners = match init_listeners(&config, &routing) {
            Ok(listeners) => listeners,
            Err(e) => {
                if let Err(shutdown_err) = routing.shutdown().await {
                    tracing::error!(error = %shutdown_err, "failed to shut down destinations");
                }
                return Err(e);
            }
        };

        tracing::info!(
            listeners = listeners.count(),
            destinations = routing.len(),
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            record_daemon_metrics(listeners.count(), routing.len());
        }

        let (shutdown_tx, _) = broadcast::channel(16);

        Ok(Self {
            config,
            routing: Some(routing),
            listeners,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start all listeners and block until SIGTERM or SIGINT, then shut down.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start all listeners and block until `shutdown` resolves, then shut down.
    ///
    /// The PID file (if configured) is written before listeners start and
    /// removed after the routing table has drained.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_file = self.pid_file();
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        if let Err(e) = self.start().await {
            if let Some(path) = &pid_file {
                remove_pid_file(path);
            }
            return Err(e);
        }

        let uptime_updater_task = if self.config.metrics.enabled {
            let shutdown_rx = self.shutdown_tx.subscribe();
            Some(spawn_uptime_updater(self.start_time, shutdown_rx))
        } else {
            None
        };

        tracing::info!("entering main event loop");
        let signal = shutdown.await;
        match &signal {
            Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "shutdown signal handling failed, shutting down"),
        }

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_updater_task {
            let _ = task.await;
        }

        let result = self.shutdown().await;

        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }

        signal?;
        result
    }

    /// Start all listeners.
    ///
    /// On failure, already-started listeners are stopped and the routing
    /// table is drained before the error is returned.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(listeners = self.listeners.count(), "starting all listeners");
        if let Err(e) = self.listeners.start_all().await {
            tracing::warn!(error = %e, "startup failed, rolling back already-started listeners");
            if let Err(stop_err) = self.shutdown().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(e);
        }
        tracing::info!("all listeners started");
        Ok(())
    }

    /// Stop all listeners, then drain and close every destination.
    ///
    /// Calling this more than once is harmless.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all listeners");
        let listeners_result = self.listeners.stop_all().await;

        let routing_result = match self.routing.take() {
            Some(routing) => {
                tracing::info!(destinations = routing.len(), "draining destination queues");
                routing
                    .shutdown()
                    .await
                    .map_err(|e| anyhow::anyhow!("failed to shut down destinations: {}", e))
            }
            None => Ok(()),
        };

        listeners_result?;
        routing_result?;
        tracing::info!("shutdown complete");
        Ok(())
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let mut components: Vec<ComponentHealth> = self
            .listeners
            .health_statuses()
            .await
            .into_iter()
            .map(|(name, status)| ComponentHealth::listener(name, status))
            .collect();
        if let Some(routing) = &self.routing {
            components.extend(
                routing
                    .health()
                    .into_iter()
                    .map(|(id, status)| ComponentHealth::destination(id, status)),
            );
        }

        let status = aggregate_status(&components);
        let uptime_secs = self.start_time.elapsed().as_secs();

        if self.config.metrics.enabled {
            use logbridge_core::metrics as m;
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status,
            uptime_secs,
            components,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogbridgeConfig {
        &self.config
    }

    /// The routing table, until shutdown.
    pub fn routing(&self) -> Option<&RoutingTable> {
        self.routing.as_ref()
    }

    /// The listener registry.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    fn pid_file(&self) -> Option<PathBuf> {
        if self.config.general.pid_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.config.general.pid_file))
        }
    }
}

/// Build syslog listeners followed by webhook listeners.
fn init_listeners(config: &LogbridgeConfig, routing: &RoutingTable) -> Result<ListenerRegistry> {
    let mut registry = ListenerRegistry::new();
    for handle in modules::syslog::init(config, routing)? {
        registry.register(handle);
    }
    for handle in modules::webhook::init(config, routing)? {
        registry.register(handle);
    }
    Ok(registry)
}

/// Destinations with no listener still get a worker; flag them.
fn warn_unused_destinations(config: &LogbridgeConfig) {
    let referenced: HashSet<&str> = config
        .syslog
        .iter()
        .map(|s| s.kafka_id.as_str())
        .chain(config.webhook.iter().map(|w| w.kafka_id.as_str()))
        .collect();
    for kafka in &config.kafka {
        if !referenced.contains(kafka.id.as_str()) {
            tracing::warn!(destination = %kafka.id, "destination is not referenced by any listener");
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl+C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("CTRL_C")
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create file (prevents TOCTOU races)
/// - Verifies the created file is a regular file (prevents symlink attacks)
/// - Creates parent directory with restrictive permissions (0o700)
///
/// # Errors
///
/// Returns an error if the PID file cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file (possible symlink attack)",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record daemon-level metrics (build info, registered components).
fn record_daemon_metrics(listener_count: usize, destination_count: usize) {
    use logbridge_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_LISTENERS_REGISTERED).set(listener_count as f64);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_DESTINATIONS_REGISTERED).set(destination_count as f64);

    tracing::debug!(
        listeners = listener_count,
        destinations = destination_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

/// Spawn a background task that periodically updates the uptime metric.
///
/// Updates every 10 seconds to keep the metric fresh for Prometheus scrapes.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use logbridge_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_write_pid_file_creates_parent_directory() {
        // Given: A path with non-existent parent directory
        let dir = tempfile::tempdir().expect("should create temp dir");
        let pid_file = dir.path().join("subdir").join("test.pid");

        // When: Writing PID file
        write_pid_file(&pid_file).expect("write_pid_file should create parent directory");

        // Then: File contains the current PID
        let content = fs::read_to_string(&pid_file).expect("should read PID file");
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_pid_file_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("should create temp dir");
        let pid_file = dir.path().join("run").join("logbridge.pid");
        write_pid_file(&pid_file).expect("should write PID file");

        let file_mode = fs::metadata(&pid_file).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(pid_file.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn test_write_pid_file_fails_if_already_exists() {
        // Given: An existing PID file
        let dir = tempfile::tempdir().expect("should create temp dir");
        let pid_file = dir.path().join("dup.pid");
        fs::write(&pid_file, "12345").expect("should write initial PID file");

        // When: Attempting to write PID file again
        let err = write_pid_file(&pid_file).unwrap_err().to_string();

        // Then: Error names the existing PID and the file is untouched
        assert!(err.contains("already exists"), "got: {}", err);
        assert!(err.contains("12345"), "got: {}", err);
        assert_eq!(fs::read_to_string(&pid_file).unwrap(), "12345");
    }

    #[test]
    fn test_remove_pid_file_handles_nonexistent_gracefully() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let pid_file = dir.path().join("missing.pid");

        // Should not panic (logs warning internally)
        remove_pid_file(&pid_file);
        assert!(!pid_file.exists());
    }

    #[tokio::test]
    async fn test_uptime_updater_stops_on_shutdown() {
        let (tx, rx) = broadcast::channel(1);
        let task = spawn_uptime_updater(Instant::now(), rx);
        tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("updater should exit on shutdown")
            .unwrap();
    }
}
