//! Listener registry and initialization.
//!
//! Each configured syslog or webhook listener is wrapped as a
//! [`ListenerHandle`] that provides uniform lifecycle management via the
//! [`DynPipeline`] trait.
//!
//! The [`ListenerRegistry`] tracks all registered listeners and supports
//! ordered start/stop operations.

pub mod syslog;
pub mod webhook;

use logbridge_core::pipeline::{DynPipeline, HealthStatus};

/// A handle to a registered listener.
pub struct ListenerHandle {
    /// Listener name for logging and health reporting.
    pub name: String,
    /// Destination id the listener routes to.
    pub destination: String,
    /// The listener's pipeline implementation (start/stop/health_check).
    pub pipeline: Box<dyn DynPipeline>,
    started: bool,
}

impl ListenerHandle {
    /// Create a new listener handle.
    pub fn new(
        name: impl Into<String>,
        destination: impl Into<String>,
        pipeline: Box<dyn DynPipeline>,
    ) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            pipeline,
            started: false,
        }
    }

    /// Whether the registry has started this listener and not yet stopped it.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Check the listener's health status.
    pub async fn health_check(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }
}

/// Registry of all logbridge listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    /// Listeners in configuration order (syslog entries, then webhook entries).
    listeners: Vec<ListenerHandle>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn register(&mut self, handle: ListenerHandle) {
        self.listeners.push(handle);
    }

    /// Start all listeners in registration order.
    ///
    /// Returns an error on the first listener that fails to start.
    /// Already-started listeners are NOT rolled back; the caller should
    /// invoke `stop_all` if partial startup is unacceptable.
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        for handle in &mut self.listeners {
            if handle.started {
                continue;
            }

            tracing::info!(listener = %handle.name, destination = %handle.destination, "starting listener");
            handle.pipeline.start().await.map_err(|e| {
                anyhow::anyhow!("failed to start listener '{}': {}", handle.name, e)
            })?;
            handle.started = true;
        }
        Ok(())
    }

    /// Stop all started listeners in reverse registration order.
    ///
    /// Logs errors but continues stopping remaining listeners.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        for handle in self.listeners.iter_mut().rev() {
            if !handle.started {
                continue;
            }

            tracing::info!(listener = %handle.name, "stopping listener");
            handle.started = false;
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(listener = %handle.name, error = %e, "failed to stop listener");
                errors.push(format!("{}: {}", handle.name, e));
            }
        }

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping listeners: {}",
                errors.join("; ")
            ));
        }

        Ok(())
    }

    /// Get health status for all listeners.
    pub async fn health_statuses(&self) -> Vec<(String, HealthStatus)> {
        let mut statuses = Vec::with_capacity(self.listeners.len());
        for handle in &self.listeners {
            statuses.push((handle.name.clone(), handle.health_check().await));
        }
        statuses
    }

    /// Number of registered listeners.
    pub fn count(&self) -> usize {
        self.listeners.len()
    }

    /// Names of registered listeners, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.listeners.iter().map(|h| h.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logbridge_core::error::{LogbridgeError, PipelineError};
    use logbridge_core::pipeline::Pipeline;

    struct MockListener {
        running: bool,
        fail_start: bool,
    }

    impl MockListener {
        fn boxed(fail_start: bool) -> Box<dyn DynPipeline> {
            Box::new(Self {
                running: false,
                fail_start,
            })
        }
    }

    impl Pipeline for MockListener {
        async fn start(&mut self) -> Result<(), LogbridgeError> {
            if self.fail_start {
                return Err(PipelineError::InitFailed("bind refused".to_owned()).into());
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
                HealthStatus::Unhealthy("not running".to_owned())
            }
        }
    }

    #[tokio::test]
    async fn start_and_stop_all() {
        let mut registry = ListenerRegistry::new();
        registry.register(ListenerHandle::new("a", "k1", MockListener::boxed(false)));
        registry.register(ListenerHandle::new("b", "k1", MockListener::boxed(false)));

        registry.start_all().await.unwrap();
        let statuses = registry.health_statuses().await;
        assert!(statuses.iter().all(|(_, s)| s.is_healthy()));

        registry.stop_all().await.unwrap();
        let statuses = registry.health_statuses().await;
        assert!(statuses.iter().all(|(_, s)| s.is_unhealthy()));
    }

    #[tokio::test]
    async fn failed_start_leaves_only_earlier_listeners_started() {
        let mut registry = ListenerRegistry::new();
        registry.register(ListenerHandle::new("ok", "k1", MockListener::boxed(false)));
        registry.register(ListenerHandle::new("broken", "k1", MockListener::boxed(true)));
        registry.register(ListenerHandle::new("never", "k1", MockListener::boxed(false)));

        let err = registry.start_all().await.unwrap_err();
        assert!(err.to_string().contains("broken"));

        // rollback must only touch the listener that actually started
        registry.stop_all().await.unwrap();
        assert_eq!(registry.names(), vec!["ok", "broken", "never"]);
    }
}
