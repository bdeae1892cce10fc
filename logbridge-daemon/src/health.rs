//! Aggregated health check reporting.
//!
//! Collects each listener's `health_check()` and each destination's
//! queue state into a unified [`DaemonHealth`] report. The overall
//! daemon status is the worst status among all components.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use std::fmt;

use serde::Serialize;

use logbridge_core::pipeline::HealthStatus;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all components).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-component health reports, listeners first.
    pub components: Vec<ComponentHealth>,
}

/// What a health report entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Inbound syslog or webhook listener.
    Listener,
    /// Outbound destination queue and worker.
    Destination,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listener => write!(f, "listener"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// Health status for a single listener or destination.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component name (e.g., "syslog-udp:0.0.0.0:514", "kafka-events").
    pub name: String,
    /// Listener or destination.
    pub kind: ComponentKind,
    /// Current health status of the component.
    pub status: HealthStatus,
}

impl ComponentHealth {
    /// Health entry for a listener.
    pub fn listener(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::Listener,
            status,
        }
    }

    /// Health entry for a destination.
    pub fn destination(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::Destination,
            status,
        }
    }
}

/// Aggregate multiple component health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Reasons are prefixed with `kind name` and joined with `"; "`.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut degraded = Vec::new();
    let mut unhealthy = Vec::new();

    for component in components {
        match &component.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                degraded.push(format!("{} {}: {}", component.kind, component.name, reason));
                if !worst.is_unhealthy() {
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                unhealthy.push(format!("{} {}: {}", component.kind, component.name, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(degraded.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(unhealthy.join("; ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_healthy() {
        assert_eq!(aggregate_status(&[]), HealthStatus::Healthy);
    }

    #[test]
    fn unhealthy_wins_and_lists_only_unhealthy_reasons() {
        let components = vec![
            ComponentHealth::destination("k1", HealthStatus::Degraded("queue 95/100".to_owned())),
            ComponentHealth::listener("syslog-udp", HealthStatus::Unhealthy("stopped".to_owned())),
        ];
        assert_eq!(
            aggregate_status(&components),
            HealthStatus::Unhealthy("listener syslog-udp: stopped".to_owned())
        );
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&ComponentKind::Destination).unwrap();
        assert_eq!(json, "\"destination\"");
    }
}
