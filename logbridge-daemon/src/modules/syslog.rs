//! Syslog listener initialization.
//!
//! Builds one [`SyslogListener`] per `[[syslog]]` entry and binds it to
//! the route of the Kafka destination named by `kafka_id`.

use anyhow::Result;

use logbridge_core::config::LogbridgeConfig;
use logbridge_ingest::SyslogListener;
use logbridge_router::RoutingTable;

use super::ListenerHandle;

/// Initialize all configured syslog listeners.
///
/// Listeners are created but not started.
///
/// # Errors
///
/// Returns an error if an entry names an unknown destination or an
/// unsupported format/protocol.
pub fn init(config: &LogbridgeConfig, routing: &RoutingTable) -> Result<Vec<ListenerHandle>> {
    let mut handles = Vec::with_capacity(config.syslog.len());

    for (idx, syslog) in config.syslog.iter().enumerate() {
        let route = routing
            .route_for(&syslog.kafka_id)
            .map_err(|e| anyhow::anyhow!("syslog[{}]: {}", idx, e))?;
        let listener = SyslogListener::from_config(syslog, route)
            .map_err(|e| anyhow::anyhow!("syslog[{}]: {}", idx, e))?;

        let name = format!("{}:{}", listener.kind(), syslog.listen);
        tracing::info!(
            listener = %name,
            format = %syslog.format,
            destination = %syslog.kafka_id,
            "initializing syslog listener"
        );
        handles.push(ListenerHandle::new(name, &syslog.kafka_id, Box::new(listener)));
    }

    Ok(handles)
}
