//! Webhook listener initialization.

use anyhow::Result;

use logbridge_core::config::LogbridgeConfig;
use logbridge_ingest::WebhookListener;
use logbridge_router::RoutingTable;

use super::ListenerHandle;

/// Initialize all configured webhook listeners.
///
/// Listeners are created but not started; TLS material is loaded on start.
pub fn init(config: &LogbridgeConfig, routing: &RoutingTable) -> Result<Vec<ListenerHandle>> {
    let mut handles = Vec::with_capacity(config.webhook.len());

    for (idx, webhook) in config.webhook.iter().enumerate() {
        let route = routing
            .route_for(&webhook.kafka_id)
            .map_err(|e| anyhow::anyhow!("webhook[{}]: {}", idx, e))?;

        let name = format!("webhook:{}{}", webhook.listen, webhook.path);
        tracing::info!(
            listener = %name,
            tls = webhook.is_https(),
            destination = %webhook.kafka_id,
            "initializing webhook listener"
        );
        let listener = WebhookListener::new(webhook.clone(), route);
        handles.push(ListenerHandle::new(name, &webhook.kafka_id, Box::new(listener)));
    }

    Ok(handles)
}
