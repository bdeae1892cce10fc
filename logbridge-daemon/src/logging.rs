//! Logging initialization for logbridge-daemon.
//!
//! One global `tracing-subscriber` registry: an `EnvFilter` plus a
//! JSON or pretty fmt layer chosen by `general.log_format`.

use anyhow::{Result, bail};
use tracing_subscriber::{EnvFilter, fmt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logbridge_core::config::GeneralConfig;

/// Build the level filter: `RUST_LOG` wins over the configured level.
fn env_filter(config: &GeneralConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Initialize the global tracing subscriber from `[general]`.
///
/// Must be called exactly once, before any tracing macros are used.
/// `log_format` selects JSON lines (`"json"`, production) or
/// human-readable output (`"pretty"`, development).
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let initialized = match config.log_format.as_str() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        "pretty" => registry.with(fmt::layer().pretty()).try_init(),
        other => bail!("unknown log format '{}', expected 'json' or 'pretty'", other),
    };

    initialized.map_err(|e| {
        anyhow::anyhow!(
            "failed to initialize {} tracing subscriber: {}",
            config.log_format,
            e
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..Default::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format 'xml'"));
    }
}
