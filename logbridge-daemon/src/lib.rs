//! logbridge-daemon library -- exposes the orchestrator for integration tests.

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod modules;
pub mod orchestrator;
