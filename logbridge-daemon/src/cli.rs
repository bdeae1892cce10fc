//! CLI argument definitions for logbridge-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use logbridge_core::config::LogbridgeConfig;

/// logbridge syslog/webhook to Kafka forwarding daemon.
///
/// Receives syslog (udp, tcp, unixgram) and HTTP(S) webhook messages and
/// forwards them to the Kafka topics configured per listener.
#[derive(Parser, Debug)]
#[command(name = "logbridge-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the configuration file (TOML, or YAML for .yaml/.yml).
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply_overrides(&self, config: &mut LogbridgeConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["logbridge-daemon"]);
        assert_eq!(cli.config, PathBuf::from("config.toml"));
        assert!(!cli.validate);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn overrides_take_precedence() {
        let cli = DaemonCli::parse_from([
            "logbridge-daemon",
            "-c",
            "/etc/logbridge/logbridge.yaml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--pid-file",
            "/tmp/lb.pid",
            "--validate",
        ]);
        assert!(cli.validate);

        let mut config = LogbridgeConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.general.pid_file, "/tmp/lb.pid");
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        DaemonCli::command().debug_assert();
    }
}
