//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for the node's log output.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Name this node identifies itself as in logs.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error), or a full
    /// `tracing_subscriber::EnvFilter` directive string.
    pub log_level: String,

    /// Emit one JSON object per line instead of the human-readable format.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "trustchain-node".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Build configuration from `LEDGER_LOG`/`RUST_LOG` and `LEDGER_JSON_LOGS`.
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("LEDGER_SERVICE_NAME")
                .unwrap_or_else(|_| "trustchain-node".to_string()),
            log_level: env::var("LEDGER_LOG")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            json_logs: env::var("LEDGER_JSON_LOGS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Configuration tagged with a node id, for a multi-node test harness
    /// where several loggers run in the same process.
    pub fn for_node(node_label: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("trustchain-node-{node_label}");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn for_node_tags_service_name() {
        let config = TelemetryConfig::for_node("3");
        assert_eq!(config.service_name, "trustchain-node-3");
    }
}
