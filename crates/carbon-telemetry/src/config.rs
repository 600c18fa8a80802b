//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `info,bc_04_project_workflow=debug`
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Register the Prometheus collectors
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "bluecarbon-registry".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BC_SERVICE_NAME`: Service name (default: bluecarbon-registry)
    /// - `BC_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `BC_JSON_LOGS`: JSON output (default: false, true in containers)
    /// - `BC_METRICS_ENABLED`: Register metrics (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("BC_SERVICE_NAME")
                .unwrap_or_else(|_| "bluecarbon-registry".to_string()),

            log_level: env::var("BC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("BC_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            metrics_enabled: env::var("BC_METRICS_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "bluecarbon-registry");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }
}
