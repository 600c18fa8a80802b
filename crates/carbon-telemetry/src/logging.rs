//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber with an `EnvFilter` and either a
//! human-readable or a JSON formatter. JSON lines carry `timestamp`, `level`,
//! `target`, `fields.message` and every structured field the components
//! attach (`project`, `tx_hash`, `signer`, ...).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Initialize the global subscriber.
///
/// Fails with `TelemetryError::SubscriberInit` if one is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("log filter {:?}: {e}", config.log_level)))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_filter_is_config_error() {
        let config = TelemetryConfig {
            log_level: "bc_04_project_workflow=loudest".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(TelemetryError::Config(_))
        ));
    }
}
