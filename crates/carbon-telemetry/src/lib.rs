//! # Carbon Telemetry
//!
//! Logging and metrics for the BlueCarbon registry.
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter`, human or JSON output
//! - **Metrics**: Prometheus collectors on a process-wide registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use carbon_telemetry::{TelemetryConfig, init_telemetry};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_telemetry(config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BC_SERVICE_NAME` | `bluecarbon-registry` | Service name in logs |
//! | `BC_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `BC_JSON_LOGS` | `false` | JSON log lines |
//! | `BC_METRICS_ENABLED` | `true` | Register Prometheus collectors |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, HistogramTimer, MetricsHandle, AUDIT_APPEND_FAILURES,
    AUDIT_BACKLOG, CREDITS_MINTED, LEDGER_OUTCOMES, LINK_CHANGES, PROJECTS_SUBMITTED,
    TRANSITIONS_COMMITTED, TRANSITIONS_PROPOSED, TRANSITIONS_REJECTED, TRANSITION_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, if enabled, metrics.
///
/// Calling it a second time returns `SubscriberInit` instead of panicking.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    logging::init_logging(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        metrics,
    })
}

/// Guard that keeps telemetry active for the life of the process.
pub struct TelemetryGuard {
    service_name: String,
    metrics: Option<MetricsHandle>,
}

impl TelemetryGuard {
    pub fn metrics(&self) -> Option<&MetricsHandle> {
        self.metrics.as_ref()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
