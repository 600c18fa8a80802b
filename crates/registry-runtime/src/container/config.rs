//! # Registry Configuration
//!
//! Unified configuration for every component and the runtime.
//!
//! All timeouts and limits have sane defaults; each can be overridden from
//! the environment (`BC_*` variables) and a few from the command line.

use bc_02_signature_codec::FreshnessWindow;
use bc_04_project_workflow::WorkflowConfig;
use bc_05_ledger_orchestrator::OrchestratorConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Complete registry configuration.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Signature freshness configuration.
    pub security: SecurityConfig,
    /// Ledger submission and confirmation.
    pub ledger: LedgerConfig,
    /// Audit trail storage.
    pub audit: AuditConfig,
    /// Content store calls.
    pub content: ContentStoreConfig,
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid value")]
    InvalidValue { var: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl RegistryConfig {
    /// Defaults overridden by `BC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `BC_FRESHNESS_WINDOW_SECS` | `security.freshness_window_secs` |
    /// | `BC_MAX_FUTURE_SKEW_SECS` | `security.max_future_skew_secs` |
    /// | `BC_CONFIRMATION_TIMEOUT_MS` | `ledger.confirmation_timeout_ms` |
    /// | `BC_POLL_INTERVAL_MS` | `ledger.poll_interval_ms` |
    /// | `BC_MAX_SUBMIT_ATTEMPTS` | `ledger.max_submit_attempts` |
    /// | `BC_SUBMIT_BACKOFF_MS` | `ledger.submit_backoff_ms` |
    /// | `BC_RECONCILE_INTERVAL_MS` | `ledger.reconcile_interval_ms` |
    /// | `BC_AUDIT_DIR` | `audit.data_dir` |
    /// | `BC_AUDIT_APPEND_ATTEMPTS` | `audit.append_attempts` |
    /// | `BC_CONTENT_TIMEOUT_MS` | `content.timeout_ms` |
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let security = &mut config.security;
        override_from(&lookup, "BC_FRESHNESS_WINDOW_SECS", &mut security.freshness_window_secs)?;
        override_from(&lookup, "BC_MAX_FUTURE_SKEW_SECS", &mut security.max_future_skew_secs)?;

        let ledger = &mut config.ledger;
        override_from(&lookup, "BC_CONFIRMATION_TIMEOUT_MS", &mut ledger.confirmation_timeout_ms)?;
        override_from(&lookup, "BC_POLL_INTERVAL_MS", &mut ledger.poll_interval_ms)?;
        override_from(&lookup, "BC_MAX_SUBMIT_ATTEMPTS", &mut ledger.max_submit_attempts)?;
        override_from(&lookup, "BC_SUBMIT_BACKOFF_MS", &mut ledger.submit_backoff_ms)?;
        override_from(&lookup, "BC_RECONCILE_INTERVAL_MS", &mut ledger.reconcile_interval_ms)?;

        if let Some(dir) = lookup("BC_AUDIT_DIR").filter(|d| !d.is_empty()) {
            config.audit.data_dir = Some(PathBuf::from(dir));
        }
        override_from(&lookup, "BC_AUDIT_APPEND_ATTEMPTS", &mut config.audit.append_attempts)?;
        override_from(&lookup, "BC_CONTENT_TIMEOUT_MS", &mut config.content.timeout_ms)?;
        Ok(config)
    }

    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            (self.security.freshness_window_secs, "security.freshness_window_secs"),
            (self.ledger.confirmation_timeout_ms, "ledger.confirmation_timeout_ms"),
            (self.ledger.poll_interval_ms, "ledger.poll_interval_ms"),
            (u64::from(self.ledger.max_submit_attempts), "ledger.max_submit_attempts"),
            (self.ledger.reconcile_interval_ms, "ledger.reconcile_interval_ms"),
            (u64::from(self.audit.append_attempts), "audit.append_attempts"),
            (self.content.timeout_ms, "content.timeout_ms"),
        ];
        for (value, name) in nonzero {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }

    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig {
            confirmation_timeout: Duration::from_millis(self.ledger.confirmation_timeout_ms),
            content_timeout: Duration::from_millis(self.content.timeout_ms),
        }
    }
}

fn override_from<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(var) {
        *target = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value,
        })?;
    }
    Ok(())
}

/// Security configuration.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Maximum signed-action age in seconds.
    pub freshness_window_secs: u64,
    /// Maximum future timestamp skew in seconds.
    pub max_future_skew_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: 300,
            max_future_skew_secs: 30,
        }
    }
}

impl SecurityConfig {
    pub fn freshness_window(&self) -> FreshnessWindow {
        FreshnessWindow::from_secs(self.freshness_window_secs, self.max_future_skew_secs)
    }
}

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// How long one proposal waits for its receipt.
    pub confirmation_timeout_ms: u64,
    /// Receipt polling interval.
    pub poll_interval_ms: u64,
    /// Send attempts before the ledger counts as unavailable.
    pub max_submit_attempts: u32,
    /// Linear backoff step between send attempts.
    pub submit_backoff_ms: u64,
    /// How often the runtime retries unconfirmed transitions and the audit
    /// backlog in the background.
    pub reconcile_interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: 30_000,
            poll_interval_ms: 500,
            max_submit_attempts: 3,
            submit_backoff_ms: 200,
            reconcile_interval_ms: 15_000,
        }
    }
}

impl LedgerConfig {
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_submit_attempts: self.max_submit_attempts,
            submit_backoff: Duration::from_millis(self.submit_backoff_ms),
        }
    }
}

/// Audit configuration.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Directory of the JSON-lines audit log; in-memory when `None`.
    pub data_dir: Option<PathBuf>,
    /// Append attempts before an outcome goes to the backlog.
    pub append_attempts: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            append_attempts: 3,
        }
    }
}

/// Content store configuration.
#[derive(Debug, Clone)]
pub struct ContentStoreConfig {
    /// Bound on each put/get.
    pub timeout_ms: u64,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.security.freshness_window_secs, 300);
        assert_eq!(config.ledger.confirmation_timeout_ms, 30_000);
        assert_eq!(config.audit.append_attempts, 3);
        assert!(config.audit.data_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = RegistryConfig::from_lookup(lookup(&[
            ("BC_FRESHNESS_WINDOW_SECS", "60"),
            ("BC_POLL_INTERVAL_MS", " 250 "),
            ("BC_AUDIT_DIR", "/var/lib/registry"),
        ]))
        .unwrap();
        assert_eq!(config.security.freshness_window_secs, 60);
        assert_eq!(config.ledger.poll_interval_ms, 250);
        assert_eq!(config.audit.data_dir, Some(PathBuf::from("/var/lib/registry")));
        assert_eq!(config.security.freshness_window().max_age_ms, 60_000);
    }

    #[test]
    fn test_invalid_value_names_variable() {
        let err = RegistryConfig::from_lookup(lookup(&[("BC_MAX_SUBMIT_ATTEMPTS", "many")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "BC_MAX_SUBMIT_ATTEMPTS".into(),
                value: "many".into()
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = RegistryConfig::default();
        config.content.timeout_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("content.timeout_ms")));
    }
}
