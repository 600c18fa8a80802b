//! Prometheus metrics for the registry.
//!
//! All metrics follow the naming convention: `bc_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., transitions_committed_total)
//! - **Gauge**: Value that can go up or down (e.g., audit_backlog)
//! - **Histogram**: Distribution of values (e.g., transition_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

/// Transition latency buckets, 10ms to ~82s.
const DURATION_BUCKETS: &[f64] = &[
    0.01, 0.02, 0.04, 0.08, 0.16, 0.32, 0.64, 1.28, 2.56, 5.12, 10.24, 20.48, 40.96, 81.92,
];

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PROJECT METRICS (Component 4)
    // =========================================================================

    /// Projects accepted at `Submitted`
    pub static ref PROJECTS_SUBMITTED: Counter = Counter::new(
        "bc_workflow_projects_submitted_total",
        "Total number of projects submitted"
    ).expect("metric creation failed");

    /// Transitions proposed, by action
    pub static ref TRANSITIONS_PROPOSED: CounterVec = CounterVec::new(
        Opts::new("bc_workflow_transitions_proposed_total", "Signed actions presented"),
        &["action"]
    ).expect("metric creation failed");

    /// Transitions committed, by action
    pub static ref TRANSITIONS_COMMITTED: CounterVec = CounterVec::new(
        Opts::new("bc_workflow_transitions_committed_total", "Transitions committed after ledger confirmation"),
        &["action"]
    ).expect("metric creation failed");

    /// Transitions refused, by action and error kind
    pub static ref TRANSITIONS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("bc_workflow_transitions_rejected_total", "Proposals that did not commit"),
        &["action", "kind"]  // kind: stable ErrorKind tag
    ).expect("metric creation failed");

    /// End-to-end proposal latency
    pub static ref TRANSITION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "bc_workflow_transition_duration_seconds",
            "Time from proposal to commit or failure"
        ).buckets(DURATION_BUCKETS.to_vec()),
        &["action"]
    ).expect("metric creation failed");

    // =========================================================================
    // LEDGER METRICS (Component 5)
    // =========================================================================

    /// Ledger outcomes observed by proposals
    pub static ref LEDGER_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("bc_ledger_outcomes_total", "Ledger submissions by observed outcome"),
        &["outcome"]  // outcome: confirmed/reverted/timed_out/unavailable
    ).expect("metric creation failed");

    /// Credits minted on final approval
    pub static ref CREDITS_MINTED: Counter = Counter::new(
        "bc_ledger_credits_minted_total",
        "Total carbon credits minted"
    ).expect("metric creation failed");

    // =========================================================================
    // AUDIT METRICS (Component 6)
    // =========================================================================

    /// Commits whose audit append failed
    pub static ref AUDIT_APPEND_FAILURES: Counter = Counter::new(
        "bc_audit_append_failures_total",
        "Outcomes queued because the audit store was unavailable"
    ).expect("metric creation failed");

    /// Outcomes waiting for the audit store
    pub static ref AUDIT_BACKLOG: Gauge = Gauge::new(
        "bc_audit_backlog",
        "Committed outcomes not yet in the audit trail"
    ).expect("metric creation failed");

    // =========================================================================
    // HIERARCHY METRICS (Component 1)
    // =========================================================================

    /// Link changes by operation
    pub static ref LINK_CHANGES: CounterVec = CounterVec::new(
        Opts::new("bc_hierarchy_link_changes_total", "Verifier link assignments and revocations"),
        &["operation"]  // operation: assign/replace/revoke
    ).expect("metric creation failed");
}

/// Handle proving the collectors are registered.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    pub fn gather(&self) -> Result<String, TelemetryError> {
        encode(&self.registry)
    }
}

/// Register all metrics with the global registry.
///
/// Registering twice is tolerated: the existing registration is reused.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Workflow
        Box::new(PROJECTS_SUBMITTED.clone()),
        Box::new(TRANSITIONS_PROPOSED.clone()),
        Box::new(TRANSITIONS_COMMITTED.clone()),
        Box::new(TRANSITIONS_REJECTED.clone()),
        Box::new(TRANSITION_DURATION.clone()),
        // Ledger
        Box::new(LEDGER_OUTCOMES.clone()),
        Box::new(CREDITS_MINTED.clone()),
        // Audit
        Box::new(AUDIT_APPEND_FAILURES.clone()),
        Box::new(AUDIT_BACKLOG.clone()),
        // Hierarchy
        Box::new(LINK_CHANGES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

/// Encode all registered metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    encode(&REGISTRY)
}

fn encode(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
