use std::time::Duration;

use ctrl_ha_types::RecoveryOutcome;
use prometheus::{Encoder, TextEncoder};

use crate::metrics::*;

/// Metrics collector for recovery runs
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RECOVERY METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_recovery_started(&self) {
        RECOVERIES_STARTED.inc();
    }

    /// Record the single outcome of a run and how long it took
    pub fn record_recovery_outcome(&self, outcome: &RecoveryOutcome, duration: Duration) {
        RECOVERY_OUTCOMES.with_label_values(&[outcome.label()]).inc();

        if let RecoveryOutcome::Failed { stage, kind, .. } = outcome {
            RECOVERY_FAILURES
                .with_label_values(&[stage.as_str(), kind.as_str()])
                .inc();
        }

        RECOVERY_DURATION.observe(duration.as_secs_f64());
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONTROLLER API METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_login_attempt(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        LOGIN_ATTEMPTS.with_label_values(&[result]).inc();
    }

    /// Record one restore loop iteration and the reason it saw
    pub fn record_restore_poll(&self, reason_code: &str) {
        RESTORE_POLLS.with_label_values(&[reason_code]).inc();
    }

    pub fn record_presumptive_success(&self, call: &str) {
        PRESUMPTIVE_SUCCESSES.with_label_values(&[call]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // GUARD METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_guard_event(&self, event: GuardEvent) {
        GUARD_EVENTS.with_label_values(&[event.as_str()]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_side_task_failure(&self) {
        SIDE_TASK_FAILURES.inc();
    }

    pub fn record_error_event(&self, kind: &str) {
        ERROR_EVENTS.with_label_values(&[kind]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Ingress guard events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardEvent {
    /// Rule created by this run
    Opened,

    /// Rule already present, or not needed in private access mode
    PreExisting,

    Reverted,

    /// Rule was already gone at revert time
    AlreadyGone,

    RevertFailed,
}

impl GuardEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardEvent::Opened => "opened",
            GuardEvent::PreExisting => "pre_existing",
            GuardEvent::Reverted => "reverted",
            GuardEvent::AlreadyGone => "already_gone",
            GuardEvent::RevertFailed => "revert_failed",
        }
    }
}

/// Metrics error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
}
