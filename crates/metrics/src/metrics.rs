use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

lazy_static! {
    // ═══════════════════════════════════════════════════════════════════════════
    // RECOVERY METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Total number of recovery runs started
    pub static ref RECOVERIES_STARTED: IntCounter = register_int_counter!(
        "ctrl_ha_recoveries_started_total",
        "Total number of recovery runs started"
    )
    .expect("register ctrl_ha_recoveries_started_total");

    /// Recovery runs by outcome
    pub static ref RECOVERY_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        "ctrl_ha_recovery_outcomes_total",
        "Recovery runs by outcome",
        &["outcome"]
    )
    .expect("register ctrl_ha_recovery_outcomes_total");

    /// Failed recovery runs by stage and failure kind
    pub static ref RECOVERY_FAILURES: IntCounterVec = register_int_counter_vec!(
        "ctrl_ha_recovery_failures_total",
        "Failed recovery runs by stage and kind",
        &["stage", "kind"]
    )
    .expect("register ctrl_ha_recovery_failures_total");

    /// Recovery duration histogram (in seconds)
    pub static ref RECOVERY_DURATION: Histogram = register_histogram!(
        "ctrl_ha_recovery_duration_seconds",
        "Recovery duration in seconds",
        vec![30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1200.0]
    )
    .expect("register ctrl_ha_recovery_duration_seconds");

    // ═══════════════════════════════════════════════════════════════════════════
    // CONTROLLER API METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Login attempts by result
    pub static ref LOGIN_ATTEMPTS: IntCounterVec = register_int_counter_vec!(
        "ctrl_ha_login_attempts_total",
        "Controller login attempts by result",
        &["result"]
    )
    .expect("register ctrl_ha_login_attempts_total");

    /// Restore loop iterations by classified reason
    pub static ref RESTORE_POLLS: IntCounterVec = register_int_counter_vec!(
        "ctrl_ha_restore_polls_total",
        "Restore loop iterations by reason code",
        &["reason"]
    )
    .expect("register ctrl_ha_restore_polls_total");

    /// Calls treated as successful after the controller dropped the connection
    pub static ref PRESUMPTIVE_SUCCESSES: IntCounterVec = register_int_counter_vec!(
        "ctrl_ha_presumptive_successes_total",
        "Calls presumed successful after the connection was closed",
        &["call"]
    )
    .expect("register ctrl_ha_presumptive_successes_total");

    // ═══════════════════════════════════════════════════════════════════════════
    // GUARD METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Ingress guard events (opened, pre-existing, reverted, revert failed)
    pub static ref GUARD_EVENTS: IntCounterVec = register_int_counter_vec!(
        "ctrl_ha_guard_events_total",
        "Management ingress guard events",
        &["event"]
    )
    .expect("register ctrl_ha_guard_events_total");

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Best-effort side tasks that failed or timed out
    pub static ref SIDE_TASK_FAILURES: IntCounter = register_int_counter!(
        "ctrl_ha_side_task_failures_total",
        "Best-effort side tasks that failed or timed out"
    )
    .expect("register ctrl_ha_side_task_failures_total");

    /// Error-level log events by failure kind
    pub static ref ERROR_EVENTS: IntCounterVec = register_int_counter_vec!(
        "ctrl_ha_error_events_total",
        "Error-level log events",
        &["kind"]
    )
    .expect("register ctrl_ha_error_events_total");
}
