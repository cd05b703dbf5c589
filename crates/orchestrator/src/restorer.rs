//! Account provisioning and backup restore on the new controller.
//!
//! The loop is driven by [`RestoreState`]. Each iteration makes the one call
//! the state calls for and feeds the reply through [`transition`], which
//! decides the next state and what the loop does before its next call.
//! Progress lives in the state, so losing the session never repeats a
//! confirmed step.

use std::sync::Arc;
use std::time::Duration;

use ctrl_ha_controller::{
    classify_reason, is_duplicate_account, AccountProfile, ApiError, ApiResponse,
    ControllerSession, PollAction, ReasonCode, RestoreRequest, WaitHint,
};
use ctrl_ha_metrics::MetricsCollector;
use ctrl_ha_retry::{Deadline, DeadlineExceeded, PollBudget};
use ctrl_ha_types::RecoveryStage;
use tracing::{debug, info, warn};

use crate::bootstrap::BootstrapResult;
use crate::error::RecoveryError;
use crate::progress::StageTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    /// Waiting for the controller to report bootstrap complete
    AwaitingBootstrap,

    /// Registering the scratch account
    ProvisioningAccount,

    /// Account confirmed; issuing the restore
    Restoring,

    Restored,
}

impl RestoreState {
    pub fn initial(bootstrap: BootstrapResult) -> Self {
        match bootstrap {
            BootstrapResult::AlreadyDone => RestoreState::ProvisioningAccount,
            BootstrapResult::Started => RestoreState::AwaitingBootstrap,
        }
    }

    /// State after the current step is confirmed
    fn advance(self) -> Self {
        match self {
            RestoreState::AwaitingBootstrap => RestoreState::ProvisioningAccount,
            RestoreState::ProvisioningAccount => RestoreState::Restoring,
            RestoreState::Restoring | RestoreState::Restored => RestoreState::Restored,
        }
    }

    /// Recovery stage reached once this state is entered
    pub fn stage(&self) -> RecoveryStage {
        match self {
            RestoreState::AwaitingBootstrap => RecoveryStage::VersionResolved,
            RestoreState::ProvisioningAccount => RecoveryStage::BootstrapComplete,
            RestoreState::Restoring => RecoveryStage::AccountReady,
            RestoreState::Restored => RecoveryStage::Restored,
        }
    }
}

/// What the loop does after a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Make the next state's call right away
    Proceed,

    Wait(WaitHint),

    /// Drop the session and log in again
    Reauthenticate,

    Finish,

    Abort(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: RestoreState,
    pub action: NextAction,

    /// Metrics label of the reply that caused this transition
    pub observed: &'static str,
}

/// Decide the next state from the reply to the current state's call
pub fn transition(state: RestoreState, response: &ApiResponse) -> Transition {
    let reason = response.reason_str();
    let confirmed = response.ok
        || (state == RestoreState::ProvisioningAccount && is_duplicate_account(reason));

    if confirmed {
        let next = state.advance();
        return Transition {
            state: next,
            action: if next == RestoreState::Restored {
                NextAction::Finish
            } else {
                NextAction::Proceed
            },
            observed: "ok",
        };
    }

    // A bare negative status check only means bootstrap is still running
    let code = if state == RestoreState::AwaitingBootstrap && reason.trim().is_empty() {
        ReasonCode::SetupNotRun
    } else {
        classify_reason(reason)
    };

    let action = match code.action() {
        PollAction::KeepPolling(hint) => NextAction::Wait(hint),
        PollAction::Reauthenticate => NextAction::Reauthenticate,
        PollAction::Abort => NextAction::Abort(reason.to_string()),
    };

    Transition {
        state,
        action,
        observed: code.as_str(),
    }
}

/// Inputs and pacing of the restore loop
#[derive(Debug, Clone)]
pub struct RestoreSettings {
    pub account: AccountProfile,
    pub request: RestoreRequest,
    pub customer_id: Option<String>,

    /// Cap on accumulated waiting
    pub restore_wait: Duration,

    /// `WaitHint::Short`
    pub poll_delay: Duration,

    /// `WaitHint::Long`
    pub retry_delay: Duration,

    /// Wait before logging back in after a session loss
    pub reconnect_delay: Duration,
}

impl RestoreSettings {
    fn delay(&self, hint: WaitHint) -> Duration {
        match hint {
            WaitHint::Short => self.poll_delay,
            WaitHint::Long => self.retry_delay,
        }
    }
}

pub struct BackupRestorer {
    settings: RestoreSettings,
    metrics: Arc<MetricsCollector>,
}

impl BackupRestorer {
    pub fn new(settings: RestoreSettings, metrics: Arc<MetricsCollector>) -> Self {
        Self { settings, metrics }
    }

    /// Drive the controller from `start` to a restored backup.
    ///
    /// Starts with a fresh login, since bootstrap invalidates earlier tokens.
    /// Returns the time spent waiting.
    pub async fn run(
        &self,
        session: &mut ControllerSession,
        start: RestoreState,
        deadline: &Deadline,
        tracker: &mut StageTracker,
    ) -> Result<Duration, RecoveryError> {
        let mut budget = PollBudget::new(self.settings.restore_wait);
        let mut state = start;
        session.invalidate();

        while !budget.is_exhausted() {
            deadline.check()?;

            if !session.is_authenticated() {
                match session.authenticate().await {
                    Ok(_) => self.metrics.record_login_attempt(true),
                    Err(e) => {
                        self.metrics.record_login_attempt(false);
                        warn!(error = %e, "Login failed during restore, retrying");
                        budget.wait(self.settings.poll_delay).await;
                        continue;
                    }
                }
            }

            let response = self.call(state, session).await;
            let step = transition(state, &response);
            self.metrics.record_restore_poll(step.observed);

            if step.state != state {
                // The caller records the terminal stage once the result is persisted
                if !step.state.stage().is_terminal() {
                    tracker.advance(step.state.stage(), None).await;
                }
                state = step.state;
            }

            match step.action {
                NextAction::Proceed => {}
                NextAction::Finish => {
                    info!(waited_secs = budget.spent().as_secs(), "Backup restored");
                    return Ok(budget.spent());
                }
                NextAction::Wait(hint) => {
                    info!(
                        state = ?state,
                        reason = %response.reason_str(),
                        observed = step.observed,
                        "Controller not ready, polling again"
                    );
                    budget.wait(self.settings.delay(hint)).await;
                }
                NextAction::Reauthenticate => {
                    warn!(reason = %response.reason_str(), "Controller session lost, logging in again");
                    session.invalidate();
                    budget.wait(self.settings.reconnect_delay).await;
                }
                NextAction::Abort(reason) => {
                    return Err(RecoveryError::fatal_remote(format!(
                        "restoring backup failed: {reason}"
                    )));
                }
            }
        }

        Err(DeadlineExceeded {
            elapsed: budget.spent(),
            budget: budget.cap(),
        }
        .into())
    }

    /// The one call `state` calls for, with transport failures folded into
    /// a reply
    async fn call(&self, state: RestoreState, session: &ControllerSession) -> ApiResponse {
        let token = match session.require() {
            Ok(token) => token,
            Err(e) => return ApiResponse::failure(e.to_string()),
        };
        let api = session.api();

        match state {
            RestoreState::AwaitingBootstrap => api
                .initial_setup_check(token)
                .await
                .unwrap_or_else(|e| ApiResponse::failure(e.to_string())),

            RestoreState::ProvisioningAccount => {
                debug!(account = %self.settings.account.account_name, "Creating scratch account");
                match api.setup_account_profile(token, &self.settings.account).await {
                    Ok(response) => {
                        if is_duplicate_account(response.reason_str()) {
                            info!(
                                account = %self.settings.account.account_name,
                                "Scratch account already exists"
                            );
                        }
                        response
                    }
                    Err(ApiError::ConnectionClosed(detail)) => {
                        warn!(detail = %detail, "Connection closed creating account, presuming it was created");
                        self.metrics.record_presumptive_success("setup_account_profile");
                        ApiResponse::presumed_success()
                    }
                    Err(e) => ApiResponse::failure(e.to_string()),
                }
            }

            RestoreState::Restoring => {
                if let Some(customer_id) = &self.settings.customer_id {
                    match api.setup_customer_id(token, customer_id).await {
                        Ok(response) if response.ok => debug!("Customer id applied"),
                        Ok(response) => {
                            warn!(reason = %response.reason_str(), "Setting customer id failed")
                        }
                        Err(e) => warn!(error = %e, "Setting customer id failed"),
                    }
                }

                info!(
                    file = %self.settings.request.file_name,
                    bucket = %self.settings.request.bucket_name,
                    "Restoring backup"
                );
                match api.restore_config(token, &self.settings.request).await {
                    Ok(response) => response,
                    Err(ApiError::ConnectionClosed(detail)) => {
                        warn!(detail = %detail, "Connection closed during restore, presuming it succeeded");
                        self.metrics.record_presumptive_success("restore_config");
                        ApiResponse::presumed_success()
                    }
                    Err(e) => ApiResponse::failure(e.to_string()),
                }
            }

            RestoreState::Restored => ApiResponse::success(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(reason: &str) -> ApiResponse {
        ApiResponse::failure(reason)
    }

    #[test]
    fn test_confirmed_steps_advance() {
        let ok = ApiResponse::success();

        let t = transition(RestoreState::AwaitingBootstrap, &ok);
        assert_eq!(t.state, RestoreState::ProvisioningAccount);
        assert_eq!(t.action, NextAction::Proceed);

        let t = transition(RestoreState::ProvisioningAccount, &ok);
        assert_eq!(t.state, RestoreState::Restoring);

        let t = transition(RestoreState::Restoring, &ok);
        assert_eq!(t.state, RestoreState::Restored);
        assert_eq!(t.action, NextAction::Finish);
    }

    #[test]
    fn test_duplicate_account_counts_as_created() {
        let t = transition(
            RestoreState::ProvisioningAccount,
            &failure("Account tempacc already exists"),
        );
        assert_eq!(t.state, RestoreState::Restoring);
        assert_eq!(t.action, NextAction::Proceed);
    }

    #[test]
    fn test_duplicate_reason_does_not_confirm_restore() {
        let t = transition(RestoreState::Restoring, &failure("Account tempacc already exists"));
        assert_eq!(t.state, RestoreState::Restoring);
        assert!(matches!(t.action, NextAction::Abort(_)));
    }

    #[test]
    fn test_reason_table_actions() {
        let cases = [
            ("account_password required.", NextAction::Wait(WaitHint::Long)),
            ("valid action required", NextAction::Wait(WaitHint::Long)),
            ("CID is invalid or expired.", NextAction::Reauthenticate),
            (
                "Invalid session. Please login again.",
                NextAction::Reauthenticate,
            ),
            ("Session abc123 expired", NextAction::Reauthenticate),
            ("Session abc123 not found.", NextAction::Reauthenticate),
            ("not run", NextAction::Wait(WaitHint::Short)),
            (
                "Remote end closed connection without response",
                NextAction::Wait(WaitHint::Short),
            ),
            (
                "HTTPSConnectionPool: Max retries exceeded with url",
                NextAction::Wait(WaitHint::Long),
            ),
            (
                "Failed to establish a new connection: [Errno 111]",
                NextAction::Wait(WaitHint::Long),
            ),
        ];

        for (reason, expected) in cases {
            let t = transition(RestoreState::Restoring, &failure(reason));
            assert_eq!(t.action, expected, "reason {reason:?}");
            assert_eq!(t.state, RestoreState::Restoring);
        }
    }

    #[test]
    fn test_unlisted_reason_aborts() {
        let t = transition(RestoreState::Restoring, &failure("Backup file is corrupted"));
        assert_eq!(
            t.action,
            NextAction::Abort("Backup file is corrupted".to_string())
        );
        assert_eq!(t.observed, "unclassified");
    }

    #[test]
    fn test_bare_negative_check_keeps_waiting() {
        let t = transition(
            RestoreState::AwaitingBootstrap,
            &ApiResponse {
                ok: false,
                reason: None,
            },
        );
        assert_eq!(t.state, RestoreState::AwaitingBootstrap);
        assert_eq!(t.action, NextAction::Wait(WaitHint::Short));
    }

    #[test]
    fn test_transport_failures_classify() {
        let closed = ApiError::ConnectionClosed("eof".into()).to_string();
        let t = transition(RestoreState::AwaitingBootstrap, &failure(&closed));
        assert_eq!(t.action, NextAction::Wait(WaitHint::Short));

        let refused = ApiError::ConnectFailed("refused".into()).to_string();
        let t = transition(RestoreState::ProvisioningAccount, &failure(&refused));
        assert_eq!(t.action, NextAction::Wait(WaitHint::Long));
    }

    #[test]
    fn test_initial_state_and_stages() {
        assert_eq!(
            RestoreState::initial(BootstrapResult::AlreadyDone),
            RestoreState::ProvisioningAccount
        );
        assert_eq!(
            RestoreState::initial(BootstrapResult::Started),
            RestoreState::AwaitingBootstrap
        );
        assert_eq!(
            RestoreState::ProvisioningAccount.stage(),
            RecoveryStage::BootstrapComplete
        );
        assert_eq!(RestoreState::Restoring.stage(), RecoveryStage::AccountReady);
    }
}
