/// Known failure reasons reported by the controller while it boots,
/// bootstraps and restores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    /// API is up but not yet accepting account calls
    AccountPasswordRequired,

    /// API is up but not yet routing actions
    ValidActionRequired,

    /// Session token no longer valid
    SessionExpired,

    /// Bootstrap has not finished
    SetupNotRun,

    /// Peer closed the connection mid-response
    ConnectionClosed,

    /// Controller unreachable
    ConnectFailed,

    /// Anything else
    Unclassified,
}

/// How long to wait before the next poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitHint {
    /// The poll step (10s by default)
    Short,

    /// The retry step (30s by default)
    Long,
}

/// What the restore loop does with a reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    KeepPolling(WaitHint),
    Reauthenticate,
    Abort,
}

impl ReasonCode {
    pub fn action(&self) -> PollAction {
        match self {
            ReasonCode::AccountPasswordRequired | ReasonCode::ValidActionRequired => {
                PollAction::KeepPolling(WaitHint::Long)
            }
            ReasonCode::SessionExpired => PollAction::Reauthenticate,
            ReasonCode::SetupNotRun | ReasonCode::ConnectionClosed => {
                PollAction::KeepPolling(WaitHint::Short)
            }
            ReasonCode::ConnectFailed => PollAction::KeepPolling(WaitHint::Long),
            ReasonCode::Unclassified => PollAction::Abort,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::AccountPasswordRequired => "account_password_required",
            ReasonCode::ValidActionRequired => "valid_action_required",
            ReasonCode::SessionExpired => "session_expired",
            ReasonCode::SetupNotRun => "setup_not_run",
            ReasonCode::ConnectionClosed => "connection_closed",
            ReasonCode::ConnectFailed => "connect_failed",
            ReasonCode::Unclassified => "unclassified",
        }
    }
}

type Predicate = fn(&str) -> bool;

/// Checked in order; the first match wins
const PATTERNS: &[(Predicate, ReasonCode)] = &[
    (is_account_password_required, ReasonCode::AccountPasswordRequired),
    (is_valid_action_required, ReasonCode::ValidActionRequired),
    (is_session_lost, ReasonCode::SessionExpired),
    (is_setup_not_run, ReasonCode::SetupNotRun),
    (is_connection_closed, ReasonCode::ConnectionClosed),
    (is_connect_failure, ReasonCode::ConnectFailed),
];

/// Map a remote reason string onto a known code; unknown reasons are
/// `Unclassified` and abort the restore
pub fn classify_reason(reason: &str) -> ReasonCode {
    let reason = reason.trim();
    PATTERNS
        .iter()
        .find(|(matches, _)| matches(reason))
        .map(|(_, code)| *code)
        .unwrap_or(ReasonCode::Unclassified)
}

fn is_account_password_required(reason: &str) -> bool {
    reason == "account_password required."
}

fn is_valid_action_required(reason: &str) -> bool {
    reason == "valid action required"
}

fn is_session_lost(reason: &str) -> bool {
    if reason == "CID is invalid or expired." || reason.contains("Invalid session. Please login again")
    {
        return true;
    }
    match reason.find("Session ") {
        Some(start) => {
            let rest = reason[start..].trim_end_matches('.');
            rest.contains(" not found") || rest.ends_with(" expired")
        }
        None => false,
    }
}

fn is_setup_not_run(reason: &str) -> bool {
    reason == "not run"
}

fn is_connection_closed(reason: &str) -> bool {
    reason.contains("Remote end closed connection without response")
}

fn is_connect_failure(reason: &str) -> bool {
    reason.contains("Failed to establish a new connection")
        || reason.contains("Max retries exceeded")
        || reason.contains("request timed out")
}

/// Account creation reported a name collision
pub fn is_duplicate_account(reason: &str) -> bool {
    reason.contains("already exists")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_password_required_keeps_polling() {
        let code = classify_reason("account_password required.");
        assert_eq!(code, ReasonCode::AccountPasswordRequired);
        assert_eq!(code.action(), PollAction::KeepPolling(WaitHint::Long));
    }

    #[test]
    fn test_valid_action_required_keeps_polling() {
        let code = classify_reason("valid action required");
        assert_eq!(code, ReasonCode::ValidActionRequired);
        assert_eq!(code.action(), PollAction::KeepPolling(WaitHint::Long));
    }

    #[test]
    fn test_cid_invalid_reauthenticates() {
        let code = classify_reason("CID is invalid or expired.");
        assert_eq!(code, ReasonCode::SessionExpired);
        assert_eq!(code.action(), PollAction::Reauthenticate);
    }

    #[test]
    fn test_invalid_session_reauthenticates() {
        assert_eq!(
            classify_reason("Invalid session. Please login again."),
            ReasonCode::SessionExpired
        );
    }

    #[test]
    fn test_session_expired_reauthenticates() {
        assert_eq!(
            classify_reason("Session abc123 expired"),
            ReasonCode::SessionExpired
        );
        assert_eq!(
            classify_reason("Session abc123 expired."),
            ReasonCode::SessionExpired
        );
    }

    #[test]
    fn test_session_not_found_reauthenticates() {
        assert_eq!(
            classify_reason("Session abc123 not found"),
            ReasonCode::SessionExpired
        );
    }

    #[test]
    fn test_not_run_waits_for_bootstrap() {
        let code = classify_reason("not run");
        assert_eq!(code, ReasonCode::SetupNotRun);
        assert_eq!(code.action(), PollAction::KeepPolling(WaitHint::Short));
    }

    #[test]
    fn test_remote_closed_waits() {
        let code = classify_reason(
            "('Connection aborted.', RemoteDisconnected('Remote end closed connection without response'))",
        );
        assert_eq!(code, ReasonCode::ConnectionClosed);
        assert_eq!(code.action(), PollAction::KeepPolling(WaitHint::Short));
    }

    #[test]
    fn test_connectivity_keeps_polling() {
        let code = classify_reason("Failed to establish a new connection: [Errno 111]");
        assert_eq!(code, ReasonCode::ConnectFailed);
        assert_eq!(code.action(), PollAction::KeepPolling(WaitHint::Long));

        assert_eq!(
            classify_reason("HTTPSConnectionPool: Max retries exceeded with url: /v1/api"),
            ReasonCode::ConnectFailed
        );
        assert_eq!(
            classify_reason("request timed out: operation timed out"),
            ReasonCode::ConnectFailed
        );
    }

    #[test]
    fn test_unknown_reason_aborts() {
        let code = classify_reason("Backup file is corrupted");
        assert_eq!(code, ReasonCode::Unclassified);
        assert_eq!(code.action(), PollAction::Abort);
        assert_eq!(classify_reason("").action(), PollAction::Abort);
    }

    #[test]
    fn test_exact_matches_are_not_substring_matches() {
        assert_eq!(classify_reason("setup not run yet"), ReasonCode::Unclassified);
        assert_eq!(
            classify_reason("a valid action required here"),
            ReasonCode::Unclassified
        );
    }

    #[test]
    fn test_session_word_alone_is_not_session_loss() {
        assert_eq!(classify_reason("Session limit reached"), ReasonCode::Unclassified);
    }

    #[test]
    fn test_duplicate_account() {
        assert!(is_duplicate_account("Account tempacc already exists"));
        assert!(!is_duplicate_account("Account created"));
    }
}
