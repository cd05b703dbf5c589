use std::sync::Arc;
use std::time::Duration;

use ctrl_ha_controller::{ApiError, ControllerSession};
use ctrl_ha_metrics::MetricsCollector;
use tracing::{info, warn};

use crate::error::RecoveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapResult {
    /// The controller reported bootstrap as complete before any run
    AlreadyDone,

    /// The run command was accepted, or presumed accepted
    Started,
}

/// Brings a freshly launched controller to the backup's version
pub struct BootstrapDriver {
    settle: Duration,
    metrics: Arc<MetricsCollector>,
}

impl BootstrapDriver {
    pub fn new(settle: Duration, metrics: Arc<MetricsCollector>) -> Self {
        Self { settle, metrics }
    }

    pub async fn run(
        &self,
        session: &ControllerSession,
        target_version: &str,
    ) -> Result<BootstrapResult, RecoveryError> {
        let token = session.require().map_err(api_failure)?;

        // An unreachable check counts as not complete
        match session.api().initial_setup_check(token).await {
            Ok(status) if status.ok => {
                info!("Initial setup already complete");
                return Ok(BootstrapResult::AlreadyDone);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Initial setup check failed, treating setup as not complete");
            }
        }

        info!(target_version, "Running initial setup");
        let run = session
            .api()
            .initial_setup_run(token, target_version)
            .await;

        let accepted = match run {
            Ok(response) => response,
            Err(ApiError::ConnectionClosed(detail)) => {
                warn!(
                    target_version,
                    detail = %detail,
                    "Controller closed the connection during initial setup, presuming it started"
                );
                self.metrics.record_presumptive_success("initial_setup_run");
                tokio::time::sleep(self.settle).await;
                return Ok(BootstrapResult::Started);
            }
            Err(e) => return Err(api_failure(e)),
        };

        tokio::time::sleep(self.settle).await;
        if !accepted.ok {
            return Err(RecoveryError::fatal_remote(format!(
                "could not bring the new controller to version {target_version}: {}",
                accepted.reason_str()
            )));
        }

        Ok(BootstrapResult::Started)
    }
}

fn api_failure(err: ApiError) -> RecoveryError {
    RecoveryError::fatal_remote(err.to_string())
}
