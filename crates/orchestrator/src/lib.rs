//! Recovery of a replacement controller instance
//!
//! [`RecoveryOrchestrator::recover`] takes a trigger naming the new instance
//! and drives it to a restored backup: bind the floating address, open a
//! temporary ingress rule, log in, bootstrap to the backup's version,
//! register a scratch account and restore. The ingress rule is reverted on
//! every path out, and one left behind by a killed run is reverted before
//! the next run starts.

pub mod bootstrap;
pub mod cloud;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod progress;
pub mod restorer;


// Re-export main types
pub use bootstrap::{BootstrapDriver, BootstrapResult};
pub use cloud::{
    AddressAssigner, ArtifactStore, CloudError, CloudErrorKind, IngressRule, IngressRules,
    InstanceControl, StoredObject,
};
pub use error::{BuilderError, RecoveryError};
pub use guard::{RevertOutcome, SecurityGuard};
pub use orchestrator::{RecoveryOrchestrator, RecoveryOrchestratorBuilder};
pub use progress::StageTracker;
pub use restorer::{transition, BackupRestorer, NextAction, RestoreSettings, RestoreState, Transition};
