//! Metrics and tracing for controller HA recovery
//!
//! Recovery runs as a short-lived process, so metrics are only gathered and
//! rendered in the Prometheus text format; nothing is served over HTTP.
//!
//! # Example
//!
//! ```no_run
//! use ctrl_ha_metrics::{init_tracing, MetricsCollector, RunId};
//!
//! init_tracing("info", false).unwrap();
//!
//! let collector = MetricsCollector::new();
//! collector.record_recovery_started();
//!
//! let run_id = RunId::new();
//! println!("{run_id}: {}", collector.export_metrics().unwrap());
//! ```

pub mod collector;
pub mod metrics;
pub mod tracing;

pub use collector::{GuardEvent, MetricsCollector, MetricsError};
pub use crate::tracing::{init_tracing, init_tracing_with_metrics, RecoverySpan, RunId, TracingError};
