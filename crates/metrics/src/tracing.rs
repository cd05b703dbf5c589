use std::sync::Arc;
use tracing::{field::Visit, Event, Level, Subscriber};
use tracing_subscriber::{
    fmt,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::collector::MetricsCollector;

/// Initialize tracing at `level`; `RUST_LOG` overrides it when set
pub fn init_tracing(level: &str, json: bool) -> Result<(), TracingError> {
    init_tracing_with_metrics(level, json, Arc::new(MetricsCollector::new()))
}

/// Initialize tracing with metrics integration
pub fn init_tracing_with_metrics(
    level: &str,
    json: bool,
    collector: Arc<MetricsCollector>,
) -> Result<(), TracingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| TracingError::InitError(e.to_string()))?,
    };

    let json_layer = json.then(|| fmt::layer().with_target(true).json());
    let text_layer = (!json).then(|| fmt::layer().with_target(true));

    let metrics_layer = MetricsLayer::new(collector);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(metrics_layer)
        .try_init()
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    Ok(())
}

/// Tracing layer that counts error events by their `kind` field
pub struct MetricsLayer {
    collector: Arc<MetricsCollector>,
}

impl MetricsLayer {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }

        let mut visitor = KindVisitor::default();
        event.record(&mut visitor);
        self.collector
            .record_error_event(visitor.kind.as_deref().unwrap_or("unknown"));
    }
}

#[derive(Default)]
struct KindVisitor {
    kind: Option<String>,
}

impl Visit for KindVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "kind" {
            self.kind = Some(format!("{value:?}").trim_matches('"').to_string());
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "kind" {
            self.kind = Some(value.to_string());
        }
    }
}

/// Identifier of one recovery run; keys its transition history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(uuid::Uuid);

impl RunId {
    /// Generate a new run ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the run ID as a string
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span context for one recovery run
#[derive(Debug, Clone)]
pub struct RecoverySpan {
    pub run_id: RunId,
    pub new_instance_id: String,
}

impl RecoverySpan {
    pub fn new(new_instance_id: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            new_instance_id: new_instance_id.into(),
        }
    }

    /// Tracing span for this run; attach with `Instrument::instrument`
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "recovery",
            run_id = %self.run_id,
            new_instance_id = %self.new_instance_id,
        )
    }
}

/// Tracing error types
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_generation() {
        let id1 = RunId::new();
        let id2 = RunId::new();

        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 36);
        assert_eq!(id1.to_string(), id1.as_str());
    }

    #[test]
    fn test_recovery_span_creation() {
        let span = RecoverySpan::new("i-0abc");
        assert_eq!(span.new_instance_id, "i-0abc");
        let _ = span.span();
    }
}
