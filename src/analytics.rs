//! Analytics binding.
//!
//! Subscribes to the lifecycle [`EventBus`] and forwards the events worth
//! tracking to an [`AnalyticsSink`]. Sink errors and panics are logged and
//! dropped; the submission pipeline never waits on analytics.

use serde::Serialize;
use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::events::{EventBus, LifecycleEvent};

/// Fire-and-forget payload: `{eventName, category, label, ...params}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub event_name: String,
    pub category: String,
    pub label: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl AnalyticsEvent {
    pub fn new(event_name: &str, category: &str, label: impl Into<String>) -> Self {
        Self {
            event_name: event_name.to_string(),
            category: category.to_string(),
            label: label.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// The analytics view of a lifecycle event. Attempt and backoff
    /// bookkeeping is not tracked.
    pub fn from_lifecycle(event: &LifecycleEvent) -> Option<Self> {
        let label = event.form_kind().as_str();
        let tracked = match event {
            LifecycleEvent::FormStarted { .. } => Self::new("form_start", "engagement", label),
            LifecycleEvent::FieldInvalid { field, error, .. } => {
                Self::new("form_field_error", "form", label)
                    .with_param("field", field.as_str())
                    .with_param("error", error.as_str())
            }
            LifecycleEvent::SubmitSucceeded { retry_count, .. } => {
                Self::new("form_submit", "conversion", label)
                    .with_param("success", true)
                    .with_param("retryCount", *retry_count)
            }
            LifecycleEvent::SubmitFailed {
                error, transient, ..
            } => Self::new("form_submit", "form", label)
                .with_param("success", false)
                .with_param("error", error.as_str())
                .with_param("transient", *transient),
            LifecycleEvent::SubmitCancelled { .. } => Self::new("form_cancel", "form", label),
            LifecycleEvent::Business { name, params, .. } => {
                let mut tracked = Self::new(name, "business", label);
                tracked.params = params.clone();
                tracked
            }
            LifecycleEvent::SubmitAttempted { .. } | LifecycleEvent::RetryScheduled { .. } => {
                return None
            }
        };
        Some(tracked)
    }
}

/// Destination for analytics events
#[cfg_attr(test, mockall::automock)]
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: &AnalyticsEvent) -> Result<()>;
}

/// Writes analytics events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn track(&self, event: &AnalyticsEvent) -> Result<()> {
        let params = serde_json::to_string(&event.params)?;
        tracing::info!(
            target: "formflow::analytics",
            event_name = %event.event_name,
            category = %event.category,
            label = %event.label,
            params = %params,
            "Analytics event"
        );
        Ok(())
    }
}

/// Hand one event to the sink, containing any failure
pub fn deliver(sink: &dyn AnalyticsSink, event: &AnalyticsEvent) {
    match catch_unwind(AssertUnwindSafe(|| sink.track(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(
            event_name = %event.event_name,
            error = %e,
            "Analytics sink failed"
        ),
        Err(_) => tracing::warn!(event_name = %event.event_name, "Analytics sink panicked"),
    }
}

/// Background task forwarding bus events to a sink
pub struct AnalyticsBinding {
    handle: JoinHandle<()>,
}

impl AnalyticsBinding {
    pub fn spawn(bus: &EventBus, sink: Arc<dyn AnalyticsSink>) -> Self {
        let mut rx = bus.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(tracked) = AnalyticsEvent::from_lifecycle(&event) {
                            deliver(sink.as_ref(), &tracked);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Analytics binding lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Analytics binding stopped");
        });
        Self { handle }
    }

    /// Wait until every publisher is gone and the backlog is drained
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "Analytics binding task failed");
            }
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}
