//! Lifecycle events emitted by the submission pipeline.
//!
//! The pipeline publishes on a broadcast channel and never waits for
//! listeners; analytics and any other observers subscribe separately.

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::state::{FormKind, FormValues, RequestId};

const DEFAULT_CAPACITY: usize = 256;

/// Something observable happened to a form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// First field touched
    FormStarted { form_kind: FormKind },
    /// A field failed validation
    FieldInvalid {
        form_kind: FormKind,
        field: String,
        error: String,
    },
    /// A network attempt is about to go out (attempt 0 is the first try)
    SubmitAttempted {
        form_kind: FormKind,
        request_id: RequestId,
        attempt: u32,
    },
    RetryScheduled {
        form_kind: FormKind,
        retry_count: u32,
        delay_ms: u64,
    },
    SubmitSucceeded {
        form_kind: FormKind,
        request_id: RequestId,
        retry_count: u32,
    },
    SubmitFailed {
        form_kind: FormKind,
        error: String,
        /// Whether the failure was transient before retries ran out
        transient: bool,
    },
    SubmitCancelled {
        form_kind: FormKind,
        request_id: Option<RequestId>,
    },
    /// Form-kind specific conversion event
    Business {
        form_kind: FormKind,
        name: String,
        params: Map<String, Value>,
    },
}

impl LifecycleEvent {
    pub fn form_kind(&self) -> FormKind {
        match self {
            Self::FormStarted { form_kind }
            | Self::FieldInvalid { form_kind, .. }
            | Self::SubmitAttempted { form_kind, .. }
            | Self::RetryScheduled { form_kind, .. }
            | Self::SubmitSucceeded { form_kind, .. }
            | Self::SubmitFailed { form_kind, .. }
            | Self::SubmitCancelled { form_kind, .. }
            | Self::Business { form_kind, .. } => *form_kind,
        }
    }
}

/// Fan-out channel for lifecycle events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Publish without waiting. Having no subscribers is fine.
    pub fn emit(&self, event: LifecycleEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Lifecycle event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn tag(values: &FormValues, params: &mut Map<String, Value>, field: &str) {
    if let Some(text) = values.text(field).map(str::trim).filter(|t| !t.is_empty()) {
        params.insert(field.to_string(), Value::String(text.to_string()));
    }
}

/// Conversion events to emit after a successful submission
pub fn business_events(kind: FormKind, values: &FormValues) -> Vec<LifecycleEvent> {
    let mut params = Map::new();
    let name = match kind {
        FormKind::Contact => {
            tag(values, &mut params, "subject");
            "contact_message"
        }
        FormKind::Consultation => {
            tag(values, &mut params, "service");
            tag(values, &mut params, "industry");
            tag(values, &mut params, "budget");
            "consultation_request"
        }
        FormKind::JobApplication => {
            tag(values, &mut params, "jobId");
            "job_application"
        }
        FormKind::Newsletter => "newsletter_signup",
    };
    vec![LifecycleEvent::Business {
        form_kind: kind,
        name: name.to_string(),
        params,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(LifecycleEvent::FormStarted {
            form_kind: FormKind::Contact,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.form_kind(), FormKind::Contact);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(LifecycleEvent::FormStarted {
            form_kind: FormKind::Newsletter,
        });
    }

    #[test]
    fn test_consultation_business_tags() {
        let values = FormValues::new()
            .with("service", "Cloud migration")
            .with("industry", " Retail ")
            .with("name", "Jo");
        let events = business_events(FormKind::Consultation, &values);
        assert_eq!(
            events,
            vec![LifecycleEvent::Business {
                form_kind: FormKind::Consultation,
                name: "consultation_request".to_string(),
                params: json!({"service": "Cloud migration", "industry": "Retail"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            }]
        );
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = LifecycleEvent::FieldInvalid {
            form_kind: FormKind::Contact,
            field: "email".to_string(),
            error: "bad".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "field_invalid", "form_kind": "contact", "field": "email", "error": "bad"})
        );
    }
}
