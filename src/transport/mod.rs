//! Network transport adapter
//!
//! Turns a validated form into an HTTP request, runs it under a per-attempt
//! cancellation token and a hard timeout, and classifies what came back into
//! exactly one [`TransportOutcome`].

mod client;
mod mock;
mod payload;
mod traits;

use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::state::{RequestId, UploadedFile};

pub use client::ReqwestTransport;
pub use mock::{MockCall, MockTransport};
pub use payload::{build_body, build_upload_body, Diagnostics};
pub use traits::HttpTransport;

/// A file attached to a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field_name: String,
    pub file: UploadedFile,
}

/// Request body: JSON for text-only forms, multipart when files are attached
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart { .. })
    }

    /// Value of a text field, for either body shape
    pub fn field(&self, name: &str) -> Option<String> {
        match self {
            RequestBody::Json(value) => value.get(name).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            RequestBody::Multipart { fields, .. } => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
        }
    }
}

/// One network attempt. A retry re-issues the same body under a new id.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRequest {
    pub request_id: RequestId,
    pub url: String,
    pub body: RequestBody,
}

impl SubmissionRequest {
    pub fn new(url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            request_id: RequestId::new(),
            url: url.into(),
            body,
        }
    }

    /// Same payload, fresh correlation id
    pub fn reissue(&self) -> Self {
        Self {
            request_id: RequestId::new(),
            url: self.url.clone(),
            body: self.body.clone(),
        }
    }
}

/// Raw response from the endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Classified result of one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOutcome {
    /// 2xx, with the parsed body
    Success(Value),
    /// 5xx, network error or timeout
    Retryable(String),
    /// 4xx business rejection, surfaced verbatim
    Rejected(String),
    /// The attempt's cancellation token fired
    Cancelled,
}

impl TransportOutcome {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportOutcome::Retryable(_))
    }
}

/// Parse a response body: JSON when possible, the raw text otherwise
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Classify a completed HTTP exchange
pub fn classify(response: &HttpResponse) -> TransportOutcome {
    match response.status {
        200..=299 => TransportOutcome::Success(parse_body(&response.body)),
        400..=499 => {
            let message = serde_json::from_str::<Value>(&response.body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("Request failed with status {}", response.status));
            TransportOutcome::Rejected(message)
        }
        status => TransportOutcome::Retryable(format!("Server error: HTTP {status}")),
    }
}

/// Run one attempt: execute under `timeout`, abort when `token` fires, classify.
pub async fn dispatch<T: HttpTransport + ?Sized>(
    transport: &T,
    request: &SubmissionRequest,
    token: &CancellationToken,
    timeout: Duration,
) -> TransportOutcome {
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::info!(request_id = %request.request_id, "Request cancelled");
            TransportOutcome::Cancelled
        }
        result = tokio::time::timeout(timeout, transport.execute(request, timeout)) => match result {
            Err(_) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Request timed out"
                );
                TransportOutcome::Retryable(format!(
                    "Request timed out after {}ms",
                    timeout.as_millis()
                ))
            }
            Ok(Err(e)) if e.is_timeout() => TransportOutcome::Retryable(format!(
                "Request timed out after {}ms",
                timeout.as_millis()
            )),
            Ok(Err(e)) => {
                tracing::warn!(request_id = %request.request_id, error = %e, "Request failed");
                TransportOutcome::Retryable(e.to_string())
            }
            Ok(Ok(response)) => {
                let outcome = classify(&response);
                tracing::debug!(
                    request_id = %request.request_id,
                    status = response.status,
                    retryable = outcome.is_retryable(),
                    "Classified response"
                );
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormError;
    use serde_json::json;

    fn request() -> SubmissionRequest {
        SubmissionRequest::new(
            "https://api.example.com/contact",
            RequestBody::Json(json!({"name": "Jo"})),
        )
    }

    mod classification {
        use super::*;

        #[test]
        fn test_success_parses_json() {
            let outcome = classify(&HttpResponse::new(201, r#"{"id": 7}"#));
            assert_eq!(outcome, TransportOutcome::Success(json!({"id": 7})));
        }

        #[test]
        fn test_success_with_empty_or_plain_body() {
            assert_eq!(
                classify(&HttpResponse::new(204, "")),
                TransportOutcome::Success(Value::Null)
            );
            assert_eq!(
                classify(&HttpResponse::new(200, "ok")),
                TransportOutcome::Success(Value::String("ok".to_string()))
            );
        }

        #[test]
        fn test_client_error_surfaces_message_verbatim() {
            let outcome = classify(&HttpResponse::new(
                422,
                r#"{"message": "This email is already subscribed"}"#,
            ));
            assert_eq!(
                outcome,
                TransportOutcome::Rejected("This email is already subscribed".to_string())
            );
        }

        #[test]
        fn test_client_error_without_message() {
            let outcome = classify(&HttpResponse::new(429, "slow down"));
            assert_eq!(
                outcome,
                TransportOutcome::Rejected("Request failed with status 429".to_string())
            );
        }

        #[test]
        fn test_server_error_is_retryable() {
            assert!(classify(&HttpResponse::new(500, "")).is_retryable());
            assert!(classify(&HttpResponse::new(503, "")).is_retryable());
        }
    }

    mod dispatching {
        use super::*;

        #[tokio::test]
        async fn test_network_error_is_retryable() {
            let mock = MockTransport::new();
            mock.add_response(
                "POST /contact",
                Err(FormError::Transport("connection refused".to_string())),
            );
            let outcome = dispatch(
                &mock,
                &request(),
                &CancellationToken::new(),
                Duration::from_secs(5),
            )
            .await;
            assert_eq!(
                outcome,
                TransportOutcome::Retryable("Transport error: connection refused".to_string())
            );
        }

        #[tokio::test]
        async fn test_timeout_is_retryable_not_cancelled() {
            let mock = MockTransport::new();
            let _trigger =
                mock.add_response_with_trigger("POST /contact", Ok(HttpResponse::new(200, "")));
            let outcome = dispatch(
                &mock,
                &request(),
                &CancellationToken::new(),
                Duration::from_millis(20),
            )
            .await;
            assert_eq!(
                outcome,
                TransportOutcome::Retryable("Request timed out after 20ms".to_string())
            );
            assert_eq!(mock.in_flight_count(), 0);
        }

        #[tokio::test]
        async fn test_cancellation_aborts_in_flight_call() {
            let mock = MockTransport::new();
            let _trigger =
                mock.add_response_with_trigger("POST /contact", Ok(HttpResponse::new(200, "")));
            let token = CancellationToken::new();

            let canceller = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                canceller.cancel();
            });

            let outcome = dispatch(&mock, &request(), &token, Duration::from_secs(5)).await;
            assert_eq!(outcome, TransportOutcome::Cancelled);
            assert_eq!(mock.in_flight_count(), 0);
            assert_eq!(mock.call_count(), 1);
        }
    }

    #[test]
    fn test_reissue_keeps_body_and_changes_id() {
        let first = request();
        let second = first.reissue();
        assert_ne!(first.request_id, second.request_id);
        assert_eq!(first.body, second.body);
        assert_eq!(first.url, second.url);
    }

    #[test]
    fn test_body_field_lookup() {
        let json = RequestBody::Json(json!({"formType": "contact", "n": 1}));
        assert_eq!(json.field("formType").as_deref(), Some("contact"));
        assert_eq!(json.field("n").as_deref(), Some("1"));

        let multipart = RequestBody::Multipart {
            fields: vec![("formType".to_string(), "job_application".to_string())],
            files: vec![],
        };
        assert!(multipart.is_multipart());
        assert_eq!(multipart.field("formType").as_deref(), Some("job_application"));
        assert!(multipart.field("missing").is_none());
    }
}
