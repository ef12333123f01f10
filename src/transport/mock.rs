//! Scripted transport for tests and demos.
//!
//! Responses are queued per `"POST /path"` key and handed out in FIFO order.
//! A response can be held back until its trigger fires, which lets tests
//! observe the pipeline while a request is in flight.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::{HttpResponse, HttpTransport, RequestBody, SubmissionRequest};
use crate::error::{FormError, Result};
use crate::state::RequestId;

/// A queued response that can optionally wait for a trigger before completing
enum MockResponse {
    Immediate(Result<HttpResponse>),
    Triggered {
        response: Result<HttpResponse>,
        trigger: Option<oneshot::Receiver<()>>,
    },
}

/// Record of a call made to the mock transport
#[derive(Debug, Clone)]
pub struct MockCall {
    pub request_id: RequestId,
    pub url: String,
    pub path: String,
    pub body: RequestBody,
    pub timeout: Duration,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
}

/// Path component of a URL, or the whole string if it does not parse
fn path_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `"POST /path"`
    pub fn add_response(&self, key: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(MockResponse::Immediate(response));
    }

    /// Queue the same status/body `count` times
    pub fn add_responses(&self, key: &str, status: u16, body: &str, count: usize) {
        for _ in 0..count {
            self.add_response(key, Ok(HttpResponse::new(status, body)));
        }
    }

    /// Queue a response that completes only once the returned sender fires
    /// (or is dropped).
    pub fn add_response_with_trigger(
        &self,
        key: &str,
        response: Result<HttpResponse>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(MockResponse::Triggered {
                response,
                trigger: Some(rx),
            });
        tx
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of requests currently executing. Drops back down when a
    /// request is aborted mid-flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(
        &self,
        request: &SubmissionRequest,
        timeout: Duration,
    ) -> Result<HttpResponse> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
        };

        let path = path_of(&request.url);
        self.calls.lock().push(MockCall {
            request_id: request.request_id,
            url: request.url.clone(),
            path: path.clone(),
            body: request.body.clone(),
            timeout,
        });

        let key = format!("POST {path}");
        let mock_response = {
            let mut responses = self.responses.lock();
            responses
                .get_mut(&key)
                .filter(|queue| !queue.is_empty())
                .map(|queue| queue.remove(0))
        };

        match mock_response {
            Some(MockResponse::Immediate(response)) => response,
            Some(MockResponse::Triggered { response, trigger }) => {
                if let Some(rx) = trigger {
                    // Proceed whether the trigger fired or was dropped
                    let _ = rx.await;
                }
                response
            }
            None => Err(FormError::Transport(format!(
                "No mock response configured for {key}"
            ))),
        }
    }
}

/// Decrements the in-flight counter when dropped, including on abort
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(url: &str) -> SubmissionRequest {
        SubmissionRequest::new(url, RequestBody::Json(json!({})))
    }

    #[tokio::test]
    async fn test_responses_are_fifo() {
        let mock = MockTransport::new();
        mock.add_response("POST /contact", Ok(HttpResponse::new(500, "first")));
        mock.add_response("POST /contact", Ok(HttpResponse::new(200, "second")));

        let req = request("https://api.example.com/contact");
        let first = mock.execute(&req, Duration::from_secs(1)).await.unwrap();
        let second = mock.execute(&req, Duration::from_secs(1)).await.unwrap();
        assert_eq!(first.body, "first");
        assert_eq!(second.body, "second");
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.get_calls()[0].path, "/contact");
    }

    #[tokio::test]
    async fn test_unconfigured_path_errors() {
        let mock = MockTransport::new();
        let result = mock
            .execute(&request("https://api.example.com/nowhere"), Duration::from_secs(1))
            .await;
        assert!(result.is_err());
        assert_eq!(mock.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_triggered_response_waits() {
        let mock = MockTransport::new();
        let trigger =
            mock.add_response_with_trigger("POST /contact", Ok(HttpResponse::new(200, "late")));

        let mock_clone = mock.clone();
        let handle = tokio::spawn(async move {
            mock_clone
                .execute(&request("https://api.example.com/contact"), Duration::from_secs(1))
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        assert_eq!(mock.in_flight_count(), 1);

        trigger.send(()).unwrap();
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.body, "late");
        assert_eq!(mock.in_flight_count(), 0);
    }
}
