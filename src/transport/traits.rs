//! Trait abstraction for the HTTP transport to enable fakes in tests

use async_trait::async_trait;
use std::time::Duration;

use super::{HttpResponse, SubmissionRequest};
use crate::error::Result;

/// Executes one submission request against the remote endpoint.
///
/// Implementations return the raw status and body; classification into
/// success, rejection and retryable failure happens in [`super::classify`].
/// Dropping the returned future must abort the request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST the request body to `request.url`
    ///
    /// # Errors
    /// Returns an error if the request fails due to network issues, times
    /// out, or the body cannot be assembled (for example an unreadable file).
    async fn execute(&self, request: &SubmissionRequest, timeout: Duration)
        -> Result<HttpResponse>;
}
