//! Production transport using reqwest

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use std::time::Duration;

use super::{HttpResponse, HttpTransport, RequestBody, SubmissionRequest};
use crate::config::PipelineConfig;
use crate::error::{FormError, Result};

/// HTTP transport that talks to the real submission endpoint
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Build a client carrying the configured user agent and timeout
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client })
    }

    async fn multipart_form(
        fields: &[(String, String)],
        files: &[super::FilePart],
    ) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        for part in files {
            let bytes = part.file.read_bytes().await?;
            let file_part = Part::bytes(bytes)
                .file_name(part.file.name.clone())
                .mime_str(part.file.content_type())
                .map_err(|e| {
                    FormError::Transport(format!(
                        "Invalid content type '{}': {}",
                        part.file.content_type(),
                        e
                    ))
                })?;
            form = form
                .part("file", file_part)
                .text("fieldName", part.field_name.clone());
        }
        Ok(form)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(request_id = %request.request_id, url = %request.url))]
    async fn execute(
        &self,
        request: &SubmissionRequest,
        timeout: Duration,
    ) -> Result<HttpResponse> {
        tracing::debug!(
            timeout_ms = timeout.as_millis() as u64,
            multipart = request.body.is_multipart(),
            "Executing submission request"
        );

        let req = self
            .client
            .post(&request.url)
            .timeout(timeout)
            .header(ACCEPT, "application/json");

        let req = match &request.body {
            RequestBody::Json(value) => req.header(CONTENT_TYPE, "application/json").json(value),
            RequestBody::Multipart { fields, files } => {
                req.multipart(Self::multipart_form(fields, files).await?)
            }
        };

        let response = req.send().await.map_err(|e| {
            tracing::error!(error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::info!(
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UploadedFile;
    use crate::transport::FilePart;

    #[test]
    fn test_from_config_builds_client() {
        assert!(ReqwestTransport::from_config(&PipelineConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_multipart_form_reads_file_bytes() {
        let fields = vec![("formType".to_string(), "job_application".to_string())];
        let files = vec![FilePart {
            field_name: "resume".to_string(),
            file: UploadedFile::from_bytes("cv.pdf", "application/pdf", b"%PDF-1.7".to_vec()),
        }];
        let form = ReqwestTransport::multipart_form(&fields, &files).await;
        assert!(form.is_ok());
    }

    #[tokio::test]
    async fn test_multipart_form_fails_for_missing_file() {
        let files = vec![FilePart {
            field_name: "resume".to_string(),
            file: UploadedFile::from_path(
                "cv.pdf",
                "application/pdf",
                10,
                "/definitely/not/here/cv.pdf".into(),
            ),
        }];
        let result = ReqwestTransport::multipart_form(&[], &files).await;
        assert!(matches!(result, Err(FormError::Storage(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let transport = ReqwestTransport::new();
        let request = SubmissionRequest::new(
            "http://127.0.0.1:9/contact",
            RequestBody::Json(serde_json::json!({})),
        );
        let result = transport
            .execute(&request, Duration::from_millis(500))
            .await;
        assert!(result.is_err());
    }
}
