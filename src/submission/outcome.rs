use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const ALREADY_SUBMITTING: &str = "Form is already being submitted";
pub const MAX_RETRIES_REACHED: &str = "Maximum retry attempts reached";
pub const VALIDATION_FAILED: &str = "Please correct the errors in the form";

/// Per-call options for a submission
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Endpoint path or absolute URL replacing the form kind's default
    pub endpoint: Option<String>,
    /// Extra payload fields. Diagnostics and `formType` take precedence.
    pub metadata: Map<String, Value>,
}

impl SubmitOptions {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// How a submit or retry call settled. Never an error type: every path ends here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Succeeded { data: Value },
    /// Local validation failed; nothing was sent
    Invalid { errors: BTreeMap<String, String> },
    /// 4xx from the endpoint, message kept verbatim
    Rejected { message: String },
    /// Transient failures outlasted the retry budget
    Failed { message: String },
    Cancelled,
    AlreadySubmitting,
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Succeeded { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            SubmitOutcome::Succeeded { data } => Some(data),
            _ => None,
        }
    }

    /// User-facing message. Cancellation has none.
    pub fn error(&self) -> Option<String> {
        match self {
            SubmitOutcome::Succeeded { .. } | SubmitOutcome::Cancelled => None,
            SubmitOutcome::Invalid { .. } => Some(VALIDATION_FAILED.to_string()),
            SubmitOutcome::Rejected { message } | SubmitOutcome::Failed { message } => {
                Some(message.clone())
            }
            SubmitOutcome::AlreadySubmitting => Some(ALREADY_SUBMITTING.to_string()),
        }
    }

    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            SubmitOutcome::Invalid { errors } => Some(errors),
            _ => None,
        }
    }

    pub fn to_result(&self) -> SubmitResult {
        SubmitResult {
            success: self.is_success(),
            data: self.data().cloned(),
            error: self.error(),
            errors: self.field_errors().cloned(),
            cancelled: matches!(self, SubmitOutcome::Cancelled),
        }
    }
}

/// Flat `{success, data?, error?}` shape for callers that want it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_success_result_shape() {
        let outcome = SubmitOutcome::Succeeded { data: json!({"id": 1}) };
        assert_eq!(
            serde_json::to_value(outcome.to_result()).unwrap(),
            json!({"success": true, "data": {"id": 1}})
        );
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            SubmitOutcome::AlreadySubmitting.error().as_deref(),
            Some(ALREADY_SUBMITTING)
        );
        assert_eq!(
            SubmitOutcome::Failed {
                message: MAX_RETRIES_REACHED.to_string()
            }
            .error()
            .as_deref(),
            Some("Maximum retry attempts reached")
        );
        assert!(SubmitOutcome::Cancelled.error().is_none());
        assert!(!SubmitOutcome::Cancelled.is_success());
    }

    #[test]
    fn test_invalid_result_carries_field_errors() {
        let mut errors = BTreeMap::new();
        errors.insert("email".to_string(), "Email is required".to_string());
        let result = SubmitOutcome::Invalid { errors }.to_result();
        assert!(!result.success);
        assert_eq!(
            result.errors.unwrap().get("email").map(String::as_str),
            Some("Email is required")
        );
    }

    #[test]
    fn test_options_builder() {
        let options = SubmitOptions::default()
            .with_endpoint("/contact/priority")
            .with_metadata("source", "footer");
        assert_eq!(options.endpoint.as_deref(), Some("/contact/priority"));
        assert_eq!(options.metadata.get("source"), Some(&json!("footer")));
    }
}
