//! Validation engine
//!
//! Pure functions from `(field name, value, form kind)` to a
//! [`ValidationResult`]. Invalid input never errors; it always produces a
//! structured result and the caller decides whether to block submission.

mod format;
mod registry;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::state::{FieldValue, FormKind, FormValues};

pub use format::{digits_only, format_currency, format_phone, parse_amount, PhoneRegion};
pub use registry::{ValidatorFn, ValidatorRegistry};
pub use rules::{validate_budget, validate_file, FileRule, RuleContext};

/// Outcome of validating one field.
///
/// `valid == false` always carries an `error`, and `valid == true` never does.
/// A warning may accompany a valid result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Normalized display form of the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
            warning: None,
            formatted: None,
        }
    }

    pub fn formatted(value: impl Into<String>) -> Self {
        Self {
            formatted: Some(value.into()),
            ..Self::valid()
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            warning: None,
            formatted: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// Inclusive range a budget must fall within
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
}

impl Default for BudgetRange {
    fn default() -> Self {
        Self {
            min: 1000.0,
            max: 1_000_000.0,
        }
    }
}

/// Per-field results of validating a whole form
pub type FieldResults = BTreeMap<String, ValidationResult>;

/// Only the failing fields, mapped to their error messages
pub fn field_errors(results: &FieldResults) -> BTreeMap<String, String> {
    results
        .iter()
        .filter_map(|(name, r)| r.error.as_ref().map(|e| (name.clone(), e.clone())))
        .collect()
}

/// Validate one field with the default rule context
pub fn validate_field(name: &str, value: &FieldValue, kind: FormKind) -> ValidationResult {
    ValidatorRegistry::for_kind(kind, RuleContext::default()).validate_field(name, value)
}

/// Validate every required or present field with the default rule context
pub fn validate_form(values: &FormValues, kind: FormKind) -> FieldResults {
    ValidatorRegistry::for_kind(kind, RuleContext::default()).validate_form(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_invalid_email_scenario() {
        let result = validate_field("email", &FieldValue::text("not-an-email"), FormKind::Contact);
        assert_eq!(
            result,
            ValidationResult::invalid("Please enter a valid email address")
        );
    }

    #[test]
    fn test_short_message_scenario() {
        let values = FormValues::new()
            .with("name", "Jo")
            .with("email", "jo@acme.com")
            .with("message", "Hi");
        let results = validate_form(&values, FormKind::Contact);
        let errors = field_errors(&results);

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get("message").map(String::as_str),
            Some("Message must be at least 10 characters long")
        );
        assert!(results["name"].valid);
        assert!(results["email"].valid);
    }

    #[test]
    fn test_result_constructors_keep_invariant() {
        for result in [
            ValidationResult::valid(),
            ValidationResult::formatted("x"),
            ValidationResult::valid().with_warning("w"),
            ValidationResult::invalid("e"),
        ] {
            assert_eq!(result.valid, result.error.is_none());
        }
    }

    #[test]
    fn test_serializes_without_empty_extras() {
        let json = serde_json::to_string(&ValidationResult::invalid("bad")).unwrap();
        assert_eq!(json, r#"{"valid":false,"error":"bad"}"#);
    }

    fn field_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "name", "firstName", "lastName", "email", "phone", "message", "budget", "company",
            "jobId", "website", "service", "unknown",
        ])
        .prop_map(str::to_string)
    }

    fn form_kind() -> impl Strategy<Value = FormKind> {
        prop::sample::select(FormKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn validate_field_is_deterministic(
            name in field_name(),
            value in ".{0,120}",
            kind in form_kind(),
        ) {
            let value = FieldValue::text(value);
            let first = validate_field(&name, &value, kind);
            let second = validate_field(&name, &value, kind);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.valid, first.error.is_none());
        }

        #[test]
        fn blank_required_field_is_always_reported(kind in form_kind(), pick in 0usize..5) {
            let required = kind.required_fields();
            let missing = required[pick % required.len()];
            let mut values = FormValues::new();
            for field in required {
                if *field != missing {
                    values.set(field, "placeholder value");
                }
            }
            let errors = field_errors(&validate_form(&values, kind));
            prop_assert!(errors.contains_key(missing));
        }
    }
}
