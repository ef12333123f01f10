//! Field-name to rule registry, built once per form kind

use std::collections::HashMap;

use super::rules::{self, FileRule, RuleContext};
use super::{FieldResults, ValidationResult};
use crate::state::{FieldValue, FormKind, FormValues};

/// A field rule: `(field name, value, context) -> result`
pub type ValidatorFn = fn(&str, &FieldValue, &RuleContext) -> ValidationResult;

/// Rules shared by every form kind
const COMMON_RULES: &[(&str, ValidatorFn)] = &[
    ("name", rules::name),
    ("firstName", rules::name),
    ("lastName", rules::name),
    ("company", rules::name),
    ("jobTitle", rules::name),
    ("email", rules::email),
    ("phone", rules::phone),
    ("message", rules::message),
    ("website", rules::website),
];

const CONSULTATION_RULES: &[(&str, ValidatorFn)] = &[
    ("budget", rules::budget),
    ("service", rules::tag),
    ("industry", rules::tag),
];

const JOB_APPLICATION_RULES: &[(&str, ValidatorFn)] = &[
    ("resume", rules::resume),
    ("coverLetter", rules::cover_letter),
    ("jobId", rules::selection),
];

/// Rules and required fields for one form kind
#[derive(Clone)]
pub struct ValidatorRegistry {
    kind: FormKind,
    ctx: RuleContext,
    rules: HashMap<&'static str, ValidatorFn>,
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields: Vec<_> = self.rules.keys().collect();
        fields.sort();
        f.debug_struct("ValidatorRegistry")
            .field("kind", &self.kind)
            .field("ctx", &self.ctx)
            .field("fields", &fields)
            .finish()
    }
}

impl ValidatorRegistry {
    pub fn for_kind(kind: FormKind, ctx: RuleContext) -> Self {
        let specific: &[(&str, ValidatorFn)] = match kind {
            FormKind::Consultation => CONSULTATION_RULES,
            FormKind::JobApplication => JOB_APPLICATION_RULES,
            FormKind::Contact | FormKind::Newsletter => &[],
        };
        let rules = COMMON_RULES
            .iter()
            .chain(specific)
            .map(|(name, rule)| (*name, *rule))
            .collect();
        Self { kind, ctx, rules }
    }

    pub fn kind(&self) -> FormKind {
        self.kind
    }

    pub fn context(&self) -> &RuleContext {
        &self.ctx
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// The upload rule for `name`, when this form kind takes a file there
    pub fn file_rule(&self, name: &str) -> Option<&'static FileRule> {
        if self.has_rule(name) {
            rules::file_rule_for(name)
        } else {
            None
        }
    }

    /// Validate one field. Blank required fields fail with "<Label> is
    /// required"; blank optional fields and text without a rule pass. A
    /// file under a field without a rule is rejected.
    pub fn validate_field(&self, name: &str, value: &FieldValue) -> ValidationResult {
        if value.is_blank() {
            return if self.kind.is_required(name) {
                rules::required_error(name)
            } else {
                ValidationResult::valid()
            };
        }
        match (self.rules.get(name), value) {
            (Some(rule), _) => rule(name, value, &self.ctx),
            (None, FieldValue::File(_)) => rules::file_not_accepted(name),
            (None, _) => ValidationResult::valid(),
        }
    }

    /// Validate every required field, every present field that has a rule
    /// and every attached file
    pub fn validate_form(&self, values: &FormValues) -> FieldResults {
        let mut results = FieldResults::new();
        for field in self.kind.required_fields() {
            let value = values.get(field).cloned().unwrap_or_default();
            results.insert(field.to_string(), self.validate_field(field, &value));
        }
        for (name, value) in values.iter() {
            let is_file = matches!(value, FieldValue::File(_));
            if results.contains_key(name) || !(is_file || self.has_rule(name)) {
                continue;
            }
            results.insert(name.clone(), self.validate_field(name, value));
        }
        results
    }

    pub fn is_valid(&self, values: &FormValues) -> bool {
        self.validate_form(values).values().all(|r| r.valid)
    }
}
