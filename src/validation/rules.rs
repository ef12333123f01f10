//! Per-field validation rules.
//!
//! Every rule is a pure function of the field name, its value and the
//! [`RuleContext`]. Blank and required handling happens in the registry;
//! rules only see values that are present.

use regex::Regex;
use std::sync::LazyLock;

use super::format::{digits_only, format_currency, format_phone, parse_amount, PhoneRegion};
use super::{BudgetRange, ValidationResult};
use crate::config::PipelineConfig;
use crate::state::{FieldValue, UploadedFile};

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 100;
pub const MESSAGE_MIN_CHARS: usize = 10;
pub const MESSAGE_MAX_CHARS: usize = 1000;
pub const COVER_LETTER_MAX_CHARS: usize = 5000;
pub const EMAIL_MAX_CHARS: usize = 254;
pub const PHONE_MIN_DIGITS: usize = 10;
pub const PHONE_MIN_DIGITS_INTERNATIONAL: usize = 7;
pub const PHONE_MAX_DIGITS: usize = 15;

const MB: u64 = 1024 * 1024;

pub const INVALID_EMAIL: &str = "Please enter a valid email address";
pub const DISPOSABLE_EMAIL: &str = "Please use a permanent email address";
pub const PERSONAL_EMAIL_WARNING: &str = "Consider using your business email address";
pub const INVALID_PHONE: &str = "Please enter a valid phone number";
pub const SPAM_MESSAGE: &str = "Message appears to be spam. Please revise and try again";
pub const INVALID_BUDGET: &str = "Please enter a valid budget amount";
pub const INVALID_FILE_NAME: &str = "File name contains invalid characters";
pub const INVALID_URL: &str = "Please enter a valid URL";

const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "temp-mail.org",
    "throwaway.email",
    "yopmail.com",
    "trashmail.com",
    "sharklasers.com",
    "getnada.com",
    "dispostable.com",
    "maildrop.cc",
];

const PERSONAL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "msn.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "mail.com",
];

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("valid email pattern"));

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://|www\.").expect("valid url pattern"));

static SHOUTING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Lu}{5,}").expect("valid uppercase pattern"));

static WEBSITE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^\s/?#.]+(\.[^\s/?#.]+)+([/?#].*)?$").expect("valid website pattern")
});

/// Characters never allowed in an uploaded file's name
const FORBIDDEN_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Inputs that rules need beyond the value itself
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RuleContext {
    pub budget: BudgetRange,
    pub region: PhoneRegion,
}

impl RuleContext {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            budget: config.budget_range(),
            region: config.region,
        }
    }
}

/// Size ceiling and extension allow-list for one upload field
#[derive(Debug, Clone, Copy)]
pub struct FileRule {
    pub max_bytes: u64,
    pub extensions: &'static [&'static str],
    pub type_error: &'static str,
    pub size_error: &'static str,
}

pub const RESUME_RULE: FileRule = FileRule {
    max_bytes: 10 * MB,
    extensions: &[".pdf", ".doc", ".docx"],
    type_error: "Please upload a PDF, DOC, or DOCX file",
    size_error: "File size must be less than 10MB",
};

pub const COVER_LETTER_RULE: FileRule = FileRule {
    max_bytes: 5 * MB,
    extensions: &[".pdf", ".doc", ".docx", ".txt"],
    type_error: "Please upload a PDF, DOC, DOCX, or TXT file",
    size_error: "File size must be less than 5MB",
};

/// Human label used in error messages
pub fn label(field: &str) -> &str {
    match field {
        "name" => "Name",
        "firstName" => "First name",
        "lastName" => "Last name",
        "email" => "Email",
        "company" => "Company",
        "jobTitle" => "Job title",
        "phone" => "Phone number",
        "message" => "Message",
        "budget" => "Budget",
        "resume" => "Resume",
        "coverLetter" => "Cover letter",
        "jobId" => "Position",
        "website" => "Website",
        "service" => "Service",
        "industry" => "Industry",
        other => other,
    }
}

pub fn required_error(field: &str) -> ValidationResult {
    ValidationResult::invalid(format!("{} is required", label(field)))
}

fn expect_text<'a>(field: &str, value: &'a FieldValue) -> Result<&'a str, ValidationResult> {
    match value {
        FieldValue::Text(s) => Ok(s),
        FieldValue::File(_) => Err(ValidationResult::invalid(format!(
            "{} must be text",
            label(field)
        ))),
        FieldValue::Undefined => Err(required_error(field)),
    }
}

/// Names and titles: 2..=100 characters after trimming
pub fn name(field: &str, value: &FieldValue, _ctx: &RuleContext) -> ValidationResult {
    let text = match expect_text(field, value) {
        Ok(t) => t.trim(),
        Err(result) => return result,
    };
    let len = text.chars().count();
    if len == 0 {
        return required_error(field);
    }
    if len < NAME_MIN_CHARS {
        return ValidationResult::invalid(format!(
            "{} must be at least {} characters long",
            label(field),
            NAME_MIN_CHARS
        ));
    }
    if len > NAME_MAX_CHARS {
        return ValidationResult::invalid(format!(
            "{} must be less than {} characters",
            label(field),
            NAME_MAX_CHARS
        ));
    }
    ValidationResult::formatted(text)
}

pub fn email(field: &str, value: &FieldValue, _ctx: &RuleContext) -> ValidationResult {
    let text = match expect_text(field, value) {
        Ok(t) => t.trim(),
        Err(result) => return result,
    };
    if text.is_empty() {
        return required_error(field);
    }
    if text.len() > EMAIL_MAX_CHARS {
        return ValidationResult::invalid("Email address is too long");
    }
    if !EMAIL_PATTERN.is_match(text) {
        return ValidationResult::invalid(INVALID_EMAIL);
    }

    let normalized = text.to_lowercase();
    let domain = normalized.rsplit('@').next().unwrap_or_default();
    if DISPOSABLE_DOMAINS.contains(&domain) {
        return ValidationResult::invalid(DISPOSABLE_EMAIL);
    }

    let result = ValidationResult::formatted(&normalized);
    if PERSONAL_DOMAINS.contains(&domain) {
        result.with_warning(PERSONAL_EMAIL_WARNING)
    } else {
        result
    }
}

/// Phone numbers need at least 10 digits, or 7 when written with a leading
/// `+` country code, and never more than 15.
pub fn phone(field: &str, value: &FieldValue, ctx: &RuleContext) -> ValidationResult {
    let text = match expect_text(field, value) {
        Ok(t) => t.trim(),
        Err(result) => return result,
    };
    let international = text.starts_with('+');
    let digits = digits_only(text);
    let min = if international {
        PHONE_MIN_DIGITS_INTERNATIONAL
    } else {
        PHONE_MIN_DIGITS
    };
    if digits.len() < min || digits.len() > PHONE_MAX_DIGITS {
        return ValidationResult::invalid(INVALID_PHONE);
    }
    ValidationResult::formatted(format_phone(&digits, ctx.region, international))
}

/// Longest run of one non-whitespace character. `regex` has no
/// backreferences, so this one is a scan.
fn longest_repeat(text: &str) -> usize {
    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<char> = None;
    for c in text.chars() {
        run = match prev {
            Some(p) if p == c && !c.is_whitespace() => run + 1,
            _ if c.is_whitespace() => 0,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(c);
    }
    best
}

/// Two or more of: a raw URL, five uppercase letters in a row, one character
/// repeated five times in a row.
pub fn looks_like_spam(text: &str) -> bool {
    let signals = [
        URL_PATTERN.is_match(text),
        SHOUTING_PATTERN.is_match(text),
        longest_repeat(text) >= 5,
    ];
    signals.iter().filter(|s| **s).count() >= 2
}

pub fn message(field: &str, value: &FieldValue, _ctx: &RuleContext) -> ValidationResult {
    let text = match expect_text(field, value) {
        Ok(t) => t.trim(),
        Err(result) => return result,
    };
    let len = text.chars().count();
    if len == 0 {
        return required_error(field);
    }
    if len < MESSAGE_MIN_CHARS {
        return ValidationResult::invalid(format!(
            "{} must be at least {} characters long",
            label(field),
            MESSAGE_MIN_CHARS
        ));
    }
    if len > MESSAGE_MAX_CHARS {
        return ValidationResult::invalid(format!(
            "{} must be less than {} characters",
            label(field),
            MESSAGE_MAX_CHARS
        ));
    }
    if looks_like_spam(text) {
        return ValidationResult::invalid(SPAM_MESSAGE);
    }
    ValidationResult::formatted(text)
}

/// Validate a budget against an explicit range
pub fn validate_budget(value: &str, range: BudgetRange) -> ValidationResult {
    let Some(amount) = parse_amount(value) else {
        return ValidationResult::invalid(INVALID_BUDGET);
    };
    if amount < range.min {
        return ValidationResult::invalid(format!(
            "Budget must be at least {}",
            format_currency(range.min)
        ));
    }
    if amount > range.max {
        return ValidationResult::invalid(format!(
            "Budget must not exceed {}",
            format_currency(range.max)
        ));
    }
    ValidationResult::formatted(format_currency(amount))
}

pub fn budget(field: &str, value: &FieldValue, ctx: &RuleContext) -> ValidationResult {
    match expect_text(field, value) {
        Ok(text) => validate_budget(text, ctx.budget),
        Err(result) => result,
    }
}

pub fn has_forbidden_name_chars(name: &str) -> bool {
    name.chars()
        .any(|c| c.is_control() || FORBIDDEN_FILE_NAME_CHARS.contains(&c))
}

/// Validate one file against a rule
pub fn validate_file(file: &UploadedFile, rule: &FileRule) -> ValidationResult {
    if file.name.trim().is_empty() || has_forbidden_name_chars(&file.name) {
        return ValidationResult::invalid(INVALID_FILE_NAME);
    }
    if file.size_bytes == 0 {
        return ValidationResult::invalid("File is empty");
    }
    if file.size_bytes > rule.max_bytes {
        return ValidationResult::invalid(rule.size_error);
    }
    match file.extension() {
        Some(ext) if rule.extensions.contains(&ext.as_str()) => ValidationResult::valid(),
        _ => ValidationResult::invalid(rule.type_error),
    }
}

/// The file rule that applies to an upload field, if it is one
pub fn file_rule_for(field: &str) -> Option<&'static FileRule> {
    match field {
        "resume" => Some(&RESUME_RULE),
        "coverLetter" => Some(&COVER_LETTER_RULE),
        _ => None,
    }
}

/// A file attached to a field that takes no uploads
pub fn file_not_accepted(field: &str) -> ValidationResult {
    ValidationResult::invalid(format!("File uploads are not accepted for {}", label(field)))
}

pub fn resume(field: &str, value: &FieldValue, _ctx: &RuleContext) -> ValidationResult {
    match value {
        FieldValue::File(file) => validate_file(file, &RESUME_RULE),
        FieldValue::Text(_) => ValidationResult::invalid(format!(
            "Please upload your {}",
            label(field).to_lowercase()
        )),
        FieldValue::Undefined => required_error(field),
    }
}

/// Cover letters may be uploaded or pasted in
pub fn cover_letter(field: &str, value: &FieldValue, _ctx: &RuleContext) -> ValidationResult {
    match value {
        FieldValue::File(file) => validate_file(file, &COVER_LETTER_RULE),
        FieldValue::Text(text) if text.trim().chars().count() > COVER_LETTER_MAX_CHARS => {
            ValidationResult::invalid(format!(
                "{} must be less than {} characters",
                label(field),
                COVER_LETTER_MAX_CHARS
            ))
        }
        FieldValue::Text(text) => ValidationResult::formatted(text.trim()),
        FieldValue::Undefined => required_error(field),
    }
}

pub fn selection(field: &str, value: &FieldValue, _ctx: &RuleContext) -> ValidationResult {
    match expect_text(field, value) {
        Ok(text) if text.trim().is_empty() => required_error(field),
        Ok(text) => ValidationResult::formatted(text.trim()),
        Err(result) => result,
    }
}

/// Optional free-form tags such as service or industry
pub fn tag(field: &str, value: &FieldValue, _ctx: &RuleContext) -> ValidationResult {
    let text = match expect_text(field, value) {
        Ok(t) => t.trim(),
        Err(result) => return result,
    };
    if text.chars().count() > NAME_MAX_CHARS {
        return ValidationResult::invalid(format!(
            "{} must be less than {} characters",
            label(field),
            NAME_MAX_CHARS
        ));
    }
    ValidationResult::formatted(text)
}

pub fn website(field: &str, value: &FieldValue, _ctx: &RuleContext) -> ValidationResult {
    let text = match expect_text(field, value) {
        Ok(t) => t.trim(),
        Err(result) => return result,
    };
    if WEBSITE_PATTERN.is_match(text) {
        ValidationResult::formatted(text)
    } else {
        ValidationResult::invalid(INVALID_URL)
    }
}
