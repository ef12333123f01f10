//! Locale-aware display formatting for phone numbers and money amounts

use serde::{Deserialize, Serialize};

/// Region whose grouping conventions are used for phone numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneRegion {
    #[default]
    Us,
    Ca,
    Uk,
    Au,
    Other,
}

/// Keep only ASCII digits
pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Group a digit string for display. Numbers that do not match the region's
/// national shape are returned as plain digits, prefixed with `+` when the
/// caller wrote them in international form.
pub fn format_phone(digits: &str, region: PhoneRegion, international: bool) -> String {
    let grouped = match (region, digits.len()) {
        (PhoneRegion::Us | PhoneRegion::Ca, 10) => Some(format!(
            "({}) {}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..]
        )),
        (PhoneRegion::Us | PhoneRegion::Ca, 11) if digits.starts_with('1') => Some(format!(
            "+1 ({}) {}-{}",
            &digits[1..4],
            &digits[4..7],
            &digits[7..]
        )),
        (PhoneRegion::Uk, 11) if digits.starts_with('0') => {
            Some(format!("{} {}", &digits[0..5], &digits[5..]))
        }
        (PhoneRegion::Uk, 12) if digits.starts_with("44") => Some(format!(
            "+44 {} {}",
            &digits[2..6],
            &digits[6..]
        )),
        (PhoneRegion::Au, 10) if digits.starts_with('0') => Some(format!(
            "{} {} {}",
            &digits[0..4],
            &digits[4..7],
            &digits[7..]
        )),
        (PhoneRegion::Au, 11) if digits.starts_with("61") => Some(format!(
            "+61 {} {} {}",
            &digits[2..3],
            &digits[3..7],
            &digits[7..]
        )),
        _ => None,
    };

    grouped.unwrap_or_else(|| {
        if international {
            format!("+{digits}")
        } else {
            digits.to_string()
        }
    })
}

/// Parse a user-typed money amount, ignoring currency symbols, thousands
/// separators and whitespace. Returns None for anything that is not a
/// finite, non-negative number.
pub fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let amount: f64 = cleaned.parse().ok()?;
    if amount.is_finite() && amount >= 0.0 {
        Some(amount)
    } else {
        None
    }
}

/// Format as US dollars: `$1,000` or `$2,500.50`
pub fn format_currency(amount: f64) -> String {
    let cents = (amount * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if frac == 0 {
        format!("${grouped}")
    } else {
        format!("${grouped}.{frac:02}")
    }
}
