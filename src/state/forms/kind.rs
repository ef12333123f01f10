//! Form kinds and their per-kind field requirements

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The purpose of a form. Determines required fields and the default endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    Contact,
    Consultation,
    JobApplication,
    Newsletter,
}

impl FormKind {
    pub const ALL: [FormKind; 4] = [
        FormKind::Contact,
        FormKind::Consultation,
        FormKind::JobApplication,
        FormKind::Newsletter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Consultation => "consultation",
            Self::JobApplication => "job_application",
            Self::Newsletter => "newsletter",
        }
    }

    /// Fields that must be present and non-blank for a submission to proceed
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Contact => &["name", "email", "message"],
            Self::Consultation => &["name", "email", "message", "company"],
            Self::JobApplication => &["firstName", "lastName", "email", "resume", "jobId"],
            Self::Newsletter => &["email"],
        }
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required_fields().contains(&field)
    }

    /// Endpoint path used when the configuration has no override for this kind
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Contact => "/contact",
            Self::Consultation => "/consultation",
            Self::JobApplication => "/careers/apply",
            Self::Newsletter => "/newsletter/subscribe",
        }
    }

    /// Storage key for this kind's draft snapshot
    pub fn autosave_key(&self) -> String {
        format!("form_{}_autosave", self.as_str())
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contact" => Ok(Self::Contact),
            "consultation" => Ok(Self::Consultation),
            "job_application" | "job-application" => Ok(Self::JobApplication),
            "newsletter" => Ok(Self::Newsletter),
            _ => Err(format!("Invalid form kind: {}", s)),
        }
    }
}
