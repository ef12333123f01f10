//! Submission lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation token for one network attempt. Never reused across attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Phase of the submission state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Validating,
    Submitting,
    Retrying,
    Succeeded,
    Failed,
    Cancelled,
}

impl SubmissionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Submitting => "submitting",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a new submission attempt may start from this phase
    pub fn accepts_submit(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Succeeded | Self::Failed | Self::Cancelled
        )
    }

    /// An attempt is validating, on the wire, or waiting out a backoff
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Validating | Self::Submitting | Self::Retrying)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for SubmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single active submission record of a form instance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SubmissionState {
    pub phase: SubmissionPhase,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Id of the most recent network attempt
    pub request_id: Option<RequestId>,
}

impl SubmissionState {
    /// Back to idle, dropping transient error and retry state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_accepts_submit() {
        assert!(SubmissionPhase::Idle.accepts_submit());
        assert!(SubmissionPhase::Succeeded.accepts_submit());
        assert!(SubmissionPhase::Failed.accepts_submit());
        assert!(SubmissionPhase::Cancelled.accepts_submit());
        assert!(!SubmissionPhase::Validating.accepts_submit());
        assert!(!SubmissionPhase::Submitting.accepts_submit());
        assert!(!SubmissionPhase::Retrying.accepts_submit());
    }

    #[test]
    fn test_in_flight_and_terminal_are_disjoint() {
        for phase in [
            SubmissionPhase::Idle,
            SubmissionPhase::Validating,
            SubmissionPhase::Submitting,
            SubmissionPhase::Retrying,
            SubmissionPhase::Succeeded,
            SubmissionPhase::Failed,
            SubmissionPhase::Cancelled,
        ] {
            assert!(!(phase.is_in_flight() && phase.is_terminal()), "{phase}");
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = SubmissionState {
            phase: SubmissionPhase::Failed,
            retry_count: 3,
            last_error: Some("boom".to_string()),
            request_id: Some(RequestId::new()),
        };
        state.reset();
        assert_eq!(state, SubmissionState::default());
    }
}
