//! Submission state machine: validate, send, retry with linear backoff,
//! cancel, settle.

mod machine;
mod outcome;
mod retry;

pub use machine::SubmissionMachine;
pub use outcome::{
    SubmitOptions, SubmitOutcome, SubmitResult, ALREADY_SUBMITTING, MAX_RETRIES_REACHED,
    VALIDATION_FAILED,
};
pub use retry::RetryPolicy;
