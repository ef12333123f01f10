//! formflow - resilient form submission pipeline
//!
//! Validates form values, submits them over HTTP with linear-backoff
//! retries and per-attempt cancellation, keeps debounced drafts of
//! in-progress input, and publishes lifecycle events for analytics.
//!
//! Most callers only need [`FormController`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use formflow::{
//!     DraftStore, EventBus, FormController, FormKind, FormValues, MemoryStore,
//!     PipelineConfig, ReqwestTransport, SubmitOptions,
//! };
//!
//! # async fn run() -> formflow::Result<()> {
//! let config = Arc::new(PipelineConfig::load()?);
//! let transport = Arc::new(ReqwestTransport::from_config(&config)?);
//! let drafts = DraftStore::from_config(Arc::new(MemoryStore::new()), &config);
//! let form = FormController::new(FormKind::Newsletter, config, transport, drafts, EventBus::new());
//!
//! let values = FormValues::new().with("email", "jo@acme.com");
//! let outcome = form.submit_form(&values, SubmitOptions::default()).await;
//! println!("{:?}", outcome.to_result());
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod draft;
pub mod error;
pub mod events;
pub mod form;
pub mod state;
pub mod submission;
pub mod transport;
pub mod validation;

pub use analytics::{AnalyticsBinding, AnalyticsEvent, AnalyticsSink, TracingSink};
pub use config::PipelineConfig;
pub use draft::{DraftSnapshot, DraftStore, FileStore, KeyValueStore, MemoryStore};
pub use error::{FormError, Result};
pub use events::{EventBus, LifecycleEvent};
pub use form::FormController;
pub use state::{
    FieldValue, FormKind, FormValues, RequestId, SubmissionPhase, SubmissionState, UploadedFile,
};
pub use submission::{RetryPolicy, SubmissionMachine, SubmitOptions, SubmitOutcome, SubmitResult};
pub use transport::{HttpTransport, MockTransport, ReqwestTransport};
pub use validation::{validate_field, validate_form, ValidationResult, ValidatorRegistry};
