//! Caller-facing form controller.
//!
//! Ties one form instance's field values, inline errors, draft and
//! submission machine together behind the operations a UI layer calls.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::draft::DraftStore;
use crate::events::{EventBus, LifecycleEvent};
use crate::state::{FieldValue, FormKind, FormValues, RequestId, SubmissionState, UploadedFile};
use crate::submission::{SubmissionMachine, SubmitOptions, SubmitOutcome};
use crate::transport::{
    build_upload_body, dispatch, Diagnostics, HttpTransport, SubmissionRequest, TransportOutcome,
};
use crate::validation::rules::file_not_accepted;
use crate::validation::{validate_file, ValidationResult};

pub struct FormController {
    kind: FormKind,
    config: Arc<PipelineConfig>,
    transport: Arc<dyn HttpTransport>,
    drafts: DraftStore,
    events: EventBus,
    machine: SubmissionMachine,
    values: Mutex<FormValues>,
    errors: Mutex<BTreeMap<String, String>>,
    /// Tokens of the uploads currently on the wire
    uploads: Mutex<HashMap<RequestId, CancellationToken>>,
    started: AtomicBool,
}

impl FormController {
    pub fn new(
        kind: FormKind,
        config: Arc<PipelineConfig>,
        transport: Arc<dyn HttpTransport>,
        drafts: DraftStore,
        events: EventBus,
    ) -> Self {
        let machine = SubmissionMachine::new(
            kind,
            config.clone(),
            transport.clone(),
            drafts.clone(),
            events.clone(),
        );
        Self {
            kind,
            config,
            transport,
            drafts,
            events,
            machine,
            values: Mutex::new(FormValues::new()),
            errors: Mutex::new(BTreeMap::new()),
            uploads: Mutex::new(HashMap::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> FormKind {
        self.kind
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn values(&self) -> FormValues {
        self.values.lock().clone()
    }

    pub fn errors(&self) -> BTreeMap<String, String> {
        self.errors.lock().clone()
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.machine.state()
    }

    /// Record a field change: marks the form started, drops the field's
    /// stale error and schedules an auto-save.
    pub fn update_field(&self, name: &str, value: impl Into<FieldValue>) {
        if !self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(form_kind = %self.kind, "Form started");
            self.events.emit(LifecycleEvent::FormStarted {
                form_kind: self.kind,
            });
        }

        let snapshot = {
            let mut values = self.values.lock();
            values.set(name, value);
            values.clone()
        };
        self.errors.lock().remove(name);
        self.auto_save(&snapshot);
    }

    /// Validate one value and keep the inline error in sync with the result
    pub fn validate_field(&self, name: &str, value: &FieldValue) -> ValidationResult {
        let result = self.machine.registry().validate_field(name, value);
        self.record(name, &result);
        result
    }

    pub fn get_field_error(&self, name: &str) -> Option<String> {
        self.errors.lock().get(name).cloned()
    }

    /// No inline errors and the current values pass validation
    pub fn is_form_valid(&self) -> bool {
        if !self.errors.lock().is_empty() {
            return false;
        }
        let values = self.values.lock().clone();
        self.machine.registry().is_valid(&values)
    }

    pub async fn submit_form(&self, values: &FormValues, options: SubmitOptions) -> SubmitOutcome {
        let outcome = self.machine.submit(values, options).await;
        self.absorb(&outcome);
        outcome
    }

    pub async fn retry_submission(&self, values: &FormValues) -> SubmitOutcome {
        let outcome = self.machine.retry(values).await;
        self.absorb(&outcome);
        outcome
    }

    /// Cancel the in-flight submission and any pending uploads. Returns
    /// whether anything was cancelled.
    pub fn cancel_submission(&self) -> bool {
        let submission = self.machine.cancel();
        let uploads = self.cancel_uploads();
        submission || uploads
    }

    /// Clear values, errors and submission state. The draft is kept.
    pub fn reset_form(&self) {
        self.machine.reset();
        self.cancel_uploads();
        self.values.lock().clear();
        self.errors.lock().clear();
        self.started.store(false, Ordering::SeqCst);
    }

    /// Validate `file` for `field_name`, upload it on its own and keep it in
    /// the form's values once the endpoint accepts it.
    pub async fn handle_file_upload(&self, file: UploadedFile, field_name: &str) -> SubmitOutcome {
        let result = match self.machine.registry().file_rule(field_name) {
            Some(rule) => validate_file(&file, rule),
            None => file_not_accepted(field_name),
        };
        self.record(field_name, &result);
        if let Some(error) = result.error {
            let mut errors = BTreeMap::new();
            errors.insert(field_name.to_string(), error);
            return SubmitOutcome::Invalid { errors };
        }

        let body = build_upload_body(
            self.kind,
            field_name,
            &file,
            &Diagnostics::from_config(&self.config),
        );
        let request = SubmissionRequest::new(self.config.upload_url(), body);
        tracing::debug!(
            form_kind = %self.kind,
            request_id = %request.request_id,
            field = field_name,
            size_bytes = file.size_bytes,
            "Uploading file"
        );

        let token = CancellationToken::new();
        self.uploads.lock().insert(request.request_id, token.clone());
        let outcome = dispatch(
            self.transport.as_ref(),
            &request,
            &token,
            self.config.request_timeout(),
        )
        .await;
        self.uploads.lock().remove(&request.request_id);

        match outcome {
            TransportOutcome::Success(data) => {
                self.values.lock().set(field_name, file);
                tracing::info!(form_kind = %self.kind, field = field_name, "File uploaded");
                SubmitOutcome::Succeeded { data }
            }
            TransportOutcome::Rejected(message) => {
                tracing::warn!(form_kind = %self.kind, field = field_name, error = %message, "Upload rejected");
                SubmitOutcome::Rejected { message }
            }
            TransportOutcome::Retryable(message) => {
                tracing::warn!(form_kind = %self.kind, field = field_name, error = %message, "Upload failed");
                SubmitOutcome::Failed { message }
            }
            TransportOutcome::Cancelled => {
                tracing::info!(form_kind = %self.kind, field = field_name, "Upload cancelled");
                SubmitOutcome::Cancelled
            }
        }
    }

    pub fn auto_save(&self, values: &FormValues) {
        self.drafts.save(self.kind, values);
    }

    /// Restore the saved draft into the form, if one is usable
    pub async fn load_auto_save(&self) -> Option<FormValues> {
        let restored = self.drafts.load(self.kind).await?;
        {
            let mut values = self.values.lock();
            for (name, value) in restored.iter() {
                values.set(name, value.clone());
            }
        }
        tracing::debug!(form_kind = %self.kind, fields = restored.len(), "Draft restored");
        Some(restored)
    }

    pub async fn clear_auto_save(&self) {
        self.drafts.clear(self.kind).await;
    }

    fn cancel_uploads(&self) -> bool {
        let pending: Vec<_> = self.uploads.lock().drain().collect();
        for (_, token) in &pending {
            token.cancel();
        }
        !pending.is_empty()
    }

    fn record(&self, name: &str, result: &ValidationResult) {
        match &result.error {
            Some(error) => {
                self.errors.lock().insert(name.to_string(), error.clone());
                self.events.emit(LifecycleEvent::FieldInvalid {
                    form_kind: self.kind,
                    field: name.to_string(),
                    error: error.clone(),
                });
            }
            None => {
                self.errors.lock().remove(name);
            }
        }
    }

    fn absorb(&self, outcome: &SubmitOutcome) {
        match outcome {
            SubmitOutcome::Invalid { errors } => *self.errors.lock() = errors.clone(),
            SubmitOutcome::Succeeded { .. } => self.errors.lock().clear(),
            _ => {}
        }
    }
}
