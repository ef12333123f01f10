//! The submission state machine.
//!
//! One machine per form instance. It owns the single [`SubmissionState`]
//! record and drives validate → submit → retry/cancel → settle. Every network
//! attempt runs under its own [`CancellationToken`] and [`RequestId`]; a
//! result whose id no longer owns the slot is dropped as stale.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::outcome::{SubmitOptions, SubmitOutcome, MAX_RETRIES_REACHED};
use super::retry::RetryPolicy;
use crate::config::PipelineConfig;
use crate::draft::DraftStore;
use crate::events::{business_events, EventBus, LifecycleEvent};
use crate::state::{FormKind, FormValues, RequestId, SubmissionPhase, SubmissionState};
use crate::transport::{
    build_body, dispatch, Diagnostics, HttpTransport, SubmissionRequest, TransportOutcome,
};
use crate::validation::{field_errors, RuleContext, ValidatorRegistry};

struct Slot {
    record: SubmissionState,
    /// Token of the attempt or backoff that currently owns the slot
    token: Option<CancellationToken>,
    /// Options of the last submit, reused by explicit retries
    options: SubmitOptions,
}

impl Slot {
    fn owned_by(&self, id: RequestId, phase: SubmissionPhase) -> bool {
        self.record.request_id == Some(id) && self.record.phase == phase
    }
}

pub struct SubmissionMachine {
    kind: FormKind,
    config: Arc<PipelineConfig>,
    registry: ValidatorRegistry,
    transport: Arc<dyn HttpTransport>,
    drafts: DraftStore,
    events: EventBus,
    policy: RetryPolicy,
    slot: Mutex<Slot>,
}

impl SubmissionMachine {
    pub fn new(
        kind: FormKind,
        config: Arc<PipelineConfig>,
        transport: Arc<dyn HttpTransport>,
        drafts: DraftStore,
        events: EventBus,
    ) -> Self {
        Self {
            kind,
            registry: ValidatorRegistry::for_kind(kind, RuleContext::from_config(&config)),
            policy: RetryPolicy::from_config(&config),
            config,
            transport,
            drafts,
            events,
            slot: Mutex::new(Slot {
                record: SubmissionState::default(),
                token: None,
                options: SubmitOptions::default(),
            }),
        }
    }

    pub fn kind(&self) -> FormKind {
        self.kind
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Snapshot of the submission record
    pub fn state(&self) -> SubmissionState {
        self.slot.lock().record.clone()
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.slot.lock().record.phase
    }

    /// Validate and send `values`. Rejected immediately while another
    /// attempt owns the machine.
    pub async fn submit(&self, values: &FormValues, options: SubmitOptions) -> SubmitOutcome {
        {
            let mut slot = self.slot.lock();
            if !slot.record.phase.accepts_submit() {
                tracing::debug!(
                    form_kind = %self.kind,
                    phase = slot.record.phase.as_str(),
                    "Submit rejected, attempt already in progress"
                );
                return SubmitOutcome::AlreadySubmitting;
            }
            slot.record.reset();
            slot.record.phase = SubmissionPhase::Validating;
            slot.token = None;
            slot.options = options.clone();
        }

        if let Some(invalid) = self.validate(values) {
            let mut slot = self.slot.lock();
            if slot.record.phase == SubmissionPhase::Validating {
                slot.record.phase = SubmissionPhase::Idle;
            }
            return invalid;
        }

        let request = self.build_request(values, &options);
        let token = CancellationToken::new();
        {
            let mut slot = self.slot.lock();
            if slot.record.phase != SubmissionPhase::Validating {
                return SubmitOutcome::Cancelled;
            }
            slot.record.request_id = Some(request.request_id);
            slot.token = Some(token.clone());
        }

        self.run(request, token, business_events(self.kind, values))
            .await
    }

    /// Caller-driven retry after a failure. Counts against the same retry
    /// budget as automatic retries and waits out the same backoff. A
    /// cancelled submission stays cancelled until `reset()` or a new submit.
    pub async fn retry(&self, values: &FormValues) -> SubmitOutcome {
        let options = {
            let mut slot = self.slot.lock();
            if slot.record.phase.is_in_flight() {
                return SubmitOutcome::AlreadySubmitting;
            }
            if slot.record.phase == SubmissionPhase::Cancelled {
                tracing::debug!(form_kind = %self.kind, "Retry refused, submission was cancelled");
                return SubmitOutcome::Cancelled;
            }
            if self.policy.can_retry(slot.record.retry_count) {
                Some(slot.options.clone())
            } else {
                slot.record.phase = SubmissionPhase::Failed;
                slot.record.last_error = Some(MAX_RETRIES_REACHED.to_string());
                None
            }
        };
        let Some(options) = options else {
            tracing::warn!(form_kind = %self.kind, "Retry refused, retries exhausted");
            self.events.emit(LifecycleEvent::SubmitFailed {
                form_kind: self.kind,
                error: MAX_RETRIES_REACHED.to_string(),
                transient: true,
            });
            return SubmitOutcome::Failed {
                message: MAX_RETRIES_REACHED.to_string(),
            };
        };

        if let Some(invalid) = self.validate(values) {
            return invalid;
        }

        let request = self.build_request(values, &options);
        let token = CancellationToken::new();
        let retry = {
            let mut slot = self.slot.lock();
            if slot.record.phase.is_in_flight() {
                return SubmitOutcome::AlreadySubmitting;
            }
            if slot.record.phase == SubmissionPhase::Cancelled {
                return SubmitOutcome::Cancelled;
            }
            slot.record.retry_count += 1;
            slot.record.phase = SubmissionPhase::Retrying;
            slot.record.request_id = Some(request.request_id);
            slot.token = Some(token.clone());
            slot.record.retry_count
        };

        if !self.backoff(retry, &token).await {
            return SubmitOutcome::Cancelled;
        }
        self.run(request, token, business_events(self.kind, values))
            .await
    }

    /// Abort the in-flight call or pending backoff. Returns whether anything
    /// was cancelled; calling it again, or after settling, does nothing.
    pub fn cancel(&self) -> bool {
        let request_id = {
            let mut slot = self.slot.lock();
            if !matches!(
                slot.record.phase,
                SubmissionPhase::Submitting | SubmissionPhase::Retrying
            ) {
                return false;
            }
            if let Some(token) = slot.token.take() {
                token.cancel();
            }
            slot.record.phase = SubmissionPhase::Cancelled;
            slot.record.request_id
        };

        tracing::info!(form_kind = %self.kind, request_id = ?request_id, "Submission cancelled");
        self.events.emit(LifecycleEvent::SubmitCancelled {
            form_kind: self.kind,
            request_id,
        });
        true
    }

    /// Back to idle. Drafts are left alone.
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        if let Some(token) = slot.token.take() {
            token.cancel();
        }
        slot.record.reset();
        tracing::debug!(form_kind = %self.kind, "Submission state reset");
    }

    fn validate(&self, values: &FormValues) -> Option<SubmitOutcome> {
        let errors = field_errors(&self.registry.validate_form(values));
        if errors.is_empty() {
            return None;
        }
        tracing::debug!(
            form_kind = %self.kind,
            invalid_fields = errors.len(),
            "Validation failed, nothing sent"
        );
        for (field, error) in &errors {
            self.events.emit(LifecycleEvent::FieldInvalid {
                form_kind: self.kind,
                field: field.clone(),
                error: error.clone(),
            });
        }
        Some(SubmitOutcome::Invalid { errors })
    }

    fn build_request(&self, values: &FormValues, options: &SubmitOptions) -> SubmissionRequest {
        let url = self.config.url_for(self.kind, options.endpoint.as_deref());
        let diagnostics = Diagnostics::from_config(&self.config);
        SubmissionRequest::new(
            url,
            build_body(self.kind, values, &options.metadata, &diagnostics),
        )
    }

    /// Wait before retry `retry`. False if cancelled meanwhile.
    async fn backoff(&self, retry: u32, token: &CancellationToken) -> bool {
        let delay = self.policy.delay_for(retry);
        self.events.emit(LifecycleEvent::RetryScheduled {
            form_kind: self.kind,
            retry_count: retry,
            delay_ms: delay.as_millis() as u64,
        });
        tracing::info!(
            form_kind = %self.kind,
            retry_count = retry,
            backoff_ms = delay.as_millis() as u64,
            "Retrying submission after backoff"
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Move the slot from submitting to `phase` if `id` still owns it.
    /// Returns the retry count on success.
    fn settle(&self, id: RequestId, phase: SubmissionPhase, error: Option<String>) -> Option<u32> {
        let mut slot = self.slot.lock();
        if !slot.owned_by(id, SubmissionPhase::Submitting) {
            return None;
        }
        slot.record.phase = phase;
        slot.record.last_error = error;
        slot.token = None;
        Some(slot.record.retry_count)
    }

    async fn run(
        &self,
        mut request: SubmissionRequest,
        mut token: CancellationToken,
        business: Vec<LifecycleEvent>,
    ) -> SubmitOutcome {
        loop {
            let attempt = {
                let mut slot = self.slot.lock();
                let owns = slot.record.request_id == Some(request.request_id)
                    && matches!(
                        slot.record.phase,
                        SubmissionPhase::Validating | SubmissionPhase::Retrying
                    );
                if !owns {
                    return SubmitOutcome::Cancelled;
                }
                slot.record.phase = SubmissionPhase::Submitting;
                slot.record.retry_count
            };

            self.events.emit(LifecycleEvent::SubmitAttempted {
                form_kind: self.kind,
                request_id: request.request_id,
                attempt,
            });
            tracing::debug!(
                form_kind = %self.kind,
                request_id = %request.request_id,
                attempt,
                url = %request.url,
                "Submitting form"
            );

            let outcome = dispatch(
                self.transport.as_ref(),
                &request,
                &token,
                self.config.request_timeout(),
            )
            .await;

            match outcome {
                TransportOutcome::Success(data) => {
                    let Some(retry_count) =
                        self.settle(request.request_id, SubmissionPhase::Succeeded, None)
                    else {
                        return SubmitOutcome::Cancelled;
                    };
                    self.drafts.clear(self.kind).await;
                    tracing::info!(
                        form_kind = %self.kind,
                        request_id = %request.request_id,
                        retry_count,
                        "Form submitted"
                    );
                    self.events.emit(LifecycleEvent::SubmitSucceeded {
                        form_kind: self.kind,
                        request_id: request.request_id,
                        retry_count,
                    });
                    for event in business {
                        self.events.emit(event);
                    }
                    return SubmitOutcome::Succeeded { data };
                }
                TransportOutcome::Rejected(message) => {
                    if self
                        .settle(
                            request.request_id,
                            SubmissionPhase::Failed,
                            Some(message.clone()),
                        )
                        .is_none()
                    {
                        return SubmitOutcome::Cancelled;
                    }
                    tracing::warn!(
                        form_kind = %self.kind,
                        request_id = %request.request_id,
                        error = %message,
                        "Submission rejected by endpoint"
                    );
                    self.events.emit(LifecycleEvent::SubmitFailed {
                        form_kind: self.kind,
                        error: message.clone(),
                        transient: false,
                    });
                    return SubmitOutcome::Rejected { message };
                }
                TransportOutcome::Cancelled => return SubmitOutcome::Cancelled,
                TransportOutcome::Retryable(error) => {
                    let next = request.reissue();
                    let next_token = CancellationToken::new();
                    let scheduled = {
                        let mut slot = self.slot.lock();
                        if !slot.owned_by(request.request_id, SubmissionPhase::Submitting) {
                            return SubmitOutcome::Cancelled;
                        }
                        if self.policy.can_retry(slot.record.retry_count) {
                            slot.record.retry_count += 1;
                            slot.record.phase = SubmissionPhase::Retrying;
                            slot.record.last_error = Some(error.clone());
                            slot.record.request_id = Some(next.request_id);
                            slot.token = Some(next_token.clone());
                            Some(slot.record.retry_count)
                        } else {
                            slot.record.phase = SubmissionPhase::Failed;
                            slot.record.last_error = Some(MAX_RETRIES_REACHED.to_string());
                            slot.token = None;
                            None
                        }
                    };

                    let Some(retry) = scheduled else {
                        tracing::warn!(
                            form_kind = %self.kind,
                            request_id = %request.request_id,
                            error = %error,
                            "Submission failed, retries exhausted"
                        );
                        self.events.emit(LifecycleEvent::SubmitFailed {
                            form_kind: self.kind,
                            error: MAX_RETRIES_REACHED.to_string(),
                            transient: true,
                        });
                        return SubmitOutcome::Failed {
                            message: MAX_RETRIES_REACHED.to_string(),
                        };
                    };

                    tracing::warn!(
                        form_kind = %self.kind,
                        request_id = %request.request_id,
                        retry_count = retry,
                        error = %error,
                        "Transient submission failure"
                    );
                    if !self.backoff(retry, &next_token).await {
                        return SubmitOutcome::Cancelled;
                    }
                    request = next;
                    token = next_token;
                }
            }
        }
    }
}
