//! End-to-end behaviour of the submission pipeline against a scripted endpoint

use formflow::transport::HttpResponse;
use formflow::validation::{validate_budget, BudgetRange};
use formflow::{
    validate_field, validate_form, DraftStore, EventBus, FieldValue, FileStore, FormController,
    FormKind, FormValues, MemoryStore, MockTransport, PipelineConfig, SubmissionPhase,
    SubmitOptions, ValidationResult,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn config() -> PipelineConfig {
    PipelineConfig {
        base_url: "https://forms.acme.example/api".to_string(),
        retry_delay_ms: 5,
        autosave_debounce_ms: 5,
        ..PipelineConfig::default()
    }
}

fn form_with(kind: FormKind, mock: &MockTransport, drafts: DraftStore) -> Arc<FormController> {
    Arc::new(FormController::new(
        kind,
        Arc::new(config()),
        Arc::new(mock.clone()),
        drafts,
        EventBus::new(),
    ))
}

fn form(kind: FormKind, mock: &MockTransport) -> Arc<FormController> {
    let drafts = DraftStore::from_config(Arc::new(MemoryStore::new()), &config());
    form_with(kind, mock, drafts)
}

fn contact() -> FormValues {
    FormValues::new()
        .with("name", "Jo Smith")
        .with("email", "jo@acme.com")
        .with("message", "We need help rebuilding our intranet.")
}

#[test]
fn test_invalid_email_is_rejected() {
    let result = validate_field("email", &FieldValue::text("not-an-email"), FormKind::Contact);
    assert_eq!(
        result,
        ValidationResult::invalid("Please enter a valid email address")
    );
}

#[test]
fn test_short_message_fails_form_validation() {
    let values = FormValues::new()
        .with("name", "Jo")
        .with("email", "jo@acme.com")
        .with("message", "Hi");
    let results = validate_form(&values, FormKind::Contact);

    assert_eq!(
        results["message"].error.as_deref(),
        Some("Message must be at least 10 characters long")
    );
    assert!(results["name"].valid);
    assert!(results["email"].valid);
}

#[test]
fn test_budget_below_minimum() {
    let result = validate_budget("$500", BudgetRange::default());
    assert!(!result.valid);
    assert_eq!(result.error.as_deref(), Some("Budget must be at least $1,000"));
}

#[tokio::test]
async fn test_three_server_errors_then_success() {
    let mock = MockTransport::new();
    mock.add_responses("POST /api/contact", 500, "", 3);
    mock.add_responses("POST /api/contact", 200, r#"{"ok": true}"#, 1);
    let form = form(FormKind::Contact, &mock);

    let outcome = form.submit_form(&contact(), SubmitOptions::default()).await;

    assert!(outcome.is_success());
    assert_eq!(mock.call_count(), 4);
    let state = form.submission_state();
    assert_eq!(state.phase, SubmissionPhase::Succeeded);
    assert_eq!(state.retry_count, 3);
}

#[tokio::test]
async fn test_retry_ceiling_stops_network_calls() {
    let mock = MockTransport::new();
    mock.add_responses("POST /api/contact", 503, "", 10);
    let form = form(FormKind::Contact, &mock);

    let outcome = form.submit_form(&contact(), SubmitOptions::default()).await;

    assert_eq!(outcome.error().as_deref(), Some("Maximum retry attempts reached"));
    assert_eq!(form.submission_state().phase, SubmissionPhase::Failed);
    assert_eq!(mock.call_count(), 4);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(mock.call_count(), 4);
}

#[tokio::test]
async fn test_business_rejection_is_verbatim_and_not_retried() {
    let mock = MockTransport::new();
    mock.add_responses(
        "POST /api/newsletter/subscribe",
        400,
        r#"{"message": "This email is already subscribed"}"#,
        1,
    );
    let form = form(FormKind::Newsletter, &mock);

    let result = form
        .submit_form(
            &FormValues::new().with("email", "jo@acme.com"),
            SubmitOptions::default(),
        )
        .await
        .to_result();

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("This email is already subscribed"));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_required_fields_block_submission_for_every_kind() {
    for kind in FormKind::ALL {
        let mock = MockTransport::new();
        let form = form(kind, &mock);
        for required in kind.required_fields() {
            let values = FormValues::new().with(required, "");
            let outcome = form.submit_form(&values, SubmitOptions::default()).await;
            let errors = outcome.field_errors().expect("validation errors");
            assert!(errors.contains_key(*required), "{kind}: {required}");
        }
        assert_eq!(mock.call_count(), 0);
    }
}

#[tokio::test]
async fn test_at_most_one_submission_in_flight() {
    let mock = MockTransport::new();
    let release = mock.add_response_with_trigger(
        "POST /api/contact",
        Ok(HttpResponse::new(200, "{}")),
    );
    let form = form(FormKind::Contact, &mock);

    let first = {
        let form = form.clone();
        tokio::spawn(async move { form.submit_form(&contact(), SubmitOptions::default()).await })
    };
    while mock.in_flight_count() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let second = form.submit_form(&contact(), SubmitOptions::default()).await;
    assert_eq!(second.error().as_deref(), Some("Form is already being submitted"));

    release.send(()).unwrap();
    assert!(first.await.unwrap().is_success());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let mock = MockTransport::new();
    let _never = mock.add_response_with_trigger(
        "POST /api/contact",
        Ok(HttpResponse::new(200, "{}")),
    );
    let form = form(FormKind::Contact, &mock);

    let pending = {
        let form = form.clone();
        tokio::spawn(async move { form.submit_form(&contact(), SubmitOptions::default()).await })
    };
    while mock.in_flight_count() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(form.cancel_submission());
    assert!(!form.cancel_submission());
    let result = pending.await.unwrap().to_result();
    assert!(!result.success);
    assert!(result.cancelled);
    assert!(result.error.is_none());
    assert_eq!(form.submission_state().phase, SubmissionPhase::Cancelled);
}

#[tokio::test]
async fn test_draft_round_trip_and_cleared_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let drafts = DraftStore::from_config(Arc::new(FileStore::new(dir.path())), &config());
    let mock = MockTransport::new();
    mock.add_responses("POST /api/contact", 201, "", 1);
    let form = form_with(FormKind::Contact, &mock, drafts.clone());

    form.auto_save(&contact());
    assert_eq!(form.load_auto_save().await, Some(contact()));

    drafts.flush(FormKind::Contact).await;
    assert!(dir.path().join("form_contact_autosave.json").exists());

    assert!(form
        .submit_form(&contact(), SubmitOptions::default())
        .await
        .is_success());
    assert!(form.load_auto_save().await.is_none());
    assert!(!dir.path().join("form_contact_autosave.json").exists());
}
