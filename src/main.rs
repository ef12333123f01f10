//! formflow - submit a form from the command line
//!
//! `formflow <kind> <values.json>` loads the pipeline configuration, submits
//! the values through the HTTP transport and prints the outcome as JSON.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use formflow::{
    AnalyticsBinding, DraftStore, EventBus, FieldValue, FileStore, FormController, FormKind,
    FormValues, KeyValueStore, MemoryStore, PipelineConfig, ReqwestTransport, SubmitOptions,
    TracingSink, UploadedFile,
};
use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "formflow", version)]
#[command(about = "Validate and submit a form, printing the outcome as JSON")]
struct Cli {
    /// Form kind: contact, consultation, job_application or newsletter
    #[arg(value_parser = parse_kind)]
    kind: FormKind,

    /// JSON object of field values; `{"file": "<path>"}` attaches a file
    values: PathBuf,

    /// Endpoint path or absolute URL overriding the configured one
    #[arg(short, long)]
    endpoint: Option<String>,
}

fn parse_kind(raw: &str) -> std::result::Result<FormKind, String> {
    raw.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the outcome
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Arc::new(PipelineConfig::load().context("Failed to load configuration")?);
    let values = read_values(&cli.values).await?;

    let transport = Arc::new(ReqwestTransport::from_config(&config)?);
    let storage: Arc<dyn KeyValueStore> = match FileStore::default_location() {
        Some(store) => Arc::new(store),
        None => {
            tracing::warn!("No data directory, drafts kept in memory");
            Arc::new(MemoryStore::new())
        }
    };
    let drafts = DraftStore::from_config(storage, &config);
    let events = EventBus::new();
    let analytics = AnalyticsBinding::spawn(&events, Arc::new(TracingSink));

    let form = Arc::new(FormController::new(
        cli.kind,
        config,
        transport,
        drafts,
        events,
    ));

    // Ctrl-C cancels the in-flight attempt
    let weak = Arc::downgrade(&form);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if let Some(form) = weak.upgrade() {
                form.cancel_submission();
            }
        }
    });

    let options = match cli.endpoint {
        Some(endpoint) => SubmitOptions::default().with_endpoint(endpoint),
        None => SubmitOptions::default(),
    };
    let outcome = form.submit_form(&values, options).await;
    interrupt.abort();
    drop(form);
    analytics.join().await;

    println!("{}", serde_json::to_string_pretty(&outcome.to_result())?);
    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Read a JSON object of field values. Strings, numbers and booleans become
/// text; `{"file": "<path>"}` attaches a file.
async fn read_values(path: &Path) -> Result<FormValues> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let object: Map<String, Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON object", path.display()))?;

    let mut values = FormValues::new();
    for (name, value) in object {
        let field = match value {
            Value::Null => continue,
            Value::String(text) => FieldValue::Text(text),
            Value::Number(n) => FieldValue::Text(n.to_string()),
            Value::Bool(b) => FieldValue::Text(b.to_string()),
            Value::Object(spec) => match spec.get("file").and_then(Value::as_str) {
                Some(file) => FieldValue::File(attach(PathBuf::from(file)).await?),
                None => bail!("Field '{name}' must be text or {{\"file\": \"<path>\"}}"),
            },
            Value::Array(_) => bail!("Field '{name}' must be text or {{\"file\": \"<path>\"}}"),
        };
        values.set(&name, field);
    }
    Ok(values)
}

async fn attach(path: PathBuf) -> Result<UploadedFile> {
    let metadata = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadedFile::from_path(
        &name,
        &extension,
        metadata.len(),
        path,
    ))
}
