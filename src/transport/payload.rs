//! Request body assembly

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::{FilePart, RequestBody};
use crate::config::PipelineConfig;
use crate::state::{FormKind, FormValues, UploadedFile};

/// Non-sensitive context attached to every payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub submitted_at: DateTime<Utc>,
    pub url: String,
    pub user_agent: String,
}

impl Diagnostics {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            submitted_at: Utc::now(),
            url: config.origin_url().to_string(),
            user_agent: config.user_agent.clone(),
        }
    }

    fn entries(&self) -> [(&'static str, String); 3] {
        [
            (
                "submittedAt",
                self.submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("url", self.url.clone()),
            ("userAgent", self.user_agent.clone()),
        ]
    }
}

/// Part names the pipeline writes itself; caller fields and metadata never
/// shadow them
const RESERVED_FIELDS: &[&str] = &[
    "formType",
    "submittedAt",
    "url",
    "userAgent",
    "file",
    "fieldName",
];

fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the body for a form submission. Text-only forms become JSON; any
/// attached file switches the body to multipart.
pub fn build_body(
    kind: FormKind,
    values: &FormValues,
    metadata: &Map<String, Value>,
    diagnostics: &Diagnostics,
) -> RequestBody {
    let metadata = metadata.iter().filter(|(k, _)| !is_reserved(k));
    if values.has_files() {
        let mut fields: Vec<(String, String)> = values
            .text_fields()
            .into_iter()
            .filter(|(k, _)| !is_reserved(k))
            .collect();
        fields.extend(metadata.map(|(k, v)| (k.clone(), value_to_text(v))));
        fields.push(("formType".to_string(), kind.as_str().to_string()));
        fields.extend(
            diagnostics
                .entries()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );
        let files = values
            .files()
            .map(|(name, file)| FilePart {
                field_name: name.clone(),
                file: file.clone(),
            })
            .collect();
        return RequestBody::Multipart { fields, files };
    }

    let mut body: Map<String, Value> = values
        .text_fields()
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    for (k, v) in metadata {
        body.insert(k.clone(), v.clone());
    }
    body.insert("formType".to_string(), Value::String(kind.as_str().to_string()));
    for (k, v) in diagnostics.entries() {
        body.insert(k.to_string(), Value::String(v));
    }
    RequestBody::Json(Value::Object(body))
}

/// Body for a stand-alone file upload: `file`, `fieldName`, `formType`
pub fn build_upload_body(
    kind: FormKind,
    field_name: &str,
    file: &UploadedFile,
    diagnostics: &Diagnostics,
) -> RequestBody {
    let mut fields = vec![("formType".to_string(), kind.as_str().to_string())];
    fields.extend(
        diagnostics
            .entries()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v)),
    );
    RequestBody::Multipart {
        fields,
        files: vec![FilePart {
            field_name: field_name.to_string(),
            file: file.clone(),
        }],
    }
}
