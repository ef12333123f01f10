//! Form field value objects

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Result;

/// Where the bytes of an uploaded file live. The caller owns the handle;
/// the pipeline only reads it at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// Metadata for a file attached to a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub size_bytes: u64,
    /// MIME type or bare extension as reported by the caller
    pub mime_or_extension: String,
    pub source: FileSource,
}

impl UploadedFile {
    /// Build an in-memory file, taking its size from the bytes
    pub fn from_bytes(name: &str, mime_or_extension: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            size_bytes: bytes.len() as u64,
            mime_or_extension: mime_or_extension.to_string(),
            source: FileSource::Memory(bytes),
        }
    }

    pub fn from_path(name: &str, mime_or_extension: &str, size_bytes: u64, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            size_bytes,
            mime_or_extension: mime_or_extension.to_string(),
            source: FileSource::Path(path),
        }
    }

    /// Lower-cased extension including the dot (".pdf"), from the file name
    /// or, failing that, from `mime_or_extension`.
    pub fn extension(&self) -> Option<String> {
        if let Some(idx) = self.name.rfind('.') {
            if idx + 1 < self.name.len() {
                return Some(self.name[idx..].to_ascii_lowercase());
            }
        }
        let hint = self.mime_or_extension.trim().to_ascii_lowercase();
        match hint.as_str() {
            "" => None,
            "application/pdf" => Some(".pdf".to_string()),
            "application/msword" => Some(".doc".to_string()),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(".docx".to_string())
            }
            "text/plain" => Some(".txt".to_string()),
            h if h.starts_with('.') => Some(h.to_string()),
            h if !h.contains('/') => Some(format!(".{h}")),
            _ => None,
        }
    }

    /// MIME type to put on the multipart part
    pub fn content_type(&self) -> &str {
        if self.mime_or_extension.contains('/') {
            &self.mime_or_extension
        } else {
            "application/octet-stream"
        }
    }

    /// Read the file contents
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => Ok(tokio::fs::read(path).await?),
        }
    }
}

/// Type-safe field values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    Text(String),
    File(UploadedFile),
    #[default]
    Undefined,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Get the text value (returns None for files and undefined)
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            FieldValue::File(f) => Some(f),
            _ => None,
        }
    }

    /// Undefined, or text that is empty after trimming
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::File(_) => false,
            FieldValue::Undefined => true,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<UploadedFile> for FieldValue {
    fn from(value: UploadedFile) -> Self {
        FieldValue::File(value)
    }
}

/// Field name to value mapping for one form. Keys are unique; order is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormValues {
    fields: BTreeMap<String, FieldValue>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn has_files(&self) -> bool {
        self.fields
            .values()
            .any(|v| matches!(v, FieldValue::File(_)))
    }

    pub fn files(&self) -> impl Iterator<Item = (&String, &UploadedFile)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.as_file().map(|f| (k, f)))
    }

    /// Text-valued fields only. Files and undefined values are dropped.
    pub fn text_fields(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.as_text().map(|t| (k.clone(), t.to_string())))
            .collect()
    }

    pub fn from_text_fields(fields: BTreeMap<String, String>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k, FieldValue::Text(v)))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
