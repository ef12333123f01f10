//! Form domain layer
//!
//! Form kinds and the values a caller collects for them.

mod field;
mod kind;

pub use field::{FieldValue, FileSource, FormValues, UploadedFile};
pub use kind::FormKind;
