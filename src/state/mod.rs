//! Pipeline state module

mod forms;
mod submission;

pub use forms::*;
pub use submission::*;
