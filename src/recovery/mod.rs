pub mod extract;
pub mod repair;
pub mod sanitize;

pub use extract::extract_json_object;

use crate::llm::error::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("JSON repair request failed: {0}")]
    Repair(#[from] ModelError),

    #[error("Model output is not valid JSON even after repair: {source} (output starts: {preview})")]
    Unparseable {
        source: serde_json::Error,
        preview: String,
    },

    #[error("Model output is a JSON {kind}, expected an object")]
    NotAnObject { kind: &'static str },
}
