use serde_json::{Map, Value};
use tracing::warn;

use crate::config::REPAIR_SYSTEM_PROMPT;
use crate::llm::client::{ModelClient, ModelRequest};
use crate::recovery::sanitize::sanitize_json_text;
use crate::recovery::RecoveryError;

const REPAIR_MAX_OUTPUT_TOKENS: u32 = 1600;
const PREVIEW_CHARS: usize = 200;

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{truncated}...")
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Asks the model to rewrite `candidate` as strict JSON. Costs one extra
/// request; its output is sanitized once and parsed, with no further rounds.
pub async fn repair_with_model<C: ModelClient>(
    client: &C,
    candidate: &str,
) -> Result<Map<String, Value>, RecoveryError> {
    let request = ModelRequest::new("json_repair", REPAIR_SYSTEM_PROMPT, candidate)
        .with_max_output_tokens(REPAIR_MAX_OUTPUT_TOKENS);

    let fixed = client.complete(&request).await?;
    let fixed = sanitize_json_text(fixed.trim());

    match serde_json::from_str::<Value>(&fixed) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => {
            warn!("JSON repair produced a {} instead of an object", value_kind(&other));
            Err(RecoveryError::NotAnObject {
                kind: value_kind(&other),
            })
        }
        Err(source) => {
            warn!("JSON repair output is still invalid: {}", source);
            Err(RecoveryError::Unparseable {
                source,
                preview: preview(&fixed),
            })
        }
    }
}
