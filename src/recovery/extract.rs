use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::llm::client::ModelClient;
use crate::recovery::repair::repair_with_model;
use crate::recovery::sanitize::sanitize_json_text;
use crate::recovery::RecoveryError;

/// Which stage of the escalation produced the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    Direct,
    Sanitized,
    BraceDelimited,
    ModelRepair,
}

impl RecoveryStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryStrategy::Direct => "direct",
            RecoveryStrategy::Sanitized => "sanitized",
            RecoveryStrategy::BraceDelimited => "brace_delimited",
            RecoveryStrategy::ModelRepair => "model_repair",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub object: Map<String, Value>,
    pub strategy: RecoveryStrategy,
}

/// Strictly parses `text` as a JSON object. Syntax errors and non-object
/// values both yield `None`.
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Slice from the first `{` to the last `}`, if the pair exists in order.
pub fn brace_candidate(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Every mechanical strategy, in order. `Err` carries the text that has to
/// go to the model: the brace-delimited candidate when one exists, the whole
/// sanitized text otherwise.
pub fn recover_locally(raw: &str) -> Result<Recovered, String> {
    let raw = raw.trim();

    if let Some(object) = parse_object(raw) {
        return Ok(Recovered {
            object,
            strategy: RecoveryStrategy::Direct,
        });
    }

    let cleaned = sanitize_json_text(raw);
    if let Some(object) = parse_object(&cleaned) {
        return Ok(Recovered {
            object,
            strategy: RecoveryStrategy::Sanitized,
        });
    }

    match brace_candidate(&cleaned) {
        Some(candidate) => match parse_object(candidate) {
            Some(object) => Ok(Recovered {
                object,
                strategy: RecoveryStrategy::BraceDelimited,
            }),
            None => Err(candidate.to_string()),
        },
        None => Err(cleaned),
    }
}

/// Recovers a JSON object from raw model output, calling the model for one
/// repair round only when every mechanical strategy fails.
pub async fn extract_json_object<C: ModelClient>(
    client: &C,
    raw: &str,
) -> Result<Recovered, RecoveryError> {
    match recover_locally(raw) {
        Ok(recovered) => {
            debug!(
                "Recovered JSON object via {} ({} keys)",
                recovered.strategy.as_str(),
                recovered.object.len()
            );
            Ok(recovered)
        }
        Err(candidate) => {
            warn!(
                "Mechanical JSON recovery failed for {} chars of model output; asking {}/{} to repair",
                raw.len(),
                client.provider(),
                client.model()
            );
            let object = repair_with_model(client, &candidate).await?;
            Ok(Recovered {
                object,
                strategy: RecoveryStrategy::ModelRepair,
            })
        }
    }
}
