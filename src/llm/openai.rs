use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::OpenAiSettings;
use crate::llm::client::{ModelClient, ModelRequest, OutputFormat};
use crate::llm::error::ModelError;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const PROVIDER: &str = "openai";

/// Responses API client. Holds no per-call state, so one instance serves
/// every request of a session.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    settings: OpenAiSettings,
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self { settings }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/responses",
            self.settings.base_url.as_str().trim_end_matches('/')
        )
    }

    fn redact(&self, text: &str) -> String {
        let key = self.settings.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    async fn send(&self, payload: &Value) -> Result<String, ModelError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(target: "llm.openai", payload = %summarize_payload(payload));
        }

        let response = get_http_client()
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .timeout(self.settings.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "OpenAI request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                ModelError::Transport(err_text)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("OpenAI API error: status={}, body={}", status, body_summary);
            return Err(ModelError::from_status(
                status,
                message.unwrap_or(body_summary),
            ));
        }

        let value = response
            .json::<Value>()
            .await
            .map_err(|err| ModelError::InvalidResponse(err.to_string()))?;

        if let Some(status) = value.get("status").and_then(Value::as_str) {
            if status == "incomplete" {
                let reason = value
                    .pointer("/incomplete_details/reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                warn!("OpenAI response incomplete (reason={})", reason);
            }
        }

        let text = extract_output_text(&value);
        if text.trim().is_empty() {
            warn!(
                "OpenAI response had no output text: {}",
                truncate_for_log(&value.to_string(), 2000)
            );
        }
        Ok(text)
    }
}

impl ModelClient for OpenAiClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let payload = build_payload(&self.settings.model, &self.settings.image_detail, request);
        let metadata = json!({
            "format": request.format.label(),
            "image": request.image.is_some(),
            "max_output_tokens": request.max_output_tokens,
        });
        log_llm_timing(
            PROVIDER,
            &self.settings.model,
            request.label,
            Some(metadata),
            || self.send(&payload),
        )
        .await
    }
}

fn build_text_format(format: &OutputFormat) -> Option<Value> {
    match format {
        OutputFormat::Text => None,
        OutputFormat::JsonObject => Some(json!({ "format": { "type": "json_object" } })),
        OutputFormat::JsonSchema { name, schema } => Some(json!({
            "format": {
                "type": "json_schema",
                "name": name,
                "schema": schema,
                "strict": true
            }
        })),
    }
}

pub(crate) fn build_payload(model: &str, image_detail: &str, request: &ModelRequest) -> Value {
    let mut content = vec![json!({ "type": "input_text", "text": request.text })];
    if let Some(image) = &request.image {
        content.push(json!({
            "type": "input_image",
            "image_url": image.to_data_url(),
            "detail": image_detail
        }));
    }

    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert("instructions".to_string(), json!(request.instructions));
    payload.insert(
        "input".to_string(),
        json!([{ "role": "user", "content": content }]),
    );
    payload.insert(
        "max_output_tokens".to_string(),
        json!(request.max_output_tokens),
    );
    if let Some(text) = build_text_format(&request.format) {
        payload.insert("text".to_string(), text);
    }
    Value::Object(payload)
}

/// Mirrors the SDK's `output_text` convenience: every `output_text` part of
/// every message item, joined.
pub(crate) fn extract_output_text(response: &Value) -> String {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }

    let mut parts = Vec::new();
    for item in response
        .get("output")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
    {
        for part in item
            .get("content")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
        {
            if part.get("type").and_then(Value::as_str) == Some("output_text") {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    parts.push(text);
                }
            }
        }
    }
    parts.join("")
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_payload(payload: &Value) -> Value {
    let mut summary = Map::new();
    for key in ["model", "max_output_tokens", "text"] {
        if let Some(value) = payload.get(key) {
            summary.insert(key.to_string(), value.clone());
        }
    }
    if let Some(instructions) = payload.get("instructions").and_then(Value::as_str) {
        summary.insert(
            "instructions".to_string(),
            json!(truncate_for_log(instructions, 120)),
        );
    }

    let parts: Vec<Value> = payload
        .pointer("/input/0/content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|part| match part.get("type").and_then(Value::as_str) {
                    Some("input_text") => json!({
                        "input_text": truncate_for_log(
                            part.get("text").and_then(Value::as_str).unwrap_or(""),
                            200
                        )
                    }),
                    Some("input_image") => json!({
                        "input_image": {
                            "urlLen": part
                                .get("image_url")
                                .and_then(Value::as_str)
                                .map(str::len)
                                .unwrap_or(0),
                            "detail": part.get("detail").cloned().unwrap_or(Value::Null)
                        }
                    }),
                    _ => json!({ "unknownPart": true }),
                })
                .collect()
        })
        .unwrap_or_default();
    summary.insert("content".to_string(), Value::Array(parts));

    Value::Object(summary)
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::media::ImageInput;

    #[test]
    fn payload_has_one_text_segment_and_at_most_one_image() {
        let request = ModelRequest::new("caption", "Be brief.", "Caption this.")
            .with_image(ImageInput::new(b"abc".to_vec(), "image/png", None))
            .with_max_output_tokens(400)
            .with_format(OutputFormat::JsonObject);

        let payload = build_payload("gpt-test", "high", &request);
        let content = payload
            .pointer("/input/0/content")
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "input_text");
        assert_eq!(content[1]["image_url"], "data:image/png;base64,YWJj");
        assert_eq!(content[1]["detail"], "high");
        assert_eq!(payload["max_output_tokens"], 400);
        assert_eq!(payload["text"]["format"]["type"], "json_object");
    }

    #[test]
    fn text_format_is_omitted_for_plain_requests() {
        let payload = build_payload("gpt-test", "low", &ModelRequest::new("repair", "x", "y"));
        assert!(payload.get("text").is_none());
        assert_eq!(payload.pointer("/input/0/content").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn schema_format_is_strict() {
        let request = ModelRequest::new("recreate", "x", "y").with_format(OutputFormat::JsonSchema {
            name: "package".into(),
            schema: json!({ "type": "object" }),
        });
        let payload = build_payload("gpt-test", "high", &request);
        assert_eq!(payload["text"]["format"]["name"], "package");
        assert_eq!(payload["text"]["format"]["strict"], true);
    }

    #[test]
    fn output_text_is_collected_from_message_items() {
        let response = json!({
            "output": [
                { "type": "reasoning", "summary": [] },
                { "type": "message", "content": [
                    { "type": "output_text", "text": "{\"a\":" },
                    { "type": "refusal", "refusal": "no" },
                    { "type": "output_text", "text": "1}" }
                ]}
            ]
        });
        assert_eq!(extract_output_text(&response), "{\"a\":1}");
        assert_eq!(extract_output_text(&json!({ "output_text": "hi" })), "hi");
        assert_eq!(extract_output_text(&json!({})), "");
    }

    #[test]
    fn error_body_prefers_api_message() {
        let (message, _) =
            summarize_error_body(r#"{"error":{"message":"Invalid schema for response_format"}}"#);
        assert_eq!(message.as_deref(), Some("Invalid schema for response_format"));
        assert_eq!(summarize_error_body("  ").1, "empty response body");
    }

    #[test]
    fn payload_summary_hides_image_data() {
        let request = ModelRequest::new("clone", "x", "y")
            .with_image(ImageInput::new(vec![7; 64], "image/jpeg", None));
        let summary = summarize_payload(&build_payload("gpt-test", "high", &request));
        let rendered = summary.to_string();
        assert!(rendered.contains("urlLen"));
        assert!(!rendered.contains("base64,"));
    }
}
