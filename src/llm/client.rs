use serde_json::Value;
use tracing::warn;

use crate::config::JSON_ONLY_SUFFIX;
use crate::llm::error::ModelError;
use crate::llm::media::ImageInput;

/// How strictly the API is asked to shape its output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Text,
    JsonObject,
    JsonSchema { name: String, schema: Value },
}

impl OutputFormat {
    /// One step looser. `Text` cannot be relaxed any further.
    pub fn relaxed(&self) -> Option<OutputFormat> {
        match self {
            OutputFormat::JsonSchema { .. } => Some(OutputFormat::JsonObject),
            OutputFormat::JsonObject => Some(OutputFormat::Text),
            OutputFormat::Text => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::JsonObject => "json_object",
            OutputFormat::JsonSchema { .. } => "json_schema",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub label: &'static str,
    pub instructions: String,
    pub text: String,
    pub image: Option<ImageInput>,
    pub max_output_tokens: u32,
    pub format: OutputFormat,
}

impl ModelRequest {
    pub fn new(label: &'static str, instructions: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label,
            instructions: instructions.into(),
            text: text.into(),
            image: None,
            max_output_tokens: 900,
            format: OutputFormat::Text,
        }
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    fn relaxed(&self) -> Option<ModelRequest> {
        let format = self.format.relaxed()?;
        let mut request = self.clone();
        if format == OutputFormat::Text {
            request.instructions.push_str(JSON_ONLY_SUFFIX);
        }
        request.format = format;
        Some(request)
    }
}

/// Text + optional image in, free-form text out.
#[allow(async_fn_in_trait)]
pub trait ModelClient {
    fn provider(&self) -> &str;
    fn model(&self) -> &str;
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError>;
}

/// Sends `request`; if the API rejects a constrained output format as
/// malformed, sends it once more with the format relaxed by one step.
pub async fn complete_with_format_fallback<C: ModelClient>(
    client: &C,
    request: &ModelRequest,
) -> Result<String, ModelError> {
    match client.complete(request).await {
        Err(err) if err.is_malformed_request() => {
            let Some(relaxed) = request.relaxed() else {
                return Err(err);
            };
            warn!(
                "Model {}/{} rejected {} output for {}: {}; retrying once with {}",
                client.provider(),
                client.model(),
                request.format.label(),
                request.label,
                err,
                relaxed.format.label()
            );
            client.complete(&relaxed).await
        }
        other => other,
    }
}
