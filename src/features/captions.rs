use anyhow::Result;
use serde::Serialize;

use crate::config::CAPTION_SYSTEM_PROMPT;
use crate::features::normalize::{string_field, string_list, JsonObject, NormalizedShape};
use crate::features::request::request_and_recover;
use crate::llm::client::{ModelClient, ModelRequest, OutputFormat};
use crate::llm::media::ImageInput;

pub const HASHTAG_COUNT: usize = 4;
pub const PLACEHOLDER_HASHTAG: &str = "#instagram";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionResult {
    pub caption: String,
    pub hashtags: Vec<String>,
}

impl CaptionResult {
    pub fn hashtags_text(&self) -> String {
        self.hashtags.join(" ")
    }
}

fn as_hashtag(tag: &str) -> String {
    if tag.starts_with('#') {
        tag.to_string()
    } else {
        format!("#{tag}")
    }
}

impl NormalizedShape for CaptionResult {
    fn normalize(object: &JsonObject) -> Self {
        let mut hashtags: Vec<String> = string_list(object.get("hashtags"))
            .iter()
            .take(HASHTAG_COUNT)
            .map(|tag| as_hashtag(tag))
            .collect();
        while hashtags.len() < HASHTAG_COUNT {
            hashtags.push(PLACEHOLDER_HASHTAG.to_string());
        }

        CaptionResult {
            caption: string_field(object, "caption"),
            hashtags,
        }
    }
}

pub async fn generate_caption<C: ModelClient>(
    client: &C,
    image: ImageInput,
    style: &str,
    language: &str,
) -> Result<CaptionResult> {
    let text = format!(
        "Caption style: {}\nLanguage: {}\n\nNow look at the photo and write the caption JSON.",
        style.trim(),
        language.trim()
    );
    let request = ModelRequest::new("captions", CAPTION_SYSTEM_PROMPT, text)
        .with_image(image)
        .with_max_output_tokens(500)
        .with_format(OutputFormat::JsonObject);

    request_and_recover(client, &request).await
}
