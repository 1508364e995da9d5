use anyhow::Result;
use serde::Serialize;

use crate::config::CLONER_SYSTEM_PROMPT;
use crate::features::normalize::{string_field, JsonObject, NormalizedShape};
use crate::features::request::request_and_recover;
use crate::llm::client::{ModelClient, ModelRequest, OutputFormat};
use crate::llm::media::ImageInput;

/// Scene breakdown used to recreate a photo with another identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CloneAnalysis {
    pub pose: String,
    pub camera_angle: String,
    pub lighting_setup: String,
    pub background: String,
    pub hairstyle: String,
    pub makeup: String,
    pub attire: String,
    pub jewellery: String,
    pub body_structure: String,
    pub photo_realism_notes: String,
    pub negative_prompt: String,
    pub full_prompt: String,
}

impl NormalizedShape for CloneAnalysis {
    fn normalize(object: &JsonObject) -> Self {
        let jewellery = match string_field(object, "jewellery") {
            value if value.is_empty() => string_field(object, "jewelry"),
            value => value,
        };
        CloneAnalysis {
            pose: string_field(object, "pose"),
            camera_angle: string_field(object, "camera_angle"),
            lighting_setup: string_field(object, "lighting_setup"),
            background: string_field(object, "background"),
            hairstyle: string_field(object, "hairstyle"),
            makeup: string_field(object, "makeup"),
            attire: string_field(object, "attire"),
            jewellery,
            body_structure: string_field(object, "body_structure"),
            photo_realism_notes: string_field(object, "photo_realism_notes"),
            negative_prompt: string_field(object, "negative_prompt"),
            full_prompt: string_field(object, "full_prompt"),
        }
    }
}

pub async fn analyze_for_clone<C: ModelClient>(
    client: &C,
    image: ImageInput,
    master_dna: &str,
) -> Result<CloneAnalysis> {
    let text = format!(
        "MASTER DNA (must be inserted verbatim at top of full_prompt):\n{}\n\nNow analyze this image and produce the JSON.",
        master_dna.trim()
    );
    let request = ModelRequest::new("cloner", CLONER_SYSTEM_PROMPT, text)
        .with_image(image)
        .with_max_output_tokens(1200)
        .with_format(OutputFormat::JsonObject);

    request_and_recover(client, &request).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::llm::client::testing::ScriptedClient;

    #[test]
    fn every_field_defaults_to_empty() {
        let analysis = CloneAnalysis::normalize(json!({ "pose": "seated" }).as_object().unwrap());
        assert_eq!(analysis.pose, "seated");
        assert_eq!(
            analysis,
            CloneAnalysis {
                pose: "seated".into(),
                ..CloneAnalysis::default()
            }
        );
    }

    #[test]
    fn american_spelling_is_accepted() {
        let analysis =
            CloneAnalysis::normalize(json!({ "jewelry": "gold hoops" }).as_object().unwrap());
        assert_eq!(analysis.jewellery, "gold hoops");
    }

    #[tokio::test]
    async fn descriptor_is_sent_with_the_image() {
        let client = ScriptedClient::new().with_response(
            "Here you go:\n{\"pose\": \"standing\", \"full_prompt\": \"DNA\nPROMPT: standing\"}",
        );
        let image = ImageInput::new(vec![9, 9, 9], "image/webp", None);

        let analysis = analyze_for_clone(&client, image, "DNA").await.unwrap();

        assert_eq!(analysis.full_prompt, "DNA\nPROMPT: standing");
        let request = &client.requests()[0];
        assert!(request.text.starts_with("MASTER DNA"));
        assert_eq!(request.image.as_ref().map(|i| i.mime_type.as_str()), Some("image/webp"));
    }
}
