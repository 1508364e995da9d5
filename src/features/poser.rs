use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::config::POSER_SYSTEM_PROMPT;
use crate::features::identity::compact_master_dna;
use crate::features::normalize::{array_field, string_field, JsonObject, NormalizedShape};
use crate::features::prompter::{NEGATIVE_PROMPT, QUALITY_CONSTRAINTS};
use crate::features::request::request_and_recover;
use crate::llm::client::{ModelClient, ModelRequest, OutputFormat};
use crate::llm::media::ImageInput;

pub const POSE_COUNT: usize = 5;
const POSE_LIST_KEYS: [&str; 2] = ["prompts", "poses"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoseEntry {
    pub pose_name: String,
    pub pose_description: String,
    pub facial_expression: String,
    /// Left empty by normalization; filled by [`PoseVariations::compose_prompts`].
    pub full_prompt: String,
}

impl PoseEntry {
    fn from_object(object: &JsonObject) -> Self {
        PoseEntry {
            pose_name: string_field(object, "pose_name"),
            pose_description: string_field(object, "pose_description"),
            facial_expression: string_field(object, "facial_expression"),
            full_prompt: String::new(),
        }
    }
}

/// Up to [`POSE_COUNT`] entries. Fewer is possible when the model returned
/// malformed list items, so index lookups must be bounds-checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoseVariations {
    pub scene_lock: String,
    pub pose_style: String,
    pub compact_master_dna: String,
    pub prompts: Vec<PoseEntry>,
}

impl NormalizedShape for PoseVariations {
    fn normalize(object: &JsonObject) -> Self {
        let prompts = array_field(object, &POSE_LIST_KEYS)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .take(POSE_COUNT)
                    .map(PoseEntry::from_object)
                    .collect()
            })
            .unwrap_or_default();

        PoseVariations {
            scene_lock: string_field(object, "scene_lock"),
            pose_style: string_field(object, "pose_style"),
            compact_master_dna: String::new(),
            prompts,
        }
    }
}

impl PoseVariations {
    pub fn get(&self, index: usize) -> Option<&PoseEntry> {
        self.prompts.get(index)
    }

    /// Final generator prompt for one pose. `identity` is used when no
    /// compacted descriptor was recorded.
    pub fn compose_prompt(&self, index: usize, identity: &str) -> Option<String> {
        let entry = self.get(index)?;
        let identity = if self.compact_master_dna.trim().is_empty() {
            identity
        } else {
            self.compact_master_dna.as_str()
        };
        Some(compose_pose_prompt(identity, &self.scene_lock, entry))
    }

    pub fn compose_prompts(&mut self, identity: &str) {
        for index in 0..self.prompts.len() {
            if let Some(full_prompt) = self.compose_prompt(index, identity) {
                self.prompts[index].full_prompt = full_prompt;
            }
        }
    }
}

pub fn compose_pose_prompt(identity: &str, scene_lock: &str, entry: &PoseEntry) -> String {
    let pose_name = entry.pose_name.trim();
    let pose_description = entry.pose_description.trim();
    let facial_expression = entry.facial_expression.trim();
    let scene_lock = scene_lock.trim();

    let mut lines = vec![identity.trim().to_string(), String::new(), "PROMPT:".to_string()];
    if pose_name.is_empty() {
        lines.push("Pose: (selected pose)".to_string());
    } else {
        lines.push(format!("Pose: {pose_name}"));
    }
    if !pose_description.is_empty() {
        lines.push(format!("Pose details: {pose_description}"));
    }
    if !facial_expression.is_empty() {
        lines.push(format!("Facial expression: {facial_expression}"));
    }
    if !scene_lock.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Scene lock (keep everything else identical): {scene_lock}"
        ));
    }
    lines.push(String::new());
    lines.push("Quality + realism constraints:".to_string());
    lines.extend(QUALITY_CONSTRAINTS.iter().map(|line| format!("- {line}")));
    lines.push(String::new());
    lines.push("Negative prompt:".to_string());
    lines.push(NEGATIVE_PROMPT.to_string());

    lines.join("\n").trim().to_string()
}

pub async fn generate_pose_variations<C: ModelClient>(
    client: &C,
    image: ImageInput,
    master_dna: &str,
    pose_style: &str,
) -> Result<PoseVariations> {
    let compact_dna = compact_master_dna(master_dna);
    let text = format!(
        "MASTER DNA (identity to keep):\n{}\n\nPose style to target: {}\n\nNow analyze the image and create {} pose variations.",
        compact_dna,
        pose_style.trim(),
        POSE_COUNT
    );
    let request = ModelRequest::new("poser", POSER_SYSTEM_PROMPT, text)
        .with_image(image)
        .with_max_output_tokens(1500)
        .with_format(OutputFormat::JsonObject);

    let mut variations: PoseVariations = request_and_recover(client, &request).await?;
    if variations.pose_style.trim().is_empty() {
        variations.pose_style = pose_style.trim().to_string();
    }
    variations.compact_master_dna = compact_dna;
    variations.compose_prompts(master_dna);
    Ok(variations)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::features::identity::{COMPACT_DNA_THRESHOLD, COMPACT_IDENTITY_DNA};
    use crate::llm::client::testing::ScriptedClient;

    fn pose(name: &str) -> Value {
        json!({ "pose_name": name, "pose_description": format!("{name} details"), "facial_expression": "smile" })
    }

    fn normalize(value: Value) -> PoseVariations {
        PoseVariations::normalize(value.as_object().unwrap())
    }

    #[test]
    fn keeps_at_most_five_entries() {
        let poses: Vec<Value> = (1..=7).map(|i| pose(&format!("p{i}"))).collect();
        let result = normalize(json!({ "scene_lock": "studio", "prompts": poses }));
        assert_eq!(result.prompts.len(), POSE_COUNT);
        assert_eq!(result.prompts[4].pose_name, "p5");
    }

    #[test]
    fn short_lists_are_not_padded() {
        let result = normalize(json!({ "prompts": [pose("a"), pose("b"), pose("c")] }));
        assert_eq!(result.prompts.len(), 3);
    }

    #[test]
    fn non_object_entries_are_dropped() {
        let result = normalize(json!({ "prompts": [pose("a"), "junk", pose("c")] }));
        let names: Vec<&str> = result.prompts.iter().map(|p| p.pose_name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn alternate_list_key_is_used_when_first_is_absent() {
        let result = normalize(json!({ "poses": [pose("alt")] }));
        assert_eq!(result.prompts[0].pose_name, "alt");

        let preferred = normalize(json!({ "prompts": [pose("main")], "poses": [pose("alt")] }));
        assert_eq!(preferred.prompts[0].pose_name, "main");
    }

    #[test]
    fn entries_default_missing_fields_and_leave_full_prompt_empty() {
        let result = normalize(json!({ "prompts": [{ "pose_name": "lean", "full_prompt": "model text" }] }));
        let entry = &result.prompts[0];
        assert_eq!(entry.pose_description, "");
        assert_eq!(entry.facial_expression, "");
        assert_eq!(entry.full_prompt, "");
        assert_eq!(result.scene_lock, "");
    }

    #[test]
    fn composed_prompt_skips_empty_sections() {
        let entry = PoseEntry {
            pose_name: "Over-shoulder look".into(),
            ..PoseEntry::default()
        };
        let prompt = compose_pose_prompt("DNA", "", &entry);
        assert!(prompt.starts_with("DNA\n\nPROMPT:\nPose: Over-shoulder look\n\nQuality"));
        assert!(!prompt.contains("Scene lock"));
        assert!(prompt.ends_with(NEGATIVE_PROMPT));
    }

    #[test]
    fn compose_prompt_is_bounds_checked() {
        let variations = normalize(json!({ "prompts": [pose("a")] }));
        assert!(variations.compose_prompt(0, "DNA").is_some());
        assert!(variations.compose_prompt(3, "DNA").is_none());
    }

    #[tokio::test]
    async fn long_descriptor_is_compacted_and_prompts_are_composed() {
        let client = ScriptedClient::new().with_response(
            "{\"scene_lock\": \"beige studio, softbox left\", \"prompts\": [{\"pose_name\": \"Hand on hip\", \"pose_description\": \"weight on back leg\", \"facial_expression\": \"soft smile\"}]}",
        );
        let image = ImageInput::new(vec![1, 2, 3], "image/png", None);
        let long_dna = "d".repeat(COMPACT_DNA_THRESHOLD + 50);

        let variations = generate_pose_variations(&client, image, &long_dna, "Elegant")
            .await
            .unwrap();

        assert_eq!(variations.compact_master_dna, COMPACT_IDENTITY_DNA);
        assert_eq!(variations.pose_style, "Elegant");
        let full = &variations.prompts[0].full_prompt;
        assert!(full.starts_with(COMPACT_IDENTITY_DNA));
        assert!(full.contains("Pose: Hand on hip"));
        assert!(full.contains("Scene lock (keep everything else identical): beige studio, softbox left"));

        let request = &client.requests()[0];
        assert!(request.text.contains(COMPACT_IDENTITY_DNA));
        assert!(!request.text.contains(&long_dna));
        assert!(request.text.contains("Pose style to target: Elegant"));
    }
}
