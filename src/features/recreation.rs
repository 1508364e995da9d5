//! Identity-locked recreation package.
//!
//! The shape is enforced by schema-constrained decoding. What comes back is
//! handed over as recovered, without defaulting missing leaves, and the
//! accessors below only cover the fields the caller renders directly.

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::RECREATION_SYSTEM_PROMPT;
use crate::features::normalize::{string_field, JsonObject, NormalizedShape};
use crate::features::request::request_and_recover;
use crate::llm::client::{ModelClient, ModelRequest, OutputFormat};
use crate::llm::media::ImageInput;

pub const SUBJECT_PLACEHOLDER: &str = "[[SUBJECT:USER_FACE_AND_BODY]]";
pub const SCHEMA_NAME: &str = "recreation_package";

/// Object schema with every property required and nothing extra, as strict
/// mode demands.
fn strict_object(properties: &[(&str, Value)]) -> Value {
    let mut props = Map::new();
    for (name, schema) in properties {
        props.insert((*name).to_string(), schema.clone());
    }
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
    json!({
        "type": "object",
        "properties": props,
        "required": required,
        "additionalProperties": false
    })
}

fn text() -> Value {
    json!({ "type": "string" })
}

pub fn recreation_schema() -> Value {
    strict_object(&[
        (
            "subject",
            strict_object(&[
                ("pose", text()),
                ("facial_expression", text()),
                ("gaze_direction", text()),
                ("hands", text()),
                ("body_orientation", text()),
            ]),
        ),
        (
            "camera",
            strict_object(&[
                ("shot_type", text()),
                ("angle", text()),
                ("height", text()),
                ("lens_focal_length", text()),
                ("aperture", text()),
                ("focus", text()),
                ("depth_of_field", text()),
                ("device_look", text()),
            ]),
        ),
        (
            "lighting",
            strict_object(&[
                ("key_light", text()),
                ("fill_light", text()),
                ("rim_light", text()),
                ("direction", text()),
                ("quality", text()),
                ("color_temperature", text()),
                ("shadows", text()),
            ]),
        ),
        (
            "composition",
            strict_object(&[
                ("framing", text()),
                ("aspect_ratio", text()),
                ("subject_placement", text()),
                ("background", text()),
                ("foreground", text()),
            ]),
        ),
        (
            "wardrobe",
            strict_object(&[
                ("attire", text()),
                ("accessories", text()),
                ("jewellery", text()),
                ("hairstyle", text()),
                ("makeup", text()),
            ]),
        ),
        (
            "color_grading",
            strict_object(&[("palette", text()), ("contrast", text()), ("film_look", text())]),
        ),
        ("recreation_prompt", text()),
        ("negative_prompt", text()),
        ("subject_placeholder", text()),
        ("insertion_instructions", text()),
    ])
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RecreationPackage(pub JsonObject);

impl NormalizedShape for RecreationPackage {
    fn normalize(object: &JsonObject) -> Self {
        RecreationPackage(object.clone())
    }
}

impl RecreationPackage {
    pub fn recreation_prompt(&self) -> String {
        string_field(&self.0, "recreation_prompt").trim().to_string()
    }

    pub fn negative_prompt(&self) -> String {
        string_field(&self.0, "negative_prompt").trim().to_string()
    }

    pub fn subject_placeholder(&self) -> String {
        let placeholder = string_field(&self.0, "subject_placeholder");
        let placeholder = placeholder.trim();
        if placeholder.is_empty() {
            SUBJECT_PLACEHOLDER.to_string()
        } else {
            placeholder.to_string()
        }
    }

    pub fn insertion_instructions(&self) -> String {
        string_field(&self.0, "insertion_instructions").trim().to_string()
    }
}

fn recreation_request_text(master_dna: &str, identity_lock: bool) -> String {
    if identity_lock {
        format!(
            "MASTER IDENTITY LOCK: the recreated subject must be exactly this person. \
Start recreation_prompt with this block verbatim:\n{}\n\n\
Set subject_placeholder to {SUBJECT_PLACEHOLDER}.\n\
Now analyze the reference image and fill the schema.",
            master_dna.trim()
        )
    } else {
        format!(
            "No identity lock: do not describe the person's identity. \
Wherever the subject appears in recreation_prompt, write the token {SUBJECT_PLACEHOLDER} \
and explain in insertion_instructions how to substitute a face/body reference for it.\n\
Now analyze the reference image and fill the schema."
        )
    }
}

pub async fn analyze_for_recreation<C: ModelClient>(
    client: &C,
    image: ImageInput,
    master_dna: &str,
    identity_lock: bool,
) -> Result<RecreationPackage> {
    let request = ModelRequest::new(
        "perfect_cloner",
        RECREATION_SYSTEM_PROMPT,
        recreation_request_text(master_dna, identity_lock),
    )
    .with_image(image)
    .with_max_output_tokens(2500)
    .with_format(OutputFormat::JsonSchema {
        name: SCHEMA_NAME.to_string(),
        schema: recreation_schema(),
    });

    request_and_recover(client, &request).await
}
