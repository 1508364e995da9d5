use anyhow::{anyhow, Result};
use serde::Serialize;

pub const QUALITY_CONSTRAINTS: [&str; 4] = [
    "shot on a modern smartphone, deep depth-of-field look",
    "realistic physics-based lighting and shadows",
    "natural skin texture with pores and micro-details (not plastic, not overly smoothed)",
    "sharp focus on subject, realistic depth of field",
];

pub const NEGATIVE_PROMPT: &str = "blurry, low-res, over-smoothed skin, plastic skin, uncanny face, deformed hands, extra fingers, bad anatomy, watermark, logo, text artifacts";

/// Scene choices for a locally built prompt. Unset fields render empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromptFields {
    pub pose: Option<String>,
    pub camera_angle: String,
    pub camera_lens: String,
    pub lighting: String,
    pub background: String,
    pub hairstyle: String,
    pub makeup: String,
    pub attire: String,
    pub jewellery: String,
    pub extra_notes: String,
}

impl PromptFields {
    pub const KEYS: [&'static str; 10] = [
        "pose",
        "camera_angle",
        "camera_lens",
        "lighting",
        "background",
        "hairstyle",
        "makeup",
        "attire",
        "jewellery",
        "extra_notes",
    ];

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        match key.trim() {
            "pose" => self.pose = Some(value),
            "camera_angle" => self.camera_angle = value,
            "camera_lens" => self.camera_lens = value,
            "lighting" => self.lighting = value,
            "background" => self.background = value,
            "hairstyle" => self.hairstyle = value,
            "makeup" => self.makeup = value,
            "attire" => self.attire = value,
            "jewellery" | "jewelry" => self.jewellery = value,
            "extra_notes" => self.extra_notes = value,
            other => {
                return Err(anyhow!(
                    "Unknown prompt field '{other}'. Expected one of: {}",
                    Self::KEYS.join(", ")
                ))
            }
        }
        Ok(())
    }

    /// Parses `key=value`.
    pub fn set_pair(&mut self, pair: &str) -> Result<()> {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected key=value, got '{pair}'"))?;
        self.set(key, value)
    }
}

pub fn build_prompt(master_dna: &str, fields: &PromptFields) -> String {
    let pose = fields.pose.as_deref().unwrap_or("User-selected pose");
    let mut parts = vec![
        master_dna.trim().to_string(),
        String::new(),
        "PROMPT:".to_string(),
        format!("Pose: {pose}"),
        format!("Camera angle: {}", fields.camera_angle),
        format!("Camera / lens / focus: {}", fields.camera_lens),
        format!("Lighting setup: {}", fields.lighting),
        format!("Background: {}", fields.background),
        format!("Hairstyle: {}", fields.hairstyle),
        format!("Makeup: {}", fields.makeup),
        format!("Attire: {}", fields.attire),
        format!("Jewellery: {}", fields.jewellery),
        String::new(),
        "Quality + realism constraints:".to_string(),
    ];
    parts.extend(QUALITY_CONSTRAINTS.iter().map(|line| format!("- {line}")));
    parts.push(String::new());

    let extra = fields.extra_notes.trim();
    if !extra.is_empty() {
        parts.push("Extra notes:".to_string());
        parts.push(extra.to_string());
        parts.push(String::new());
    }

    parts.push("Negative prompt:".to_string());
    parts.push(NEGATIVE_PROMPT.to_string());
    parts.join("\n")
}
