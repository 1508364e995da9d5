use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::warn;
use url::Url;

/// Settings handed to the model client. Kept apart from [`Config`] so the
/// client never reaches for process-wide state.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub timeout: Duration,
    pub image_detail: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub openai_api_key: String,
    pub openai_base_url: Url,
    pub openai_model: String,
    pub openai_timeout_seconds: u64,
    pub openai_image_detail: String,
    pub master_dna_path: Option<PathBuf>,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn parse_base_url(value: &str) -> Result<Url> {
    let trimmed = value.trim().trim_end_matches('/');
    let url = Url::parse(&format!("{trimmed}/"))
        .with_context(|| format!("Invalid OPENAI_BASE_URL value: {value}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("OPENAI_BASE_URL must be http(s), got scheme '{other}'")),
    }
}

fn normalize_image_detail(value: String) -> String {
    let lowered = value.trim().to_lowercase();
    match lowered.as_str() {
        "low" | "high" | "auto" => lowered,
        "" => "high".to_string(),
        _ => {
            warn!(
                "Unknown OPENAI_IMAGE_DETAIL value '{}'; defaulting to high.",
                value
            );
            "high".to_string()
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let openai_base_url = parse_base_url(&env_string(
            "OPENAI_BASE_URL",
            "https://api.openai.com/v1",
        ))?;

        let openai_model = env_string("OPENAI_MODEL", "gpt-4.1-mini").trim().to_string();
        if openai_model.is_empty() {
            return Err(anyhow!("OPENAI_MODEL must not be empty"));
        }

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(env_string("LOG_DIR", "logs")),
            openai_api_key: env_string("OPENAI_API_KEY", "").trim().to_string(),
            openai_base_url,
            openai_model,
            openai_timeout_seconds: env_u64("OPENAI_TIMEOUT_SECONDS", 90).max(1),
            openai_image_detail: normalize_image_detail(env_string("OPENAI_IMAGE_DETAIL", "high")),
            master_dna_path: env_path("MASTER_DNA_PATH"),
        })
    }

    /// Settings for commands that talk to the model. Fails when no API key
    /// is configured, which local-only commands never need.
    pub fn openai_settings(&self) -> Result<OpenAiSettings> {
        if self.openai_api_key.is_empty() {
            return Err(anyhow!(
                "OPENAI_API_KEY is required for commands that call the model"
            ));
        }
        Ok(OpenAiSettings {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
            timeout: Duration::from_secs(self.openai_timeout_seconds),
            image_detail: self.openai_image_detail.clone(),
        })
    }
}

pub const DEFAULT_MASTER_DNA: &str = "MASTER IDENTITY DNA: describe the subject's face, skin tone, hair, eyes, build and age here. \
Keep this block verbatim at the top of every prompt so the identity stays consistent across generations.";

pub const JSON_ONLY_SUFFIX: &str = "\nReturn ONLY JSON. No markdown. No extra text.";

pub const REPAIR_SYSTEM_PROMPT: &str = "You will be given text intended to be JSON but it may be invalid. \
Output STRICT VALID JSON only (no markdown, no extra text). \
Rules: escape all newlines as \\n and escape all internal quotes as \\\" inside strings.";

pub const CLONER_SYSTEM_PROMPT: &str = "You are an expert prompt engineer for realistic portrait photography and AI image generation.\n\
Analyze the provided image and produce a prompt to recreate the SAME scene for a different AI model identity.\n\n\
Return ONLY valid JSON with these keys:\n\
pose, camera_angle, lighting_setup, background, hairstyle, makeup, attire, jewellery,\n\
body_structure, photo_realism_notes, negative_prompt, full_prompt.\n\n\
Rules:\n\
- Be specific, grounded in what you see (don't invent props that are not visible).\n\
- Keep it safe-for-work.\n\
- full_prompt MUST start with MASTER DNA verbatim.\n\
- IMPORTANT: Use \\n for newlines and escape quotes as \\\" in JSON strings.\n";

pub const POSER_SYSTEM_PROMPT: &str = "You are an expert prompt engineer.\n\
Analyze the image and generate 5 new poses that keep EVERYTHING else the same:\n\
- same identity, same face, same body structure,\n\
- same attire, makeup, background, lighting, camera style.\n\
Only change: POSE.\n\n\
Return ONLY valid JSON with keys:\n\
scene_lock, pose_style, prompts (array of 5 objects: pose_name, pose_description, facial_expression).\n\n\
Rules:\n\
- scene_lock describes everything that must stay identical, in one paragraph.\n\
- Do NOT write full prompts; they are composed later.\n\
- IMPORTANT: Use \\n for newlines and escape quotes as \\\" in JSON strings.\n\
Safety: keep it tasteful and safe-for-work.";

pub const CAPTION_SYSTEM_PROMPT: &str = "You are a social media copywriter for Instagram.\n\
Look at the photo and write one caption in the requested style and language.\n\n\
Return ONLY valid JSON with keys:\n\
caption (string), hashtags (array of exactly 4 strings, each starting with #).\n\n\
Rules:\n\
- Keep the caption under 300 characters; emojis are fine.\n\
- Hashtags must be relevant to the photo, no spaces inside a tag.\n\
- IMPORTANT: Use \\n for newlines and escape quotes as \\\" in JSON strings.";

pub const RECREATION_SYSTEM_PROMPT: &str = "You are a cinematographer and prompt engineer.\n\
Analyze the reference image with forensic precision and produce a prompt package that recreates \
the exact shot (camera, lens, lighting, composition, wardrobe, color grading) for an image or video generator.\n\
Fill every field of the provided JSON schema. Describe only what is visible.\n\
recreation_prompt must be a single self-contained paragraph ready to paste into a generator.\n\
Keep it safe-for-work.";
