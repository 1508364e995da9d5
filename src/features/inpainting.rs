//! Request templates for near-identical inpainting edits on an external
//! image model. Nothing here calls a model; it packages inputs.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use image::{imageops, GrayImage, ImageFormat, Luma};
use serde::Serialize;

pub const DEFAULT_MASK_THRESHOLD: u8 = 1;
pub const DEFAULT_FEATHER_PX: f32 = 12.0;
const MAX_FEATHER_PX: f32 = 80.0;

pub const DEFAULT_EDIT_PROMPT: &str = "Replace the person with [[SUBJECT:USER_FACE_AND_BODY]] while keeping pose, lighting, camera angle, background, and color grading identical.";

#[derive(Debug, Clone, Serialize)]
pub struct InpaintingInputs {
    pub base_image_b64: Option<String>,
    pub mask_image_b64: Option<String>,
    pub identity_image_b64: Option<String>,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendedSettings {
    pub preserve_background: bool,
    pub edit_strength_hint: &'static str,
    pub guidance: &'static str,
    pub aspect_ratio: &'static str,
}

impl Default for RecommendedSettings {
    fn default() -> Self {
        Self {
            preserve_background: true,
            edit_strength_hint: "low",
            guidance: "high",
            aspect_ratio: "match_base_image",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InpaintingTemplate {
    pub provider: &'static str,
    pub model_suggestion: &'static str,
    pub notes: &'static str,
    pub inputs: InpaintingInputs,
    pub recommended_settings: RecommendedSettings,
}

fn encode(bytes: Option<&[u8]>) -> Option<String> {
    bytes
        .filter(|bytes| !bytes.is_empty())
        .map(|bytes| general_purpose::STANDARD.encode(bytes))
}

pub fn build_inpainting_template(
    base_image: Option<&[u8]>,
    mask_image: Option<&[u8]>,
    identity_image: Option<&[u8]>,
    prompt: &str,
) -> InpaintingTemplate {
    let prompt = match prompt.trim() {
        "" => DEFAULT_EDIT_PROMPT.to_string(),
        trimmed => trimmed.to_string(),
    };
    InpaintingTemplate {
        provider: "google_gemini",
        model_suggestion: "gemini-3-pro-image-preview",
        notes: "Send this JSON to your image editing endpoint. Base + mask enable near-identical edits. Keep denoise/strength low for maximum similarity.",
        inputs: InpaintingInputs {
            base_image_b64: encode(base_image),
            mask_image_b64: encode(mask_image),
            identity_image_b64: encode(identity_image),
            prompt,
        },
        recommended_settings: RecommendedSettings::default(),
    }
}

/// Turns a painted stroke layer (RGBA, strokes opaque over a transparent
/// background) into an edit mask: white where alpha exceeds `threshold`,
/// black elsewhere, optionally feathered by a Gaussian blur. Returns PNG.
pub fn build_mask_from_strokes(stroke_layer: &[u8], threshold: u8, feather_px: f32) -> Result<Vec<u8>> {
    if !feather_px.is_finite() || feather_px < 0.0 {
        return Err(anyhow!("Feather must be a non-negative number, got {feather_px}"));
    }
    let strokes = image::load_from_memory(stroke_layer)
        .context("Stroke layer is not a decodable image")?
        .to_rgba8();

    let (width, height) = strokes.dimensions();
    let mut mask = GrayImage::new(width, height);
    for (x, y, pixel) in strokes.enumerate_pixels() {
        let painted = pixel[3] > threshold;
        mask.put_pixel(x, y, Luma([if painted { 255 } else { 0 }]));
    }

    let feather_px = feather_px.min(MAX_FEATHER_PX);
    let mask = if feather_px > 0.0 {
        imageops::blur(&mask, feather_px)
    } else {
        mask
    };

    let mut out = Cursor::new(Vec::new());
    mask.write_to(&mut out, ImageFormat::Png)
        .context("Failed to encode mask as PNG")?;
    Ok(out.into_inner())
}
