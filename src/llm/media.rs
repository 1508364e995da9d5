use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};

const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lowered,
    }
}

fn supports_image_mime(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/png" | "image/jpeg" | "image/webp" | "image/gif" | "image/heic" | "image/heif"
    )
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// An uploaded image plus the media type the uploader declared for it.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub display_name: Option<String>,
}

impl ImageInput {
    pub fn new(bytes: Vec<u8>, declared_mime_type: &str, display_name: Option<String>) -> Self {
        let mime_type = resolve_image_mime(&bytes, declared_mime_type);
        Self {
            bytes,
            mime_type,
            display_name,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image file: {}", path.display()))?;
        let declared = mime_for_extension(path).unwrap_or("");
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(Self::new(bytes, declared, display_name))
    }

    /// Inline-data form accepted by the vision input of the model API.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Declared type wins when it is a supported image type, then the sniffed
/// type, then JPEG.
pub fn resolve_image_mime(bytes: &[u8], declared_mime_type: &str) -> String {
    let mut candidates = Vec::new();
    if !declared_mime_type.trim().is_empty() {
        candidates.push(declared_mime_type.to_string());
    }
    if let Some(detected) = detect_mime_type(bytes) {
        candidates.push(detected);
    }

    for candidate in candidates {
        let normalized = normalize_image_mime_type(&candidate);
        if supports_image_mime(&normalized) {
            return normalized;
        }
    }

    FALLBACK_IMAGE_MIME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[test]
    fn declared_alias_is_normalized() {
        let image = ImageInput::new(vec![1, 2, 3], "image/JPG", None);
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn sniffs_when_declared_type_is_missing() {
        let image = ImageInput::new(PNG_HEADER.to_vec(), "", None);
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn unsupported_declared_type_falls_back_to_sniffing_then_jpeg() {
        let sniffed = ImageInput::new(PNG_HEADER.to_vec(), "application/octet-stream", None);
        assert_eq!(sniffed.mime_type, "image/png");

        let unknown = ImageInput::new(vec![0, 1, 2, 3], "text/plain", None);
        assert_eq!(unknown.mime_type, "image/jpeg");
    }

    #[test]
    fn data_url_carries_mime_and_base64_payload() {
        let image = ImageInput::new(b"hello".to_vec(), "image/webp", None);
        assert_eq!(image.to_data_url(), "data:image/webp;base64,aGVsbG8=");
    }

    #[test]
    fn extension_hint_is_used_for_paths() {
        assert_eq!(mime_for_extension(Path::new("a/b/photo.JPEG")), Some("image/jpeg"));
        assert_eq!(mime_for_extension(Path::new("notes.txt")), None);
    }
}
