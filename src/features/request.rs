use anyhow::{Context, Result};
use tracing::info;

use crate::features::normalize::NormalizedShape;
use crate::llm::client::{complete_with_format_fallback, ModelClient, ModelRequest};
use crate::recovery::extract_json_object;

/// The one procedure every model-backed feature goes through: send
/// instructions (+ optional image), recover a JSON object from the reply,
/// normalize it to the feature's shape.
pub async fn request_and_recover<C, T>(client: &C, request: &ModelRequest) -> Result<T>
where
    C: ModelClient,
    T: NormalizedShape,
{
    let raw = complete_with_format_fallback(client, request)
        .await
        .with_context(|| {
            format!(
                "{} request to {}/{} failed",
                request.label,
                client.provider(),
                client.model()
            )
        })?;

    let recovered = extract_json_object(client, &raw)
        .await
        .with_context(|| format!("Could not recover JSON from the {} response", request.label))?;

    info!(
        "{} response recovered via {} ({} keys)",
        request.label,
        recovered.strategy.as_str(),
        recovered.object.len()
    );

    Ok(T::normalize(&recovered.object))
}
