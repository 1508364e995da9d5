use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::cli::{
    CaptionArgs, CloneArgs, Command, InpaintArgs, PosesArgs, PromptArgs, RecreateArgs,
};
use crate::config::{Config, DEFAULT_MASTER_DNA};
use crate::features::captions::generate_caption;
use crate::features::cloner::analyze_for_clone;
use crate::features::inpainting::{build_inpainting_template, build_mask_from_strokes};
use crate::features::poser::generate_pose_variations;
use crate::features::prompter::build_prompt;
use crate::features::recreation::analyze_for_recreation;
use crate::llm::media::ImageInput;
use crate::llm::OpenAiClient;
use crate::recovery::extract::recover_locally;
use crate::recovery::extract_json_object;
use crate::utils::timing::{complete_command_timer, start_command_timer};

pub async fn run_command(config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Clone(args) => {
            let detail = Some(args.image.display().to_string());
            timed("clone", detail, || clone_handler(config, args)).await
        }
        Command::Recreate(args) => {
            let detail = Some(format!(
                "{} identity_lock={}",
                args.image.display(),
                args.identity_lock()
            ));
            timed("recreate", detail, || recreate_handler(config, args)).await
        }
        Command::Poses(args) => {
            let detail = Some(format!("{} style={}", args.image.display(), args.style));
            timed("poses", detail, || poses_handler(config, args)).await
        }
        Command::Caption(args) => {
            let detail = Some(format!(
                "{} style={} language={}",
                args.image.display(),
                args.style,
                args.language
            ));
            timed("caption", detail, || caption_handler(config, args)).await
        }
        Command::Prompt(args) => timed("prompt", None, || prompt_handler(config, args)).await,
        Command::Inpaint(args) => timed("inpaint", None, || inpaint_handler(args)).await,
        Command::Recover(args) => {
            let detail = Some(args.file.display().to_string());
            timed("recover", detail, || recover_handler(config, args.file)).await
        }
    }
}

async fn timed<F, Fut>(command: &str, detail: Option<String>, run: F) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut timer = start_command_timer(command, detail);
    let result = run().await;
    match &result {
        Ok(()) => complete_command_timer(&mut timer, "success", None),
        Err(err) => complete_command_timer(&mut timer, "error", Some(format!("{err:#}"))),
    }
    result
}

fn model_client(config: &Config) -> Result<OpenAiClient> {
    Ok(OpenAiClient::new(config.openai_settings()?))
}

/// `--dna` wins over `MASTER_DNA_PATH`; with neither, the built-in
/// descriptor is used.
async fn load_master_dna(config: &Config, dna: Option<&Path>) -> Result<String> {
    let Some(path) = dna.or(config.master_dna_path.as_deref()) else {
        warn!("No identity descriptor configured; using the built-in default");
        return Ok(DEFAULT_MASTER_DNA.to_string());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read identity descriptor: {}", path.display()))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(anyhow!("Identity descriptor file is empty: {}", path.display()));
    }
    Ok(text.to_string())
}

async fn read_optional(path: Option<&Path>) -> Result<Option<Vec<u8>>> {
    match path {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(bytes))
        }
        None => Ok(None),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render result as JSON")?;
    println!("{rendered}");
    Ok(())
}

async fn load_image(path: &Path) -> Result<ImageInput> {
    let image = ImageInput::from_path(path).await?;
    info!(
        "Loaded image {} ({}, {} bytes)",
        image.display_name.as_deref().unwrap_or("<unnamed>"),
        image.mime_type,
        image.bytes.len()
    );
    Ok(image)
}

async fn clone_handler(config: &Config, args: CloneArgs) -> Result<()> {
    let client = model_client(config)?;
    let master_dna = load_master_dna(config, args.dna.as_deref()).await?;
    let image = load_image(&args.image).await?;

    let analysis = analyze_for_clone(&client, image, &master_dna).await?;
    print_json(&analysis)
}

async fn recreate_handler(config: &Config, args: RecreateArgs) -> Result<()> {
    let client = model_client(config)?;
    let identity_lock = args.identity_lock();
    let master_dna = if identity_lock {
        load_master_dna(config, args.dna.as_deref()).await?
    } else {
        String::new()
    };
    let image = load_image(&args.image).await?;

    let package = analyze_for_recreation(&client, image, &master_dna, identity_lock).await?;
    if package.recreation_prompt().is_empty() {
        warn!("Recreation package came back without a recreation_prompt");
    }
    print_json(&json!({
        "identity_lock": identity_lock,
        "recreation_prompt": package.recreation_prompt(),
        "negative_prompt": package.negative_prompt(),
        "subject_placeholder": package.subject_placeholder(),
        "insertion_instructions": package.insertion_instructions(),
        "package": package,
    }))
}

async fn poses_handler(config: &Config, args: PosesArgs) -> Result<()> {
    let client = model_client(config)?;
    let master_dna = load_master_dna(config, args.dna.as_deref()).await?;
    let image = load_image(&args.image).await?;

    let variations = generate_pose_variations(&client, image, &master_dna, &args.style).await?;
    info!("Generated {} pose variations", variations.prompts.len());
    print_json(&variations)
}

async fn caption_handler(config: &Config, args: CaptionArgs) -> Result<()> {
    let client = model_client(config)?;
    let image = load_image(&args.image).await?;

    let result = generate_caption(&client, image, &args.style, &args.language).await?;
    print_json(&json!({
        "caption": result.caption,
        "hashtags": result.hashtags,
        "hashtags_text": result.hashtags_text(),
    }))
}

async fn prompt_handler(config: &Config, args: PromptArgs) -> Result<()> {
    let fields = args.fields()?;
    let master_dna = load_master_dna(config, args.dna.as_deref()).await?;
    println!("{}", build_prompt(&master_dna, &fields));
    Ok(())
}

async fn inpaint_handler(args: InpaintArgs) -> Result<()> {
    let base = read_optional(args.base.as_deref()).await?;
    let identity = read_optional(args.identity.as_deref()).await?;
    let mask = match args.strokes.as_deref() {
        Some(strokes_path) => {
            let strokes = tokio::fs::read(strokes_path)
                .await
                .with_context(|| format!("Failed to read {}", strokes_path.display()))?;
            let mask = build_mask_from_strokes(&strokes, args.threshold, args.feather_px)?;
            if let Some(mask_out) = args.mask_out.as_deref() {
                tokio::fs::write(mask_out, &mask)
                    .await
                    .with_context(|| format!("Failed to write mask to {}", mask_out.display()))?;
                info!("Wrote mask to {}", mask_out.display());
            }
            Some(mask)
        }
        None => read_optional(args.mask.as_deref()).await?,
    };
    if base.is_none() || mask.is_none() {
        warn!("Inpainting template is missing a base image or mask; edits will not be near-identical");
    }

    let template = build_inpainting_template(
        base.as_deref(),
        mask.as_deref(),
        identity.as_deref(),
        args.prompt.as_deref().unwrap_or(""),
    );
    print_json(&template)
}

async fn recover_handler(config: &Config, file: PathBuf) -> Result<()> {
    let raw = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let recovered = match recover_locally(&raw) {
        Ok(recovered) => recovered,
        Err(_) => {
            let client = model_client(config)
                .context("Local recovery failed and the model is needed for repair")?;
            extract_json_object(&client, &raw).await?
        }
    };
    print_json(&json!({
        "strategy": recovered.strategy.as_str(),
        "object": recovered.object,
    }))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use image::{ImageFormat, Rgba, RgbaImage};
    use tempfile::{Builder, NamedTempFile, TempDir};
    use url::Url;

    use super::*;
    use crate::features::inpainting::DEFAULT_MASK_THRESHOLD;

    fn test_config(master_dna_path: Option<PathBuf>) -> Config {
        Config {
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            openai_api_key: String::new(),
            openai_base_url: Url::parse("https://api.openai.com/v1/").unwrap(),
            openai_model: "gpt-4.1-mini".to_string(),
            openai_timeout_seconds: 90,
            openai_image_detail: "high".to_string(),
            master_dna_path,
        }
    }

    fn file_with(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[tokio::test]
    async fn descriptor_falls_back_to_the_built_in_default() {
        let dna = load_master_dna(&test_config(None), None).await.unwrap();
        assert_eq!(dna, DEFAULT_MASTER_DNA);
    }

    #[tokio::test]
    async fn flag_path_wins_over_configured_path() {
        let configured = file_with(b"configured dna");
        let flagged = file_with(b"  flagged dna \n");
        let config = test_config(Some(configured.path().to_path_buf()));

        assert_eq!(load_master_dna(&config, None).await.unwrap(), "configured dna");
        assert_eq!(
            load_master_dna(&config, Some(flagged.path())).await.unwrap(),
            "flagged dna"
        );
    }

    #[tokio::test]
    async fn empty_descriptor_file_is_an_error() {
        let empty = file_with(b"   \n");
        assert!(load_master_dna(&test_config(None), Some(empty.path()))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn loaded_image_keeps_its_file_name() {
        let mut file = Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"not really a png").unwrap();

        let image = load_image(file.path()).await.unwrap();

        let expected = file.path().file_name().map(|n| n.to_string_lossy().into_owned());
        assert_eq!(image.display_name, expected);
        assert_eq!(image.mime_type, "image/png");
    }

    #[tokio::test]
    async fn model_commands_require_an_api_key() {
        let image = file_with(b"not really an image");
        let args = CloneArgs {
            image: image.path().to_path_buf(),
            dna: None,
        };
        let err = clone_handler(&test_config(None), args).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn inpaint_writes_the_mask_built_from_strokes() {
        let mut layer = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        layer.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let mut png = Cursor::new(Vec::new());
        layer.write_to(&mut png, ImageFormat::Png).unwrap();
        let strokes = file_with(png.get_ref());
        let dir = TempDir::new().unwrap();
        let mask_out = dir.path().join("mask.png");

        inpaint_handler(InpaintArgs {
            base: None,
            mask: None,
            strokes: Some(strokes.path().to_path_buf()),
            identity: None,
            prompt: None,
            threshold: DEFAULT_MASK_THRESHOLD,
            feather_px: 0.0,
            mask_out: Some(mask_out.clone()),
        })
        .await
        .unwrap();

        let mask = image::open(&mask_out).unwrap().to_luma8();
        assert_eq!(mask.get_pixel(1, 1)[0], 255);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[tokio::test]
    async fn recover_runs_locally_without_an_api_key() {
        let raw = file_with(b"Sure!\n{\"caption\": \"line one\nline two\"}");
        recover_handler(&test_config(None), raw.path().to_path_buf())
            .await
            .unwrap();

        let broken = file_with(b"{\"a\": 1 2}");
        let err = recover_handler(&test_config(None), broken.path().to_path_buf())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("OPENAI_API_KEY"));
    }
}
