use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::features::inpainting::{DEFAULT_FEATHER_PX, DEFAULT_MASK_THRESHOLD};
use crate::features::prompter::PromptFields;

pub const DEFAULT_CAPTION_STYLE: &str = "Engaging";
pub const DEFAULT_CAPTION_LANGUAGE: &str = "English";
pub const DEFAULT_POSE_STYLE: &str = "Casual";

#[derive(Debug, Parser)]
#[command(
    name = "prompt_studio",
    version,
    about = "Turn reference photos into structured generation prompts",
    after_help = "The identity descriptor is read from --dna, else MASTER_DNA_PATH, else a built-in default.",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Break a photo down into a scene clone prompt.
    Clone(CloneArgs),
    /// Build a schema-checked recreation package for a reference shot.
    Recreate(RecreateArgs),
    /// Five new poses that keep everything else in the scene.
    Poses(PosesArgs),
    /// Instagram caption plus four hashtags.
    Caption(CaptionArgs),
    /// Assemble a prompt locally from scene fields.
    Prompt(PromptArgs),
    /// Package base, mask and identity images for an inpainting edit.
    Inpaint(InpaintArgs),
    /// Run JSON recovery on a saved raw model response.
    Recover(RecoverArgs),
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct CloneArgs {
    #[arg(long)]
    pub image: PathBuf,
    #[arg(long)]
    pub dna: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct RecreateArgs {
    #[arg(long)]
    pub image: PathBuf,
    #[arg(long)]
    pub dna: Option<PathBuf>,
    /// Describe the subject with a placeholder token instead of the descriptor.
    #[arg(long)]
    pub no_identity_lock: bool,
}

impl RecreateArgs {
    pub fn identity_lock(&self) -> bool {
        !self.no_identity_lock
    }
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct PosesArgs {
    #[arg(long)]
    pub image: PathBuf,
    #[arg(long)]
    pub dna: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_POSE_STYLE)]
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct CaptionArgs {
    #[arg(long)]
    pub image: PathBuf,
    #[arg(long, default_value = DEFAULT_CAPTION_STYLE)]
    pub style: String,
    #[arg(long, default_value = DEFAULT_CAPTION_LANGUAGE)]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct PromptArgs {
    #[arg(long)]
    pub dna: Option<PathBuf>,
    /// Scene field as key=value; repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_field_pair)]
    pub set: Vec<String>,
}

impl PromptArgs {
    pub fn fields(&self) -> Result<PromptFields> {
        let mut fields = PromptFields::default();
        for pair in &self.set {
            fields.set_pair(pair)?;
        }
        Ok(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct InpaintArgs {
    #[arg(long)]
    pub base: Option<PathBuf>,
    #[arg(long, conflicts_with = "strokes")]
    pub mask: Option<PathBuf>,
    /// RGBA stroke layer to turn into a mask.
    #[arg(long)]
    pub strokes: Option<PathBuf>,
    #[arg(long)]
    pub identity: Option<PathBuf>,
    #[arg(long)]
    pub prompt: Option<String>,
    #[arg(long, default_value_t = DEFAULT_MASK_THRESHOLD)]
    pub threshold: u8,
    #[arg(long = "feather", value_name = "PX", default_value_t = DEFAULT_FEATHER_PX, value_parser = parse_feather)]
    pub feather_px: f32,
    #[arg(long, requires = "strokes")]
    pub mask_out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct RecoverArgs {
    #[arg(long)]
    pub file: PathBuf,
}

/// Checks `key=value` against the known prompt fields at parse time.
fn parse_field_pair(value: &str) -> Result<String, String> {
    PromptFields::default()
        .set_pair(value)
        .map(|()| value.to_string())
        .map_err(|err| err.to_string())
}

fn parse_feather(value: &str) -> Result<f32, String> {
    value
        .parse::<f32>()
        .ok()
        .filter(|px| px.is_finite() && *px >= 0.0)
        .ok_or_else(|| format!("expected a non-negative number of pixels, got '{value}'"))
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    use super::*;

    fn parse(parts: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("prompt_studio").chain(parts.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_shows_help() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn caption_defaults_style_and_language() {
        let command = parse(&["caption", "--image", "a.jpg"]).unwrap();
        assert_eq!(
            command,
            Command::Caption(CaptionArgs {
                image: PathBuf::from("a.jpg"),
                style: DEFAULT_CAPTION_STYLE.to_string(),
                language: DEFAULT_CAPTION_LANGUAGE.to_string(),
            })
        );
    }

    #[test]
    fn recreate_can_turn_identity_lock_off() {
        let Command::Recreate(args) =
            parse(&["recreate", "--image", "ref.png", "--no-identity-lock", "--dna", "me.txt"])
                .unwrap()
        else {
            panic!("expected recreate command");
        };
        assert!(!args.identity_lock());
        assert_eq!(args.dna, Some(PathBuf::from("me.txt")));

        let Command::Recreate(locked) = parse(&["recreate", "--image", "ref.png"]).unwrap() else {
            panic!("expected recreate command");
        };
        assert!(locked.identity_lock());
    }

    #[test]
    fn prompt_collects_repeated_fields() {
        let Command::Prompt(args) =
            parse(&["prompt", "--set", "pose=Seated", "--set", "attire=Red saree"]).unwrap()
        else {
            panic!("expected prompt command");
        };
        assert!(args.dna.is_none());
        let fields = args.fields().unwrap();
        assert_eq!(fields.pose.as_deref(), Some("Seated"));
        assert_eq!(fields.attire, "Red saree");
    }

    #[test]
    fn inpaint_parses_mask_options() {
        let Command::Inpaint(args) = parse(&[
            "inpaint", "--base", "b.png", "--strokes", "s.png", "--threshold", "10", "--feather",
            "4.5", "--mask-out", "m.png",
        ])
        .unwrap() else {
            panic!("expected inpaint command");
        };
        assert_eq!(args.threshold, 10);
        assert_eq!(args.feather_px, 4.5);
        assert_eq!(args.mask_out, Some(PathBuf::from("m.png")));
        assert!(args.mask.is_none());

        let Command::Inpaint(defaults) = parse(&["inpaint"]).unwrap() else {
            panic!("expected inpaint command");
        };
        assert_eq!(defaults.threshold, DEFAULT_MASK_THRESHOLD);
        assert_eq!(defaults.feather_px, DEFAULT_FEATHER_PX);
        assert!(defaults.prompt.is_none());
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            parse(&["clone"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert!(parse(&["clone", "--image"]).is_err());
        assert_eq!(
            parse(&["caption", "--image", "a.jpg", "--dna", "x"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
        assert!(parse(&["inpaint", "--threshold", "300"]).is_err());
        assert!(parse(&["inpaint", "--feather", "-1"]).is_err());
        assert_eq!(
            parse(&["inpaint", "--mask", "m.png", "--strokes", "s.png"]).unwrap_err().kind(),
            ErrorKind::ArgumentConflict
        );
        assert!(parse(&["inpaint", "--mask-out", "m.png"]).is_err());
        assert_eq!(
            parse(&["render"]).unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
        assert!(parse(&["prompt", "--set", "shoes=red"]).is_err());
        assert!(parse(&["prompt", "--set", "attire"]).is_err());
    }
}
