use std::process::ExitCode;

use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info};

mod cli;
mod config;
mod features;
mod handlers;
mod llm;
mod recovery;
mod utils;

use cli::Cli;
use config::Config;
use handlers::commands::run_command;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::from(2);
        }
    };
    let _guards = init_logging(&config);

    info!(
        "prompt_studio starting: model={} base_url={}",
        config.openai_model, config.openai_base_url
    );
    match run_command(&config, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Command failed: {err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
