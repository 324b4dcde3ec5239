use anyhow::{Context, Result};
use clap::Parser;
use droid_netwatch::cli::commands::total_seconds;
use droid_netwatch::cli::{Cli, CommandHandler, Commands};
use droid_netwatch::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let handler = CommandHandler::new(config);

    match cli.command {
        Commands::Run {
            minutes,
            seconds,
            wait_device,
        } => {
            handler
                .handle_run_command(total_seconds(minutes, seconds), wait_device)
                .await?;
        }
        Commands::Devices => handler.handle_devices_command().await?,
        Commands::Info { json } => handler.handle_info_command(json).await?,
        Commands::Traffic {
            measurement_duration,
            json,
        } => {
            handler
                .handle_traffic_command(measurement_duration, json)
                .await?;
        }
        Commands::Capture => handler.handle_capture_command().await?,
    }

    Ok(())
}
