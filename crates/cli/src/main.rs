use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use shelf_kernel::settings::Settings;

/// Operate the Shelf book records service
#[derive(Debug, Parser)]
#[command(name = "shelf", version, about)]
struct Cli {
    /// Environment overlay to load (local, staging, production)
    #[arg(long, global = true)]
    env: Option<String>,

    /// Directory holding base.toml and the environment overlays
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Create the indexes every module declares
    Migrate,
    /// Check that the database is reachable
    Check,
    /// Print the resolved configuration with credentials masked
    Config,
}

fn init_telemetry(settings: &Settings, command: &str) -> anyhow::Result<()> {
    shelf_telemetry::init(&settings.telemetry)?;
    tracing::info!(env = ?settings.environment, command, "shelf cli starting");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_overriding(cli.config_dir, cli.env)
        .with_context(|| "failed to load Shelf settings")?;

    match cli.command {
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings.redacted())
                .context("failed to render settings")?;
            println!("{}", rendered);
        }
        Command::Serve => {
            init_telemetry(&settings, "serve")?;
            shelf_app::serve(settings).await?;
        }
        Command::Migrate => {
            init_telemetry(&settings, "migrate")?;
            let applied = shelf_app::migrate(&settings).await?;
            println!("applied {} migrations", applied);
        }
        Command::Check => {
            init_telemetry(&settings, "check")?;
            shelf_app::check(&settings).await?;
            println!("database reachable");
        }
    }

    Ok(())
}
