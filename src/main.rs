use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blogwatch::app::AppContext;
use blogwatch::cli::{commands, Cli, Commands};
use blogwatch::config::{Config, ConfigProvider, FileConfigProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::load_or_init(cli.config.as_deref())?;
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_config_path()?,
    };
    let ctx = AppContext::new(config, cli.db_path)?;

    match cli.command {
        Commands::Run { once, interval } => {
            let provider: Arc<dyn ConfigProvider> = Arc::new(FileConfigProvider::new(config_path));
            commands::run(&ctx, provider, once, interval.as_deref()).await?;
        }
        Commands::Check { url } => {
            commands::check(&ctx, &url).await?;
        }
        Commands::History { url, limit } => {
            commands::history(&ctx, &url, limit)?;
        }
        Commands::State => {
            commands::list_states(&ctx)?;
        }
        Commands::Forget { url } => {
            commands::forget(&ctx, &url)?;
        }
    }

    Ok(())
}
