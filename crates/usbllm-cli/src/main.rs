//! CLI entry point - the composition root.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use usbllm_cli::{Cli, Commands, handlers};
use usbllm_core::LauncherConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = LauncherConfig::from_env();
    cli.apply(&mut config);

    match cli.command_or_default() {
        Commands::Serve => handlers::serve::execute(config).await?,
        Commands::Models => handlers::models::execute(&config)?,
    }

    Ok(())
}
