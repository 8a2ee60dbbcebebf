use anyhow::Result;
use clap::Parser;
use retrofit_service::logging::init_logging;
use retrofit_service::{start_server, AppState, ServiceConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "retrofit-service")]
#[command(about = "Retrofit energy and emissions prediction API")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (overrides logging.level)
    #[arg(long)]
    log_level: Option<String>,

    /// Artifact root directory (overrides models.root_dir)
    #[arg(long)]
    models_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(dir) = cli.models_dir {
        config.models.root_dir = dir;
    }

    init_logging(&config.logging)?;

    info!("Starting retrofit prediction service v{}", retrofit_core::VERSION);
    info!(
        root_dir = %config.models.root_dir.display(),
        bundle = ?config.models.bundle_dir,
        "Loading models"
    );

    let state = AppState::load(config);
    start_server(state).await
}
