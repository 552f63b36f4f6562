use crate::{error::CliError, shutdown::ShutdownCoordinator};
use clap::Parser;
use connectors::erp::HttpErpClient;
use connectors::plc::InMemoryPlcBus;
use engine_config::Settings;
use engine_runtime::Orchestrator;
use std::process;
use std::sync::Arc;
use tracing::{info, Level};

mod env;
mod error;
mod shutdown;

#[derive(Parser)]
#[command(name = "mes-coordinator", version = "0.1.0", about = "MES coordination core")]
struct Cli {
    /// Optional .env-style file with MES_* overrides, loaded before settings are read.
    #[arg(long)]
    env_file: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("fatal error: {e}");
            e.exit_code()
        }
    };

    process::exit(exit_code);
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    if let Some(path) = &cli.env_file {
        info!(path, "loading env file");
        env::load_env_file(path)?;
    }

    let settings = Arc::new(Settings::load()?);
    let plc = Arc::new(InMemoryPlcBus::new());
    let erp = Arc::new(HttpErpClient::new(settings.erp_base_url.clone(), settings.erp_http_timeout));

    let orchestrator = Orchestrator::build(settings, plc, erp).await?;
    let shutdown = ShutdownCoordinator::new(orchestrator.cancel_token());
    shutdown.register_handlers();

    info!("orchestrator running, waiting for shutdown or a fatal error");
    match orchestrator.run().await {
        None => {
            info!("shut down gracefully");
            Ok(())
        }
        Some(err) => Err(CliError::Runtime(err)),
    }
}
