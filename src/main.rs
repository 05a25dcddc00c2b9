use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod config;
mod http_objects;
mod lifecycle;
mod routes;
mod service;
mod tracing_setup;

use config::ServerConfig;
use service::Service;

#[derive(Parser)]
#[command(name = "blobgate-server", version, about = "HTTP gateway for blob storage")]
struct Cli {
    /// Path to a YAML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;
    tracing_setup::setup_tracing(&config);

    info!(
        env = %config.env,
        listen_addr = %config.listen_addr,
        blob_storage_path = %config.blob_storage.path,
        "starting blobgate server"
    );

    let service = match Service::new(config).await {
        Ok(service) => service,
        Err(err) => {
            error!("failed to start: {:?}", err);
            std::process::exit(1);
        }
    };
    service.start().await
}
