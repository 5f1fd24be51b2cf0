//! QCC orchestrator node entry point.

use anyhow::Result;
use node_runtime::{Node, NodeConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("===========================================");
    info!("  QCC Node Runtime v0.1.0");
    info!("===========================================");

    let config = match std::env::args().nth(1) {
        Some(path) => NodeConfig::from_file(&PathBuf::from(path))?,
        None => {
            info!("no config file given, using defaults");
            NodeConfig::default()
        }
    };

    let node = Node::start(config).await?;

    info!("node is running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    node.shutdown().await;
    Ok(())
}
