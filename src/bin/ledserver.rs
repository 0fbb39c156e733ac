use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ledserver_rs::config::{self, Root};
use ledserver_rs::{controller, listener};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "./config.yaml";

/// Serve the LED control page and WebSocket API.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address to listen on, overriding the configuration.
    #[arg(long)]
    bind: Option<String>,
    /// Keep duty frames in memory instead of writing to hardware.
    #[arg(long)]
    dry_run: bool,
}

fn load_config(args: &Args) -> anyhow::Result<Root> {
    let mut root = match &args.config {
        Some(path) => config::read_config_yaml(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None if std::path::Path::new(DEFAULT_CONFIG).exists() => {
            config::read_config_yaml(DEFAULT_CONFIG).context("failed to load ./config.yaml")?
        }
        None => {
            info!("no config file, using built-in defaults");
            Root::default()
        }
    };

    if let Some(bind) = &args.bind {
        root.server.web_addr = bind.clone();
    }
    if args.dry_run {
        root.output.host = config::Host::Memory;
    }
    root.validate()?;
    Ok(root)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config_root = load_config(&args)?;

    let controller = controller::Controller::from_config(&config_root)
        .context("unable to initialize output host")?;

    listener::serve(&config_root, Arc::new(controller)).await?;

    Ok(())
}
