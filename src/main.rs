use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facereg::{config, server, store::FaceStore};
use facereg::detector::HttpDetector;
use log::info;

#[derive(Parser)]
#[command(name = "facereg")]
#[command(version, about = "Face registration and recognition service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Config file path (defaults to the built-in location)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Listen address override (e.g. 0.0.0.0:5001)
        #[arg(short, long)]
        listen: Option<String>,
        /// Database path override
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
    /// Open config file in editor
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            listen,
            database,
        } => {
            let mut cfg = config::load_config(config.as_deref())?;
            if let Some(listen) = listen {
                cfg.listen = listen;
            }
            if let Some(database) = database {
                cfg.database = database;
            }
            serve(cfg).await
        }
        Commands::Config => open_config(),
    }
}

async fn serve(cfg: config::Config) -> Result<()> {
    info!("Opening registry: {}", cfg.database.display());
    let store = FaceStore::open(&cfg.database).context("Failed to open face registry")?;

    info!("Detector endpoint: {}", cfg.detector_url);
    info!(
        "Metric: {:?}, threshold: {}",
        cfg.metric,
        cfg.threshold()
    );

    let state = server::AppState {
        store: Arc::new(store),
        detector: Arc::new(HttpDetector::new(cfg.detector_url.clone())),
        metric: cfg.metric,
        threshold: cfg.threshold(),
    };

    server::serve(&cfg.listen, state).await
}

fn open_config() -> Result<()> {
    let config_path = *config::CONFIG_PATH;

    if !config_path.exists() {
        info!("Writing default config: {}", config_path.display());
        config::save_config(&config::Config::default(), None)?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {}", config_path.display());

    let status = std::process::Command::new(editor)
        .arg(config_path.as_os_str())
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
