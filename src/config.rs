use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::metric::Metric;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEREG_CONFIG_PATH").unwrap_or("/usr/local/etc/facereg/config.toml"))
});

pub static DATA_PREFIX: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEREG_DATA_PREFIX").unwrap_or("/usr/local/etc/facereg"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub listen: String,
    /// SQLite database holding the face registry.
    pub database: PathBuf,
    /// Endpoint of the embedding-extraction service.
    pub detector_url: String,
    pub metric: Metric,
    /// Maximum accepted match distance. Unset means the metric's default
    /// (0.6 euclidean, 0.45 cosine).
    pub threshold: Option<f32>,
}

impl Config {
    pub fn threshold(&self) -> f32 {
        self.threshold.unwrap_or(self.metric.default_threshold())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5001".to_string(),
            database: DATA_PREFIX.join("faces.db"),
            detector_url: "http://127.0.0.1:5100/represent".to_string(),
            metric: Metric::Euclidean,
            threshold: None,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
