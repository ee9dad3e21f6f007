use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{Level, info};

pub const CONFIG_FILE: &str = "bizstudio.toml";
pub const DATA_DIR_ENV: &str = "BIZSTUDIO_DATA_DIR";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Extra flows merged into the built-in catalog.
    #[serde(default)]
    pub flows_file: Option<PathBuf>,

    /// Extra provider definitions merged into the built-in registry.
    #[serde(default)]
    pub providers_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Falls back to the provider's `default_model`.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// SQLite file for preference stores; relative paths live under the data dir.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_provider() -> String {
    "google".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    17990
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}

/// Root data directory: `$BIZSTUDIO_DATA_DIR`, else `~/.bizstudio`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bizstudio")
}

impl AppConfig {
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let config_path = data_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            info!("No {} found, using defaults.", CONFIG_FILE);
            return Ok(Self::default().rooted_at(data_dir));
        }
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        Ok(config.rooted_at(data_dir))
    }

    /// Resolve relative paths against the data directory.
    fn rooted_at(mut self, data_dir: &Path) -> Self {
        let root = |p: PathBuf| {
            if p.is_absolute() {
                p
            } else {
                data_dir.join(p)
            }
        };
        self.flows_file = Some(root(
            self.flows_file
                .take()
                .unwrap_or_else(|| PathBuf::from("custom_flows.yaml")),
        ));
        self.providers_file = Some(root(
            self.providers_file
                .take()
                .unwrap_or_else(|| PathBuf::from("custom_providers.json")),
        ));
        self.storage.database = Some(root(
            self.storage
                .database
                .take()
                .unwrap_or_else(|| PathBuf::from("preferences.db")),
        ));
        self
    }

    pub fn flows_path(&self) -> Option<&Path> {
        self.flows_file.as_deref()
    }

    pub fn providers_path(&self) -> Option<&Path> {
        self.providers_file.as_deref()
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.storage.database.as_deref()
    }
}
