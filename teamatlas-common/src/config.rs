//! Configuration loading and root folder resolution
//!
//! Missing or unreadable config files never stop startup: a warning is logged
//! and compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TEAMATLAS_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "teamatlas.db";

/// Top-level TOML configuration (`~/.config/teamatlas/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamAtlasConfig {
    /// Root folder holding the database
    pub root_folder: Option<String>,
    pub logging: LoggingConfig,
    pub cache: CacheSettings,
    pub scheduler: SchedulerSettings,
    pub sources: SourceSettings,
    pub server: ServerSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Two-tier cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Fast tier time-to-live
    pub fast_ttl_secs: u64,
    /// Durable tier time-to-live
    pub durable_ttl_secs: u64,
    /// Fast tier capacity (entries)
    pub fast_max_entries: usize,
    /// Durable tier row quota
    pub durable_max_entries: u64,
    /// Expired-entry sweep period
    pub sweep_interval_secs: u64,
    /// Upper bound on lock-contention retries for durable writes
    pub max_lock_wait_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            fast_ttl_secs: 6 * 3600,
            durable_ttl_secs: 24 * 3600,
            fast_max_entries: 100,
            durable_max_entries: 5000,
            sweep_interval_secs: 30 * 60,
            max_lock_wait_ms: 5000,
        }
    }
}

/// Update scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub tier1_interval_secs: u64,
    pub tier2_interval_secs: u64,
    pub tier3_interval_secs: u64,
    pub batch_size: usize,
    pub batch_concurrency: usize,
    pub inter_batch_delay_ms: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tier1_interval_secs: 24 * 3600,
            tier2_interval_secs: 7 * 24 * 3600,
            tier3_interval_secs: 30 * 24 * 3600,
            batch_size: 5,
            batch_concurrency: 3,
            inter_batch_delay_ms: 2000,
            max_retries: 3,
            retry_delay_secs: 60,
        }
    }
}

/// Upstream source endpoints and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub knowledge_graph_url: String,
    pub knowledge_graph_interval_ms: u64,
    pub static_file_url: String,
    pub static_file_season: String,
    pub static_file_interval_ms: u64,
    pub rest_catalog_url: String,
    pub rest_catalog_key: Option<String>,
    pub rest_catalog_interval_ms: u64,
    pub rest_catalog_per_minute: u32,
    pub request_timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            knowledge_graph_url: "https://query.wikidata.org/sparql".to_string(),
            knowledge_graph_interval_ms: 1000,
            static_file_url: "https://raw.githubusercontent.com/openfootball/football.json/master"
                .to_string(),
            static_file_season: "2024-25".to_string(),
            static_file_interval_ms: 500,
            rest_catalog_url: "https://www.thesportsdb.com/api/v1/json".to_string(),
            rest_catalog_key: None,
            rest_catalog_interval_ms: 250,
            rest_catalog_per_minute: 30,
            request_timeout_secs: 15,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5731".to_string(),
        }
    }
}

impl TeamAtlasConfig {
    /// Parse configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load from the given path or the platform config file, falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(p) => p,
            None => {
                warn!("No config file location available, using defaults");
                return Self::default();
            }
        };

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
                Self::default()
            }
        }
    }
}

/// Platform config file path (`<config_dir>/teamatlas/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("teamatlas").join("config.toml"))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("teamatlas"))
        .unwrap_or_else(|| PathBuf::from("./teamatlas_data"))
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `TEAMATLAS_ROOT` environment variable
/// 3. `root_folder` in the TOML config
/// 4. OS-dependent compiled default
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    config_value: Option<String>,
}

impl RootFolderResolver {
    pub fn new(config: &TeamAtlasConfig) -> Self {
        Self {
            cli_arg: None,
            config_value: config.root_folder.clone(),
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.config_value {
            return PathBuf::from(path);
        }

        default_root_folder()
    }
}

/// Creates the root folder and locates files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!(path = %self.root_folder.display(), "Created root folder");
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }
}
