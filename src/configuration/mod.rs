use crate::database::{DataStore, DatabaseError, StoreSettings, SupabaseStore};
use serde::Deserialize;
use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File read error")]
    FileError,

    #[error("Deserialization error:{0}")]
    DeserializationError(String),

    #[error("Store error:{0}")]
    StoreError(#[from] DatabaseError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pages: PagesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PagesConfig {
    pub catalog_page: String,
    pub create_page: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub avatar_bucket: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeConfig {
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub max_avatar_bytes: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            catalog_page: "index.html".to_string(),
            create_page: "create.html".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            avatar_bucket: crate::database::services::DEFAULT_AVATAR_BUCKET.to_string(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_avatar_bytes: crate::creation::MAX_AVATAR_BYTES,
        }
    }
}

impl Config {
    pub fn new(config_file: &str) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(config_file).map_err(|_| ConfigError::FileError)?;
        Self::from_json(&config_str)
    }

    pub fn from_json(config_str: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(config_str)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
        Ok(config)
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            avatar_bucket: self.storage.avatar_bucket.clone(),
            poll_interval: Duration::from_secs(self.realtime.poll_interval_secs.max(1)),
        }
    }
}

/// Everything a request handler needs.
#[derive(Clone)]
pub struct Context {
    pub config: Config,
    pub store: Arc<dyn DataStore>,
    /// Enables init data signature checks when set.
    pub bot_token: Option<String>,
}

impl Context {
    pub fn new(config_file: &str) -> Result<Self, ConfigError> {
        let config = Config::new(config_file)?;
        let store = SupabaseStore::new(config.store_settings())?;
        let bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        Ok(Self {
            config,
            store: Arc::new(store),
            bot_token,
        })
    }

    pub fn with_store(config: Config, store: Arc<dyn DataStore>) -> Self {
        Self {
            config,
            store,
            bot_token: None,
        }
    }
}
