use crate::constants;
use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::fs;

const CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Hours between background scrapes in serve mode; 0 disables the loop.
    #[serde(default)]
    pub scrape_interval_hours: u64,
}

fn default_db_path() -> String {
    "data/talks.db".to_string()
}

fn default_site_url() -> String {
    "https://maven.com".to_string()
}

fn default_base_url() -> String {
    constants::API_BASE_URL.to_string()
}

fn default_page_limit() -> u32 {
    constants::DEFAULT_PAGE_LIMIT
}

fn default_delay_ms() -> u64 {
    constants::REQUEST_DELAY_MS
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_port() -> u16 {
    8080
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_limit: default_page_limit(),
            delay_ms: default_delay_ms(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            scrape_interval_hours: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            server: ServerConfig::default(),
            db_path: default_db_path(),
            site_url: default_site_url(),
        }
    }
}

impl Config {
    /// Loads config.toml if present, otherwise falls back to defaults.
    /// `TALKS_DB_PATH` overrides the database location either way.
    pub fn load() -> Result<Self> {
        let mut config = match fs::read_to_string(CONFIG_PATH) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => {
                return Err(ScraperError::Config(format!(
                    "failed to read '{CONFIG_PATH}': {e}"
                )))
            }
        };

        if let Ok(db_path) = std::env::var("TALKS_DB_PATH") {
            config.db_path = db_path;
        }

        Ok(config)
    }
}
