use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;
use crate::policy::ChannelPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub guide: GuideConfig,
    #[serde(default)]
    pub auto_channels: AutoChannelConfig,
    /// Hand-configured channels, the `[[channel]]` tables.
    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where content comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// TOML file with one `[[item]]` table per library entry.
    #[serde(default = "default_catalog_file")]
    pub catalog_file: PathBuf,
    /// Library folder holding commercials. No adverts are inserted without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commercial_folder: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideConfig {
    /// How far ahead the background refresher keeps every channel scheduled.
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,
}

/// Genre and decade channels generated from the library contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoChannelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub genres: bool,
    #[serde(default)]
    pub decades: bool,
    #[serde(default = "default_base_channel_number")]
    pub base_channel_number: u32,
    #[serde(default = "default_min_genre_items")]
    pub min_genre_items: usize,
    #[serde(default = "default_min_decade_items")]
    pub min_decade_items: usize,
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            catalog_file: default_catalog_file(),
            commercial_folder: None,
        }
    }
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            days_ahead: default_days_ahead(),
            refresh_interval_secs: default_refresh_interval(),
            maintenance_interval_secs: default_maintenance_interval(),
        }
    }
}

impl Default for AutoChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            genres: true,
            decades: false,
            base_channel_number: default_base_channel_number(),
            min_genre_items: default_min_genre_items(),
            min_decade_items: default_min_decade_items(),
            update_interval_secs: default_update_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8097
}

fn default_catalog_file() -> PathBuf {
    platform::config_dir().join("library.toml")
}

fn default_days_ahead() -> u32 {
    3
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_maintenance_interval() -> u64 {
    300
}

fn default_base_channel_number() -> u32 {
    1000
}

fn default_min_genre_items() -> usize {
    5
}

fn default_min_decade_items() -> usize {
    10
}

fn default_update_interval() -> u64 {
    3600
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
