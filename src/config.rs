use crate::remote::FetchConfig;
use crate::remote::config::DEFAULT_REFRESH_SECONDS;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "webring-nav";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Catalog location: URL, or path under the local data directory
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    /// Ring selected at startup
    #[serde(default = "default_selected_ring")]
    pub selected_ring: String,
    /// Refresh interval for the catalog and for rings that set none
    #[serde(default = "default_refresh_seconds")]
    pub data_refresh_seconds: u64,
    /// Where relative, non-URL locations are looked up
    #[serde(default)]
    pub local_data_dir: Option<PathBuf>,
    #[serde(default)]
    pub fetch: FetchSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_request_logging")]
    pub request_logging: bool,
}

fn default_registry_url() -> String {
    "data/rings.json".to_string()
}

fn default_selected_ring() -> String {
    "default".to_string()
}

fn default_refresh_seconds() -> u64 {
    DEFAULT_REFRESH_SECONDS
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_logging() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: default_registry_url(),
            selected_ring: default_selected_ring(),
            data_refresh_seconds: default_refresh_seconds(),
            local_data_dir: None,
            fetch: FetchSettings::default(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: None,
            request_logging: default_request_logging(),
        }
    }
}

impl Config {
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // Use XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join(APP_DIR)
        } else {
            // Use home directory with dot prefix on Windows/Mac
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(format!(".{}", APP_DIR))
        };
        Ok(config_dir)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = Self::get_config_dir()?;

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
            info!("Created config directory: {:?}", config_dir);
        }

        Ok(config_dir.join("config.toml"))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using default config");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        debug!(
            "Loaded config: registry {}, ring {}",
            config.registry_url, config.selected_ring
        );
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        debug!("Saving config to: {:?}", config_path);

        let config_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Config saved successfully");
        Ok(())
    }

    /// Apply `WEBRING_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WEBRING_REGISTRY_URL") {
            debug!("Registry URL overridden from environment");
            self.registry_url = url;
        }
        if let Some(ring) = lookup("WEBRING_RING") {
            self.selected_ring = ring;
        }
        if let Some(seconds) = lookup("WEBRING_REFRESH_SECONDS") {
            self.data_refresh_seconds = seconds
                .trim()
                .parse()
                .with_context(|| format!("Invalid WEBRING_REFRESH_SECONDS: {:?}", seconds))?;
        }
        if let Some(dir) = lookup("WEBRING_DATA_DIR") {
            self.local_data_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Directory that relative, non-URL locations resolve against
    pub fn local_data_root(&self) -> Result<PathBuf> {
        match &self.local_data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::get_config_dir()?),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        let mut builder = FetchConfig::builder()
            .request_timeout(Duration::from_secs(self.fetch.request_timeout_secs))
            .connect_timeout(Duration::from_secs(self.fetch.connect_timeout_secs))
            .default_refresh_seconds(self.data_refresh_seconds)
            .request_logging(self.fetch.request_logging);
        if let Some(user_agent) = &self.fetch.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        builder.build()
    }

    /// Store `ring_id` as the startup ring in the file at `config_path`
    ///
    /// The file is re-read first so environment overrides applied to an
    /// in-memory config are never written back.
    pub fn set_selected_ring(config_path: &Path, ring_id: &str) -> Result<()> {
        info!("Setting selected ring to: {}", ring_id);
        let mut config = Self::load_from(config_path)?;
        config.selected_ring = ring_id.to_string();
        config.save_to(config_path)
    }
}
