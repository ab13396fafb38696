use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::{geolocation::PositionOptions, resolver::ResolverOptions};

/// Proxy served by the bundled backend in development.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
/// Place shown when neither the device nor saved state provides one.
pub const DEFAULT_PLACE: &str = "London";
/// Overrides `api_url` from the config file.
pub const API_URL_ENV: &str = "SKYCAST_API_URL";

/// A fixed device position, for machines without a location service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DevicePosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend proxy, e.g. "http://localhost:5000/api".
    pub api_url: String,

    /// Fallback place when device location fails and nothing is saved.
    pub default_place: String,

    /// Example TOML:
    /// [geolocation]
    /// enable_high_accuracy = true
    /// timeout_ms = 5000
    /// maximum_age_ms = 0
    pub geolocation: PositionOptions,

    /// Example TOML:
    /// [device]
    /// latitude = 51.5
    /// longitude = -0.12
    pub device: Option<DevicePosition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            default_place: DEFAULT_PLACE.to_string(),
            geolocation: PositionOptions::default(),
            device: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    /// `SKYCAST_API_URL` wins over the file.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            Self::from_toml_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            // First run: no config file.
            Self::default()
        };

        cfg.apply_api_url_override(std::env::var(API_URL_ENV).ok())?;
        Ok(cfg)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        validate_api_url(&cfg.api_url)?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the persisted key/value store (saved city, theme).
    pub fn storage_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("storage.json"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    pub fn set_api_url(&mut self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        validate_api_url(&url)?;
        self.api_url = url;
        Ok(())
    }

    pub fn apply_api_url_override(&mut self, value: Option<String>) -> Result<()> {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(url) => self
                .set_api_url(url.trim())
                .with_context(|| format!("Invalid {API_URL_ENV}")),
            None => Ok(()),
        }
    }

    pub fn set_default_place(&mut self, place: impl Into<String>) -> Result<()> {
        let place = place.into();
        let trimmed = place.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Default place must not be empty"));
        }
        self.default_place = trimmed.to_string();
        Ok(())
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions { position: self.geolocation, default_place: self.default_place.clone() }
    }
}

fn validate_api_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!(
            "API URL '{url}' must start with http:// or https://.\n\
             Hint: run `skycast configure --api-url http://localhost:5000/api`."
        ))
    }
}
