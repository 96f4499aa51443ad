//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the backend project coordinates, the last signed-in email, and the
//! asset-cache deployment settings.
//!
//! Configuration is stored at `~/.config/harambee/config.json`. The backend
//! URL and anon key can also come from the `HARAMBEE_URL` and
//! `HARAMBEE_ANON_KEY` environment variables (a `.env` file works too),
//! which take precedence over the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "harambee";

/// Config file name
const CONFIG_FILE: &str = "config.json";

fn default_generation() -> String {
    "v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub last_email: Option<String>,
    /// Current asset-cache generation name; bumped on each deployment so
    /// activation purges the previous generation.
    #[serde(default = "default_generation")]
    pub asset_generation: String,
    /// Critical assets warmed into the cache at install time.
    #[serde(default)]
    pub shell_assets: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            anon_key: None,
            last_email: None,
            asset_generation: default_generation(),
            shell_assets: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config: Self = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        // Environment takes precedence over the file.
        if let Ok(url) = std::env::var("HARAMBEE_URL") {
            config.backend_url = Some(url);
        }
        if let Ok(key) = std::env::var("HARAMBEE_ANON_KEY") {
            config.anon_key = Some(key);
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Backend project URL, required for any API call.
    pub fn backend_url(&self) -> Result<&str> {
        self.backend_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!("No backend URL configured - set HARAMBEE_URL or edit config.json")
        })
    }

    /// Backend anon key, required for any API call.
    pub fn anon_key(&self) -> Result<&str> {
        self.anon_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("No anon key configured - set HARAMBEE_ANON_KEY or edit config.json")
        })
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Directory holding the named asset caches.
    pub fn asset_cache_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("assets"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.asset_generation, "v1");
        assert!(config.shell_assets.is_empty());
        assert!(config.backend_url().is_err());
    }

    #[test]
    fn test_parse_partial_config() {
        // Older config files predate the asset-cache fields.
        let json = r#"{"backend_url": "https://proj.example.co", "anon_key": "anon", "last_email": null}"#;
        let config: Config = serde_json::from_str(json).expect("config should parse");
        assert_eq!(config.backend_url().expect("url"), "https://proj.example.co");
        assert_eq!(config.asset_generation, "v1");
    }
}
