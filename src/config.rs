use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tracker connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tracker host, e.g. `tracker.example.com`. The client prefixes the
    /// scheme and admin API path itself.
    pub domain: String,
    pub api_key: String,
}

impl TrackerConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Read from the `KT_DOMAIN` / `KT_TOKEN` environment variables. Unset
    /// variables leave the fields empty; the client reports the tracker as
    /// unavailable when asked to use an empty config.
    pub fn from_env() -> Self {
        Self {
            domain: std::env::var("KT_DOMAIN").unwrap_or_default(),
            api_key: std::env::var("KT_TOKEN").unwrap_or_default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.domain.is_empty() && !self.api_key.is_empty()
    }
}
