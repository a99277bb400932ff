//! Configuration loading
//!
//! Precedence, lowest to highest: built-in defaults, the TOML config file,
//! environment variables. Missing config file is normal; a malformed one is
//! an error so typos do not silently fall back to defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::api::{GRAPH_BASE_URL, WELL_KNOWN_CLIENT_IDS};

const TENANT_ENV_VAR: &str = "GRAPH_TENANT_ID";
const BASE_URL_ENV_VAR: &str = "GRAPH_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// AAD tenant to authenticate against; "common" works for most accounts
    pub tenant_id: String,
    /// Public client application ids tried in order during sign-in
    pub client_ids: Vec<String>,
    pub graph_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tenant_id: "common".to_string(),
            client_ids: WELL_KNOWN_CLIENT_IDS
                .iter()
                .map(|id| id.to_string())
                .collect(),
            graph_base_url: GRAPH_BASE_URL.to_string(),
        }
    }
}

/// On-disk shape of the config file; every field optional
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    tenant_id: Option<String>,
    client_ids: Option<Vec<String>>,
    graph_base_url: Option<String>,
}

/// Default config file location: `<config dir>/planner-import/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("planner-import").join("config.toml"))
}

impl Config {
    pub fn load() -> Result<Config> {
        let mut config = Config::default();

        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let file: ConfigFile = toml::from_str(&content)
                    .with_context(|| format!("Invalid config file: {}", path.display()))?;
                config.apply(file);
                log::debug!("Loaded config from {}", path.display());
            }
        }

        if let Ok(tenant) = std::env::var(TENANT_ENV_VAR) {
            if !tenant.trim().is_empty() {
                config.tenant_id = tenant.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV_VAR) {
            if !url.trim().is_empty() {
                config.graph_base_url = url.trim().trim_end_matches('/').to_string();
            }
        }

        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(tenant_id) = file.tenant_id {
            self.tenant_id = tenant_id;
        }
        if let Some(client_ids) = file.client_ids {
            if !client_ids.is_empty() {
                self.client_ids = client_ids;
            }
        }
        if let Some(url) = file.graph_base_url {
            self.graph_base_url = url.trim_end_matches('/').to_string();
        }
    }
}
