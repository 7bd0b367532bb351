use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::audit::anchor::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::{AnchorError, Result};

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "audit-anchor.toml";

/// Prefix for environment overrides, e.g. `AUDIT_ANCHOR_API_URL`.
pub const ENV_PREFIX: &str = "AUDIT_ANCHOR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub export_dir: PathBuf,
    pub page_size: u32,
    pub poll_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            export_dir: PathBuf::from("."),
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load defaults, then the config file, then `AUDIT_ANCHOR_*` variables.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: AppConfig = Config::builder()
            .set_default("api_url", defaults.api_url)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs)?
            .set_default("export_dir", defaults.export_dir.to_string_lossy().to_string())?
            .set_default("page_size", defaults.page_size as u64)?
            .set_default("poll_interval_secs", defaults.poll_interval_secs)?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(AnchorError::Config("api_url must not be empty".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(AnchorError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(AnchorError::Config(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Configured page size, clamped to what the listing endpoint accepts.
    pub fn page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}
