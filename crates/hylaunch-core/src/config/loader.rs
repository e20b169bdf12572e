//! Configuration loader for YAML files and environment resolution
//!
//! This module handles loading configuration from YAML files and applying
//! environment overrides on top of the parsed values.

use crate::config::paths::LauncherPaths;
use crate::config::types::*;
use crate::errors::PipelineError;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable that overrides the configured auth domain
pub const AUTH_DOMAIN_ENV: &str = "HYTALE_AUTH_DOMAIN";

/// File name looked up in the app directory when no path is given
pub const CONFIG_FILE_NAME: &str = "hylaunch.yaml";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<LauncherConfig, PipelineError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Load an explicit file, or the default location if present, or defaults
    pub async fn load_or_default(path: Option<&Path>) -> Result<LauncherConfig, PipelineError> {
        if let Some(path) = path {
            return Self::from_file(path).await;
        }

        match Self::default_config_path() {
            Some(path) if path.exists() => {
                log::debug!("Loading configuration from {}", path.display());
                Self::from_file(&path).await
            }
            _ => {
                log::debug!("No configuration file found, using defaults");
                Self::from_str("")
            }
        }
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<LauncherConfig, PipelineError> {
        let mut config: LauncherConfig = if content.trim().is_empty() {
            LauncherConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                PipelineError::Config(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Self::resolve_environment(&mut config);
        Self::expand_paths(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Default config location inside the per-OS app directory
    pub fn default_config_path() -> Option<PathBuf> {
        LauncherPaths::default_app_dir()
            .ok()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    fn resolve_environment(config: &mut LauncherConfig) {
        if let Ok(domain) = env::var(AUTH_DOMAIN_ENV) {
            let domain = domain.trim();
            if !domain.is_empty() {
                log::debug!("Using auth domain '{}' from {}", domain, AUTH_DOMAIN_ENV);
                config.auth_domain = domain.to_string();
            }
        }
    }

    fn expand_paths(config: &mut LauncherConfig) {
        if let Some(root) = &config.install_root {
            config.install_root = Some(expand_home(&root.to_string_lossy()));
        }

        if let Some(runtime) = &config.runtime_path {
            let trimmed = runtime.trim();
            config.runtime_path = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
