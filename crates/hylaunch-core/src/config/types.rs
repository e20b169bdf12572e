//! Configuration type definitions for the launcher pipeline
//!
//! Every field is optional in YAML; a missing section falls back to the
//! defaults below, so an empty file is a valid configuration.

use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_AUTH_DOMAIN: &str = "sanasol.ws";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Directory the launcher data lives under; defaults to the per-OS app dir
    #[serde(default)]
    pub install_root: Option<PathBuf>,
    /// Java executable or JAVA_HOME-style directory used instead of the bundled runtime
    #[serde(default)]
    pub runtime_path: Option<String>,
    /// Domain the binaries are patched to point at
    #[serde(default = "default_auth_domain")]
    pub auth_domain: String,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            install_root: None,
            runtime_path: None,
            auth_domain: default_auth_domain(),
            endpoints: EndpointsConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_runtime_manifest")]
    pub runtime_manifest: String,
    #[serde(default = "default_latest_version")]
    pub latest_version: String,
    #[serde(default = "default_installed_version")]
    pub installed_version: String,
    #[serde(default = "default_variant_version")]
    pub variant_version: String,
    #[serde(default = "default_variant_download")]
    pub variant_download: String,
    #[serde(default = "default_tool_base")]
    pub tool_base: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            runtime_manifest: default_runtime_manifest(),
            latest_version: default_latest_version(),
            installed_version: default_installed_version(),
            variant_version: default_variant_version(),
            variant_download: default_variant_download(),
            tool_base: default_tool_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Timeout for the small JSON version queries, not for artifact downloads
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl LauncherConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.auth_domain.trim().is_empty() {
            return Err(PipelineError::Config(
                "auth_domain must not be empty".to_string(),
            ));
        }

        let endpoints = [
            ("runtime_manifest", &self.endpoints.runtime_manifest),
            ("latest_version", &self.endpoints.latest_version),
            ("installed_version", &self.endpoints.installed_version),
            ("variant_version", &self.endpoints.variant_version),
            ("variant_download", &self.endpoints.variant_download),
            ("tool_base", &self.endpoints.tool_base),
        ];
        for (name, url) in endpoints {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(PipelineError::Config(format!(
                    "endpoint '{}' must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        if self.transfer.max_attempts == 0 {
            return Err(PipelineError::Config(
                "transfer.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_auth_domain() -> String {
    DEFAULT_AUTH_DOMAIN.to_string()
}

fn default_runtime_manifest() -> String {
    "https://launcher.hytale.com/version/release/jre.json".to_string()
}

fn default_latest_version() -> String {
    "http://3.10.208.30:3002/api/version_client".to_string()
}

fn default_installed_version() -> String {
    "http://3.10.208.30:3002/api/clientCheck".to_string()
}

fn default_variant_version() -> String {
    "http://3.10.208.30:3002/api/multi".to_string()
}

fn default_variant_download() -> String {
    "http://3.10.208.30:3002/client".to_string()
}

fn default_tool_base() -> String {
    "https://broth.itch.zone/butler".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
