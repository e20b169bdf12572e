//! Platform detection and naming for remote artifacts

use serde::Serialize;
use std::path::PathBuf;

/// Operating system and CPU architecture an artifact is resolved for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// Get the current platform
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// OS key used by the vendor manifests
    pub fn manifest_os(&self) -> &str {
        match self.os.as_str() {
            "macos" => "darwin",
            other => other,
        }
    }

    /// Architecture key used by the vendor manifests
    pub fn manifest_arch(&self) -> &str {
        match self.arch.as_str() {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            other => other,
        }
    }

    /// Convert to a common format used in release assets
    pub fn to_asset_format(&self) -> String {
        format!("{}-{}", self.manifest_os(), self.manifest_arch())
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    pub fn is_macos(&self) -> bool {
        self.os == "macos"
    }

    /// Append the platform's executable suffix to a base name
    pub fn executable_name(&self, base: &str) -> String {
        if self.is_windows() {
            format!("{}.exe", base)
        } else {
            base.to_string()
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// One downloadable unit, created per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub url: String,
    pub destination: PathBuf,
    pub expected_digest: Option<String>,
    pub platform: Platform,
}

impl ArtifactDescriptor {
    pub fn new(url: impl Into<String>, destination: PathBuf, platform: Platform) -> Self {
        Self {
            url: url.into(),
            destination,
            expected_digest: None,
            platform,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.expected_digest = Some(digest.into());
        self
    }

    /// Short description used when decorating errors
    pub fn describe(&self) -> String {
        format!(
            "{} -> {} ({})",
            self.url,
            self.destination.display(),
            self.platform.to_asset_format()
        )
    }
}
