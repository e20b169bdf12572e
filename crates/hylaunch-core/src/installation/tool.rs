//! Provisioning of the butler patch-delivery tool

use crate::errors::PipelineError;
use crate::installation::archive::{self, ArchiveFormat};
use crate::installation::platform::Platform;
use crate::installation::transfer::Downloader;
use crate::progress::ProgressReporter;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

const TOOL_NAME: &str = "butler";
const ARCHIVE_NAME: &str = "butler.zip";

/// Result of [`ToolProvisioner::ensure_tool`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInstall {
    pub success: bool,
    pub installed: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ToolProvisioner {
    downloader: Downloader,
    base_url: String,
    platform: Platform,
}

impl ToolProvisioner {
    pub fn new(downloader: Downloader, base_url: impl Into<String>) -> Self {
        Self {
            downloader,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn tool_path(&self, tools_dir: &Path) -> PathBuf {
        tools_dir.join(self.platform.executable_name(TOOL_NAME))
    }

    /// Download URLs to try in order
    ///
    /// Apple silicon falls back to the x86_64 build, which runs under Rosetta.
    pub fn candidate_urls(&self) -> Result<Vec<String>, PipelineError> {
        let channels: &[&str] = match (self.platform.os.as_str(), self.platform.manifest_arch()) {
            ("windows", _) => &["windows-amd64"],
            ("macos", "arm64") => &["darwin-arm64", "darwin-amd64"],
            ("macos", _) => &["darwin-amd64"],
            ("linux", _) => &["linux-amd64"],
            _ => {
                return Err(PipelineError::UnsupportedPlatform {
                    os: self.platform.os.clone(),
                    arch: self.platform.arch.clone(),
                })
            }
        };

        Ok(channels
            .iter()
            .map(|channel| format!("{}/{}/LATEST/archive/default", self.base_url, channel))
            .collect())
    }

    /// Return the tool path, downloading and unpacking it if missing
    pub async fn ensure_tool(
        &self,
        tools_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<ToolInstall, PipelineError> {
        let tool_path = self.tool_path(tools_dir);
        if tool_path.is_file() {
            log::debug!("Found {} at {}", TOOL_NAME, tool_path.display());
            return Ok(ToolInstall {
                success: true,
                installed: false,
                path: tool_path,
            });
        }

        let urls = self.candidate_urls()?;
        fs::create_dir_all(tools_dir).await?;
        let archive_path = tools_dir.join(ARCHIVE_NAME);

        progress.message("Fetching Butler tool...", Some(0.0));
        let download_progress = progress.scoped(None, 0.0, 80.0);
        let mut last_error = None;

        for url in &urls {
            log::info!("Trying {} download from {}", TOOL_NAME, url);
            match self
                .downloader
                .retry_download(url, &archive_path, &download_progress)
                .await
            {
                Ok(_) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    log::warn!("Failed to download {} from {}: {}", TOOL_NAME, url, e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(error) = last_error {
            return Err(error.context(format!("All {} downloads failed", TOOL_NAME)));
        }

        progress.message("Unpacking Butler...", Some(85.0));
        let destination = tools_dir.to_path_buf();
        let archive_for_task = archive_path.clone();
        tokio::task::spawn_blocking(move || {
            archive::extract_format(&archive_for_task, &destination, ArchiveFormat::Zip, false)
        })
        .await
        .map_err(|e| PipelineError::Archive(format!("Extraction task failed: {}", e)))??;

        if !tool_path.is_file() {
            return Err(PipelineError::ArtifactNotFound { path: tool_path });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tool_path, std::fs::Permissions::from_mode(0o755)).await?;
        }

        if let Err(e) = fs::remove_file(&archive_path).await {
            log::info!("Could not delete {}: {}", ARCHIVE_NAME, e);
        }

        progress.message("Butler ready", Some(100.0));
        Ok(ToolInstall {
            success: true,
            installed: true,
            path: tool_path,
        })
    }
}
