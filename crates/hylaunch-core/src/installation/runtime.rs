//! Java runtime provisioning: manifest lookup, download, verification, unpacking

use crate::errors::PipelineError;
use crate::installation::archive;
use crate::installation::cache::ArtifactCache;
use crate::installation::integrity;
use crate::installation::platform::{ArtifactDescriptor, Platform};
use crate::installation::transfer::Downloader;
use crate::progress::ProgressReporter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// `{"download_url": {os: {arch: {url, sha256}}}}`
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeManifest {
    pub download_url: HashMap<String, HashMap<String, RuntimeArtifact>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RuntimeArtifact {
    pub url: String,
    pub sha256: String,
}

impl RuntimeManifest {
    /// Find the artifact for a platform, or fail with `UnsupportedPlatform`
    pub fn artifact_for(&self, platform: &Platform) -> Result<&RuntimeArtifact, PipelineError> {
        let unsupported = || PipelineError::UnsupportedPlatform {
            os: platform.manifest_os().to_string(),
            arch: platform.manifest_arch().to_string(),
        };

        self.download_url
            .get(platform.manifest_os())
            .ok_or_else(unsupported)?
            .get(platform.manifest_arch())
            .ok_or_else(unsupported)
    }
}

/// Result of [`RuntimeProvisioner::ensure_runtime`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInstall {
    pub success: bool,
    /// False when an existing runtime was found and nothing was downloaded
    pub installed: bool,
    pub java_path: Option<PathBuf>,
}

/// Locate the java executable inside an unpacked runtime
pub fn bundled_java_path(runtime_dir: &Path, platform: &Platform) -> Option<PathBuf> {
    java_candidates(runtime_dir, platform)
        .into_iter()
        .find(|candidate| candidate.is_file())
}

fn java_candidates(runtime_dir: &Path, platform: &Platform) -> Vec<PathBuf> {
    let java = platform.executable_name("java");
    let mut candidates = vec![runtime_dir.join("bin").join(&java)];
    if platform.is_macos() {
        candidates.push(
            runtime_dir
                .join("Contents")
                .join("Home")
                .join("bin")
                .join(&java),
        );
    }
    candidates
}

/// Downloads and unpacks the bundled Java runtime
#[derive(Debug, Clone)]
pub struct RuntimeProvisioner {
    downloader: Downloader,
    manifest_url: String,
    platform: Platform,
}

impl RuntimeProvisioner {
    pub fn new(downloader: Downloader, manifest_url: impl Into<String>) -> Self {
        Self {
            downloader,
            manifest_url: manifest_url.into(),
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub async fn fetch_manifest(&self) -> Result<RuntimeManifest, PipelineError> {
        log::info!("Requesting Java runtime information from {}", self.manifest_url);
        self.downloader
            .fetch_json(&self.manifest_url, None)
            .await
            .map_err(|e| e.context("Failed to fetch runtime manifest"))
    }

    /// Make sure a runnable Java runtime exists in `runtime_dir`
    pub async fn ensure_runtime(
        &self,
        cache_dir: &Path,
        runtime_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<RuntimeInstall, PipelineError> {
        if let Some(java) = bundled_java_path(runtime_dir, &self.platform) {
            log::info!("Java runtime found at {}, skipping download", java.display());
            return Ok(RuntimeInstall {
                success: true,
                installed: false,
                java_path: Some(java),
            });
        }

        let manifest = self.fetch_manifest().await?;
        let artifact = manifest.artifact_for(&self.platform)?;

        let cache = ArtifactCache::new(cache_dir.to_path_buf());
        cache.ensure_cache_dir().await?;
        let descriptor = ArtifactDescriptor::new(
            artifact.url.clone(),
            cache.path_for_url(&artifact.url)?,
            self.platform.clone(),
        )
        .with_digest(artifact.sha256.clone());

        let archive_path = self.acquire(&cache, &descriptor, progress).await?;

        if let Some(expected) = &descriptor.expected_digest {
            progress.message("Validating files...", Some(80.0));
            integrity::ensure_verified(&archive_path, expected)
                .await
                .map_err(|e| e.context("Runtime archive failed validation"))?;
        }

        progress.message("Unpacking Java runtime...", Some(85.0));
        if fs::metadata(runtime_dir).await.is_ok() {
            fs::remove_dir_all(runtime_dir).await?;
        }
        archive::extract_async(archive_path.clone(), runtime_dir.to_path_buf(), true)
            .await
            .map_err(|e| e.context(format!("Failed to unpack {}", archive_path.display())))?;

        self.restore_exec_bits(runtime_dir).await?;

        if let Err(e) = cache.remove(&archive_path).await {
            log::warn!("Could not delete cached Java archive: {}", e);
        }

        let java_path = bundled_java_path(runtime_dir, &self.platform).ok_or_else(|| {
            PipelineError::ArtifactNotFound {
                path: runtime_dir.join("bin").join(self.platform.executable_name("java")),
            }
            .context(format!(
                "Runtime unpacked to {} but contains no java executable",
                runtime_dir.display()
            ))
        })?;

        progress.message("Java runtime ready", Some(100.0));
        log::info!("Java runtime ready in {}", runtime_dir.display());
        Ok(RuntimeInstall {
            success: true,
            installed: true,
            java_path: Some(java_path),
        })
    }

    /// Reuse a cached archive or download it, retrying once if the first
    /// attempt leaves no usable file
    async fn acquire(
        &self,
        cache: &ArtifactCache,
        descriptor: &ArtifactDescriptor,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, PipelineError> {
        if let Some(cached) = cache.find_cached(&descriptor.url).await {
            log::info!("Using cached runtime archive {}", cached.display());
            return Ok(cached);
        }

        progress.message("Fetching Java runtime...", Some(0.0));
        let download_progress = progress.scoped(None, 0.0, 80.0);
        let decorate = |e: PipelineError| {
            e.context(format!("Runtime download failed for {}", descriptor.describe()))
        };

        let first = self
            .downloader
            .download(&descriptor.url, &descriptor.destination, &download_progress)
            .await;

        match first {
            Ok(_) => {
                if cache.find_cached(&descriptor.url).await.is_some() {
                    return Ok(descriptor.destination.clone());
                }
                log::warn!("Runtime download left no usable file, retrying");
            }
            Err(e) if e.can_retry() => log::warn!("Runtime download failed ({}), retrying", e),
            Err(e) => return Err(decorate(e)),
        }

        self.downloader
            .retry_download(&descriptor.url, &descriptor.destination, &download_progress)
            .await
            .map_err(decorate)?;

        cache
            .find_cached(&descriptor.url)
            .await
            .ok_or_else(|| PipelineError::ArtifactNotFound {
                path: descriptor.destination.clone(),
            })
            .map_err(decorate)
    }

    #[cfg(unix)]
    async fn restore_exec_bits(&self, runtime_dir: &Path) -> Result<(), PipelineError> {
        use std::os::unix::fs::PermissionsExt;
        for candidate in java_candidates(runtime_dir, &self.platform) {
            if candidate.is_file() {
                fs::set_permissions(&candidate, std::fs::Permissions::from_mode(0o755)).await?;
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn restore_exec_bits(&self, _runtime_dir: &Path) -> Result<(), PipelineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> RuntimeManifest {
        serde_json::from_str(
            r#"{"version":"25","download_url":{
                "linux":{"amd64":{"url":"https://cdn/jre-linux.tar.gz","sha256":"aa"}},
                "darwin":{"arm64":{"url":"https://cdn/jre-mac.tar.gz","sha256":"bb"}}
            }}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_manifest_lookup_uses_manifest_keys() {
        let manifest = manifest();
        let artifact = manifest
            .artifact_for(&Platform::new("macos", "aarch64"))
            .unwrap();
        assert_eq!(artifact.url, "https://cdn/jre-mac.tar.gz");

        let artifact = manifest
            .artifact_for(&Platform::new("linux", "x86_64"))
            .unwrap();
        assert_eq!(artifact.sha256, "aa");
    }

    #[test]
    fn test_manifest_lookup_unsupported() {
        let manifest = manifest();
        let err = manifest
            .artifact_for(&Platform::new("linux", "riscv64"))
            .unwrap_err();
        match err {
            PipelineError::UnsupportedPlatform { os, arch } => {
                assert_eq!(os, "linux");
                assert_eq!(arch, "riscv64");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(manifest.artifact_for(&Platform::new("freebsd", "x86_64")).is_err());
    }

    #[test]
    fn test_bundled_java_path_on_macos_bundle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let bundle_java = temp_dir.path().join("Contents/Home/bin/java");
        std::fs::create_dir_all(bundle_java.parent().unwrap()).unwrap();
        std::fs::write(&bundle_java, b"").unwrap();

        assert_eq!(
            bundled_java_path(temp_dir.path(), &Platform::new("macos", "aarch64")),
            Some(bundle_java)
        );
        assert_eq!(
            bundled_java_path(temp_dir.path(), &Platform::new("linux", "x86_64")),
            None
        );
    }
}
