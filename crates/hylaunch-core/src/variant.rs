//! Optional replacement client build, offered on Windows only

use crate::errors::PipelineError;
use crate::installation::{Downloader, Platform};
use crate::patcher::marker;
use crate::progress::ProgressReporter;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

const CLIENT_NAME: &str = "HytaleClient.exe";
const TEMP_NAME: &str = "HytaleClient_temp.exe";
const BACKUP_NAME: &str = "HytaleClient_original.exe";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOutcome {
    pub success: bool,
    pub installed: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl VariantOutcome {
    fn skipped(reason: &str) -> Self {
        Self {
            success: true,
            skipped: true,
            reason: Some(reason.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariantInstaller {
    downloader: Downloader,
    download_url: String,
    platform: Platform,
}

impl VariantInstaller {
    pub fn new(downloader: Downloader, download_url: impl Into<String>) -> Self {
        Self {
            downloader,
            download_url: download_url.into(),
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn is_supported(&self) -> bool {
        self.platform.is_windows()
    }

    fn client_path(game_dir: &Path) -> PathBuf {
        game_dir.join("Client").join(CLIENT_NAME)
    }

    /// Install the variant when its version matches the installed client version
    pub async fn check_and_install(
        &self,
        game_dir: &Path,
        latest: &str,
        variant: Option<&str>,
        progress: &ProgressReporter,
    ) -> Result<VariantOutcome, PipelineError> {
        if !self.is_supported() {
            log::info!("Variant check skipped (Windows only)");
            return Ok(VariantOutcome::skipped("Windows only"));
        }

        let Some(variant) = variant else {
            log::info!("Variant client not available");
            return Ok(VariantOutcome::skipped("Variant not available"));
        };

        if variant != latest {
            log::info!("Version mismatch: client={}, variant={}", latest, variant);
            return Ok(VariantOutcome::skipped("Version mismatch"));
        }

        log::info!("Versions match ({}), installing variant client", latest);
        self.install(game_dir, progress).await
    }

    /// Download the variant and swap it in for the current client
    ///
    /// The first install keeps an unpatched copy of the replaced client. The
    /// patch marker and patch backup of the old binary are removed, so the new
    /// one gets patched again and backed up as itself.
    pub async fn install(
        &self,
        game_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<VariantOutcome, PipelineError> {
        if !self.is_supported() {
            return Ok(VariantOutcome {
                success: false,
                reason: Some("Platform not supported".to_string()),
                ..Default::default()
            });
        }

        let client_path = Self::client_path(game_dir);
        if !client_path.is_file() {
            return Err(PipelineError::ArtifactNotFound { path: client_path }
                .context("Game client not found, install the game first"));
        }
        let client_dir = client_path.parent().unwrap_or(game_dir).to_path_buf();
        let temp_path = client_dir.join(TEMP_NAME);

        progress.message("Downloading variant client...", None);
        self.downloader
            .retry_download(&self.download_url, &temp_path, progress)
            .await
            .map_err(|e| e.context("Failed to download variant client"))?;

        let backup_path = client_dir.join(BACKUP_NAME);
        if !backup_path.exists() {
            // The live client may already be patched; its pre-patch backup is the vanilla build
            let patch_backup = marker::backup_path(&client_path);
            let source = if patch_backup.is_file() {
                patch_backup
            } else {
                client_path.clone()
            };
            fs::copy(&source, &backup_path).await?;
            log::info!("Original client backed up to {}", backup_path.display());
        }

        fs::rename(&temp_path, &client_path).await?;
        marker::remove_record(&client_path)?;
        marker::remove_backup(&client_path)?;

        progress.message("Variant client installed", Some(100.0));
        log::info!("Variant client installed at {}", client_path.display());
        Ok(VariantOutcome {
            success: true,
            installed: true,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_server::{MockFileServer, MockResponse};
    use tempfile::tempdir;

    fn game_dir_with_client(root: &Path) -> PathBuf {
        let client = root.join("Client").join(CLIENT_NAME);
        std::fs::create_dir_all(client.parent().unwrap()).unwrap();
        std::fs::write(&client, b"vanilla").unwrap();
        std::fs::write(marker::marker_path(&client), "{}").unwrap();
        client
    }

    #[tokio::test]
    async fn test_skipped_off_windows() {
        let installer = VariantInstaller::new(Downloader::new("t").unwrap(), "http://127.0.0.1:9/client")
            .with_platform(Platform::new("linux", "x86_64"));
        let outcome = installer
            .check_and_install(Path::new("/nonexistent"), "5.1", Some("5.1"), &ProgressReporter::disabled())
            .await
            .unwrap();

        assert!(outcome.skipped);
        assert_eq!(outcome.reason.as_deref(), Some("Windows only"));
    }

    #[tokio::test]
    async fn test_skipped_on_version_mismatch() {
        let installer = VariantInstaller::new(Downloader::new("t").unwrap(), "http://127.0.0.1:9/client")
            .with_platform(Platform::new("windows", "x86_64"));
        let outcome = installer
            .check_and_install(Path::new("/nonexistent"), "5.1", Some("5.0"), &ProgressReporter::disabled())
            .await
            .unwrap();

        assert_eq!(outcome.reason.as_deref(), Some("Version mismatch"));
        assert!(!outcome.installed);
    }

    #[tokio::test]
    async fn test_install_swaps_client_and_keeps_backup() {
        let server = MockFileServer::start(vec![("/client", MockResponse::bytes(b"variant".to_vec()))]).await;
        let temp_dir = tempdir().unwrap();
        let client = game_dir_with_client(temp_dir.path());
        let installer = VariantInstaller::new(Downloader::new("t").unwrap(), server.url("/client"))
            .with_platform(Platform::new("windows", "x86_64"));
        let outcome = installer
            .check_and_install(temp_dir.path(), "5.1", Some("5.1"), &ProgressReporter::disabled())
            .await
            .unwrap();

        assert!(outcome.installed);
        assert_eq!(std::fs::read(&client).unwrap(), b"variant");
        let backup = temp_dir.path().join("Client").join(BACKUP_NAME);
        assert_eq!(std::fs::read(&backup).unwrap(), b"vanilla");
        assert!(!temp_dir.path().join("Client").join(TEMP_NAME).exists());
        assert!(!marker::marker_path(&client).exists());

        // A second install keeps the first backup
        installer
            .install(temp_dir.path(), &ProgressReporter::disabled())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"vanilla");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_restore_after_variant_returns_unpatched_variant() {
        use crate::patcher::encoding::utf16le;
        use crate::patcher::DomainPatcher;

        let image = |tag: &[u8]| {
            let mut data = tag.to_vec();
            data.extend(utf16le("https://hytale.com"));
            data.extend([0x00, 0x00]);
            data
        };
        let vanilla = image(b"MZvanilla");
        let variant = image(b"MZvariant");

        let server = MockFileServer::start(vec![("/client", MockResponse::bytes(variant.clone()))]).await;
        let temp_dir = tempdir().unwrap();
        let client = temp_dir.path().join("Client").join(CLIENT_NAME);
        std::fs::create_dir_all(client.parent().unwrap()).unwrap();
        std::fs::write(&client, &vanilla).unwrap();

        let patcher = DomainPatcher::new("sanasol.ws").with_platform(Platform::new("windows", "x86_64"));
        let progress = ProgressReporter::disabled();
        assert_eq!(patcher.patch_client(&client, &progress).await.unwrap().patch_count, 1);

        let installer = VariantInstaller::new(Downloader::new("t").unwrap(), server.url("/client"))
            .with_platform(Platform::new("windows", "x86_64"));
        installer.install(temp_dir.path(), &progress).await.unwrap();

        // The kept copy is the vanilla build, not the patched one that was live
        let kept = temp_dir.path().join("Client").join(BACKUP_NAME);
        assert_eq!(std::fs::read(&kept).unwrap(), vanilla);
        assert!(!marker::backup_path(&client).exists());

        assert_eq!(patcher.patch_client(&client, &progress).await.unwrap().patch_count, 1);
        assert_ne!(std::fs::read(&client).unwrap(), variant);

        assert!(patcher.restore(&client).unwrap());
        assert_eq!(std::fs::read(&client).unwrap(), variant);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_install_without_client_fails() {
        let temp_dir = tempdir().unwrap();
        let installer = VariantInstaller::new(Downloader::new("t").unwrap(), "http://127.0.0.1:9/client")
            .with_platform(Platform::new("windows", "x86_64"));

        let err = installer
            .install(temp_dir.path(), &ProgressReporter::disabled())
            .await
            .unwrap_err();

        assert!(matches!(err.root_cause(), PipelineError::ArtifactNotFound { .. }));
    }
}
