//! Domain patching of the game client binary and server jar
//!
//! The client is a native image that stores string literals as UTF-16LE; it is
//! patched in place with the wide matcher. The server is a jar whose class
//! files and resources hold UTF-8 text; eligible entries are patched and the
//! jar is rewritten next to the original, then renamed over it.
//!
//! Each artifact gets a backup before its first patch and a marker after a
//! successful one. The marker makes patching idempotent for an unchanged
//! target domain. Callers must not patch the same artifact concurrently.

pub mod domain;
pub mod encoding;
pub mod marker;

pub use domain::{resolve_target_domain, ORIGIN_DOMAIN};
pub use marker::PatchRecord;

use crate::config::LauncherConfig;
use crate::errors::PipelineError;
use crate::installation::Platform;
use crate::progress::ProgressReporter;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const PATCHABLE_EXTENSIONS: [&str; 5] = [".class", ".properties", ".json", ".xml", ".yml"];

/// Result of patching one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOutcome {
    pub success: bool,
    pub already_patched: bool,
    pub patch_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PatchOutcome {
    fn already_patched() -> Self {
        Self {
            success: true,
            already_patched: true,
            ..Default::default()
        }
    }

    fn patched(count: usize) -> Self {
        Self {
            success: true,
            patch_count: count,
            ..Default::default()
        }
    }

    fn no_matches(warning: &str) -> Self {
        Self {
            success: true,
            warning: Some(warning.to_string()),
            ..Default::default()
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Combined result of patching client and server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSummary {
    pub success: bool,
    pub already_patched: bool,
    pub patch_count: usize,
    pub client: PatchOutcome,
    pub server: PatchOutcome,
}

impl PatchSummary {
    pub fn from_outcomes(client: PatchOutcome, server: PatchOutcome) -> Self {
        Self {
            success: client.success || server.success,
            already_patched: client.already_patched && server.already_patched,
            patch_count: client.patch_count + server.patch_count,
            client,
            server,
        }
    }

    /// Combined error text when neither artifact could be patched
    pub fn error_message(&self) -> Option<String> {
        if self.success {
            return None;
        }
        let describe = |label: &str, outcome: &PatchOutcome| {
            format!(
                "{}: {}",
                label,
                outcome.error.as_deref().unwrap_or("unknown error")
            )
        };
        Some(format!(
            "{}; {}",
            describe("client", &self.client),
            describe("server", &self.server)
        ))
    }
}

#[derive(Debug, Clone)]
pub struct DomainPatcher {
    original: String,
    target: String,
    platform: Platform,
}

impl DomainPatcher {
    /// Patcher replacing [`ORIGIN_DOMAIN`] with `target`, after length fallback
    pub fn new(target: &str) -> Self {
        Self {
            original: ORIGIN_DOMAIN.to_string(),
            target: resolve_target_domain(target),
            platform: Platform::current(),
        }
    }

    pub fn from_config(config: &LauncherConfig) -> Self {
        Self::new(&config.auth_domain)
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn target_domain(&self) -> &str {
        &self.target
    }

    pub fn original_domain(&self) -> &str {
        &self.original
    }

    /// True when the marker records the current target domain
    pub fn is_patched(&self, artifact: &Path) -> bool {
        marker::read_record(artifact)
            .map(|record| record.target_domain == self.target)
            .unwrap_or(false)
    }

    fn ensure_exists(artifact: &Path) -> Result<(), PipelineError> {
        if artifact.is_file() {
            Ok(())
        } else {
            Err(PipelineError::ArtifactNotFound {
                path: artifact.to_path_buf(),
            })
        }
    }

    /// Patch the native client binary in place
    pub async fn patch_client(
        &self,
        artifact: &Path,
        progress: &ProgressReporter,
    ) -> Result<PatchOutcome, PipelineError> {
        let patcher = self.clone();
        let artifact = artifact.to_path_buf();
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || patcher.patch_client_blocking(&artifact, &progress))
            .await
            .map_err(|e| PipelineError::Io(format!("Client patch task failed: {}", e)))?
    }

    pub fn patch_client_blocking(
        &self,
        artifact: &Path,
        progress: &ProgressReporter,
    ) -> Result<PatchOutcome, PipelineError> {
        log::info!(
            "Patching client {}: {} -> {}",
            artifact.display(),
            self.original,
            self.target
        );
        Self::ensure_exists(artifact)?;

        if self.is_patched(artifact) {
            log::info!("Client already patched for {}, skipping", self.target);
            progress.message("Client already patched", Some(100.0));
            return Ok(PatchOutcome::already_patched());
        }

        progress.message("Preparing to patch client...", Some(10.0));
        marker::ensure_backup(artifact)?;

        progress.message("Reading client binary...", Some(20.0));
        let mut data = fs::read(artifact)?;
        log::debug!(
            "Client binary size: {:.2} MB",
            data.len() as f64 / 1024.0 / 1024.0
        );

        progress.message("Patching domain references...", Some(50.0));
        let count = encoding::replace_wide(&mut data, &self.original, &self.target);

        if count == 0 {
            log::warn!(
                "No occurrences of {} found in {}; binary may already be modified",
                self.original,
                artifact.display()
            );
            return Ok(PatchOutcome::no_matches("No domain occurrences found"));
        }

        progress.message("Writing patched binary...", Some(80.0));
        fs::write(artifact, &data)?;
        marker::write_record(artifact, &PatchRecord::new(&self.original, &self.target))?;

        progress.message("Patching complete", Some(100.0));
        log::info!("Patched {} occurrences in client", count);
        Ok(PatchOutcome::patched(count))
    }

    /// Patch eligible entries of the server jar
    pub async fn patch_server(
        &self,
        artifact: &Path,
        progress: &ProgressReporter,
    ) -> Result<PatchOutcome, PipelineError> {
        let patcher = self.clone();
        let artifact = artifact.to_path_buf();
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || patcher.patch_server_blocking(&artifact, &progress))
            .await
            .map_err(|e| PipelineError::Io(format!("Server patch task failed: {}", e)))?
    }

    pub fn patch_server_blocking(
        &self,
        artifact: &Path,
        progress: &ProgressReporter,
    ) -> Result<PatchOutcome, PipelineError> {
        log::info!(
            "Patching server {}: {} -> {}",
            artifact.display(),
            self.original,
            self.target
        );
        Self::ensure_exists(artifact)?;

        if self.is_patched(artifact) {
            log::info!("Server already patched for {}, skipping", self.target);
            progress.message("Server already patched", Some(100.0));
            return Ok(PatchOutcome::already_patched());
        }

        progress.message("Preparing to patch server...", Some(10.0));
        marker::ensure_backup(artifact)?;

        progress.message("Patching class files...", Some(40.0));
        let staging = staging_path(artifact);
        let count = match self.rewrite_jar(artifact, &staging) {
            Ok(count) => count,
            Err(e) => {
                let _ = fs::remove_file(&staging);
                return Err(e.context(format!("Failed to patch {}", artifact.display())));
            }
        };

        if count == 0 {
            let _ = fs::remove_file(&staging);
            log::warn!("No occurrences of {} found in server JAR entries", self.original);
            return Ok(PatchOutcome::no_matches("No domain occurrences found in JAR"));
        }

        progress.message("Writing patched JAR...", Some(80.0));
        let permissions = fs::metadata(artifact)?.permissions();
        fs::set_permissions(&staging, permissions)?;
        fs::rename(&staging, artifact)?;
        marker::write_record(artifact, &PatchRecord::new(&self.original, &self.target))?;

        progress.message("Server patching complete", Some(100.0));
        log::info!("Patched {} occurrences in server", count);
        Ok(PatchOutcome::patched(count))
    }

    /// Copy `source` to `staging`, patching eligible entries; returns the match count
    fn rewrite_jar(&self, source: &Path, staging: &Path) -> Result<usize, PipelineError> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(source)?))?;
        let mut writer = ZipWriter::new(BufWriter::new(File::create(staging)?));
        log::debug!("JAR contains {} entries", archive.len());

        let mut total = 0;
        for i in 0..archive.len() {
            if let Some((name, options, data, count)) = self.patch_entry(&mut archive, i)? {
                log::debug!("Patched {} occurrences in {}", count, name);
                writer.start_file(name, options)?;
                writer.write_all(&data)?;
                total += count;
            } else {
                writer.raw_copy_file(archive.by_index_raw(i)?)?;
            }
        }

        writer.finish()?.flush()?;
        Ok(total)
    }

    /// Patched contents of entry `index`, or `None` when it should be copied raw
    fn patch_entry<R: Read + std::io::Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        index: usize,
    ) -> Result<Option<(String, SimpleFileOptions, Vec<u8>, usize)>, PipelineError> {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        if entry.is_dir() || !PATCHABLE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            return Ok(None);
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        let count = encoding::replace_utf8(&mut data, &self.original, &self.target);
        if count == 0 {
            return Ok(None);
        }

        let method = match entry.compression() {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let mut options = SimpleFileOptions::default().compression_method(method);
        if let Some(modified) = entry.last_modified() {
            options = options.last_modified_time(modified);
        }
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }

        Ok(Some((name, options, data, count)))
    }

    /// Put the backup back in place and drop the marker
    ///
    /// Returns `false` when there is no backup to restore from.
    pub fn restore(&self, artifact: &Path) -> Result<bool, PipelineError> {
        let backup = marker::backup_path(artifact);
        if !backup.is_file() {
            log::info!("No backup found to restore for {}", artifact.display());
            return Ok(false);
        }

        fs::copy(&backup, artifact)?;
        marker::remove_record(artifact)?;
        log::info!("Restored {} from backup", artifact.display());
        Ok(true)
    }

    /// Client binary location inside a game directory, if present
    pub fn find_client_path(&self, game_dir: &Path) -> Option<PathBuf> {
        let client_dir = game_dir.join("Client");
        let mut candidates = Vec::new();
        if self.platform.is_macos() {
            candidates.push(
                client_dir
                    .join("Hytale.app")
                    .join("Contents")
                    .join("MacOS")
                    .join("HytaleClient"),
            );
        }
        candidates.push(client_dir.join(self.platform.executable_name("HytaleClient")));

        candidates.into_iter().find(|c| c.is_file())
    }

    pub fn find_server_path(&self, game_dir: &Path) -> Option<PathBuf> {
        let server_dir = game_dir.join("Server");
        [server_dir.join("HytaleServer.jar"), server_dir.join("server.jar")]
            .into_iter()
            .find(|c| c.is_file())
    }

    /// Patch client and server found under `game_dir`
    ///
    /// Per-artifact failures are captured in the outcomes; the summary counts
    /// as successful when at least one artifact was handled.
    pub async fn ensure_patched(&self, game_dir: &Path, progress: &ProgressReporter) -> PatchSummary {
        let client = match self.find_client_path(game_dir) {
            Some(path) => {
                progress.message("Patching client binary...", Some(10.0));
                let scoped = progress.scoped(Some("Client"), 0.0, 50.0);
                self.patch_client(&path, &scoped)
                    .await
                    .unwrap_or_else(|e| PatchOutcome::failed(e.to_string()))
            }
            None => {
                log::warn!("Could not find HytaleClient binary in {}", game_dir.display());
                PatchOutcome::failed("Client binary not found")
            }
        };

        let server = match self.find_server_path(game_dir) {
            Some(path) => {
                progress.message("Patching server JAR...", Some(50.0));
                let scoped = progress.scoped(Some("Server"), 50.0, 50.0);
                self.patch_server(&path, &scoped)
                    .await
                    .unwrap_or_else(|e| PatchOutcome::failed(e.to_string()))
            }
            None => {
                log::warn!("Could not find HytaleServer.jar in {}", game_dir.display());
                PatchOutcome::failed("Server JAR not found")
            }
        };

        progress.message("Patching complete", Some(100.0));
        PatchSummary::from_outcomes(client, server)
    }
}

fn staging_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".patching");
    artifact.with_file_name(name)
}
