//! Sidecar files next to a patched artifact
//!
//! `<artifact>.patched_custom` records which domain the artifact was patched
//! to. `<artifact>.original` is a byte copy of the artifact taken before the
//! first patch and left alone until a restore.

use crate::errors::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const MARKER_SUFFIX: &str = ".patched_custom";
pub const BACKUP_SUFFIX: &str = ".original";
pub const PATCHER_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRecord {
    pub patched_at: DateTime<Utc>,
    pub original_domain: String,
    pub target_domain: String,
    pub patcher_version: String,
}

impl PatchRecord {
    pub fn new(original_domain: &str, target_domain: &str) -> Self {
        Self {
            patched_at: Utc::now(),
            original_domain: original_domain.to_string(),
            target_domain: target_domain.to_string(),
            patcher_version: PATCHER_VERSION.to_string(),
        }
    }
}

fn with_suffix(artifact: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(artifact.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

pub fn marker_path(artifact: &Path) -> PathBuf {
    with_suffix(artifact, MARKER_SUFFIX)
}

pub fn backup_path(artifact: &Path) -> PathBuf {
    with_suffix(artifact, BACKUP_SUFFIX)
}

/// Read the marker; a missing or unparseable marker reads as `None`
pub fn read_record(artifact: &Path) -> Option<PatchRecord> {
    let path = marker_path(artifact);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Ignoring unreadable patch marker {}: {}", path.display(), e);
            None
        }
    }
}

pub fn write_record(artifact: &Path, record: &PatchRecord) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| PipelineError::Io(format!("Failed to serialize patch marker: {}", e)))?;
    fs::write(marker_path(artifact), json)?;
    Ok(())
}

pub fn remove_record(artifact: &Path) -> Result<(), PipelineError> {
    match fs::remove_file(marker_path(artifact)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Drop the backup once the artifact has been replaced by a different build
pub fn remove_backup(artifact: &Path) -> Result<(), PipelineError> {
    match fs::remove_file(backup_path(artifact)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Copy the artifact to its backup path unless a backup already exists
pub fn ensure_backup(artifact: &Path) -> Result<PathBuf, PipelineError> {
    let backup = backup_path(artifact);
    if backup.exists() {
        log::debug!("Backup already exists at {}", backup.display());
    } else {
        log::info!("Creating backup at {}", backup.display());
        fs::copy(artifact, &backup)?;
    }
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sidecar_paths() {
        let artifact = Path::new("/game/Client/HytaleClient.exe");
        assert_eq!(
            marker_path(artifact),
            PathBuf::from("/game/Client/HytaleClient.exe.patched_custom")
        );
        assert_eq!(
            backup_path(artifact),
            PathBuf::from("/game/Client/HytaleClient.exe.original")
        );
    }

    #[test]
    fn test_record_json_shape() {
        let temp_dir = tempdir().unwrap();
        let artifact = temp_dir.path().join("HytaleServer.jar");

        write_record(&artifact, &PatchRecord::new("hytale.com", "sanasol.ws")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(marker_path(&artifact)).unwrap()).unwrap();
        assert_eq!(raw["originalDomain"], "hytale.com");
        assert_eq!(raw["targetDomain"], "sanasol.ws");
        assert_eq!(raw["patcherVersion"], "1.0.0");
        assert!(raw["patchedAt"].is_string());

        let record = read_record(&artifact).unwrap();
        assert_eq!(record.target_domain, "sanasol.ws");
    }

    #[test]
    fn test_corrupt_record_reads_as_none() {
        let temp_dir = tempdir().unwrap();
        let artifact = temp_dir.path().join("HytaleClient");
        fs::write(marker_path(&artifact), "{not json").unwrap();

        assert!(read_record(&artifact).is_none());
        remove_record(&artifact).unwrap();
        remove_record(&artifact).unwrap();
    }

    #[test]
    fn test_backup_is_created_once() {
        let temp_dir = tempdir().unwrap();
        let artifact = temp_dir.path().join("HytaleClient");
        fs::write(&artifact, b"original").unwrap();

        let backup = ensure_backup(&artifact).unwrap();
        fs::write(&artifact, b"modified").unwrap();
        ensure_backup(&artifact).unwrap();

        assert_eq!(fs::read(backup).unwrap(), b"original");
    }
}
