//! SHA-256 verification of downloaded artifacts

use crate::errors::PipelineError;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Stream the file through SHA-256 and return the lowercase hex digest
pub async fn digest_file(path: &Path) -> Result<String, PipelineError> {
    let mut file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::ArtifactNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn normalize(expected: &str) -> String {
    expected.trim().to_ascii_lowercase()
}

/// Check the file against `expected_hex`
///
/// On mismatch the file is deleted and `false` is returned.
pub async fn verify(path: &Path, expected_hex: &str) -> Result<bool, PipelineError> {
    match ensure_verified(path, expected_hex).await {
        Ok(()) => Ok(true),
        Err(PipelineError::Integrity { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Like [`verify`], but a mismatch is returned as [`PipelineError::Integrity`]
pub async fn ensure_verified(path: &Path, expected_hex: &str) -> Result<(), PipelineError> {
    let expected = normalize(expected_hex);
    let actual = digest_file(path).await?;

    if actual == expected {
        log::debug!("Checksum verified for {}", path.display());
        return Ok(());
    }

    log::warn!(
        "Checksum mismatch for {}: expected {}, got {}",
        path.display(),
        expected,
        actual
    );
    if let Err(e) = fs::remove_file(path).await {
        log::warn!("Failed to delete corrupt file {}: {}", path.display(), e);
    }

    Err(PipelineError::Integrity {
        path: path.to_path_buf(),
        expected,
        actual,
    })
}
