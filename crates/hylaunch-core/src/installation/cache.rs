//! Shared download cache keyed by artifact URL

use crate::errors::PipelineError;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Manages the directory downloaded archives are staged in
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    cache_dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// File name a URL is cached under: its last path segment, without query
    pub fn file_name_for_url(url: &str) -> Option<String> {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);
        without_query
            .rsplit('/')
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .map(str::to_string)
    }

    /// Get the path where the artifact at `url` should be cached
    pub fn path_for_url(&self, url: &str) -> Result<PathBuf, PipelineError> {
        let name = Self::file_name_for_url(url).ok_or_else(|| {
            PipelineError::Manifest(format!("Cannot derive a file name from URL '{}'", url))
        })?;
        Ok(self.cache_dir.join(name))
    }

    /// Return the cached file for `url` if a non-empty one exists
    pub async fn find_cached(&self, url: &str) -> Option<PathBuf> {
        let path = self.path_for_url(url).ok()?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path),
            _ => None,
        }
    }

    pub async fn ensure_cache_dir(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.cache_dir).await?;
        Ok(())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Remove one cached file; a missing file is not an error
    pub async fn remove(&self, path: &Path) -> Result<(), PipelineError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Clear the entire cache
    pub async fn clear(&self) -> Result<(), PipelineError> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir).await?;
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<CacheStats, PipelineError> {
        let mut stats = CacheStats::default();

        if !self.cache_dir.exists() {
            return Ok(stats);
        }

        let mut entries = fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                stats.file_count += 1;
                stats.total_size += metadata.len();
            }
        }

        Ok(stats)
    }
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    pub file_count: usize,
    /// Total size of cached files in bytes
    pub total_size: u64,
}

impl CacheStats {
    /// Get total size in human-readable format
    pub fn total_size_human(&self) -> String {
        let sizes = ["B", "KB", "MB", "GB"];
        let mut size = self.total_size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < sizes.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        format!("{:.2} {}", size, sizes[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_name_for_url() {
        assert_eq!(
            ArtifactCache::file_name_for_url("https://cdn.example/jre/zulu25-linux_x64.tar.gz"),
            Some("zulu25-linux_x64.tar.gz".to_string())
        );
        assert_eq!(
            ArtifactCache::file_name_for_url("https://broth.itch.zone/butler/linux-amd64/LATEST/archive/default?x=1"),
            Some("default".to_string())
        );
        assert_eq!(ArtifactCache::file_name_for_url("https://example.com/"), None);
    }

    #[tokio::test]
    async fn test_find_cached_ignores_empty_files() {
        let temp_dir = tempdir().unwrap();
        let cache = ArtifactCache::new(temp_dir.path().to_path_buf());
        let url = "https://cdn.example/jre.zip";

        assert!(cache.find_cached(url).await.is_none());

        let path = cache.path_for_url(url).unwrap();
        fs::write(&path, b"").await.unwrap();
        assert!(cache.find_cached(url).await.is_none());

        fs::write(&path, b"PK").await.unwrap();
        assert_eq!(cache.find_cached(url).await, Some(path.clone()));

        cache.remove(&path).await.unwrap();
        cache.remove(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cache_stats_and_clear() {
        let temp_dir = tempdir().unwrap();
        let cache = ArtifactCache::new(temp_dir.path().join("cache"));

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.file_count, 0);

        cache.ensure_cache_dir().await.unwrap();
        fs::write(cache.cache_dir().join("a.zip"), b"content1").await.unwrap();
        fs::write(cache.cache_dir().join("b.zip"), b"content2").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_size, 16);

        cache.clear().await.unwrap();
        assert!(!cache.cache_dir().exists());
    }

    #[test]
    fn test_cache_stats_human_readable() {
        let stats = CacheStats {
            file_count: 1,
            total_size: 1024 * 1024,
        };
        assert_eq!(stats.total_size_human(), "1.00 MB");
    }
}
