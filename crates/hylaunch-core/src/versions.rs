//! Remote version queries for the installed, latest and variant client builds

use crate::config::LauncherConfig;
use crate::errors::PipelineError;
use crate::installation::Downloader;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Used when the latest-version endpoint cannot be reached
pub const FALLBACK_LATEST_VERSION: &str = "4.pwr";

/// Source of version information
///
/// Every query degrades instead of failing: latest falls back to
/// [`FALLBACK_LATEST_VERSION`], the others to `None`.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn latest_version(&self) -> String;
    async fn installed_version(&self) -> Option<String>;
    async fn variant_version(&self) -> Option<String>;
}

/// Version information gathered at the start of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionState {
    pub installed: Option<String>,
    pub latest: String,
    pub optional_variant: Option<String>,
}

impl VersionState {
    /// An update is needed only when the installed version is known and differs
    pub fn needs_update(&self) -> bool {
        matches!(&self.installed, Some(installed) if *installed != self.latest)
    }
}

/// Query all three versions concurrently
pub async fn check_versions(source: &dyn VersionSource) -> VersionState {
    let (latest, installed, optional_variant) = tokio::join!(
        source.latest_version(),
        source.installed_version(),
        source.variant_version()
    );
    log::info!(
        "Versions: installed={:?} latest={} variant={:?}",
        installed,
        latest,
        optional_variant
    );
    VersionState {
        installed,
        latest,
        optional_variant,
    }
}

#[derive(Debug, Deserialize)]
struct ClientVersionResponse {
    client_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VariantVersionResponse {
    multi_version: Option<String>,
}

/// [`VersionSource`] backed by the launcher's JSON endpoints
#[derive(Debug, Clone)]
pub struct HttpVersionSource {
    downloader: Downloader,
    latest_url: String,
    installed_url: String,
    variant_url: String,
    timeout: Duration,
}

impl HttpVersionSource {
    pub fn new(downloader: Downloader, config: &LauncherConfig) -> Self {
        Self {
            downloader,
            latest_url: config.endpoints.latest_version.clone(),
            installed_url: config.endpoints.installed_version.clone(),
            variant_url: config.endpoints.variant_version.clone(),
            timeout: Duration::from_secs(config.transfer.request_timeout_secs),
        }
    }

    async fn client_version(&self, url: &str) -> Result<Option<String>, PipelineError> {
        let response: ClientVersionResponse = self.downloader.fetch_json(url, Some(self.timeout)).await?;
        Ok(response.client_version.filter(|v| !v.is_empty()))
    }
}

#[async_trait]
impl VersionSource for HttpVersionSource {
    async fn latest_version(&self) -> String {
        match self.client_version(&self.latest_url).await {
            Ok(Some(version)) => version,
            Ok(None) => {
                log::warn!("Invalid latest version response, falling back to {}", FALLBACK_LATEST_VERSION);
                FALLBACK_LATEST_VERSION.to_string()
            }
            Err(e) => {
                log::warn!(
                    "Latest version unavailable ({}), falling back to {}",
                    e,
                    FALLBACK_LATEST_VERSION
                );
                FALLBACK_LATEST_VERSION.to_string()
            }
        }
    }

    async fn installed_version(&self) -> Option<String> {
        match self.client_version(&self.installed_url).await {
            Ok(version) => version,
            Err(e) => {
                log::warn!("Installed version unavailable: {}", e);
                None
            }
        }
    }

    async fn variant_version(&self) -> Option<String> {
        let response: Result<VariantVersionResponse, _> = self
            .downloader
            .fetch_json(&self.variant_url, Some(self.timeout))
            .await;
        match response {
            Ok(response) => response.multi_version.filter(|v| !v.is_empty()),
            Err(e) => {
                log::info!("Variant version unavailable: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_server::{MockFileServer, MockResponse};

    fn source_for(server: &MockFileServer) -> HttpVersionSource {
        let mut config = LauncherConfig::default();
        config.endpoints.latest_version = server.url("/api/version_client");
        config.endpoints.installed_version = server.url("/api/clientCheck");
        config.endpoints.variant_version = server.url("/api/multi");
        HttpVersionSource::new(Downloader::new("hylaunch-test").unwrap(), &config)
    }

    #[test]
    fn test_needs_update() {
        let state = |installed: Option<&str>, latest: &str| VersionState {
            installed: installed.map(str::to_string),
            latest: latest.to_string(),
            optional_variant: None,
        };
        assert!(!state(Some("5.1"), "5.1").needs_update());
        assert!(state(Some("5.0"), "5.1").needs_update());
        assert!(!state(None, "5.1").needs_update());
    }

    #[tokio::test]
    async fn test_versions_from_endpoints() {
        let server = MockFileServer::start(vec![
            ("/api/version_client", MockResponse::json(r#"{"client_version":"5.1"}"#)),
            ("/api/clientCheck", MockResponse::json(r#"{"client_version":"5.0"}"#)),
            ("/api/multi", MockResponse::json(r#"{"multi_version":"5.1"}"#)),
        ])
        .await;

        let state = check_versions(&source_for(&server)).await;

        assert_eq!(state.latest, "5.1");
        assert_eq!(state.installed.as_deref(), Some("5.0"));
        assert_eq!(state.optional_variant.as_deref(), Some("5.1"));
        assert!(state.needs_update());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_unavailable_endpoints_fall_back() {
        let server = MockFileServer::start(vec![
            ("/api/version_client", MockResponse::status(500)),
            ("/api/clientCheck", MockResponse::json(r#"{"unexpected":true}"#)),
        ])
        .await;

        let state = check_versions(&source_for(&server)).await;

        assert_eq!(state.latest, FALLBACK_LATEST_VERSION);
        assert_eq!(state.installed, None);
        assert_eq!(state.optional_variant, None);
        assert!(!state.needs_update());

        server.shutdown().await;
    }
}
