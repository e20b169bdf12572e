//! Acquisition of remote artifacts: the Java runtime and the butler tool
//!
//! Provisioners combine the transfer engine, the integrity verifier and the
//! archive extractor. Each one is idempotent: when its target already exists on
//! disk it returns without touching the network.

pub mod platform;
pub mod transfer;
pub mod integrity;
pub mod archive;
pub mod cache;
pub mod runtime;
pub mod java;
pub mod tool;

#[cfg(test)]
mod tests;


// Re-exports for convenience
pub use platform::*;
pub use transfer::Downloader;
pub use archive::ArchiveFormat;
pub use cache::{ArtifactCache, CacheStats};
pub use runtime::{bundled_java_path, RuntimeInstall, RuntimeManifest, RuntimeProvisioner};
pub use java::{JavaCandidate, JavaLocator, JavaSource};
pub use tool::{ToolInstall, ToolProvisioner};

use crate::config::{LauncherConfig, LauncherPaths};
use crate::errors::PipelineError;

/// Build both provisioners and the java locator from a configuration
pub fn provisioners_from_config(
    config: &LauncherConfig,
    paths: &LauncherPaths,
) -> Result<(RuntimeProvisioner, ToolProvisioner, JavaLocator), PipelineError> {
    let downloader = Downloader::from_config(&config.transfer)?;
    let runtime = RuntimeProvisioner::new(downloader.clone(), &config.endpoints.runtime_manifest);
    let tool = ToolProvisioner::new(downloader, &config.endpoints.tool_base);
    let java = JavaLocator::new(paths.jre_dir.clone()).with_override(config.runtime_path.clone());
    Ok((runtime, tool, java))
}
