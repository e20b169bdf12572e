//! Configuration module for the launcher pipeline
//!
//! Configuration is read once from YAML, overridden from the environment, and
//! then passed explicitly into every provisioner instead of being looked up
//! from global state.

pub mod types;
pub mod loader;
pub mod paths;

pub use types::*;
pub use loader::*;
pub use paths::*;


use crate::errors::PipelineError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<LauncherConfig, PipelineError> {
    ConfigLoader::from_file(path).await
}
