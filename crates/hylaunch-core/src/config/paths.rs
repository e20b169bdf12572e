//! Directory layout derived from the launcher configuration

use crate::config::types::LauncherConfig;
use crate::errors::PipelineError;
use serde::Serialize;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "HytaleF2P";

/// Every directory the pipeline reads or writes, resolved once up front
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LauncherPaths {
    pub app_dir: PathBuf,
    pub game_dir: PathBuf,
    pub jre_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub tools_dir: PathBuf,
}

impl LauncherPaths {
    /// Lay out all directories under the given app directory
    pub fn under(app_dir: impl Into<PathBuf>) -> Self {
        let app_dir = app_dir.into();
        let package = app_dir.join("release").join("package");
        Self {
            game_dir: package.join("game").join("latest"),
            jre_dir: package.join("jre").join("latest"),
            cache_dir: app_dir.join("cache"),
            tools_dir: app_dir.join("butler"),
            app_dir,
        }
    }

    pub fn from_config(config: &LauncherConfig) -> Result<Self, PipelineError> {
        let app_dir = match &config.install_root {
            Some(root) => root.join(APP_DIR_NAME),
            None => Self::default_app_dir()?,
        };
        Ok(Self::under(app_dir))
    }

    /// Per-OS application data directory
    pub fn default_app_dir() -> Result<PathBuf, PipelineError> {
        let home = dirs::home_dir().ok_or_else(|| {
            PipelineError::Config("Could not determine home directory.".to_string())
        })?;
        Ok(Self::app_dir_for(&home, std::env::consts::OS))
    }

    fn app_dir_for(home: &Path, os: &str) -> PathBuf {
        match os {
            "windows" => home.join("AppData").join("Local").join(APP_DIR_NAME),
            "macos" => home
                .join("Library")
                .join("Application Support")
                .join(APP_DIR_NAME),
            _ => home.join(".hytalef2p"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_app_dir() {
        let paths = LauncherPaths::under("/data/HytaleF2P");
        assert_eq!(
            paths.game_dir,
            PathBuf::from("/data/HytaleF2P/release/package/game/latest")
        );
        assert_eq!(
            paths.jre_dir,
            PathBuf::from("/data/HytaleF2P/release/package/jre/latest")
        );
        assert_eq!(paths.cache_dir, PathBuf::from("/data/HytaleF2P/cache"));
        assert_eq!(paths.tools_dir, PathBuf::from("/data/HytaleF2P/butler"));
    }

    #[test]
    fn test_install_root_override() {
        let config = LauncherConfig {
            install_root: Some(PathBuf::from("/games")),
            ..Default::default()
        };
        let paths = LauncherPaths::from_config(&config).unwrap();
        assert_eq!(paths.app_dir, PathBuf::from("/games/HytaleF2P"));
    }

    #[test]
    fn test_per_os_app_dirs() {
        let home = Path::new("/home/player");
        assert_eq!(
            LauncherPaths::app_dir_for(home, "linux"),
            PathBuf::from("/home/player/.hytalef2p")
        );
        assert_eq!(
            LauncherPaths::app_dir_for(home, "macos"),
            PathBuf::from("/home/player/Library/Application Support/HytaleF2P")
        );
    }
}
