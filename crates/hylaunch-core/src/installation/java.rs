//! Resolution of the java executable used to launch the game

use crate::config::expand_home;
use crate::installation::platform::Platform;
use crate::installation::runtime::bundled_java_path;
use serde::Serialize;
use std::path::{Path, PathBuf};
use which::which;

/// Where a resolved java executable came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JavaSource {
    Override,
    Bundled,
    JavaHome,
    SystemPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaCandidate {
    pub source: JavaSource,
    pub path: Option<PathBuf>,
    pub exists: bool,
}

/// Finds java in priority order: override, bundled runtime, `JAVA_HOME`, `PATH`
#[derive(Debug, Clone)]
pub struct JavaLocator {
    runtime_dir: PathBuf,
    override_path: Option<String>,
    platform: Platform,
}

impl JavaLocator {
    pub fn new(runtime_dir: PathBuf) -> Self {
        Self {
            runtime_dir,
            override_path: None,
            platform: Platform::current(),
        }
    }

    pub fn with_override(mut self, path: Option<String>) -> Self {
        self.override_path = path.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    fn java_name(&self) -> String {
        self.platform.executable_name("java")
    }

    /// Resolve a user-supplied path: a file, a JDK directory, or a command name
    pub fn resolve_override(&self, input: &str) -> Option<PathBuf> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        let expanded = expand_home(trimmed);
        if expanded.is_dir() {
            let candidate = expanded.join("bin").join(self.java_name());
            return candidate.is_file().then_some(candidate);
        }
        if expanded.exists() {
            return Some(expanded);
        }
        if !expanded.is_absolute() {
            return which(trimmed).ok();
        }
        None
    }

    fn from_java_home(&self) -> Option<PathBuf> {
        let home = std::env::var_os("JAVA_HOME")?;
        Some(Path::new(&home).join("bin").join(self.java_name()))
    }

    /// The first usable java executable, if any
    pub fn locate(&self) -> Option<(JavaSource, PathBuf)> {
        if let Some(input) = &self.override_path {
            match self.resolve_override(input) {
                Some(path) => return Some((JavaSource::Override, path)),
                None => log::warn!("Configured java path '{}' could not be resolved", input),
            }
        }

        if let Some(path) = bundled_java_path(&self.runtime_dir, &self.platform) {
            return Some((JavaSource::Bundled, path));
        }

        if let Some(path) = self.from_java_home().filter(|p| p.is_file()) {
            return Some((JavaSource::JavaHome, path));
        }

        which("java").ok().map(|path| (JavaSource::SystemPath, path))
    }

    /// Every candidate location with whether it currently exists
    pub fn candidates(&self) -> Vec<JavaCandidate> {
        let mut candidates = Vec::new();

        if let Some(input) = &self.override_path {
            let path = self.resolve_override(input);
            candidates.push(JavaCandidate {
                source: JavaSource::Override,
                exists: path.is_some(),
                path,
            });
        }

        let bundled = bundled_java_path(&self.runtime_dir, &self.platform)
            .unwrap_or_else(|| self.runtime_dir.join("bin").join(self.java_name()));
        candidates.push(JavaCandidate {
            source: JavaSource::Bundled,
            exists: bundled.is_file(),
            path: Some(bundled),
        });

        let java_home = self.from_java_home();
        candidates.push(JavaCandidate {
            source: JavaSource::JavaHome,
            exists: java_home.as_ref().is_some_and(|p| p.is_file()),
            path: java_home,
        });

        let on_path = which("java").ok();
        candidates.push(JavaCandidate {
            source: JavaSource::SystemPath,
            exists: on_path.is_some(),
            path: on_path,
        });

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    fn fake_jdk(root: &Path) -> PathBuf {
        let java = root.join("bin").join("java");
        std::fs::create_dir_all(java.parent().unwrap()).unwrap();
        std::fs::write(&java, b"").unwrap();
        java
    }

    fn linux() -> Platform {
        Platform::new("linux", "x86_64")
    }

    #[test]
    fn test_override_directory_resolves_bin_java() {
        let temp_dir = tempdir().unwrap();
        let java = fake_jdk(temp_dir.path());
        let locator = JavaLocator::new(temp_dir.path().join("jre")).with_platform(linux());

        assert_eq!(
            locator.resolve_override(&temp_dir.path().to_string_lossy()),
            Some(java.clone())
        );
        assert_eq!(locator.resolve_override(&java.to_string_lossy()), Some(java));
        assert_eq!(locator.resolve_override("/definitely/not/here/java"), None);
        assert_eq!(locator.resolve_override("   "), None);
    }

    #[test]
    #[serial]
    fn test_bundled_runtime_wins_over_java_home() {
        let temp_dir = tempdir().unwrap();
        let runtime_dir = temp_dir.path().join("jre");
        let bundled = fake_jdk(&runtime_dir);
        let home = temp_dir.path().join("home-jdk");
        fake_jdk(&home);

        std::env::set_var("JAVA_HOME", &home);
        let located = JavaLocator::new(runtime_dir).with_platform(linux()).locate();
        std::env::remove_var("JAVA_HOME");

        assert_eq!(located, Some((JavaSource::Bundled, bundled)));
    }

    #[test]
    #[serial]
    fn test_java_home_used_when_no_bundled_runtime() {
        let temp_dir = tempdir().unwrap();
        let home = temp_dir.path().join("home-jdk");
        let java = fake_jdk(&home);

        std::env::set_var("JAVA_HOME", &home);
        let locator = JavaLocator::new(temp_dir.path().join("jre")).with_platform(linux());
        let located = locator.locate();
        let candidates = locator.candidates();
        std::env::remove_var("JAVA_HOME");

        assert_eq!(located, Some((JavaSource::JavaHome, java)));
        let bundled = candidates
            .iter()
            .find(|c| c.source == JavaSource::Bundled)
            .unwrap();
        assert!(!bundled.exists);
    }

    #[test]
    #[serial]
    fn test_unresolvable_override_falls_through() {
        let temp_dir = tempdir().unwrap();
        let runtime_dir = temp_dir.path().join("jre");
        let bundled = fake_jdk(&runtime_dir);

        let located = JavaLocator::new(runtime_dir)
            .with_platform(linux())
            .with_override(Some("/missing/jdk".to_string()))
            .locate();

        assert_eq!(located, Some((JavaSource::Bundled, bundled)));
    }
}
