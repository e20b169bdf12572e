//! Tests for the installation system

#[cfg(test)]
mod tests {
    use crate::installation::*;
    use std::path::PathBuf;

    #[test]
    fn test_platform_detection() {
        let platform = Platform::current();
        assert!(!platform.os.is_empty());
        assert!(!platform.arch.is_empty());

        let asset_format = platform.to_asset_format();
        assert!(asset_format.contains('-'));
    }

    #[test]
    fn test_manifest_keys() {
        let mac = Platform::new("macos", "aarch64");
        assert_eq!(mac.manifest_os(), "darwin");
        assert_eq!(mac.manifest_arch(), "arm64");
        assert_eq!(mac.to_asset_format(), "darwin-arm64");

        let win = Platform::new("windows", "x86_64");
        assert_eq!(win.to_asset_format(), "windows-amd64");
        assert_eq!(win.executable_name("java"), "java.exe");
        assert_eq!(Platform::new("linux", "x86_64").executable_name("java"), "java");
    }

    #[test]
    fn test_artifact_descriptor_describe() {
        let descriptor = ArtifactDescriptor::new(
            "https://cdn.example/jre.tar.gz",
            PathBuf::from("/cache/jre.tar.gz"),
            Platform::new("linux", "x86_64"),
        )
        .with_digest("abc");

        assert_eq!(descriptor.expected_digest.as_deref(), Some("abc"));
        assert_eq!(
            descriptor.describe(),
            "https://cdn.example/jre.tar.gz -> /cache/jre.tar.gz (linux-amd64)"
        );
    }

    #[test]
    fn test_provisioners_from_config() {
        let config = crate::config::LauncherConfig {
            runtime_path: Some("/opt/jdk".to_string()),
            ..Default::default()
        };
        let paths = crate::config::LauncherPaths::under("/tmp/HytaleF2P");

        let (_runtime, tool, _java) = provisioners_from_config(&config, &paths).unwrap();
        let urls = tool
            .with_platform(Platform::new("linux", "x86_64"))
            .candidate_urls()
            .unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with(&config.endpoints.tool_base));
    }
}
