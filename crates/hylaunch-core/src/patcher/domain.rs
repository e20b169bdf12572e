//! Origin and replacement domains

use crate::config::DEFAULT_AUTH_DOMAIN;

/// Domain compiled into the vendor binaries
pub const ORIGIN_DOMAIN: &str = "hytale.com";

/// Pick the replacement for `ORIGIN_DOMAIN`
///
/// Patching is a same-width overwrite, so the replacement must be ASCII with
/// exactly as many characters as the origin. Anything else falls back to
/// [`DEFAULT_AUTH_DOMAIN`].
pub fn resolve_target_domain(configured: &str) -> String {
    let configured = configured.trim();
    if configured.is_ascii() && configured.len() == ORIGIN_DOMAIN.len() {
        return configured.to_string();
    }

    log::warn!(
        "Domain '{}' ({} chars) cannot replace '{}' ({} chars); using default domain {}",
        configured,
        configured.chars().count(),
        ORIGIN_DOMAIN,
        ORIGIN_DOMAIN.len(),
        DEFAULT_AUTH_DOMAIN
    );
    DEFAULT_AUTH_DOMAIN.to_string()
}
