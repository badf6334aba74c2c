//! The worker script's build-time constants and request classification.
//!
//! Bump `GENERATION_TAG` on every deploy that changes the shell manifest or
//! the caching policy; activation of the new generation evicts every store
//! named by an older tag.

use url::Url;

/// Name of the cache store owned by this worker generation.
pub const GENERATION_TAG: &str = "archwave-v2";

/// Assets needed to boot the site shell offline.
pub const SHELL_MANIFEST: &[&str] = &[
    "/",
    "/manifest.json",
    "/favicon.ico",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
];

/// Path prefix of content-hashed build output.
pub const BUILD_ASSET_PREFIX: &str = "/_next/";

/// How an intercepted GET is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Hashed bundle output: network first, never written to cache.
    BuildAsset,
    /// Everything else: cache first, populated on miss.
    ShellStatic,
}

/// One worker generation's compiled-in parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerScript {
    pub generation_tag: String,
    pub shell_manifest: Vec<String>,
    pub build_asset_prefix: String,
    /// Signal skip-waiting from the install handler so a new generation
    /// takes over without waiting for every page to close.
    pub skip_waiting_on_install: bool,
}

impl Default for WorkerScript {
    fn default() -> Self {
        Self {
            generation_tag: GENERATION_TAG.to_string(),
            shell_manifest: SHELL_MANIFEST.iter().map(|s| s.to_string()).collect(),
            build_asset_prefix: BUILD_ASSET_PREFIX.to_string(),
            skip_waiting_on_install: true,
        }
    }
}

impl WorkerScript {
    /// A script with a custom tag and manifest and the default policy.
    pub fn new(generation_tag: &str, shell_manifest: &[&str]) -> Self {
        Self {
            generation_tag: generation_tag.to_string(),
            shell_manifest: shell_manifest.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Classify by URL path alone, whatever the origin.
    pub fn classify(&self, url: &Url) -> RequestClass {
        if url.path().starts_with(&self.build_asset_prefix) {
            RequestClass::BuildAsset
        } else {
            RequestClass::ShellStatic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_default_script() {
        let script = WorkerScript::default();
        assert_eq!(script.generation_tag, GENERATION_TAG);
        assert_eq!(script.shell_manifest.len(), 5);
        assert_eq!(script.shell_manifest[0], "/");
        assert!(script.skip_waiting_on_install);
    }

    #[test]
    fn test_classify_build_assets() {
        let script = WorkerScript::default();
        assert_eq!(script.classify(&url("https://a.com/_next/static/chunks/main-abc123.js")), RequestClass::BuildAsset);
        assert_eq!(script.classify(&url("https://a.com/_next/chunk123.js")), RequestClass::BuildAsset);
    }

    #[test]
    fn test_classify_shell_static() {
        let script = WorkerScript::default();
        assert_eq!(script.classify(&url("https://a.com/")), RequestClass::ShellStatic);
        assert_eq!(script.classify(&url("https://a.com/manifest.json")), RequestClass::ShellStatic);
        assert_eq!(script.classify(&url("https://a.com/_next")), RequestClass::ShellStatic);
        assert_eq!(script.classify(&url("https://a.com/articles/_next/x")), RequestClass::ShellStatic);
    }

    #[test]
    fn test_classify_ignores_query() {
        let script = WorkerScript::default();
        assert_eq!(script.classify(&url("https://a.com/products?from=/_next/")), RequestClass::ShellStatic);
    }

    #[test]
    fn test_new_keeps_policy_defaults() {
        let script = WorkerScript::new("arch-v2", &["/", "/manifest.json"]);
        assert_eq!(script.generation_tag, "arch-v2");
        assert_eq!(script.shell_manifest, vec!["/", "/manifest.json"]);
        assert_eq!(script.build_asset_prefix, BUILD_ASSET_PREFIX);
    }
}
