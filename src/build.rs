//! Build information constants, populated by the build script.

/// Git commit hash of the build, or "unknown" if not available.
pub const GIT_HASH: &str = env!("FLYBOOK_GIT_HASH");

/// Build timestamp in RFC3339 format.
pub const BUILD_TIME_UTC: &str = env!("FLYBOOK_BUILD_TIME_UTC");

/// Rustc version used for the build.
pub const RUSTC_VERSION: &str = env!("FLYBOOK_RUSTC_VERSION");

/// Crate version from the manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_time_utc: &'static str,
    pub rustc_version: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION,
        git_hash: GIT_HASH,
        build_time_utc: BUILD_TIME_UTC,
        rustc_version: RUSTC_VERSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_is_populated() {
        let info = build_info();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(!info.git_hash.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(info.build_time_utc).is_ok());
    }
}
