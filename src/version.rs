//! Build metadata, printed by `discharge-preflight version` and returned by
//! the service's health endpoint.

use crate::engine::finding::Source;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_date: Option<&'static str>,
    pub target: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rustc_version: Option<&'static str>,
    /// The fixed check set every run fans out to
    pub sources: [Source; 5],
}

impl BuildInfo {
    /// Metadata stamped in by `build.rs`, falling back to the host
    /// architecture when the build script did not run.
    pub fn current() -> Self {
        BuildInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("DISCHARGE_PREFLIGHT_GIT_HASH"),
            build_date: option_env!("DISCHARGE_PREFLIGHT_BUILD_DATE"),
            target: option_env!("DISCHARGE_PREFLIGHT_TARGET").unwrap_or(std::env::consts::ARCH),
            rustc_version: option_env!("DISCHARGE_PREFLIGHT_RUSTC_VERSION"),
            sources: Source::ALL,
        }
    }

    /// `name/version`, with the short commit when known.
    pub fn short(&self) -> String {
        match self.commit {
            Some(commit) => format!("{}/{} ({})", self.name, self.version, commit),
            None => format!("{}/{}", self.name, self.version),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.version)?;
        let optional = [
            ("Commit", self.commit),
            ("Built", self.build_date),
            ("Rustc", self.rustc_version),
        ];
        for (label, value) in optional {
            if let Some(value) = value {
                writeln!(f, "{}: {}", label, value)?;
            }
        }
        writeln!(f, "Target: {}", self.target)?;

        let sources: Vec<&str> = self.sources.iter().map(|s| s.as_str()).collect();
        write!(f, "Checks: {}", sources.join(", "))
    }
}
