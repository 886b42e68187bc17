//! Decides which remote path the current deployment can reach.
//!
//! Resolved once at startup and carried in `AppContext`; never re-derived
//! per call and never a signal of success or failure.

use serde::Serialize;
use std::{fmt, str::FromStr};

/// Hosting domains where the datastore is only reachable through the
/// server-side gateway functions.
pub const DEFAULT_GATEWAY_SUFFIXES: [&str; 1] = [".netlify.app"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePath {
    /// Talk to the datastore directly.
    Direct,
    /// Go through the HTTP gateway.
    Gateway,
}

impl FromStr for RemotePath {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" | "sdk" => Ok(RemotePath::Direct),
            "gateway" | "functions" => Ok(RemotePath::Gateway),
            other => Err(format!("unknown deployment `{other}`")),
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemotePath::Direct => write!(f, "direct"),
            RemotePath::Gateway => write!(f, "gateway"),
        }
    }
}

/// Classify the deployment.
///
/// An explicit build flag wins; an unrecognized flag is ignored. Otherwise a
/// host ending in one of `gateway_suffixes` selects the gateway.
pub fn detect(build_flag: Option<&str>, host: &str, gateway_suffixes: &[&str]) -> RemotePath {
    if let Some(path) = build_flag.and_then(|flag| flag.parse().ok()) {
        return path;
    }
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let host = host.split(':').next().unwrap_or_default();
    if gateway_suffixes
        .iter()
        .any(|suffix| host.ends_with(&suffix.to_ascii_lowercase()))
    {
        RemotePath::Gateway
    } else {
        RemotePath::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_overrides_host() {
        assert_eq!(
            detect(Some("direct"), "wedding.netlify.app", &DEFAULT_GATEWAY_SUFFIXES),
            RemotePath::Direct
        );
        assert_eq!(
            detect(Some("gateway"), "localhost", &DEFAULT_GATEWAY_SUFFIXES),
            RemotePath::Gateway
        );
    }

    #[test]
    fn host_suffix_selects_gateway() {
        assert_eq!(
            detect(None, "Our-Wedding.netlify.app:443", &DEFAULT_GATEWAY_SUFFIXES),
            RemotePath::Gateway
        );
        assert_eq!(
            detect(None, "localhost:5173", &DEFAULT_GATEWAY_SUFFIXES),
            RemotePath::Direct
        );
    }

    #[test]
    fn unknown_flag_falls_back_to_host() {
        assert_eq!(
            detect(Some("edge"), "x.netlify.app", &DEFAULT_GATEWAY_SUFFIXES),
            RemotePath::Gateway
        );
    }
}
