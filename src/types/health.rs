//! Health endpoint response and client/server version compatibility.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version string of this SDK, reported in [`VersionCompatibility`].
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Body of `GET /api/v1/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status, usually `"healthy"`.
    #[serde(default)]
    pub status: String,
    /// Server version.
    #[serde(default)]
    pub version: Option<String>,
    /// Anything else the server reports (connection and queue counters).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthResponse {
    /// Server version, or `"unknown"` when the server did not report one.
    pub fn version_or_unknown(&self) -> &str {
        self.version.as_deref().unwrap_or("unknown")
    }
}

/// Result of comparing the server's major version with this SDK's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionCompatibility {
    /// Version reported by the server, `"unknown"` if absent.
    pub server_version: String,
    /// Version of this SDK.
    pub client_version: String,
    /// Whether the major versions match.
    pub compatible: bool,
    /// The full health response.
    pub health: HealthResponse,
}

impl VersionCompatibility {
    /// Compare `health` against [`CLIENT_VERSION`].
    pub fn check(health: HealthResponse) -> Self {
        Self::check_against(health, CLIENT_VERSION)
    }

    /// Compare `health` against an explicit client version.
    pub fn check_against(health: HealthResponse, client_version: &str) -> Self {
        let server_version = health.version_or_unknown().to_string();
        Self {
            compatible: is_compatible(&server_version, client_version),
            server_version,
            client_version: client_version.to_string(),
            health,
        }
    }
}

/// Major component of a dotted version.
///
/// Versions without a dot (including `"unknown"`) have major `"0"`.
pub fn major_version(version: &str) -> &str {
    match version.split_once('.') {
        Some((major, _)) => major,
        None => "0",
    }
}

/// Returns `true` if both versions share a major component.
pub fn is_compatible(server_version: &str, client_version: &str) -> bool {
    major_version(server_version) == major_version(client_version)
}
