//! Release information injected into templates as `.Release`

use serde::{Deserialize, Serialize};

/// Name reported by `.Release.Service`
pub const SERVICE_NAME: &str = "Helmet";

/// Release information for templates
///
/// Serialized with the Go field names templates use
/// (`.Release.Name`, `.Release.IsInstall`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseInfo {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Revision number
    pub revision: u32,

    /// Is this an install operation?
    pub is_install: bool,

    /// Is this an upgrade operation?
    pub is_upgrade: bool,

    /// Service performing the render
    pub service: String,
}

impl ReleaseInfo {
    /// Create release info for a new install
    pub fn for_install(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            is_install: true,
            is_upgrade: false,
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Create release info for an upgrade
    pub fn for_upgrade(name: &str, namespace: &str, revision: u32) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision,
            is_install: false,
            is_upgrade: true,
            service: SERVICE_NAME.to_string(),
        }
    }
}

impl Default for ReleaseInfo {
    fn default() -> Self {
        Self::for_install("release-name", "default")
    }
}
