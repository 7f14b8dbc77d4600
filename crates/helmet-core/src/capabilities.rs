//! Cluster and tool capabilities injected as `.Capabilities`

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// API versions assumed to exist when no cluster is consulted
const DEFAULT_API_VERSIONS: &[&str] = &[
    "v1",
    "admissionregistration.k8s.io/v1",
    "apiextensions.k8s.io/v1",
    "apps/v1",
    "authentication.k8s.io/v1",
    "authorization.k8s.io/v1",
    "autoscaling/v1",
    "autoscaling/v2",
    "batch/v1",
    "certificates.k8s.io/v1",
    "coordination.k8s.io/v1",
    "discovery.k8s.io/v1",
    "events.k8s.io/v1",
    "networking.k8s.io/v1",
    "node.k8s.io/v1",
    "policy/v1",
    "rbac.authorization.k8s.io/v1",
    "scheduling.k8s.io/v1",
    "storage.k8s.io/v1",
];

/// Cluster capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Kubernetes version
    pub kube_version: KubeVersion,

    /// Available API versions (`group/version` or `group/version/Kind`)
    pub api_versions: Vec<String>,

    /// Version of the rendering tool
    pub helm_version: HelmVersion,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            kube_version: KubeVersion::default(),
            api_versions: DEFAULT_API_VERSIONS.iter().map(|s| s.to_string()).collect(),
            helm_version: HelmVersion::default(),
        }
    }
}

impl Capabilities {
    /// Whether an API version (or `version/Kind`) is available
    pub fn has_api_version(&self, version: &str) -> bool {
        self.api_versions.iter().any(|v| v == version)
    }

    /// Replace the list of available API versions
    pub fn with_api_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the Kubernetes version
    pub fn with_kube_version(mut self, version: &str) -> Self {
        self.kube_version = KubeVersion::new(version);
        self
    }

    /// The `.Capabilities` data seen by templates, with Go field names
    pub fn template_value(&self) -> JsonValue {
        serde_json::json!({
            "KubeVersion": {
                "Version": self.kube_version.version,
                "Major": self.kube_version.major,
                "Minor": self.kube_version.minor,
                "GitVersion": self.kube_version.version,
            },
            "APIVersions": self.api_versions,
            "HelmVersion": {
                "Version": self.helm_version.version,
                "GitCommit": self.helm_version.git_commit,
                "GoVersion": self.helm_version.go_version,
            },
        })
    }
}

/// Kubernetes version info
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeVersion {
    pub version: String,
    pub major: String,
    pub minor: String,
}

impl Default for KubeVersion {
    fn default() -> Self {
        Self::new("v1.28.0")
    }
}

impl KubeVersion {
    pub fn new(version: &str) -> Self {
        let version = version.trim_start_matches('v');
        let mut parts = version.split('.');

        Self {
            version: format!("v{}", version),
            major: parts.next().unwrap_or("1").to_string(),
            minor: parts.next().unwrap_or("28").to_string(),
        }
    }
}

/// Rendering tool version info
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmVersion {
    pub version: String,
    pub git_commit: String,
    pub go_version: String,
}

impl Default for HelmVersion {
    fn default() -> Self {
        Self {
            version: format!("v{}", env!("CARGO_PKG_VERSION")),
            git_commit: String::new(),
            go_version: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kube_version_parsing() {
        let v = KubeVersion::new("1.30.2");
        assert_eq!(v.version, "v1.30.2");
        assert_eq!(v.major, "1");
        assert_eq!(v.minor, "30");
    }

    #[test]
    fn test_has_api_version() {
        let caps = Capabilities::default();
        assert!(caps.has_api_version("apps/v1"));
        assert!(!caps.has_api_version("extensions/v1beta1"));

        let caps = caps.with_api_versions(["monitoring.coreos.com/v1/ServiceMonitor"]);
        assert!(caps.has_api_version("monitoring.coreos.com/v1/ServiceMonitor"));
        assert!(!caps.has_api_version("apps/v1"));
    }

    #[test]
    fn test_template_value_keys() {
        let caps = Capabilities::default().with_kube_version("v1.29.3");
        let value = caps.template_value();

        assert_eq!(value["KubeVersion"]["Version"], "v1.29.3");
        assert_eq!(value["KubeVersion"]["GitVersion"], "v1.29.3");
        assert_eq!(value["KubeVersion"]["Minor"], "29");
        assert!(value["APIVersions"].as_array().unwrap().len() > 1);
    }
}
