//! Per-render inputs that are not part of the chart itself

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::capabilities::Capabilities;
use crate::release::ReleaseInfo;

/// Options describing the release being rendered and its target cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Release information (`.Release`)
    #[serde(default)]
    pub release: ReleaseInfo,

    /// Cluster capabilities (`.Capabilities`)
    #[serde(default)]
    pub capabilities: Capabilities,
}

impl RenderOptions {
    pub fn new(release: ReleaseInfo) -> Self {
        Self {
            release,
            capabilities: Capabilities::default(),
        }
    }

    /// Set capabilities
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// `Release` and `Capabilities` entries of a template context
    pub fn to_render_values(&self) -> JsonValue {
        serde_json::json!({
            "Release": self.release,
            "Capabilities": self.capabilities.template_value(),
        })
    }
}

/// Current template information (`.Template`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateInfo {
    /// Namespaced template path
    pub name: String,

    /// Namespaced path of the chart's templates directory
    pub base_path: String,
}

impl TemplateInfo {
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
        }
    }

    /// The `.Template` object seen by templates
    pub fn to_value(&self) -> JsonValue {
        serde_json::json!({
            "Name": self.name,
            "BasePath": self.base_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_from_yaml() {
        let opts: RenderOptions = serde_yaml::from_str(
            r#"
release:
  Name: web
  Namespace: prod
  Revision: 2
  IsInstall: false
  IsUpgrade: true
  Service: Helmet
capabilities:
  kubeVersion:
    version: v1.29.0
    major: "1"
    minor: "29"
  apiVersions: ["v1"]
  helmVersion:
    version: v3.14.0
    gitCommit: ""
    goVersion: ""
"#,
        )
        .unwrap();

        assert_eq!(opts.release.name, "web");
        assert!(opts.release.is_upgrade);
        assert_eq!(opts.capabilities.kube_version.minor, "29");
    }

    #[test]
    fn test_to_render_values() {
        let opts = RenderOptions::new(ReleaseInfo::for_install("moby", "sea"));
        let values = opts.to_render_values();

        assert_eq!(values["Release"]["Name"], "moby");
        assert_eq!(values["Release"]["Namespace"], "sea");
        assert_eq!(values["Capabilities"]["KubeVersion"]["Major"], "1");
    }

    #[test]
    fn test_template_info_keys() {
        let info = TemplateInfo::new("moby/templates/a.yaml", "moby/templates");
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["Name"], "moby/templates/a.yaml");
        assert_eq!(value["BasePath"], "moby/templates");
        assert_eq!(info.to_value(), value);
    }
}
