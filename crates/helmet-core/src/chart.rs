//! Chart definition

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};
use crate::files::Files;
use crate::values::Values;

/// Directory under which a chart's dependencies live in namespaced paths
pub const CHARTS_DIR: &str = "charts";

/// Directory holding a chart's template files
pub const TEMPLATES_DIR: &str = "templates";

/// A chart: metadata, templates, auxiliary files, default values and
/// nested dependency charts.
///
/// A chart owns its dependencies. Paths of nested charts are computed by
/// walking down from the root (see [`Chart::child_path`]), so no parent
/// back-reference is stored.
#[derive(Debug, Clone)]
pub struct Chart {
    /// Chart metadata
    pub metadata: ChartMetadata,

    /// Template files, relative to the chart root (e.g. `templates/svc.yaml`)
    templates: Vec<ChartFile>,

    /// Auxiliary files exposed to templates through `.Files`
    pub files: Vec<ChartFile>,

    /// Default values
    pub values: Values,

    dependencies: Vec<Chart>,
}

/// Chart type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Application,
    Library,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Library => "library",
        }
    }
}

/// Chart metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (v1 or v2)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Chart name (required)
    pub name: String,

    /// Chart version (required, SemVer)
    pub version: Version,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Application version
    #[serde(default)]
    pub app_version: Option<String>,

    /// Kubernetes version constraint
    #[serde(default)]
    pub kube_version: Option<String>,

    /// Chart type
    #[serde(default, rename = "type")]
    pub chart_type: ChartType,

    /// Home URL
    #[serde(default)]
    pub home: Option<String>,

    /// Icon URL
    #[serde(default)]
    pub icon: Option<String>,

    /// Source URLs
    #[serde(default)]
    pub sources: Vec<String>,

    /// Keywords
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Maintainers
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    /// Annotations
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Whether this chart is deprecated
    #[serde(default)]
    pub deprecated: bool,
}

fn default_api_version() -> String {
    "v2".to_string()
}

/// Maintainer information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A named file belonging to a chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFile {
    /// Path relative to the chart root
    pub name: String,

    /// Raw content
    pub data: Vec<u8>,

    /// Modification time
    pub mod_time: DateTime<Utc>,
}

impl ChartFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mod_time: DateTime::<Utc>::default(),
        }
    }

    pub fn with_mod_time(mut self, mod_time: DateTime<Utc>) -> Self {
        self.mod_time = mod_time;
        self
    }

    /// Content as text (lossy for non UTF-8 data)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl ChartMetadata {
    /// Create metadata with the given name and version
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            api_version: default_api_version(),
            name: name.into(),
            version,
            description: None,
            app_version: None,
            kube_version: None,
            chart_type: ChartType::Application,
            home: None,
            icon: None,
            sources: Vec::new(),
            keywords: Vec::new(),
            maintainers: Vec::new(),
            annotations: BTreeMap::new(),
            deprecated: false,
        }
    }

    /// The `.Chart` object seen by templates
    ///
    /// Keys follow the Go field names charts are written against
    /// (`Name`, `Version`, `APIVersion`, `AppVersion`, ...).
    pub fn template_value(&self, is_root: bool) -> JsonValue {
        let maintainers: Vec<JsonValue> = self
            .maintainers
            .iter()
            .map(|m| {
                serde_json::json!({
                    "Name": m.name,
                    "Email": m.email.clone().unwrap_or_default(),
                    "URL": m.url.clone().unwrap_or_default(),
                })
            })
            .collect();

        serde_json::json!({
            "Name": self.name,
            "Version": self.version.to_string(),
            "APIVersion": self.api_version,
            "AppVersion": self.app_version.clone().unwrap_or_default(),
            "Description": self.description.clone().unwrap_or_default(),
            "KubeVersion": self.kube_version.clone().unwrap_or_default(),
            "Type": self.chart_type.as_str(),
            "Home": self.home.clone().unwrap_or_default(),
            "Icon": self.icon.clone().unwrap_or_default(),
            "Sources": self.sources,
            "Keywords": self.keywords,
            "Maintainers": maintainers,
            "Annotations": self.annotations,
            "Deprecated": self.deprecated,
            "IsRoot": is_root,
        })
    }
}

impl Chart {
    /// Create an empty chart from its metadata
    pub fn new(metadata: ChartMetadata) -> Self {
        Self {
            metadata,
            templates: Vec::new(),
            files: Vec::new(),
            values: Values::new(),
            dependencies: Vec::new(),
        }
    }

    /// Chart name
    #[inline]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Whether this is a library chart (contributes only named templates)
    pub fn is_library(&self) -> bool {
        self.metadata.chart_type == ChartType::Library
    }

    /// Add a template file, consuming and returning the chart
    pub fn with_template(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<Self> {
        self.add_template(ChartFile::new(name, data))?;
        Ok(self)
    }

    /// Add a template file
    ///
    /// Template names are unique within a chart: each one keys an entry of
    /// the rendered output.
    pub fn add_template(&mut self, template: ChartFile) -> Result<()> {
        if self.templates.iter().any(|t| t.name == template.name) {
            return Err(CoreError::DuplicateTemplate {
                chart: self.name().to_string(),
                name: template.name,
            });
        }
        self.templates.push(template);
        Ok(())
    }

    /// Template files, in declaration order
    pub fn templates(&self) -> &[ChartFile] {
        &self.templates
    }

    /// Add an auxiliary file
    pub fn with_file(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.push(ChartFile::new(name, data));
        self
    }

    /// Set the default values
    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    /// Add a dependency, consuming and returning the chart
    pub fn with_dependency(mut self, dependency: Chart) -> Result<Self> {
        self.add_dependency(dependency)?;
        Ok(self)
    }

    /// Add a dependency
    ///
    /// Dependency names are unique among siblings: they key the
    /// dependency's value section and its output path segment.
    pub fn add_dependency(&mut self, dependency: Chart) -> Result<()> {
        if self.dependency(dependency.name()).is_some() {
            return Err(CoreError::DuplicateDependency {
                chart: self.name().to_string(),
                name: dependency.name().to_string(),
            });
        }
        self.dependencies.push(dependency);
        Ok(())
    }

    /// Direct dependencies, in declaration order
    pub fn dependencies(&self) -> &[Chart] {
        &self.dependencies
    }

    /// Find a direct dependency by name
    pub fn dependency(&self, name: &str) -> Option<&Chart> {
        self.dependencies.iter().find(|c| c.name() == name)
    }

    /// The auxiliary file set exposed as `.Files`
    pub fn file_set(&self) -> Files {
        Files::from_chart_files(&self.files)
    }

    /// Namespaced path of a dependency given its parent's path
    pub fn child_path(parent_path: &str, child_name: &str) -> String {
        format!("{}/{}/{}", parent_path, CHARTS_DIR, child_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart(name: &str) -> Chart {
        Chart::new(ChartMetadata::new(name, Version::new(0, 1, 0)))
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let mut parent = chart("parent");
        parent.add_dependency(chart("redis")).unwrap();

        let err = parent.add_dependency(chart("redis")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateDependency { .. }));
        assert_eq!(parent.dependencies().len(), 1);
    }

    #[test]
    fn test_child_path() {
        assert_eq!(Chart::child_path("parent", "child"), "parent/charts/child");
        assert_eq!(
            Chart::child_path("parent/charts/child", "leaf"),
            "parent/charts/child/charts/leaf"
        );
    }

    #[test]
    fn test_template_value_uses_go_field_names() {
        let mut meta = ChartMetadata::new("moby", Version::new(1, 2, 3));
        meta.app_version = Some("9.9".to_string());

        let value = meta.template_value(true);
        assert_eq!(value["Name"], "moby");
        assert_eq!(value["Version"], "1.2.3");
        assert_eq!(value["APIVersion"], "v2");
        assert_eq!(value["AppVersion"], "9.9");
        assert_eq!(value["IsRoot"], true);
    }

    #[test]
    fn test_duplicate_template_rejected() {
        let mut moby = chart("moby").with_template("templates/a.yaml", "a").unwrap();

        let err = moby.add_template(ChartFile::new("templates/a.yaml", "b")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateTemplate { .. }));
        assert_eq!(err.to_string(), "Duplicate template 'templates/a.yaml' in chart 'moby'");

        moby = moby.with_template("templates/b.yaml", "b").unwrap();
        assert!(moby.with_template("templates/b.yaml", "c").is_err());
    }
}
