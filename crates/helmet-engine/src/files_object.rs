//! Host objects for `.Files` and `.Capabilities`
//!
//! # Usage in Templates
//!
//! ```text
//! {{ .Files.Get "config/nginx.conf" }}
//! {{ (.Files.Glob "config/*.yaml").AsConfig | nindent 2 }}
//! {{ range .Files.Lines "hosts.txt" }}- {{ . }}{{ end }}
//! {{ if .Capabilities.APIVersions.Has "monitoring.coreos.com/v1" }}...{{ end }}
//! {{ .Capabilities.KubeVersion.Minor }}
//! ```

use std::any::Any;
use std::fmt;

use helmet_core::{Capabilities, Files, KubeVersion};

use crate::functions::str_arg;
use crate::template::{FuncError, Map, Object, Value};

fn method_arity(name: &str, want: usize, args: &[Value]) -> Result<(), FuncError> {
    if args.len() != want {
        return Err(FuncError::msg(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            want,
            args.len()
        )));
    }
    Ok(())
}

/// Auxiliary chart files exposed as `.Files`
#[derive(Debug, Clone)]
pub struct FilesObject {
    files: Files,
}

impl FilesObject {
    pub fn new(files: Files) -> Self {
        Self { files }
    }

    pub fn into_value(self) -> Value {
        Value::object(self)
    }
}

impl Object for FilesObject {
    fn type_name(&self) -> &'static str {
        "chart.Files"
    }

    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }

    fn has_method(&self, name: &str) -> bool {
        matches!(
            name,
            "Get" | "GetBytes" | "Glob" | "Lines" | "AsConfig" | "AsSecrets"
        )
    }

    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, FuncError> {
        match name {
            "Get" => {
                method_arity(name, 1, args)?;
                Ok(self.files.get(str_arg(&args[0])?).into())
            }
            "GetBytes" => {
                method_arity(name, 1, args)?;
                let bytes = self.files.get_bytes(str_arg(&args[0])?).unwrap_or_default();
                Ok(bytes.iter().map(|b| Value::Int(i64::from(*b))).collect::<Vec<_>>().into())
            }
            "Glob" => {
                method_arity(name, 1, args)?;
                let matched = self
                    .files
                    .glob(str_arg(&args[0])?)
                    .map_err(|e| FuncError::msg(e.to_string()))?;
                Ok(FilesObject::new(matched).into_value())
            }
            "Lines" => {
                method_arity(name, 1, args)?;
                let lines = self.files.lines(str_arg(&args[0])?);
                Ok(lines.into_iter().map(Value::from).collect::<Vec<_>>().into())
            }
            "AsConfig" => {
                method_arity(name, 0, args)?;
                self.files
                    .as_config()
                    .map(Value::from)
                    .map_err(|e| FuncError::msg(e.to_string()))
            }
            "AsSecrets" => {
                method_arity(name, 0, args)?;
                self.files
                    .as_secrets()
                    .map(Value::from)
                    .map_err(|e| FuncError::msg(e.to_string()))
            }
            _ => Err(FuncError::msg(format!(
                "can't evaluate field {} in type {}",
                name,
                self.type_name()
            ))),
        }
    }

    fn to_value(&self) -> Value {
        let map: Map = self
            .files
            .iter()
            .map(|(path, data)| (path.to_string(), Value::from(String::from_utf8_lossy(data).into_owned())))
            .collect();
        Value::from_map(map)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Cluster capabilities exposed as `.Capabilities`
#[derive(Debug, Clone)]
pub struct CapabilitiesObject {
    capabilities: Capabilities,
}

impl CapabilitiesObject {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    pub fn into_value(self) -> Value {
        Value::object(self)
    }
}

impl Object for CapabilitiesObject {
    fn type_name(&self) -> &'static str {
        "chartutil.Capabilities"
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "KubeVersion" => Some(Value::object(KubeVersionObject(
                self.capabilities.kube_version.clone(),
            ))),
            "APIVersions" => Some(Value::object(ApiVersions(
                self.capabilities.api_versions.clone(),
            ))),
            "HelmVersion" => self.to_value().get_key("HelmVersion"),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::from_json(&self.capabilities.template_value())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `.Capabilities.KubeVersion`; prints as its version string
#[derive(Debug, Clone)]
struct KubeVersionObject(KubeVersion);

impl Object for KubeVersionObject {
    fn type_name(&self) -> &'static str {
        "chartutil.KubeVersion"
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "Version" | "GitVersion" => Some(Value::from(self.0.version.as_str())),
            "Major" => Some(Value::from(self.0.major.as_str())),
            "Minor" => Some(Value::from(self.0.minor.as_str())),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        for field in ["Version", "Major", "Minor", "GitVersion"] {
            if let Some(value) = self.get_field(field) {
                map.insert(field.to_string(), value);
            }
        }
        Value::from_map(map)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn fmt_go(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.version)
    }
}

/// `.Capabilities.APIVersions`
#[derive(Debug, Clone)]
struct ApiVersions(Vec<String>);

impl Object for ApiVersions {
    fn type_name(&self) -> &'static str {
        "chartutil.VersionSet"
    }

    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }

    fn has_method(&self, name: &str) -> bool {
        name == "Has"
    }

    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, FuncError> {
        method_arity(name, 1, args)?;
        let wanted = str_arg(&args[0])?;
        Ok(self.0.iter().any(|v| v == wanted).into())
    }

    fn to_value(&self) -> Value {
        self.0.iter().map(|v| Value::from(v.as_str())).collect::<Vec<_>>().into()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
