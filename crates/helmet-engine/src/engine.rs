//! Render orchestration
//!
//! An [`Engine`] holds only read-only configuration and the function table
//! built from it. Each call to [`Engine::render`] flattens the chart tree,
//! compiles every template into a namespace of its own and executes the
//! non-partial templates in order, so one engine can serve any number of
//! concurrent renders.

use std::collections::BTreeMap;

use helmet_core::{Chart, RenderOptions, Values};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::flatten::{Renderable, flatten};
use crate::functions::{FuncResult, Function, FunctionOptions, FunctionTable, build_functions};
use crate::lookup::ClientProvider;
use crate::template::{Executor, FuncContext, Namespace, Value, parse};
use crate::trace;

/// Rendered manifests keyed by namespaced template path
pub type RenderedTemplates = BTreeMap<String, String>;

/// Engine settings that can be loaded from a configuration file
///
/// ```yaml
/// strict: true
/// lint: false
/// enableDns: false
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Fail on missing map keys instead of rendering them empty
    pub strict: bool,

    /// `required` and `fail` render empty instead of failing; `lookup` returns nothing
    pub lint: bool,

    /// Allow templates to resolve host names
    pub enable_dns: bool,
}

/// Template engine builder
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    custom: FunctionTable,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode (fail on missing map keys)
    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    /// Set lint mode
    pub fn lint(mut self, lint: bool) -> Self {
        self.config.lint = lint;
        self
    }

    /// Register host name resolution functions
    pub fn enable_dns(mut self, enable_dns: bool) -> Self {
        self.config.enable_dns = enable_dns;
        self
    }

    /// Add a template function, replacing any builtin of the same name
    ///
    /// `env`, `expandenv` and (without DNS) `getHostByName` stay unavailable.
    pub fn function(mut self, name: impl Into<String>, function: Function) -> Self {
        self.custom.insert(name, function);
        self
    }

    /// Add a fixed-arity function that needs no render context
    pub fn simple_function<F>(self, name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> FuncResult + Send + Sync + 'static,
    {
        self.function(
            name,
            Function::exact(arity, move |_: &FuncContext<'_>, args: &[Value]| f(args)),
        )
    }

    /// Build the engine
    pub fn build(self) -> Engine {
        let options = FunctionOptions {
            lint: self.config.lint,
            enable_dns: self.config.enable_dns,
        };
        Engine {
            config: self.config,
            functions: build_functions(&options, &self.custom),
        }
    }
}

/// The template engine
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    functions: FunctionTable,
}

impl Default for Engine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Engine {
    /// Create a builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Create an engine from loaded configuration
    pub fn from_config(config: EngineConfig) -> Self {
        Self::builder()
            .strict(config.strict)
            .lint(config.lint)
            .enable_dns(config.enable_dns)
            .build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Functions available to templates
    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Render every template of a chart tree
    ///
    /// `values` are the coalesced values of the whole tree (see
    /// [`helmet_core::coalesce_values`]). The result maps namespaced template
    /// paths to rendered text; partials produce no entry.
    pub fn render(&self, chart: &Chart, values: &Values, options: &RenderOptions) -> Result<RenderedTemplates> {
        self.render_inner(chart, values, options, None)
    }

    /// Render with a cluster collaborator backing `lookup`
    pub fn render_with_client_provider(
        &self,
        chart: &Chart,
        values: &Values,
        options: &RenderOptions,
        provider: &dyn ClientProvider,
    ) -> Result<RenderedTemplates> {
        self.render_inner(chart, values, options, Some(provider))
    }

    fn render_inner(
        &self,
        chart: &Chart,
        values: &Values,
        options: &RenderOptions,
        provider: Option<&dyn ClientProvider>,
    ) -> Result<RenderedTemplates> {
        let renderables = flatten(chart, values, options);
        tracing::debug!(
            chart = chart.name(),
            templates = renderables.len(),
            strict = self.config.strict,
            lint = self.config.lint,
            "rendering chart"
        );

        let namespace = self.compile(&renderables)?;
        let executor = Executor::new(&namespace, &self.functions)
            .strict(self.config.strict)
            .lint(self.config.lint)
            .client_provider(provider);

        let mut rendered = RenderedTemplates::new();
        for renderable in renderables.iter().filter(|r| !r.is_partial()) {
            tracing::trace!(template = %renderable.path, "executing template");

            let output = executor
                .execute(&renderable.path, &renderable.data())
                .map_err(|err| EngineError::Render {
                    template: renderable.path.clone(),
                    trace: trace::translate(&err),
                })?;

            rendered.insert(renderable.path.clone(), finish_output(&renderable.source, output));
        }

        tracing::debug!(chart = chart.name(), manifests = rendered.len(), "rendered chart");
        Ok(rendered)
    }

    /// Parse every renderable into one namespace, in render order
    fn compile(&self, renderables: &[Renderable]) -> Result<Namespace> {
        let functions = &self.functions;
        let mut namespace = Namespace::new();
        for renderable in renderables {
            let trees = parse(&renderable.path, &renderable.source, &|name| functions.contains(name))
                .map_err(|err| EngineError::parse(err, functions))?;
            namespace.add_parsed(&renderable.path, trees);
        }
        Ok(namespace)
    }
}

/// Drop `<no value>` markers and the newline a template's source starts with
fn finish_output(source: &str, output: String) -> String {
    let output = if output.contains("<no value>") {
        output.replace("<no value>", "")
    } else {
        output
    };
    match output.strip_prefix('\n') {
        Some(rest) if source.starts_with('\n') => rest.to_string(),
        _ => output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_yaml() {
        let config: EngineConfig = serde_yaml::from_str("strict: true\nenableDns: true\n").unwrap();
        assert_eq!(
            config,
            EngineConfig {
                strict: true,
                lint: false,
                enable_dns: true,
            }
        );

        let engine = Engine::from_config(config);
        assert!(engine.functions().contains("getHostByName"));
        assert!(!engine.functions().contains("env"));
    }

    #[test]
    fn test_default_config_is_lenient() {
        let config: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(!Engine::default().functions().contains("getHostByName"));
    }

    #[test]
    fn test_finish_output() {
        assert_eq!(finish_output("\nkind: A", "\nkind: A".into()), "kind: A");
        assert_eq!(finish_output("kind: A", "\nkind: A".into()), "\nkind: A");
        assert_eq!(finish_output("x", "a: <no value>".into()), "a: ");
    }
}
