//! Chart tree flattening and render ordering
//!
//! Every template of the chart tree becomes a [`Renderable`] keyed by its
//! namespaced path (`root/charts/child/templates/x.yaml`) and paired with the
//! context of the chart that owns it. The sequence is sorted deepest chart
//! first, then by path in reverse, so the named templates of parent charts
//! are compiled after (and take precedence over) those of their dependencies.

use std::cmp::Reverse;

use helmet_core::chart::TEMPLATES_DIR;
use helmet_core::{Chart, RenderOptions, TemplateInfo, Values};

use crate::files_object::{CapabilitiesObject, FilesObject};
use crate::template::{Map, Value};

/// One template paired with the context it executes against
#[derive(Debug, Clone)]
pub struct Renderable {
    /// Namespaced template path
    pub path: String,

    /// Template source
    pub source: String,

    /// Context of the owning chart (`Chart`, `Values`, `Files`, ...)
    pub context: Value,

    /// Namespaced path of the owning chart's templates directory
    pub base_path: String,
}

impl Renderable {
    /// Partials (`_helpers.tpl`) only contribute named templates
    pub fn is_partial(&self) -> bool {
        is_partial(&self.path)
    }

    /// The context with `.Template` describing this template
    pub fn data(&self) -> Value {
        let template = TemplateInfo::new(self.path.as_str(), self.base_path.as_str());

        let mut data = match &self.context {
            Value::Map(map) => map.borrow().clone(),
            _ => Map::new(),
        };
        data.insert("Template".to_string(), Value::from_json(&template.to_value()));
        Value::from_map(data)
    }
}

pub(crate) fn is_partial(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|base| base.starts_with('_'))
}

/// Flatten a chart tree into renderables in execution order
pub fn flatten(chart: &Chart, values: &Values, options: &RenderOptions) -> Vec<Renderable> {
    let top = Value::from_json(&options.to_render_values());
    let shared = SharedContext {
        release: top.get_key("Release").unwrap_or_default(),
        capabilities: CapabilitiesObject::new(options.capabilities.clone()).into_value(),
    };

    let mut renderables = Vec::new();
    let root_values = Value::from_json(values.inner());
    let root_values = if root_values.is_null() {
        Value::empty_map()
    } else {
        root_values
    };
    collect(chart, chart.name(), true, root_values, &shared, &mut renderables);

    sort_renderables(&mut renderables);
    renderables
}

/// Objects every chart's context shares
struct SharedContext {
    release: Value,
    capabilities: Value,
}

/// Add the templates of `chart` and its dependencies, returning its context
fn collect(
    chart: &Chart,
    path: &str,
    is_root: bool,
    values: Value,
    shared: &SharedContext,
    out: &mut Vec<Renderable>,
) -> Value {
    let mut subcharts = Map::new();
    for dependency in chart.dependencies() {
        let section = match values.get_key(dependency.name()) {
            Some(table @ Value::Map(_)) => table,
            _ => Value::empty_map(),
        };
        let child_path = Chart::child_path(path, dependency.name());
        let child = collect(dependency, &child_path, false, section, shared, out);
        subcharts.insert(dependency.name().to_string(), child);
    }

    let mut context = Map::new();
    context.insert(
        "Chart".to_string(),
        Value::from_json(&chart.metadata.template_value(is_root)),
    );
    context.insert("Files".to_string(), FilesObject::new(chart.file_set()).into_value());
    context.insert("Release".to_string(), shared.release.clone());
    context.insert("Capabilities".to_string(), shared.capabilities.clone());
    context.insert("Values".to_string(), values);
    context.insert("Subcharts".to_string(), Value::from_map(subcharts));
    let context = Value::from_map(context);

    let base_path = format!("{}/{}", path, TEMPLATES_DIR);
    for template in chart.templates() {
        let template_path = format!("{}/{}", path, template.name);
        if chart.is_library() && !is_partial(&template_path) {
            tracing::trace!(template = %template_path, "skipping library chart template");
            continue;
        }
        out.push(Renderable {
            path: template_path,
            source: template.text(),
            context: context.clone(),
            base_path: base_path.clone(),
        });
    }

    context
}

/// Deepest charts first; within a depth, paths in reverse order
fn sort_renderables(renderables: &mut [Renderable]) {
    renderables.sort_by_key(|r| Reverse((r.path.matches('/').count(), r.path.clone())));
}
