//! Helmet Engine - Go template rendering for charts
//!
//! This crate renders a chart tree into manifests:
//! - a Go `text/template` dialect (parser, executor, `define`/`template`/`block`)
//! - the chart function library (`include`, `tpl`, `required`, `toYaml`, `lookup`, ...)
//! - deterministic flattening of a chart and its dependencies into one namespace
//! - multi-line error traces that follow `include`/`tpl` call sites

pub mod engine;
pub mod error;
pub mod files_object;
pub mod flatten;
pub mod functions;
pub mod lookup;
pub mod suggestions;
pub mod template;
pub mod trace;

pub use engine::{Engine, EngineBuilder, EngineConfig, RenderedTemplates};
pub use error::{EngineError, Result};
pub use functions::{Arity, FuncContext, FuncResult, Function, FunctionOptions, FunctionTable};
pub use lookup::{ClientProvider, LookupError, ResourceClient};
pub use template::{FuncError, Value};
