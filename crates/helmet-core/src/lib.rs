//! Helmet Core - chart model and value resolution for the helmet renderer
//!
//! This crate provides the foundational types used by the rendering engine:
//! - `Chart`: a template bundle with its nested dependencies
//! - `Values`: value trees with deep merge support
//! - `coalesce_values`: resolution of caller values against a chart tree
//! - `Files`, `ReleaseInfo`, `Capabilities`: objects injected into templates

pub mod capabilities;
pub mod chart;
pub mod coalesce;
pub mod context;
pub mod error;
pub mod files;
pub mod release;
pub mod values;

pub use capabilities::{Capabilities, HelmVersion, KubeVersion};
pub use chart::{Chart, ChartFile, ChartMetadata, ChartType, Maintainer};
pub use coalesce::coalesce_values;
pub use context::{RenderOptions, TemplateInfo};
pub use error::{CoreError, Result};
pub use files::Files;
pub use release::ReleaseInfo;
pub use values::{GLOBAL_KEY, Values};
