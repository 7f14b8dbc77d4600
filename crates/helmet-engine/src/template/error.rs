//! Template parse and execution errors
//!
//! Execution errors nest: a failure inside an `include`d template is carried
//! as the `source()` of the error raised at the `include` call site, and the
//! `Display` of each layer embeds the full text of the layer below it. This
//! keeps the single-line messages of the Go engine while leaving the causal
//! chain walkable.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::lookup::LookupError;

/// A template failed to compile
#[derive(Debug, Clone, Error)]
#[error("template: {name}:{line}: {message}")]
pub struct ParseError {
    /// Name of the template being parsed
    pub name: String,

    /// 1-based line of the offending token
    pub line: usize,

    pub message: String,
}

impl ParseError {
    pub fn new(name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            line,
            message: message.into(),
        }
    }
}

/// A template failed while executing
#[derive(Debug)]
pub enum ExecError {
    /// Failure at a known node: `template: <loc>: executing "<name>" at <<context>>: <message>`
    At {
        location: String,
        name: String,
        context: String,
        message: String,
        source: Option<Box<TemplateError>>,
    },

    /// Failure without a node: `template: <name>: <message>`
    Bare { name: String, message: String },

    /// `template: no template "<name>" associated with template "<parent>"`
    NoTemplate { name: String, parent: String },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::At {
                location,
                name,
                context,
                message,
                ..
            } => write!(
                f,
                "template: {}: executing \"{}\" at <{}>: {}",
                location, name, context, message
            ),
            ExecError::Bare { name, message } => write!(f, "template: {}: {}", name, message),
            ExecError::NoTemplate { name, parent } => write!(
                f,
                "template: no template \"{}\" associated with template \"{}\"",
                name, parent
            ),
        }
    }
}

impl StdError for ExecError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExecError::At {
                source: Some(inner),
                ..
            } => Some(inner.as_ref()),
            _ => None,
        }
    }
}

/// Any error produced by compiling or running a template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Error returned by a template function
///
/// The executor reports it as `error calling <function>: <error>`.
#[derive(Debug, Error)]
pub enum FuncError {
    #[error("{0}")]
    Message(String),

    /// A nested template execution failed (`include`)
    #[error(transparent)]
    Template(Box<TemplateError>),

    /// `tpl` text failed to execute
    #[error("error during tpl function execution for {quoted}: {source}")]
    Tpl {
        quoted: String,
        source: Box<TemplateError>,
    },

    /// `tpl` text failed to parse
    #[error("cannot parse template {quoted}: {source}")]
    TplParse { quoted: String, source: ParseError },

    /// The cluster lookup collaborator failed
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl FuncError {
    pub fn msg(message: impl Into<String>) -> Self {
        FuncError::Message(message.into())
    }

    /// The template error this function error wraps, if any
    pub(crate) fn into_template_source(self) -> (String, Option<Box<TemplateError>>) {
        let text = self.to_string();
        let source = match self {
            FuncError::Template(inner) | FuncError::Tpl { source: inner, .. } => Some(inner),
            _ => None,
        };
        (text, source)
    }
}

impl From<TemplateError> for FuncError {
    fn from(err: TemplateError) -> Self {
        FuncError::Template(Box::new(err))
    }
}
