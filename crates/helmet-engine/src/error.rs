//! Engine error types

use helmet_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

use crate::functions::FunctionTable;
use crate::suggestions::{extract_function_name, suggest_unknown_function};
use crate::template::ParseError;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    /// A template failed to compile
    #[error("parse error at ({name}:{line}): {message}")]
    #[diagnostic(code(helmet::template::parse))]
    Parse {
        name: String,
        line: usize,
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A template failed while executing; `trace` is the formatted call trace
    #[error("{trace}")]
    #[diagnostic(code(helmet::template::render))]
    Render { template: String, trace: String },

    #[error("{0}")]
    #[diagnostic(code(helmet::core))]
    Core(#[from] CoreError),
}

impl EngineError {
    /// Wrap a compile failure, suggesting a close function name when the
    /// template calls one that does not exist
    pub fn parse(err: ParseError, functions: &FunctionTable) -> Self {
        let help = extract_function_name(&err.message)
            .and_then(|name| suggest_unknown_function(name, functions.names()));
        EngineError::Parse {
            name: err.name,
            line: err.line,
            message: err.message,
            help,
        }
    }

    /// Name of the template the error was raised in, when known
    pub fn template(&self) -> Option<&str> {
        match self {
            EngineError::Parse { name, .. } => Some(name),
            EngineError::Render { template, .. } => Some(template),
            EngineError::Core(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
