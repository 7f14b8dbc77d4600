//! Go text/template dialect used by chart templates

pub mod ast;
pub mod error;
pub mod exec;
pub mod format;
pub mod parser;
pub mod value;

pub use ast::Tree;
pub use error::{ExecError, FuncError, ParseError, TemplateError};
pub use exec::{Executor, FuncContext, Namespace, MAX_INCLUDE_DEPTH, TPL_NAME};
pub use parser::parse;
pub use value::{Map, Object, Value};
