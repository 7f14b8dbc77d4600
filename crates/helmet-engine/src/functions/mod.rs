//! Function registry
//!
//! Every function a template can call lives in a [`FunctionTable`]. The table
//! for a render is assembled by [`build_functions`] from the Go builtins, the
//! generic string/list/dict/math library, the chart-bound functions
//! (`include`, `tpl`, `required`, `fail`, `lookup`) and any caller-supplied
//! functions. Render-scoped state reaches the chart-bound functions through
//! the [`FuncContext`] passed to every call, so one table can be shared by
//! any number of concurrent renders.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::template::{FuncError, Value};

pub use crate::template::FuncContext;

mod builtins;
mod chart;
mod dicts;
mod encoding;
mod lists;
mod math;
mod network;
mod serialization;
mod strings;
mod versions;

pub type FuncResult = Result<Value, FuncError>;

type Callable = dyn Fn(&FuncContext<'_>, &[Value]) -> FuncResult + Send + Sync;

/// Functions a template may never call, whatever the configuration
pub const FORBIDDEN_FUNCTIONS: &[&str] = &["env", "expandenv"];

/// Functions that resolve host names; registered only with DNS enabled
pub const DNS_FUNCTIONS: &[&str] = &["getHostByName"];

/// Number of arguments a function accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

/// A callable template function
#[derive(Clone)]
pub struct Function {
    arity: Arity,
    call: Arc<Callable>,
}

impl Function {
    /// A function taking exactly `n` arguments
    pub fn exact<F>(n: usize, f: F) -> Self
    where
        F: Fn(&FuncContext<'_>, &[Value]) -> FuncResult + Send + Sync + 'static,
    {
        Self {
            arity: Arity::Exact(n),
            call: Arc::new(f),
        }
    }

    /// A function taking `min` or more arguments
    pub fn variadic<F>(min: usize, f: F) -> Self
    where
        F: Fn(&FuncContext<'_>, &[Value]) -> FuncResult + Send + Sync + 'static,
    {
        Self {
            arity: Arity::AtLeast(min),
            call: Arc::new(f),
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Invoke the function; the caller has already checked the arity
    pub fn call(&self, ctx: &FuncContext<'_>, args: &[Value]) -> FuncResult {
        (self.call)(ctx, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("arity", &self.arity).finish()
    }
}

/// Named template functions
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    funcs: HashMap<String, Function>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, function: Function) {
        self.funcs.insert(name.into(), function);
    }

    /// Register a function that needs no render context
    pub(crate) fn plain(&mut self, name: &str, arity: Arity, f: fn(&[Value]) -> FuncResult) {
        self.insert(
            name,
            Function {
                arity,
                call: Arc::new(move |_: &FuncContext<'_>, args: &[Value]| f(args)),
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<Function> {
        self.funcs.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Add every function of `other`, replacing same-named entries
    pub fn extend(&mut self, other: &FunctionTable) {
        for (name, function) in &other.funcs {
            self.funcs.insert(name.clone(), function.clone());
        }
    }
}

/// Flags that change which functions are registered
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionOptions {
    /// `required` and `fail` yield empty output instead of failing
    pub lint: bool,

    /// Register host name resolution helpers
    pub enable_dns: bool,
}

/// Assemble the function table for a render
pub fn build_functions(options: &FunctionOptions, custom: &FunctionTable) -> FunctionTable {
    let mut table = FunctionTable::new();

    builtins::register(&mut table);
    strings::register(&mut table);
    lists::register(&mut table);
    dicts::register(&mut table);
    math::register(&mut table);
    encoding::register(&mut table);
    versions::register(&mut table);
    serialization::register(&mut table);
    network::register(&mut table);
    chart::register(&mut table, options.lint);

    table.extend(custom);

    for name in FORBIDDEN_FUNCTIONS {
        table.remove(name);
    }
    if !options.enable_dns {
        for name in DNS_FUNCTIONS {
            table.remove(name);
        }
    }

    table
}

pub(crate) fn type_error(expected: &str, got: &Value) -> FuncError {
    FuncError::msg(format!(
        "wrong type for value; expected {}; got {}",
        expected,
        got.go_type_name()
    ))
}

/// A string parameter; nil reads as the empty string
pub(crate) fn str_arg(value: &Value) -> Result<&str, FuncError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Ok(""),
        other => Err(type_error("string", other)),
    }
}

/// An integer parameter; floats are truncated and nil reads as zero
pub(crate) fn int_arg(value: &Value) -> Result<i64, FuncError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(f) => Ok(*f as i64),
        Value::Null => Ok(0),
        other => Err(type_error("int", other)),
    }
}

pub(crate) fn bool_arg(value: &Value) -> Result<bool, FuncError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(type_error("bool", other)),
    }
}

/// String form of any value, `%v` style
pub(crate) fn strval(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strings of a list, skipping nil elements; a scalar becomes a one-element list
pub(crate) fn strslice(value: &Value) -> Vec<String> {
    match value {
        Value::List(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(strval)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![strval(other)],
    }
}

/// Lenient integer conversion: unparsable input reads as zero
pub(crate) fn to_int64(value: &Value) -> i64 {
    match value {
        Value::Int(i) => *i,
        Value::Float(f) => *f as i64,
        Value::Bool(b) => i64::from(*b),
        Value::String(s) => parse_int_literal(s.trim())
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Lenient float conversion: unparsable input reads as zero
pub(crate) fn to_float64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Integer literal with an optional base prefix (`0x`, `0o`, `0b`, leading `0`)
fn parse_int_literal(s: &str) -> Option<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let lower = digits.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        i64::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse::<i64>().ok()
    }?;
    Some(if negative { -parsed } else { parsed })
}
