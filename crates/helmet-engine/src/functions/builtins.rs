//! Functions predefined by Go's text/template

use std::cmp::Ordering;
use std::fmt::Write as _;

use super::{Arity, FuncResult, FunctionTable, str_arg};
use crate::template::format::{sprint, sprintf, sprintln};
use crate::template::{FuncError, Value};

pub(super) fn register(table: &mut FunctionTable) {
    use Arity::*;

    table.plain("and", AtLeast(1), and);
    table.plain("or", AtLeast(1), or);
    table.plain("not", Exact(1), not);
    table.plain("len", Exact(1), len);
    table.plain("index", AtLeast(1), index);
    table.plain("slice", AtLeast(1), slice);
    table.plain("print", AtLeast(0), |args| Ok(Value::from(sprint(args))));
    table.plain("println", AtLeast(0), |args| Ok(Value::from(sprintln(args))));
    table.plain("printf", AtLeast(1), printf);
    table.plain("eq", AtLeast(1), eq);
    table.plain("ne", Exact(2), ne);
    table.plain("lt", Exact(2), |args| compare(&args[0], &args[1]).map(|o| Value::Bool(o == Ordering::Less)));
    table.plain("le", Exact(2), |args| compare(&args[0], &args[1]).map(|o| Value::Bool(o != Ordering::Greater)));
    table.plain("gt", Exact(2), |args| compare(&args[0], &args[1]).map(|o| Value::Bool(o == Ordering::Greater)));
    table.plain("ge", Exact(2), |args| compare(&args[0], &args[1]).map(|o| Value::Bool(o != Ordering::Less)));
    table.plain("html", AtLeast(0), |args| Ok(Value::from(html_escape(&sprint(args)))));
    table.plain("js", AtLeast(0), |args| Ok(Value::from(js_escape(&sprint(args)))));
    table.plain("urlquery", AtLeast(0), |args| Ok(Value::from(query_escape(&sprint(args)))));
}

// The executor short-circuits `and`/`or`; these run only for already
// evaluated arguments.
fn and(args: &[Value]) -> FuncResult {
    Ok(args
        .iter()
        .find(|arg| !arg.is_truthy())
        .or(args.last())
        .cloned()
        .unwrap_or_default())
}

fn or(args: &[Value]) -> FuncResult {
    Ok(args
        .iter()
        .find(|arg| arg.is_truthy())
        .or(args.last())
        .cloned()
        .unwrap_or_default())
}

fn not(args: &[Value]) -> FuncResult {
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn len(args: &[Value]) -> FuncResult {
    match &args[0] {
        Value::Null => Err(FuncError::msg("len of nil pointer")),
        Value::Object(object) => object
            .to_value()
            .len()
            .map(|n| Value::Int(n as i64))
            .ok_or_else(|| FuncError::msg(format!("len of type {}", object.type_name()))),
        other => other
            .len()
            .map(|n| Value::Int(n as i64))
            .ok_or_else(|| FuncError::msg(format!("len of type {}", other.go_type_name()))),
    }
}

/// Position argument of `index` and `slice`, checked against `cap`
fn index_arg(index: &Value, cap: usize) -> Result<usize, FuncError> {
    let i = match index {
        Value::Int(i) => *i,
        other => {
            return Err(FuncError::msg(format!(
                "cannot index slice/array with type {}",
                other.go_type_name()
            )));
        }
    };
    if i < 0 || i as usize > cap {
        return Err(FuncError::msg(format!("index out of range: {}", i)));
    }
    Ok(i as usize)
}

/// Usage: {{ index .Values.list 0 }}, {{ index .Values.map "key" }}
fn index(args: &[Value]) -> FuncResult {
    let mut item = args[0].clone();
    for idx in &args[1..] {
        item = match &item {
            Value::List(items) => {
                let i = index_arg(idx, items.len())?;
                items
                    .get(i)
                    .cloned()
                    .ok_or_else(|| FuncError::msg(format!("index out of range: {}", i)))?
            }
            Value::String(s) => {
                let i = index_arg(idx, s.len())?;
                s.as_bytes()
                    .get(i)
                    .map(|b| Value::Int(i64::from(*b)))
                    .ok_or_else(|| FuncError::msg(format!("index out of range: {}", i)))?
            }
            Value::Map(map) => match idx {
                Value::String(key) => map.borrow().get(key).cloned().unwrap_or_default(),
                Value::Null => Value::Null,
                other => {
                    return Err(FuncError::msg(format!(
                        "value has type {}; should be string",
                        other.go_type_name()
                    )));
                }
            },
            Value::Null => return Err(FuncError::msg("index of untyped nil")),
            other => {
                return Err(FuncError::msg(format!(
                    "can't index item of type {}",
                    other.go_type_name()
                )));
            }
        };
    }
    Ok(item)
}

/// Usage: {{ slice .Values.list 1 3 }}, {{ slice "abcdef" 2 }}
fn slice(args: &[Value]) -> FuncResult {
    let item = &args[0];
    let indexes = &args[1..];

    let (len, max_indexes) = match item {
        Value::List(items) => (items.len(), 3),
        Value::String(s) => (s.len(), 2),
        Value::Null => return Err(FuncError::msg("slice of untyped nil")),
        other => {
            return Err(FuncError::msg(format!(
                "can't slice item of type {}",
                other.go_type_name()
            )));
        }
    };
    if indexes.len() > max_indexes {
        return Err(FuncError::msg(format!("too many slice indexes: {}", indexes.len())));
    }

    let mut bounds = [0, len];
    for (slot, idx) in bounds.iter_mut().zip(indexes.iter()) {
        *slot = index_arg(idx, len)?;
    }
    let [start, end] = bounds;
    if start > end {
        return Err(FuncError::msg(format!("invalid slice index: {} > {}", start, end)));
    }

    match item {
        Value::List(items) => Ok(Value::from_list(items[start..end].to_vec())),
        Value::String(s) => s
            .get(start..end)
            .map(Value::from)
            .ok_or_else(|| FuncError::msg(format!("invalid slice index: {} > {}", start, end))),
        _ => Ok(Value::Null),
    }
}

fn printf(args: &[Value]) -> FuncResult {
    let format = str_arg(&args[0])?;
    Ok(Value::from(sprintf(format, &args[1..])))
}

/// Equality with numeric values compared by value across int and float
fn equal(a: &Value, b: &Value) -> Result<bool, FuncError> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => Ok(a.is_null() && b.is_null()),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (x, y) if x.is_number() && y.is_number() => Ok(x.as_f64() == y.as_f64()),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::List(_) | Value::Map(_) | Value::Object(_), _)
        | (_, Value::List(_) | Value::Map(_) | Value::Object(_)) => Ok(a == b),
        _ => Err(FuncError::msg("incompatible types for comparison")),
    }
}

/// Usage: {{ eq .Values.kind "a" "b" }} is true when the first argument equals any other
fn eq(args: &[Value]) -> FuncResult {
    if args.len() < 2 {
        return Err(FuncError::msg("missing argument for comparison"));
    }
    for other in &args[1..] {
        if equal(&args[0], other)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn ne(args: &[Value]) -> FuncResult {
    equal(&args[0], &args[1]).map(|eq| Value::Bool(!eq))
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, FuncError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (x, y) if x.is_number() && y.is_number() => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or_else(|| FuncError::msg("invalid type for comparison")),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (x, y) if is_ordered(x) && is_ordered(y) => {
            Err(FuncError::msg("incompatible types for comparison"))
        }
        _ => Err(FuncError::msg("invalid type for comparison")),
    }
}

fn is_ordered(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::String(_))
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}

fn js_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '=' => out.push_str("\\u003D"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

fn query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push('+'),
            b => {
                let _ = write!(out, "%{:02X}", b);
            }
        }
    }
    out
}
