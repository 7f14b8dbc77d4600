//! Chart-bound functions: `include`, `tpl`, `required`, `fail` and `lookup`
//!
//! These reach back into the render through the [`FuncContext`]: `include`
//! and `tpl` execute templates of the current render, `lookup` queries the
//! cluster collaborator handed to the engine.

use super::{FuncContext, FuncResult, Function, FunctionTable, str_arg};
use crate::template::{FuncError, Value};

pub(super) fn register(table: &mut FunctionTable, lint: bool) {
    table.insert("include", Function::exact(2, include));
    table.insert("tpl", Function::exact(2, tpl));
    table.insert("required", Function::exact(2, move |_: &FuncContext<'_>, args: &[Value]| required(args, lint)));
    table.insert("fail", Function::exact(1, move |_: &FuncContext<'_>, args: &[Value]| fail(args, lint)));
    table.insert("lookup", Function::exact(4, lookup));
}

/// Usage: {{ include "mychart.labels" . | nindent 4 }}
fn include(ctx: &FuncContext<'_>, args: &[Value]) -> FuncResult {
    let name = str_arg(&args[0])?;
    ctx.include(name, args[1].clone()).map(Value::from)
}

/// Render a string as a template against the given data
///
/// Usage: {{ tpl .Values.annotationTemplate . }}
fn tpl(ctx: &FuncContext<'_>, args: &[Value]) -> FuncResult {
    let text = str_arg(&args[0])?;
    ctx.tpl(text, args[1].clone()).map(Value::from)
}

/// Usage: {{ required "image.tag is required" .Values.image.tag }}
fn required(args: &[Value], lint: bool) -> FuncResult {
    let missing = match &args[1] {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if !missing {
        return Ok(args[1].clone());
    }

    let message = str_arg(&args[0])?;
    if lint {
        tracing::info!(reason = message, "missing required value");
        return Ok(Value::from(""));
    }
    Err(FuncError::msg(message))
}

/// Usage: {{ fail "unsupported storage class" }}
fn fail(args: &[Value], lint: bool) -> FuncResult {
    if lint {
        return Ok(Value::from(""));
    }
    Err(FuncError::msg(str_arg(&args[0])?))
}

/// Usage: {{ (lookup "v1" "Secret" .Release.Namespace "db").data }}
///
/// Yields an empty map when linting or when no cluster collaborator is set.
fn lookup(ctx: &FuncContext<'_>, args: &[Value]) -> FuncResult {
    let api_version = str_arg(&args[0])?;
    let kind = str_arg(&args[1])?;
    let namespace = str_arg(&args[2])?;
    let name = str_arg(&args[3])?;

    let provider = match ctx.client_provider() {
        Some(provider) if !ctx.is_lint() => provider,
        _ => return Ok(Value::empty_map()),
    };

    let object = crate::lookup::lookup(provider, api_version, kind, namespace, name)?;
    Ok(Value::from_json(&object))
}
