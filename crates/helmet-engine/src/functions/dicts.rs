//! Dictionary helpers
//!
//! `set`, `unset`, `merge` and `mergeOverwrite` modify their first argument
//! in place and return it, so `{{ $_ := set $d "k" "v" }}` is visible through
//! every reference to `$d`.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Arity, FuncResult, FunctionTable, str_arg, strval};
use crate::template::{FuncError, Map, Value};

pub(super) fn register(table: &mut FunctionTable) {
    use Arity::*;

    table.plain("dict", AtLeast(0), dict);
    table.plain("get", Exact(2), |a| {
        let key = str_arg(&a[1])?;
        Ok(table_arg("get", &a[0])?.borrow().get(key).cloned().unwrap_or_else(|| Value::from("")))
    });
    table.plain("set", Exact(3), |a| {
        table_arg("set", &a[0])?.borrow_mut().insert(str_arg(&a[1])?.to_string(), a[2].clone());
        Ok(a[0].clone())
    });
    table.plain("unset", Exact(2), |a| {
        table_arg("unset", &a[0])?.borrow_mut().remove(str_arg(&a[1])?);
        Ok(a[0].clone())
    });
    table.plain("hasKey", Exact(2), |a| {
        Ok(table_arg("hasKey", &a[0])?.borrow().contains_key(str_arg(&a[1])?).into())
    });
    table.plain("keys", AtLeast(0), keys);
    table.plain("values", Exact(1), |a| {
        Ok(table_arg("values", &a[0])?.borrow().values().cloned().collect::<Vec<_>>().into())
    });
    table.plain("pick", AtLeast(1), |a| select("pick", a, true));
    table.plain("omit", AtLeast(1), |a| select("omit", a, false));
    table.plain("merge", AtLeast(1), |a| merge_all("merge", a, false));
    table.plain("mergeOverwrite", AtLeast(1), |a| merge_all("mergeOverwrite", a, true));
    table.plain("deepCopy", Exact(1), |a| Ok(a[0].deep_copy()));
    table.plain("dig", AtLeast(3), dig);
}

fn table_arg<'v>(function: &str, value: &'v Value) -> Result<&'v Rc<RefCell<Map>>, FuncError> {
    match value {
        Value::Map(map) => Ok(map),
        other => Err(FuncError::msg(format!(
            "{}: expected map[string]interface {{}}; got {}",
            function,
            other.go_type_name()
        ))),
    }
}

/// Usage: {{ dict "name" .Values.name "port" 80 }}
///
/// A trailing key without value maps to the empty string.
fn dict(args: &[Value]) -> FuncResult {
    let mut map = Map::new();
    for pair in args.chunks(2) {
        let value = pair.get(1).cloned().unwrap_or_else(|| Value::from(""));
        map.insert(strval(&pair[0]), value);
    }
    Ok(Value::from_map(map))
}

fn keys(args: &[Value]) -> FuncResult {
    let mut out = Vec::new();
    for arg in args {
        out.extend(table_arg("keys", arg)?.borrow().keys().cloned().map(Value::from));
    }
    Ok(out.into())
}

fn select(function: &str, args: &[Value], keep: bool) -> FuncResult {
    let source = table_arg(function, &args[0])?.borrow();
    let names: Vec<String> = args[1..].iter().map(strval).collect();
    let map: Map = source
        .iter()
        .filter(|(key, _)| names.contains(key) == keep)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok(Value::from_map(map))
}

/// Merge every source into the first dict
///
/// Without `overwrite` a key is only filled when the destination lacks it or
/// holds an empty value; nested dicts are merged recursively either way.
fn merge_all(function: &str, args: &[Value], overwrite: bool) -> FuncResult {
    let dst = table_arg(function, &args[0])?;
    for src in &args[1..] {
        let src = table_arg(function, src)?;
        if Rc::ptr_eq(dst, src) {
            continue;
        }
        let src = src.borrow().clone();
        merge_into(&mut dst.borrow_mut(), &src, overwrite);
    }
    Ok(args[0].clone())
}

fn merge_into(dst: &mut Map, src: &Map, overwrite: bool) {
    for (key, src_value) in src {
        match (dst.get(key), src_value) {
            (Some(Value::Map(dst_map)), Value::Map(src_map)) if !Rc::ptr_eq(dst_map, src_map) => {
                let src_map = src_map.borrow().clone();
                merge_into(&mut dst_map.borrow_mut(), &src_map, overwrite);
            }
            (Some(existing), _) if !overwrite && existing.is_truthy() => {}
            _ => {
                dst.insert(key.clone(), src_value.clone());
            }
        }
    }
}

/// Walk nested dicts, falling back to a default
///
/// Usage: {{ dig "a" "b" "default" .Values }}
fn dig(args: &[Value]) -> FuncResult {
    let (dict, rest) = args.split_last().ok_or_else(|| FuncError::msg("dig: missing arguments"))?;
    let (default, path) = rest.split_last().ok_or_else(|| FuncError::msg("dig: missing default"))?;

    let mut current = table_arg("dig", dict)?.clone();
    for (i, key) in path.iter().enumerate() {
        let key = str_arg(key)?;
        let next = current.borrow().get(key).cloned();
        match next {
            None => return Ok(default.clone()),
            Some(value) if i + 1 == path.len() => return Ok(value),
            Some(Value::Map(map)) => current = map,
            Some(other) => {
                return Err(FuncError::msg(format!(
                    "dig: expected map[string]interface {{}} at {}; got {}",
                    key,
                    other.go_type_name()
                )));
            }
        }
    }
    Ok(default.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from_json(&json)
    }

    #[test]
    fn test_dict_odd_arguments() {
        let d = dict(&[Value::from("a"), Value::Int(1), Value::from("b")]).unwrap();
        assert_eq!(d.to_json(), json!({"a": 1, "b": ""}));
    }

    #[test]
    fn test_merge_keeps_destination() {
        let dst = v(json!({"a": 1, "nested": {"x": "keep"}, "empty": ""}));
        let src = v(json!({"a": 2, "b": 3, "nested": {"x": "lose", "y": "add"}, "empty": "filled"}));
        let merged = merge_all("merge", &[dst.clone(), src], false).unwrap();
        assert_eq!(
            merged.to_json(),
            json!({"a": 1, "b": 3, "nested": {"x": "keep", "y": "add"}, "empty": "filled"})
        );
        assert_eq!(dst, merged);
    }

    #[test]
    fn test_merge_overwrite() {
        let dst = v(json!({"a": 1, "nested": {"x": "old"}}));
        let src = v(json!({"a": 2, "nested": {"x": "new"}}));
        let merged = merge_all("mergeOverwrite", &[dst, src], true).unwrap();
        assert_eq!(merged.to_json(), json!({"a": 2, "nested": {"x": "new"}}));
    }

    #[test]
    fn test_dig_paths() {
        let data = v(json!({"a": {"b": {"c": 1}}}));
        let found = dig(&[Value::from("a"), Value::from("b"), Value::from("c"), Value::from("d"), data.clone()]).unwrap();
        assert_eq!(found, Value::Int(1));
        let missing = dig(&[Value::from("a"), Value::from("z"), Value::from("d"), data]).unwrap();
        assert_eq!(missing, Value::from("d"));
    }

    #[test]
    fn test_pick_and_omit() {
        let data = v(json!({"a": 1, "b": 2, "c": 3}));
        assert_eq!(select("pick", &[data.clone(), Value::from("a")], true).unwrap().to_json(), json!({"a": 1}));
        assert_eq!(
            select("omit", &[data, Value::from("a")], false).unwrap().to_json(),
            json!({"b": 2, "c": 3})
        );
    }
}
