//! List helpers

use super::{Arity, FuncResult, FunctionTable, int_arg, to_int64};
use crate::template::{FuncError, Value};

pub(super) fn register(table: &mut FunctionTable) {
    use Arity::*;

    table.plain("list", AtLeast(0), |a| Ok(a.to_vec().into()));
    table.plain("first", Exact(1), |a| Ok(items("first", &a[0])?.first().cloned().unwrap_or_default()));
    table.plain("last", Exact(1), |a| Ok(items("last", &a[0])?.last().cloned().unwrap_or_default()));
    table.plain("rest", Exact(1), |a| {
        let list = items("rest", &a[0])?;
        Ok(list.get(1..).unwrap_or_default().to_vec().into())
    });
    table.plain("initial", Exact(1), |a| {
        let list = items("initial", &a[0])?;
        Ok(list[..list.len().saturating_sub(1)].to_vec().into())
    });
    table.plain("append", Exact(2), append);
    table.plain("push", Exact(2), append);
    table.plain("prepend", Exact(2), prepend);
    table.plain("concat", AtLeast(0), concat);
    table.plain("reverse", Exact(1), |a| {
        Ok(items("reverse", &a[0])?.iter().rev().cloned().collect::<Vec<_>>().into())
    });
    table.plain("uniq", Exact(1), uniq);
    table.plain("without", AtLeast(1), without);
    table.plain("has", Exact(2), has);
    table.plain("compact", Exact(1), |a| {
        Ok(items("compact", &a[0])?.iter().filter(|v| v.is_truthy()).cloned().collect::<Vec<_>>().into())
    });
    table.plain("until", Exact(1), |a| {
        let count = int_arg(&a[0])?;
        let step = if count < 0 { -1 } else { 1 };
        Ok(ints(until_step(0, count, step)?))
    });
    table.plain("untilStep", Exact(3), |a| {
        Ok(ints(until_step(int_arg(&a[0])?, int_arg(&a[1])?, int_arg(&a[2])?)?))
    });
    table.plain("seq", AtLeast(0), seq);
}

/// Elements of a list argument; nil reads as an empty list
fn items<'v>(function: &str, value: &'v Value) -> Result<&'v [Value], FuncError> {
    match value {
        Value::List(list) => Ok(list),
        Value::Null => Ok(&[]),
        other => Err(FuncError::msg(format!(
            "Cannot find {} on type {}",
            function,
            other.go_type_name()
        ))),
    }
}

fn ints(values: Vec<i64>) -> Value {
    values.into_iter().map(Value::Int).collect::<Vec<_>>().into()
}

/// Usage: {{ append .Values.list "x" }}
fn append(args: &[Value]) -> FuncResult {
    let mut list = items("append", &args[0])?.to_vec();
    list.push(args[1].clone());
    Ok(list.into())
}

fn prepend(args: &[Value]) -> FuncResult {
    let mut list = Vec::with_capacity(1);
    list.push(args[1].clone());
    list.extend_from_slice(items("prepend", &args[0])?);
    Ok(list.into())
}

fn concat(args: &[Value]) -> FuncResult {
    let mut out = Vec::new();
    for arg in args {
        out.extend_from_slice(items("concat", arg)?);
    }
    Ok(out.into())
}

fn uniq(args: &[Value]) -> FuncResult {
    let mut out: Vec<Value> = Vec::new();
    for item in items("uniq", &args[0])? {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    Ok(out.into())
}

/// Usage: {{ without .Values.list "a" "b" }}
fn without(args: &[Value]) -> FuncResult {
    let excluded = &args[1..];
    Ok(items("without", &args[0])?
        .iter()
        .filter(|item| !excluded.contains(item))
        .cloned()
        .collect::<Vec<_>>()
        .into())
}

/// Usage: {{ has "a" .Values.list }}
fn has(args: &[Value]) -> FuncResult {
    let found = match &args[1] {
        Value::Null => false,
        haystack => items("has", haystack)?.contains(&args[0]),
    };
    Ok(found.into())
}

/// Longest sequence `until`, `untilStep` and `seq` will build
const MAX_SEQUENCE_LEN: i128 = 1_000_000;

/// Integers from `start` towards `stop` (exclusive) in increments of `step`
pub(super) fn until_step(start: i64, stop: i64, step: i64) -> Result<Vec<i64>, FuncError> {
    let forward = step > 0 && start < stop;
    let backward = step < 0 && stop < start;
    if !forward && !backward {
        return Ok(Vec::new());
    }

    let span = i128::from(stop) - i128::from(start);
    let step_wide = i128::from(step);
    let len = (span + step_wide - step_wide.signum()) / step_wide;
    if len > MAX_SEQUENCE_LEN {
        return Err(FuncError::msg(format!(
            "sequence of {} elements exceeds the limit of {}",
            len, MAX_SEQUENCE_LEN
        )));
    }

    let mut out = Vec::with_capacity(len as usize);
    let mut next = Some(start);
    while let Some(i) = next {
        if (forward && i >= stop) || (backward && i <= stop) {
            break;
        }
        out.push(i);
        next = i.checked_add(step);
    }
    Ok(out)
}

/// Like [`until_step`] but including `end` when the steps land on it
fn through_step(start: i64, end: i64, step: i64) -> Result<Vec<i64>, FuncError> {
    let mut out = until_step(start, end, step)?;
    let reaches = (step > 0 && start <= end) || (step < 0 && end <= start);
    if reaches && (i128::from(end) - i128::from(start)) % i128::from(step) == 0 {
        out.push(end);
    }
    Ok(out)
}

/// Space-separated integer sequence
///
/// Usage: {{ seq 5 }}, {{ seq 2 5 }}, {{ seq 0 2 10 }}
fn seq(args: &[Value]) -> FuncResult {
    let params: Vec<i64> = args.iter().map(to_int64).collect();
    let values = match params.as_slice() {
        [end] => {
            let step = if *end < 1 { -1 } else { 1 };
            through_step(1, *end, step)?
        }
        [start, end] => {
            let step = if end < start { -1 } else { 1 };
            through_step(*start, *end, step)?
        }
        [start, step, end] => through_step(*start, *end, *step)?,
        _ => Vec::new(),
    };
    let text: Vec<String> = values.iter().map(i64::to_string).collect();
    Ok(text.join(" ").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from_json(&json)
    }

    #[test]
    fn test_until_step() {
        assert_eq!(until_step(0, 5, 2).unwrap(), vec![0, 2, 4]);
        assert_eq!(until_step(3, 0, -1).unwrap(), vec![3, 2, 1]);
        assert!(until_step(0, 5, 0).unwrap().is_empty());
        assert!(until_step(5, 0, 1).unwrap().is_empty());
    }

    #[test]
    fn test_sequences_near_integer_limits() {
        assert_eq!(
            until_step(i64::MAX - 2, i64::MAX, 1).unwrap(),
            vec![i64::MAX - 2, i64::MAX - 1]
        );
        assert_eq!(until_step(i64::MAX - 3, i64::MAX, 2).unwrap(), vec![i64::MAX - 3, i64::MAX - 1]);
        assert_eq!(until_step(i64::MIN + 1, i64::MIN, -5).unwrap(), vec![i64::MIN + 1]);
        assert_eq!(
            seq(&[Value::Int(i64::MAX - 1), Value::Int(i64::MAX)]).unwrap(),
            Value::from(format!("{} {}", i64::MAX - 1, i64::MAX))
        );
        assert_eq!(
            seq(&[Value::Int(i64::MIN + 1), Value::Int(i64::MIN)]).unwrap(),
            Value::from(format!("{} {}", i64::MIN + 1, i64::MIN))
        );
    }

    #[test]
    fn test_oversized_sequences_fail() {
        let err = seq(&[Value::Int(i64::MAX)]).unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"), "{}", err);
        assert!(until_step(i64::MIN, i64::MAX, 1).is_err());
        assert_eq!(until_step(0, 1_000_000, 1).unwrap().len(), 1_000_000);
    }

    #[test]
    fn test_seq_forms() {
        assert_eq!(seq(&[Value::Int(3)]).unwrap(), Value::from("1 2 3"));
        assert_eq!(seq(&[Value::Int(2), Value::Int(4)]).unwrap(), Value::from("2 3 4"));
        assert_eq!(seq(&[Value::Int(0), Value::Int(5), Value::Int(10)]).unwrap(), Value::from("0 5 10"));
        assert_eq!(seq(&[Value::Int(3), Value::Int(1)]).unwrap(), Value::from("3 2 1"));
    }

    #[test]
    fn test_list_editing() {
        let list = v(json!(["a", "b", "a", "c"]));
        assert_eq!(uniq(&[list.clone()]).unwrap().to_json(), json!(["a", "b", "c"]));
        assert_eq!(
            without(&[list.clone(), Value::from("a")]).unwrap().to_json(),
            json!(["b", "c"])
        );
        assert_eq!(append(&[list.clone(), Value::Int(1)]).unwrap().to_json(), json!(["a", "b", "a", "c", 1]));
        assert_eq!(prepend(&[list.clone(), Value::Int(1)]).unwrap().to_json(), json!([1, "a", "b", "a", "c"]));
        assert_eq!(has(&[Value::from("c"), list]).unwrap(), Value::Bool(true));
        assert_eq!(has(&[Value::from("c"), Value::Null]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_items_type_error() {
        let err = append(&[Value::from("x"), Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "Cannot find append on type string");
    }
}
