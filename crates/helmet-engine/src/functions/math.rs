//! Integer and float arithmetic
//!
//! Integer helpers convert every operand leniently (`"3"` counts as 3, junk
//! as 0). The `f` variants work on floats and always return a float.

use super::{Arity, FuncResult, FunctionTable, int_arg, to_float64, to_int64};
use crate::template::{FuncError, Value};

pub(super) fn register(table: &mut FunctionTable) {
    use Arity::*;

    table.plain("add", AtLeast(0), |a| Ok(Value::Int(a.iter().map(to_int64).fold(0, i64::wrapping_add))));
    table.plain("add1", Exact(1), |a| Ok(Value::Int(to_int64(&a[0]).wrapping_add(1))));
    table.plain("sub", Exact(2), |a| Ok(Value::Int(to_int64(&a[0]).wrapping_sub(to_int64(&a[1])))));
    table.plain("mul", AtLeast(1), |a| Ok(Value::Int(a.iter().map(to_int64).fold(1, i64::wrapping_mul))));
    table.plain("div", Exact(2), |a| {
        checked(to_int64(&a[0]), to_int64(&a[1]), i64::checked_div)
    });
    table.plain("mod", Exact(2), |a| {
        checked(to_int64(&a[0]), to_int64(&a[1]), i64::checked_rem)
    });
    table.plain("max", AtLeast(1), |a| Ok(Value::Int(a.iter().map(to_int64).max().unwrap_or_default())));
    table.plain("min", AtLeast(1), |a| Ok(Value::Int(a.iter().map(to_int64).min().unwrap_or_default())));
    table.plain("floor", Exact(1), |a| Ok(Value::Float(to_float64(&a[0]).floor())));
    table.plain("ceil", Exact(1), |a| Ok(Value::Float(to_float64(&a[0]).ceil())));
    table.plain("round", AtLeast(2), round);
    table.plain("addf", AtLeast(0), |a| Ok(Value::Float(a.iter().map(to_float64).sum())));
    table.plain("subf", AtLeast(1), |a| fold_floats(a, |x, y| x - y));
    table.plain("mulf", AtLeast(1), |a| fold_floats(a, |x, y| x * y));
    table.plain("divf", AtLeast(1), |a| fold_floats(a, |x, y| x / y));
}

fn checked(a: i64, b: i64, op: fn(i64, i64) -> Option<i64>) -> FuncResult {
    if b == 0 {
        return Err(FuncError::msg("runtime error: integer divide by zero"));
    }
    Ok(Value::Int(op(a, b).unwrap_or(i64::MIN)))
}

fn fold_floats(args: &[Value], op: fn(f64, f64) -> f64) -> FuncResult {
    let first = to_float64(&args[0]);
    Ok(Value::Float(args[1..].iter().map(to_float64).fold(first, op)))
}

/// Round half away from zero at `places` decimals; the optional third
/// argument moves the rounding threshold
///
/// Usage: {{ round 123.555555 3 }} renders `123.556`
fn round(args: &[Value]) -> FuncResult {
    let value = to_float64(&args[0]);
    let places = int_arg(&args[1])?;
    let threshold = args.get(2).map(to_float64).unwrap_or(0.5);

    let pow = 10f64.powi(places.clamp(-308, 308) as i32);
    let digits = value * pow;
    let int_part = digits.trunc();
    let frac = (digits - int_part).abs();
    let rounded = if frac >= threshold {
        int_part + digits.signum()
    } else {
        int_part
    };
    Ok(Value::Float(rounded / pow))
}
