//! Go `fmt` compatible printing of template values

use std::fmt::Write;

use super::value::Value;

/// Format a float the way Go's `%v` does: shortest digits, exponent form below 1e-4 and from 1e6
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:e}", v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };

    if !(-4..6).contains(&exp) {
        exponent_form(mantissa, exp)
    } else {
        format!("{}", v)
    }
}

fn exponent_form(mantissa: &str, exp: i32) -> String {
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exp.abs())
}

/// Go `%e` with an explicit precision
fn format_exp(v: f64, prec: usize, upper: bool) -> String {
    let sci = format!("{:.*e}", prec, v);
    let out = match sci.split_once('e') {
        Some((m, e)) => exponent_form(m, e.parse::<i32>().unwrap_or(0)),
        None => sci,
    };
    if upper { out.to_uppercase() } else { out }
}

/// Go `%g` with an explicit precision
fn format_general(v: f64, prec: Option<usize>) -> String {
    let Some(prec) = prec else {
        return format_float(v);
    };
    let prec = prec.max(1);
    let sci = format!("{:.*e}", prec - 1, v);
    let exp = sci
        .split_once('e')
        .and_then(|(_, e)| e.parse::<i32>().ok())
        .unwrap_or(0);
    if exp < -4 || exp >= prec as i32 {
        let (m, _) = sci.split_once('e').unwrap_or((sci.as_str(), ""));
        exponent_form(trim_fraction(m), exp)
    } else {
        let decimals = (prec as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, v)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Go `strconv.Quote`
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{0b}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Go `fmt.Sprint`: operands are separated by a space when neither is a string
pub fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !matches!(arg, Value::String(_)) && !matches!(args[i - 1], Value::String(_)) {
            out.push(' ');
        }
        let _ = write!(out, "{}", arg);
    }
    out
}

/// Go `fmt.Sprintln`: operands always separated by a space, newline appended
pub fn sprintln(args: &[Value]) -> String {
    let mut out = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    out.push('\n');
    out
}

#[derive(Default)]
struct Spec {
    minus: bool,
    plus: bool,
    sharp: bool,
    space: bool,
    zero: bool,
    width: Option<usize>,
    prec: Option<usize>,
}

/// Go `fmt.Sprintf`
pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                '#' => spec.sharp = true,
                ' ' => spec.space = true,
                '0' => spec.zero = true,
                _ => break,
            }
            chars.next();
        }

        spec.width = read_number(&mut chars, args, &mut next_arg);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.prec = Some(read_number(&mut chars, args, &mut next_arg).unwrap_or(0));
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }

        let Some(arg) = args.get(next_arg) else {
            let _ = write!(out, "%!{}(MISSING)", verb);
            continue;
        };
        next_arg += 1;

        let formatted = format_arg(verb, arg, &spec);
        out.push_str(&pad(formatted, &spec, arg.is_number()));
    }

    if next_arg < args.len() {
        out.push_str("%!(EXTRA ");
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|arg| format!("{}={}", arg.go_type_name(), arg))
            .collect();
        out.push_str(&extra.join(", "));
        out.push(')');
    }
    out
}

fn read_number(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    args: &[Value],
    next_arg: &mut usize,
) -> Option<usize> {
    if chars.peek() == Some(&'*') {
        chars.next();
        let n = args.get(*next_arg).and_then(Value::as_i64);
        *next_arg += 1;
        return n.map(|n| n.max(0) as usize);
    }
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = Some(n.unwrap_or(0) * 10 + d as usize);
        chars.next();
    }
    n
}

fn bad_verb(verb: char, arg: &Value) -> String {
    match arg {
        Value::Null => format!("%!{}(<nil>)", verb),
        other => format!("%!{}({}={})", verb, other.go_type_name(), other),
    }
}

fn signed(s: String, negative: bool, spec: &Spec) -> String {
    if negative {
        s
    } else if spec.plus {
        format!("+{}", s)
    } else if spec.space {
        format!(" {}", s)
    } else {
        s
    }
}

fn format_arg(verb: char, arg: &Value, spec: &Spec) -> String {
    match verb {
        'v' => match arg {
            Value::String(s) if spec.sharp => go_quote(s),
            Value::Int(i) => signed(i.to_string(), *i < 0, spec),
            Value::Float(f) => signed(format_float(*f), *f < 0.0, spec),
            other => other.to_string(),
        },
        's' => match arg {
            Value::String(s) => truncate(s, spec.prec),
            Value::List(_) | Value::Map(_) | Value::Object(_) => arg.to_string(),
            other => bad_verb(verb, other),
        },
        'q' => match arg {
            Value::String(s) => go_quote(s),
            Value::Int(i) => match u32::try_from(*i).ok().and_then(char::from_u32) {
                Some(c) => format!("'{}'", c),
                None => bad_verb(verb, arg),
            },
            other => bad_verb(verb, other),
        },
        'd' => match arg {
            Value::Int(i) => signed(i.to_string(), *i < 0, spec),
            other => bad_verb(verb, other),
        },
        't' => match arg {
            Value::Bool(b) => b.to_string(),
            other => bad_verb(verb, other),
        },
        'f' | 'F' => match arg {
            Value::Float(f) => signed(format!("{:.*}", spec.prec.unwrap_or(6), f), *f < 0.0, spec),
            other => bad_verb(verb, other),
        },
        'e' | 'E' => match arg {
            Value::Float(f) => signed(
                format_exp(*f, spec.prec.unwrap_or(6), verb == 'E'),
                *f < 0.0,
                spec,
            ),
            other => bad_verb(verb, other),
        },
        'g' | 'G' => match arg {
            Value::Float(f) => {
                let s = format_general(*f, spec.prec);
                signed(
                    if verb == 'G' { s.to_uppercase() } else { s },
                    *f < 0.0,
                    spec,
                )
            }
            other => bad_verb(verb, other),
        },
        'x' | 'X' => {
            let s = match arg {
                Value::Int(i) if *i < 0 => format!("-{:x}", i.unsigned_abs()),
                Value::Int(i) => format!("{:x}", i),
                Value::String(s) => hex::encode(s.as_bytes()),
                other => return bad_verb(verb, other),
            };
            let s = if spec.sharp { format!("0x{}", s) } else { s };
            if verb == 'X' { s.to_uppercase() } else { s }
        }
        'o' => match arg {
            Value::Int(i) if *i < 0 => format!("-{:o}", i.unsigned_abs()),
            Value::Int(i) => format!("{:o}", i),
            other => bad_verb(verb, other),
        },
        'b' => match arg {
            Value::Int(i) if *i < 0 => format!("-{:b}", i.unsigned_abs()),
            Value::Int(i) => format!("{:b}", i),
            other => bad_verb(verb, other),
        },
        'c' => match arg {
            Value::Int(i) => u32::try_from(*i)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| "\u{fffd}".to_string()),
            other => bad_verb(verb, other),
        },
        'T' => arg.go_type_name().to_string(),
        other => bad_verb(other, arg),
    }
}

fn truncate(s: &str, prec: Option<usize>) -> String {
    match prec {
        Some(n) => s.chars().take(n).collect(),
        None => s.to_string(),
    }
}

fn pad(s: String, spec: &Spec, numeric: bool) -> String {
    let Some(width) = spec.width else {
        return s;
    };
    let len = s.chars().count();
    if len >= width {
        return s;
    }
    let fill = width - len;
    if spec.minus {
        format!("{}{}", s, " ".repeat(fill))
    } else if spec.zero && numeric {
        match s.strip_prefix(['-', '+']) {
            Some(rest) => format!("{}{}{}", &s[..1], "0".repeat(fill), rest),
            None => format!("{}{}", "0".repeat(fill), s),
        }
    } else {
        format!("{}{}", " ".repeat(fill), s)
    }
}
