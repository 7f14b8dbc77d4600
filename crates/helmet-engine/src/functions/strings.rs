//! String helpers, conversions and defaults

use regex::Regex;

use super::{
    Arity, FuncResult, FunctionTable, bool_arg, int_arg, str_arg, strslice, strval, to_float64,
    to_int64,
};
use crate::template::format::go_quote;
use crate::template::{FuncError, Map, Value};

pub(super) fn register(table: &mut FunctionTable) {
    use Arity::*;

    table.plain("upper", Exact(1), |a| Ok(str_arg(&a[0])?.to_uppercase().into()));
    table.plain("lower", Exact(1), |a| Ok(str_arg(&a[0])?.to_lowercase().into()));
    table.plain("title", Exact(1), |a| Ok(title(str_arg(&a[0])?).into()));
    table.plain("untitle", Exact(1), |a| Ok(untitle(str_arg(&a[0])?).into()));
    table.plain("trim", Exact(1), |a| Ok(str_arg(&a[0])?.trim().into()));
    table.plain("trimAll", Exact(2), trim_all);
    table.plain("trimPrefix", Exact(2), trim_prefix);
    table.plain("trimSuffix", Exact(2), trim_suffix);
    table.plain("trunc", Exact(2), trunc);
    table.plain("abbrev", Exact(2), abbrev);
    table.plain("repeat", Exact(2), repeat);
    table.plain("substr", Exact(3), substr);
    table.plain("nospace", Exact(1), |a| {
        Ok(str_arg(&a[0])?.chars().filter(|c| !c.is_whitespace()).collect::<String>().into())
    });
    table.plain("contains", Exact(2), |a| Ok(str_arg(&a[1])?.contains(str_arg(&a[0])?).into()));
    table.plain("hasPrefix", Exact(2), |a| Ok(str_arg(&a[1])?.starts_with(str_arg(&a[0])?).into()));
    table.plain("hasSuffix", Exact(2), |a| Ok(str_arg(&a[1])?.ends_with(str_arg(&a[0])?).into()));
    table.plain("quote", AtLeast(0), quote);
    table.plain("squote", AtLeast(0), squote);
    table.plain("cat", AtLeast(0), cat);
    table.plain("indent", Exact(2), |a| Ok(indent(int_arg(&a[0])?, str_arg(&a[1])?).into()));
    table.plain("nindent", Exact(2), |a| {
        Ok(format!("\n{}", indent(int_arg(&a[0])?, str_arg(&a[1])?)).into())
    });
    table.plain("replace", Exact(3), |a| {
        Ok(str_arg(&a[2])?.replace(str_arg(&a[0])?, str_arg(&a[1])?).into())
    });
    table.plain("plural", Exact(3), |a| {
        let chosen = if int_arg(&a[2])? == 1 { &a[0] } else { &a[1] };
        Ok(str_arg(chosen)?.into())
    });
    table.plain("snakecase", Exact(1), |a| Ok(snakecase(str_arg(&a[0])?).into()));
    table.plain("kebabcase", Exact(1), |a| Ok(snakecase(str_arg(&a[0])?).replace('_', "-").into()));
    table.plain("camelcase", Exact(1), |a| Ok(camelcase(str_arg(&a[0])?).into()));
    table.plain("swapcase", Exact(1), |a| Ok(swapcase(str_arg(&a[0])?).into()));
    table.plain("split", Exact(2), split);
    table.plain("splitList", Exact(2), |a| {
        let parts = str_arg(&a[1])?.split(str_arg(&a[0])?).map(Value::from).collect::<Vec<_>>();
        Ok(parts.into())
    });
    table.plain("join", Exact(2), |a| Ok(strslice(&a[1]).join(str_arg(&a[0])?).into()));
    table.plain("sortAlpha", Exact(1), |a| {
        let mut items = strslice(&a[0]);
        items.sort();
        Ok(items.into_iter().map(Value::from).collect::<Vec<_>>().into())
    });
    table.plain("regexMatch", Exact(2), |a| Ok(compile(&a[0])?.is_match(str_arg(&a[1])?).into()));
    table.plain("regexFind", Exact(2), |a| {
        let found = compile(&a[0])?.find(str_arg(&a[1])?).map(|m| m.as_str().to_string());
        Ok(found.unwrap_or_default().into())
    });
    table.plain("regexFindAll", Exact(3), regex_find_all);
    table.plain("regexReplaceAll", Exact(3), |a| {
        Ok(compile(&a[0])?.replace_all(str_arg(&a[1])?, str_arg(&a[2])?).into_owned().into())
    });
    table.plain("regexReplaceAllLiteral", Exact(3), |a| {
        let replacement = regex::NoExpand(str_arg(&a[2])?);
        Ok(compile(&a[0])?.replace_all(str_arg(&a[1])?, replacement).into_owned().into())
    });
    table.plain("regexSplit", Exact(3), regex_split);
    table.plain("toString", Exact(1), |a| Ok(strval(&a[0]).into()));
    table.plain("toStrings", Exact(1), |a| {
        Ok(strslice(&a[0]).into_iter().map(Value::from).collect::<Vec<_>>().into())
    });

    table.plain("atoi", Exact(1), |a| Ok(Value::Int(str_arg(&a[0])?.trim().parse().unwrap_or(0))));
    table.plain("int", Exact(1), |a| Ok(Value::Int(to_int64(&a[0]))));
    table.plain("int64", Exact(1), |a| Ok(Value::Int(to_int64(&a[0]))));
    table.plain("float64", Exact(1), |a| Ok(Value::Float(to_float64(&a[0]))));
    table.plain("toDecimal", Exact(1), |a| {
        Ok(Value::Int(i64::from_str_radix(&strval(&a[0]), 8).unwrap_or(0)))
    });

    table.plain("default", AtLeast(1), default);
    table.plain("empty", Exact(1), |a| Ok((!a[0].is_truthy()).into()));
    table.plain("coalesce", AtLeast(0), |a| {
        Ok(a.iter().find(|v| v.is_truthy()).cloned().unwrap_or_default())
    });
    table.plain("ternary", Exact(3), |a| {
        Ok(if bool_arg(&a[2])? { a[0].clone() } else { a[1].clone() })
    });
}

/// Uppercase the first letter of every word
///
/// Usage: {{ "hello world" | title }} renders `Hello World`
fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_separator = true;
    for c in s.chars() {
        if prev_is_separator {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_is_separator = is_word_separator(c);
    }
    out
}

fn is_word_separator(c: char) -> bool {
    if c.is_ascii() {
        return !(c.is_ascii_alphanumeric() || c == '_');
    }
    if c.is_alphanumeric() {
        return false;
    }
    c.is_whitespace()
}

fn untitle(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_space = true;
    for c in s.chars() {
        if prev_is_space && c.is_uppercase() {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev_is_space = c.is_whitespace();
    }
    out
}

/// Usage: {{ trimAll "$" "$5.00$" }}
fn trim_all(args: &[Value]) -> FuncResult {
    let cutset = str_arg(&args[0])?;
    let s = str_arg(&args[1])?;
    Ok(s.trim_matches(|c: char| cutset.contains(c)).into())
}

fn trim_prefix(args: &[Value]) -> FuncResult {
    let prefix = str_arg(&args[0])?;
    let s = str_arg(&args[1])?;
    Ok(s.strip_prefix(prefix).unwrap_or(s).into())
}

fn trim_suffix(args: &[Value]) -> FuncResult {
    let suffix = str_arg(&args[0])?;
    let s = str_arg(&args[1])?;
    Ok(s.strip_suffix(suffix).unwrap_or(s).into())
}

/// Keep the first `n` characters, or the last `-n` when `n` is negative
///
/// Usage: {{ .Release.Name | trunc 63 }}
fn trunc(args: &[Value]) -> FuncResult {
    let n = int_arg(&args[0])?;
    let s = str_arg(&args[1])?;
    let len = s.chars().count() as i64;

    let out: String = if n >= 0 && len > n {
        s.chars().take(n as usize).collect()
    } else if n < 0 && len + n > 0 {
        s.chars().skip((len + n) as usize).collect()
    } else {
        s.to_string()
    };
    Ok(out.into())
}

/// Usage: {{ abbrev 5 "hello world" }} renders `he...`
fn abbrev(args: &[Value]) -> FuncResult {
    let width = int_arg(&args[0])?;
    let s = str_arg(&args[1])?;
    if width < 4 || s.chars().count() as i64 <= width {
        return Ok(s.into());
    }
    let kept: String = s.chars().take(width as usize - 3).collect();
    Ok(format!("{}...", kept).into())
}

fn repeat(args: &[Value]) -> FuncResult {
    let count = int_arg(&args[0])?;
    if count < 0 {
        return Err(FuncError::msg("strings: negative Repeat count"));
    }
    Ok(str_arg(&args[1])?.repeat(count as usize).into())
}

/// Usage: {{ substr 0 5 "hello world" }}
fn substr(args: &[Value]) -> FuncResult {
    let start = int_arg(&args[0])?;
    let end = int_arg(&args[1])?;
    let chars: Vec<char> = str_arg(&args[2])?.chars().collect();
    let len = chars.len() as i64;

    let (from, to) = if start < 0 {
        (0, end.clamp(0, len))
    } else if end < 0 || end > len {
        (start.min(len), len)
    } else {
        (start.min(end), end)
    };
    Ok(chars[from as usize..to as usize].iter().collect::<String>().into())
}

/// Double-quote every non-nil argument, separated by spaces
fn quote(args: &[Value]) -> FuncResult {
    let quoted: Vec<String> = args
        .iter()
        .filter(|arg| !arg.is_null())
        .map(|arg| go_quote(&strval(arg)))
        .collect();
    Ok(quoted.join(" ").into())
}

fn squote(args: &[Value]) -> FuncResult {
    let quoted: Vec<String> = args
        .iter()
        .filter(|arg| !arg.is_null())
        .map(|arg| format!("'{}'", strval(arg)))
        .collect();
    Ok(quoted.join(" ").into())
}

fn cat(args: &[Value]) -> FuncResult {
    let parts: Vec<String> = args.iter().filter(|arg| !arg.is_null()).map(strval).collect();
    Ok(parts.join(" ").into())
}

/// Prefix every line, including empty ones, with `spaces` spaces
///
/// Usage: {{ .Values.config | toYaml | indent 4 }}
fn indent(spaces: i64, s: &str) -> String {
    let pad = " ".repeat(spaces.max(0) as usize);
    format!("{}{}", pad, s.replace('\n', &format!("\n{}", pad)))
}

/// Usage: {{ "FirstName" | snakecase }} renders `first_name`
fn snakecase(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + s.len() / 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let starts_word = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if starts_word && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Usage: {{ "http_server" | camelcase }} renders `HttpServer`
fn camelcase(s: &str) -> String {
    s.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn swapcase(s: &str) -> String {
    s.chars()
        .flat_map(|c| -> Box<dyn Iterator<Item = char>> {
            if c.is_uppercase() {
                Box::new(c.to_lowercase())
            } else if c.is_lowercase() {
                Box::new(c.to_uppercase())
            } else {
                Box::new(std::iter::once(c))
            }
        })
        .collect()
}

/// Split into a dict keyed `_0`, `_1`, ...
///
/// Usage: {{ $parts := split "$" "foo$bar" }}{{ $parts._1 }}
fn split(args: &[Value]) -> FuncResult {
    let sep = str_arg(&args[0])?;
    let s = str_arg(&args[1])?;
    let map: Map = s
        .split(sep)
        .enumerate()
        .map(|(i, part)| (format!("_{}", i), Value::from(part)))
        .collect();
    Ok(Value::from_map(map))
}

fn compile(pattern: &Value) -> Result<Regex, FuncError> {
    let pattern = str_arg(pattern)?;
    Regex::new(pattern).map_err(|e| {
        FuncError::msg(format!("regexp: Compile({}): {}", go_quote(pattern), e))
    })
}

/// Usage: {{ regexFindAll "[2,4,6,8]" "123456789" -1 }}
fn regex_find_all(args: &[Value]) -> FuncResult {
    let re = compile(&args[0])?;
    let s = str_arg(&args[1])?;
    let n = int_arg(&args[2])?;
    let limit = if n < 0 { usize::MAX } else { n as usize };
    let found: Vec<Value> = re
        .find_iter(s)
        .take(limit)
        .map(|m| Value::from(m.as_str()))
        .collect();
    Ok(found.into())
}

fn regex_split(args: &[Value]) -> FuncResult {
    let re = compile(&args[0])?;
    let s = str_arg(&args[1])?;
    let n = int_arg(&args[2])?;
    let parts: Vec<Value> = match n {
        0 => Vec::new(),
        n if n < 0 => re.split(s).map(Value::from).collect(),
        n => re.splitn(s, n as usize).map(Value::from).collect(),
    };
    Ok(parts.into())
}

/// Usage: {{ .Values.name | default "app" }}
fn default(args: &[Value]) -> FuncResult {
    match args.get(1) {
        Some(given) if given.is_truthy() => Ok(given.clone()),
        _ => Ok(args[0].clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_title_and_untitle() {
        assert_eq!(title("spouter inn"), "Spouter Inn");
        assert_eq!(title("hello-world foo_bar"), "Hello-World Foo_bar");
        assert_eq!(untitle("Hello World"), "hello world");
    }

    #[test]
    fn test_trunc_both_directions() {
        assert_eq!(trunc(&[Value::Int(3), s("abcdef")]).unwrap(), s("abc"));
        assert_eq!(trunc(&[Value::Int(-2), s("abcdef")]).unwrap(), s("ef"));
        assert_eq!(trunc(&[Value::Int(10), s("abc")]).unwrap(), s("abc"));
    }

    #[test]
    fn test_trim_family() {
        assert_eq!(trim_all(&[s("$"), s("$5.00$")]).unwrap(), s("5.00"));
        assert_eq!(trim_prefix(&[s("v"), s("v1.2")]).unwrap(), s("1.2"));
        assert_eq!(trim_suffix(&[s(".yaml"), s("a.yaml")]).unwrap(), s("a"));
    }

    #[test]
    fn test_substr_and_abbrev() {
        assert_eq!(substr(&[Value::Int(0), Value::Int(5), s("hello world")]).unwrap(), s("hello"));
        assert_eq!(substr(&[Value::Int(6), Value::Int(-1), s("hello world")]).unwrap(), s("world"));
        assert_eq!(abbrev(&[Value::Int(5), s("hello world")]).unwrap(), s("he..."));
    }

    #[test]
    fn test_quote_skips_nil() {
        assert_eq!(quote(&[s("a\"b"), Value::Null, Value::Int(1)]).unwrap(), s("\"a\\\"b\" \"1\""));
        assert_eq!(squote(&[s("x")]).unwrap(), s("'x'"));
        assert_eq!(cat(&[s("a"), Value::Null, Value::Int(2)]).unwrap(), s("a 2"));
    }

    #[test]
    fn test_indent_every_line() {
        assert_eq!(indent(2, "a\n\nb"), "  a\n  \n  b");
    }

    #[test]
    fn test_case_conversions() {
        assert_eq!(snakecase("FirstName"), "first_name");
        assert_eq!(snakecase("HTTPServer"), "http_server");
        assert_eq!(snakecase("already_snake"), "already_snake");
        assert_eq!(camelcase("http_server"), "HttpServer");
        assert_eq!(swapcase("Hello"), "hELLO");
    }

    #[test]
    fn test_split_to_dict() {
        let parts = split(&[s("$"), s("foo$bar")]).unwrap();
        assert_eq!(parts.to_json(), json!({"_0": "foo", "_1": "bar"}));
    }

    #[test]
    fn test_regex_helpers() {
        assert_eq!(
            regex_find_all(&[s("[2,4,6,8]"), s("123456789"), Value::Int(-1)]).unwrap().to_json(),
            json!(["2", "4", "6", "8"])
        );
        assert_eq!(
            regex_split(&[s("z+"), s("pizza"), Value::Int(-1)]).unwrap().to_json(),
            json!(["pi", "a"])
        );
        assert!(compile(&s("(")).is_err());
    }

    #[test]
    fn test_default() {
        assert_eq!(default(&[s("d")]).unwrap(), s("d"));
        assert_eq!(default(&[s("d"), s("")]).unwrap(), s("d"));
        assert_eq!(default(&[s("d"), Value::Int(0)]).unwrap(), s("d"));
        assert_eq!(default(&[s("d"), s("x")]).unwrap(), s("x"));
    }
}
