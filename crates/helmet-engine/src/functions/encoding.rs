//! Encodings, digests, random identifiers and time

use std::any::Any;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Local, Offset, TimeZone};
use rand::Rng;
use rand::distr::Alphanumeric;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::{Arity, FuncResult, FunctionTable, int_arg, str_arg};
use crate::template::{FuncError, Object, Value};

pub(super) fn register(table: &mut FunctionTable) {
    use Arity::*;

    table.plain("b64enc", Exact(1), |a| Ok(STANDARD.encode(str_arg(&a[0])?).into()));
    table.plain("b64dec", Exact(1), |a| Ok(b64dec(str_arg(&a[0])?).into()));
    table.plain("sha1sum", Exact(1), |a| Ok(hex::encode(Sha1::digest(str_arg(&a[0])?)).into()));
    table.plain("sha256sum", Exact(1), |a| Ok(hex::encode(Sha256::digest(str_arg(&a[0])?)).into()));
    table.plain("uuidv4", Exact(0), |_| Ok(uuidv4().into()));
    table.plain("randAlphaNum", Exact(1), |a| {
        let n = int_arg(&a[0])?.max(0) as usize;
        let s: String = rand::rng().sample_iter(&Alphanumeric).take(n).map(char::from).collect();
        Ok(s.into())
    });
    table.plain("now", Exact(0), |_| Ok(Value::object(Time(Local::now()))));
    table.plain("date", Exact(2), date);
}

/// Decode standard base64; malformed input yields the decoder's message
fn b64dec(s: &str) -> String {
    match STANDARD.decode(s) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => e.to_string(),
    }
}

fn uuidv4() -> String {
    let mut bytes: [u8; 16] = rand::rng().random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let hex = hex::encode(bytes);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// A point in time, as returned by `now`
#[derive(Debug, Clone)]
pub struct Time(pub DateTime<Local>);

impl Time {
    fn format(&self, layout: &str) -> String {
        format_go_layout(&self.0, layout)
    }
}

impl Object for Time {
    fn type_name(&self) -> &'static str {
        "time.Time"
    }

    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }

    fn has_method(&self, name: &str) -> bool {
        matches!(name, "Unix" | "Format" | "Year")
    }

    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, FuncError> {
        match (name, args) {
            ("Unix", []) => Ok(Value::Int(self.0.timestamp())),
            ("Year", []) => Ok(Value::Int(i64::from(chrono::Datelike::year(&self.0)))),
            ("Format", [layout]) => Ok(self.format(str_arg(layout)?).into()),
            _ => Err(FuncError::msg(format!(
                "wrong number of args for {}: got {}",
                name,
                args.len()
            ))),
        }
    }

    fn to_value(&self) -> Value {
        Value::from(self.to_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn fmt_go(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S%.f %z"))
    }
}

/// Format a time with a Go reference layout
///
/// Usage: {{ now | date "2006-01-02" }}, {{ date "15:04" 1700000000 }}
fn date(args: &[Value]) -> FuncResult {
    let layout = str_arg(&args[0])?;
    let time = match &args[1] {
        Value::Object(object) => match object.as_any().downcast_ref::<Time>() {
            Some(time) => time.0,
            None => Local::now(),
        },
        Value::Int(secs) => Local.timestamp_opt(*secs, 0).single().unwrap_or_else(Local::now),
        Value::Float(secs) => Local
            .timestamp_opt(*secs as i64, 0)
            .single()
            .unwrap_or_else(Local::now),
        _ => Local::now(),
    };
    Ok(format_go_layout(&time, layout).into())
}

/// Translate Go's `Mon Jan 2 15:04:05 MST 2006` layout tokens to chrono output
fn format_go_layout<Tz>(time: &DateTime<Tz>, layout: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    const TOKENS: &[(&str, &str)] = &[
        ("January", "%B"),
        ("Jan", "%b"),
        ("Monday", "%A"),
        ("Mon", "%a"),
        ("MST", "%Z"),
        ("2006", "%Y"),
        ("-07:00", "%:z"),
        ("-0700", "%z"),
        ("-07", "%z"),
        ("002", "%j"),
        ("01", "%m"),
        ("02", "%d"),
        ("03", "%I"),
        ("04", "%M"),
        ("05", "%S"),
        ("06", "%y"),
        ("15", "%H"),
        ("__2", "%j"),
        ("_2", "%e"),
        ("1", "%-m"),
        ("2", "%-d"),
        ("3", "%-I"),
        ("4", "%-M"),
        ("5", "%-S"),
        ("PM", "%p"),
        ("pm", "%P"),
        (".000000000", "%.9f"),
        (".000000", "%.6f"),
        (".000", "%.3f"),
    ];

    let mut out = String::with_capacity(layout.len() + 8);
    let mut rest = layout;
    'scan: while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("Z07:00") {
            out.push_str(&zulu(time, "%:z"));
            rest = tail;
            continue;
        }
        if let Some(tail) = rest.strip_prefix("Z0700") {
            out.push_str(&zulu(time, "%z"));
            rest = tail;
            continue;
        }
        if let Some(digits) = fraction_nines(rest) {
            let frac = time.format("%.9f").to_string();
            let kept = frac[..=digits].trim_end_matches('0');
            if kept != "." {
                out.push_str(kept);
            }
            rest = &rest[digits + 1..];
            continue;
        }
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(&time.format(spec).to_string());
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

fn zulu<Tz>(time: &DateTime<Tz>, spec: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    if time.offset().fix().local_minus_utc() == 0 {
        "Z".to_string()
    } else {
        time.format(spec).to_string()
    }
}

/// Number of `9`s in a `.999` fractional-second token at the start of `s`
fn fraction_nines(s: &str) -> Option<usize> {
    let digits = s.strip_prefix('.')?;
    let count = digits.bytes().take_while(|b| *b == b'9').count();
    (count > 0).then_some(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_base64() {
        assert_eq!(STANDARD.encode("hello"), "aGVsbG8=");
        assert_eq!(b64dec("aGVsbG8="), "hello");
        assert!(!b64dec("%%%").is_empty());
    }

    #[test]
    fn test_digests() {
        assert_eq!(
            hex::encode(Sha256::digest("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hex::encode(Sha1::digest("abc")), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_uuidv4_shape() {
        let id = uuidv4();
        assert_eq!(id.len(), 36);
        assert_eq!(&id[14..15], "4");
        assert!(matches!(&id[19..20], "8" | "9" | "a" | "b"));
    }

    #[test]
    fn test_go_layout() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let time = tz.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap();
        assert_eq!(format_go_layout(&time, "2006-01-02 15:04:05"), "2024-03-07 14:05:09");
        assert_eq!(format_go_layout(&time, "Jan 2, 2006 3:04PM"), "Mar 7, 2024 2:05PM");
        assert_eq!(format_go_layout(&time, "Monday -07:00"), "Thursday +02:00");
        assert_eq!(format_go_layout(&time, "Z07:00"), "+02:00");

        let utc = Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap();
        assert_eq!(format_go_layout(&utc, "15:04:05Z07:00"), "14:05:09Z");
    }
}
