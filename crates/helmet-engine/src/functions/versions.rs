//! Semantic version constraints for `semverCompare`
//!
//! Constraints follow the syntax charts use with Kubernetes versions:
//! comparison operators, `~` and `^` ranges, `x`/`*` wildcards, hyphen
//! ranges, comma or space separated conjunctions and `||` alternatives.
//! A version with a prerelease only satisfies comparators that carry a
//! prerelease themselves, so `>=1.19-0` admits `v1.21.3-gke.100` while
//! `>=1.19` does not.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};

use super::{Arity, FunctionTable, str_arg};
use crate::template::{FuncError, Value};

static HYPHEN_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(v?[0-9xX*][0-9A-Za-z.+\-*]*)\s+-\s+(v?[0-9xX*][0-9A-Za-z.+\-*]*)")
        .expect("hyphen range pattern is valid")
});

static COMPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(!=|>=|<=|=>|=<|~>|>|<|=|~|\^)?\s*(v?[0-9xX*][0-9A-Za-z.+\-*]*)")
        .expect("comparator pattern is valid")
});

pub(super) fn register(table: &mut FunctionTable) {
    table.plain("semverCompare", Arity::Exact(2), |a| {
        semver_compare(str_arg(&a[0])?, str_arg(&a[1])?).map(Value::from)
    });
}

/// Usage: {{ semverCompare ">=1.21-0" .Capabilities.KubeVersion.GitVersion }}
pub(crate) fn semver_compare(constraint: &str, version: &str) -> Result<bool, FuncError> {
    let version = parse_partial(version)
        .filter(Partial::is_complete)
        .map(|p| p.floor())
        .ok_or_else(|| FuncError::msg("Invalid Semantic Version"))?;

    let groups = parse_constraint(constraint)
        .ok_or_else(|| FuncError::msg(format!("improper constraint: {}", constraint)))?;

    Ok(groups
        .iter()
        .any(|group| group.iter().all(|cmp| cmp.matches(&version))))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Tilde,
    Caret,
}

/// A version whose trailing components may be wildcards
#[derive(Debug, Clone)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn is_complete(&self) -> bool {
        self.major.is_some()
    }

    fn is_exact(&self) -> bool {
        self.patch.is_some()
    }

    /// Lowest version matching the pattern
    fn floor(&self) -> Version {
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre: self.pre.clone(),
            build: BuildMetadata::EMPTY,
        }
    }

    /// First version above every version matching the pattern
    fn ceiling(&self) -> Option<Version> {
        match (self.major, self.minor, self.patch) {
            (None, _, _) => None,
            (Some(major), None, _) => Some(Version::new(major + 1, 0, 0)),
            (Some(major), Some(minor), None) => Some(Version::new(major, minor + 1, 0)),
            (Some(major), Some(minor), Some(patch)) => Some(Version::new(major, minor, patch + 1)),
        }
    }
}

#[derive(Debug, Clone)]
struct Comparator {
    op: Op,
    version: Partial,
}

impl Comparator {
    fn matches(&self, v: &Version) -> bool {
        if !v.pre.is_empty() && self.version.pre.is_empty() {
            return false;
        }

        let floor = self.version.floor();
        let below_ceiling = |ceiling: Option<Version>| ceiling.is_none_or(|c| *v < c);

        match self.op {
            Op::Eq if self.version.is_exact() => *v == floor,
            Op::Eq => *v >= floor && below_ceiling(self.version.ceiling()),
            Op::Ne => !(Comparator { op: Op::Eq, version: self.version.clone() }).matches(v),
            Op::Gt if self.version.is_exact() => *v > floor,
            Op::Gt => self.version.ceiling().is_some_and(|c| *v >= c),
            Op::Ge => *v >= floor,
            Op::Lt => *v < floor,
            Op::Le if self.version.is_exact() => *v <= floor,
            Op::Le => below_ceiling(self.version.ceiling()),
            Op::Tilde => {
                let ceiling = match (self.version.major, self.version.minor) {
                    (Some(major), Some(minor)) => Some(Version::new(major, minor + 1, 0)),
                    (Some(major), None) => Some(Version::new(major + 1, 0, 0)),
                    _ => None,
                };
                *v >= floor && below_ceiling(ceiling)
            }
            Op::Caret => {
                let ceiling = match (self.version.major, self.version.minor, self.version.patch) {
                    (None, _, _) => None,
                    (Some(major), _, _) if major > 0 => Some(Version::new(major + 1, 0, 0)),
                    (Some(_), None, _) => Some(Version::new(1, 0, 0)),
                    (Some(_), Some(minor), _) if minor > 0 => Some(Version::new(0, minor + 1, 0)),
                    (Some(_), Some(_), None) => Some(Version::new(0, 1, 0)),
                    (Some(_), Some(_), Some(patch)) => Some(Version::new(0, 0, patch + 1)),
                };
                *v >= floor && below_ceiling(ceiling)
            }
        }
    }
}

fn parse_partial(text: &str) -> Option<Partial> {
    let text = text.trim();
    let text = text.strip_prefix('v').unwrap_or(text);
    let text = text.split('+').next().unwrap_or(text);
    let (numbers, pre) = match text.split_once('-') {
        Some((numbers, pre)) => (numbers, Prerelease::new(pre).ok()?),
        None => (text, Prerelease::EMPTY),
    };

    let mut parts = [None, None, None];
    let mut wildcard = false;
    for (i, part) in numbers.split('.').enumerate() {
        if i >= parts.len() || part.is_empty() {
            return None;
        }
        if matches!(part, "x" | "X" | "*") {
            wildcard = true;
            continue;
        }
        if wildcard {
            return None;
        }
        parts[i] = Some(part.parse::<u64>().ok()?);
    }

    let [major, minor, patch] = parts;
    Some(Partial {
        major,
        minor,
        patch,
        pre,
    })
}

fn parse_op(op: &str) -> Op {
    match op {
        "!=" => Op::Ne,
        ">" => Op::Gt,
        ">=" | "=>" => Op::Ge,
        "<" => Op::Lt,
        "<=" | "=<" => Op::Le,
        "~" | "~>" => Op::Tilde,
        "^" => Op::Caret,
        _ => Op::Eq,
    }
}

/// Parse `a, b || c` into alternatives of conjunctions
fn parse_constraint(text: &str) -> Option<Vec<Vec<Comparator>>> {
    let mut groups = Vec::new();
    for group in text.split("||") {
        let group = HYPHEN_RANGE.replace_all(group, ">= $1, <= $2");

        let mut comparators = Vec::new();
        let mut consumed = 0;
        for caps in COMPARATOR.captures_iter(&group) {
            let whole = caps.get(0)?;
            let between = &group[consumed..whole.start()];
            if !between.chars().all(|c| c == ',' || c.is_whitespace()) {
                return None;
            }
            consumed = whole.end();

            let op = parse_op(caps.get(1).map_or("", |m| m.as_str()));
            let version = parse_partial(caps.get(2)?.as_str())?;
            comparators.push(Comparator { op, version });
        }
        if comparators.is_empty()
            || !group[consumed..].chars().all(|c| c == ',' || c.is_whitespace())
        {
            return None;
        }
        groups.push(comparators);
    }
    Some(groups)
}
