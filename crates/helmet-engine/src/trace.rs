//! Rewrite nested template errors into a readable call trace
//!
//! Execution errors arrive as one long line per layer, each embedding the
//! text of the layer below it:
//!
//! ```text
//! template: moby/templates/a.yaml:1:3: executing "moby/templates/a.yaml" at <include "x" .>: error calling include: template: ...
//! ```
//!
//! The translator walks the `source()` chain, recognizes the three shapes
//! the executor emits, and prints one frame per `include`/`tpl` call site,
//! outermost first:
//!
//! ```text
//! moby/templates/a.yaml:1:3
//!   executing "moby/templates/a.yaml" at <include "x" .>:
//!     error calling include:
//! moby/templates/_helpers.tpl:2:9
//!   executing "x" at <.Values.a.b>:
//!     nil pointer evaluating interface {}.b
//! ```
//!
//! Anything that does not match falls back to the raw message.

use std::error::Error as StdError;

use once_cell::sync::Lazy;
use regex::Regex;

/// `template: <loc>: executing "<name>" at <<expr>>: <msg>[ template: ...]`
static EXEC_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)^template: (?P<location>.+?): executing (?P<function>.+?) at (?P<expr><.*?>): (?P<message>.*?)(?P<next> template:.*)?$",
    )
    .expect("exec error pattern is valid")
});

/// `template: <name>: <msg>[ template: ...]`
static BARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^template: (?P<location>.+?): (?P<message>.*?)(?P<next> template:.*)?$")
        .expect("bare error pattern is valid")
});

/// `template: no template "<X>" associated with template "<Y>"`
static NO_TEMPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^template: no template (?P<name>.*) associated with template (?P<parent>.*)$"#)
        .expect("no template pattern is valid")
});

/// One layer of a nested template error
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceFrame {
    pub location: Option<String>,
    pub function: Option<String>,
    pub message: String,
}

impl TraceFrame {
    fn parse(text: &str) -> Option<Self> {
        if let Some(caps) = EXEC_AT.captures(text) {
            return Some(Self {
                location: Some(caps["location"].to_string()),
                function: Some(format!("executing {} at {}:", &caps["function"], &caps["expr"])),
                message: caps["message"].to_string(),
            });
        }
        if NO_TEMPLATE.is_match(text) {
            return Some(Self {
                location: None,
                function: None,
                message: text.to_string(),
            });
        }
        BARE.captures(text).map(|caps| Self {
            location: Some(caps["location"].to_string()),
            function: None,
            message: caps["message"].to_string(),
        })
    }

    fn write_to(&self, out: &mut String) {
        if let Some(location) = &self.location {
            out.push_str(location);
            out.push_str("\n  ");
        }
        if let Some(function) = &self.function {
            out.push_str(function);
            out.push_str("\n    ");
        }
        if !self.message.is_empty() {
            out.push_str(&self.message);
            out.push('\n');
        }
    }
}

/// Parse every layer of `err` into frames, outermost first
///
/// Returns `None` when some layer has a shape the translator does not know.
pub fn frames(err: &(dyn StdError + 'static)) -> Option<Vec<TraceFrame>> {
    let mut frames: Vec<TraceFrame> = Vec::new();
    let mut current = Some(err);
    while let Some(layer) = current {
        let text = layer.to_string();
        let source = layer.source();

        // A layer's text ends with the text of its source; match only its own part.
        let inner = source.map(|s| s.to_string());
        let own = inner
            .as_deref()
            .and_then(|inner| text.strip_suffix(inner))
            .unwrap_or(&text);

        let frame = TraceFrame::parse(own)?;
        if frames.last() != Some(&frame) {
            frames.push(frame);
        }
        current = source;
    }

    for frame in &mut frames {
        let trimmed = frame.message.trim_end_matches(' ').len();
        frame.message.truncate(trimmed);
    }

    Some(frames)
}

/// Format `err` as a multi-line trace, or return its message unchanged
pub fn translate(err: &(dyn StdError + 'static)) -> String {
    match frames(err) {
        Some(frames) if !frames.is_empty() => {
            let mut out = String::new();
            for frame in &frames {
                frame.write_to(&mut out);
            }
            out.trim().to_string()
        }
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ExecError, TemplateError};

    fn at(location: &str, name: &str, context: &str, message: &str, source: Option<TemplateError>) -> TemplateError {
        ExecError::At {
            location: location.into(),
            name: name.into(),
            context: context.into(),
            message: message.into(),
            source: source.map(Box::new),
        }
        .into()
    }

    #[test]
    fn test_nested_include_trace() {
        let inner = at(
            "moby/charts/common/templates/_helpers_2.tpl:1:49",
            "common.names.get_name",
            ".Values.nonexistant.key",
            "nil pointer evaluating interface {}.key",
            None,
        );
        let middle = at(
            "moby/templates/_helpers_1.tpl:1:39",
            "nested_helper.name",
            "include \"common.names.get_name\" .",
            &format!("error calling include: {}", inner),
            Some(inner),
        );
        let outer = at(
            "moby/templates/svc.yaml:1:9",
            "moby/templates/svc.yaml",
            "include \"nested_helper.name\" .",
            &format!("error calling include: {}", middle),
            Some(middle),
        );

        assert_eq!(
            translate(&outer),
            "moby/templates/svc.yaml:1:9\n  \
             executing \"moby/templates/svc.yaml\" at <include \"nested_helper.name\" .>:\n    \
             error calling include:\n\
             moby/templates/_helpers_1.tpl:1:39\n  \
             executing \"nested_helper.name\" at <include \"common.names.get_name\" .>:\n    \
             error calling include:\n\
             moby/charts/common/templates/_helpers_2.tpl:1:49\n  \
             executing \"common.names.get_name\" at <.Values.nonexistant.key>:\n    \
             nil pointer evaluating interface {}.key"
        );
    }

    #[test]
    fn test_multiline_message_preserved() {
        let err = at("moby/templates/a.yaml:2:4", "moby/templates/a.yaml", "fail \"a\"", "error calling fail: first: line\nsecond line", None);
        assert_eq!(
            translate(&err),
            "moby/templates/a.yaml:2:4\n  executing \"moby/templates/a.yaml\" at <fail \"a\">:\n    error calling fail: first: line\nsecond line"
        );
    }

    #[test]
    fn test_bare_and_missing_template() {
        let bare: TemplateError = ExecError::Bare {
            name: "moby/templates/a.yaml".into(),
            message: "incomplete template".into(),
        }
        .into();
        assert_eq!(translate(&bare), "moby/templates/a.yaml\n  incomplete template");

        let missing = ExecError::NoTemplate {
            name: "nope".into(),
            parent: "gotpl".into(),
        };
        let outer = at(
            "moby/templates/a.yaml:1:3",
            "moby/templates/a.yaml",
            "include \"nope\" .",
            &format!("error calling include: {}", missing),
            Some(missing.into()),
        );
        assert_eq!(
            translate(&outer),
            "moby/templates/a.yaml:1:3\n  \
             executing \"moby/templates/a.yaml\" at <include \"nope\" .>:\n    \
             error calling include:\n\
             template: no template \"nope\" associated with template \"gotpl\""
        );
    }

    #[test]
    fn test_unknown_shape_falls_back() {
        let err = std::io::Error::other("disk on fire");
        assert_eq!(translate(&err), "disk on fire");
    }
}
