//! Syntax tree for the Go template dialect
//!
//! Every node records the byte offset where it starts in its source text.
//! Offsets are turned into `line:column` pairs when an error is reported,
//! and the `Display` impls print nodes back the way they appear in error
//! messages (`<include "x" .>`).

use std::fmt;
use std::sync::Arc;

/// A parsed, named template: either a whole file or a `define` block
#[derive(Debug, Clone)]
pub struct Tree {
    /// Name used to look the template up (`define` name or file path)
    pub name: String,

    /// Name of the top-level template whose source holds this tree
    pub parse_name: String,

    /// Full source text of `parse_name`, for position reporting
    pub source: Arc<str>,

    /// Body
    pub root: Vec<Node>,
}

impl Tree {
    /// A tree is empty when it only holds whitespace text
    pub fn is_empty(&self) -> bool {
        self.root.iter().all(|node| match node {
            Node::Text(text) => text.trim().is_empty(),
            _ => false,
        })
    }

    /// `(line, column)` of a byte offset; line is 1-based, column is a 0-based byte offset
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        line_col(&self.source, pos)
    }

    /// `parse_name:line:col` of a byte offset
    pub fn location(&self, pos: usize) -> String {
        let (line, col) = self.line_col(pos);
        format!("{}:{}:{}", self.parse_name, line, col)
    }
}

pub(crate) fn line_col(source: &str, pos: usize) -> (usize, usize) {
    let pos = pos.min(source.len());
    let before = &source.as_bytes()[..pos];
    let line = 1 + before.iter().filter(|b| **b == b'\n').count();
    let col = match before.iter().rposition(|b| *b == b'\n') {
        Some(idx) => pos - idx - 1,
        None => pos,
    };
    (line, col)
}

/// A node in a template body
#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Action(Pipeline),
    If(Branch),
    Range(Branch),
    With(Branch),
    Template {
        pos: usize,
        name: String,
        pipe: Option<Pipeline>,
    },
    Break(usize),
    Continue(usize),
}

/// Shared shape of `if`, `range` and `with`
#[derive(Debug, Clone)]
pub struct Branch {
    pub pos: usize,
    pub pipe: Pipeline,
    pub list: Vec<Node>,
    pub else_list: Vec<Node>,
}

/// A pipeline: optional variable declaration and `|` separated commands
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub pos: usize,

    /// Declared or assigned variables, including the `$`
    pub decl: Vec<String>,

    /// `=` rather than `:=`
    pub is_assign: bool,

    pub cmds: Vec<Command>,
}

/// One command of a pipeline: a function call, field, or operand
#[derive(Debug, Clone)]
pub struct Command {
    pub pos: usize,
    pub args: Vec<Arg>,
}

/// Operands
#[derive(Debug, Clone)]
pub enum Arg {
    Dot(usize),
    Nil(usize),
    Bool {
        pos: usize,
        value: bool,
    },
    Number {
        pos: usize,
        text: String,
        value: Number,
    },
    String {
        pos: usize,
        quoted: String,
        value: String,
    },
    /// `.A.B`
    Field {
        pos: usize,
        idents: Vec<String>,
    },
    /// `$x.A.B`, `idents[0]` being the variable name
    Variable {
        pos: usize,
        idents: Vec<String>,
    },
    /// Function name
    Identifier {
        pos: usize,
        name: String,
    },
    /// Parenthesized pipeline
    Pipe(Box<Pipeline>),
    /// `(pipeline).A.B`
    Chain {
        pos: usize,
        node: Box<Arg>,
        fields: Vec<String>,
    },
}

/// Numeric constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Arg {
    pub fn pos(&self) -> usize {
        match self {
            Arg::Dot(pos) | Arg::Nil(pos) => *pos,
            Arg::Bool { pos, .. }
            | Arg::Number { pos, .. }
            | Arg::String { pos, .. }
            | Arg::Field { pos, .. }
            | Arg::Variable { pos, .. }
            | Arg::Identifier { pos, .. }
            | Arg::Chain { pos, .. } => *pos,
            Arg::Pipe(pipe) => pipe.pos,
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.decl.is_empty() {
            write!(f, "{}", self.decl.join(", "))?;
            f.write_str(if self.is_assign { " = " } else { " := " })?;
        }
        for (i, cmd) in self.cmds.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", cmd)?;
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match arg {
                Arg::Pipe(pipe) => write!(f, "({})", pipe)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Dot(_) => f.write_str("."),
            Arg::Nil(_) => f.write_str("nil"),
            Arg::Bool { value, .. } => write!(f, "{}", value),
            Arg::Number { text, .. } => f.write_str(text),
            Arg::String { quoted, .. } => f.write_str(quoted),
            Arg::Field { idents, .. } => {
                for ident in idents {
                    write!(f, ".{}", ident)?;
                }
                Ok(())
            }
            Arg::Variable { idents, .. } => f.write_str(&idents.join(".")),
            Arg::Identifier { name, .. } => f.write_str(name),
            Arg::Pipe(pipe) => write!(f, "{}", pipe),
            Arg::Chain { node, fields, .. } => {
                match node.as_ref() {
                    Arg::Pipe(pipe) => write!(f, "({})", pipe)?,
                    other => write!(f, "{}", other)?,
                }
                for field in fields {
                    write!(f, ".{}", field)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_is_zero_based_byte_offset() {
        let src = "abc\n{{ .x }}";
        assert_eq!(line_col(src, 0), (1, 0));
        assert_eq!(line_col(src, 2), (1, 2));
        assert_eq!(line_col(src, 4), (2, 0));
        assert_eq!(line_col(src, 7), (2, 3));
    }

    #[test]
    fn test_empty_tree() {
        let tree = Tree {
            name: "x".into(),
            parse_name: "x".into(),
            source: Arc::from(""),
            root: vec![Node::Text("  \n ".into())],
        };
        assert!(tree.is_empty());
    }

    #[test]
    fn test_command_display() {
        let cmd = Command {
            pos: 0,
            args: vec![
                Arg::Identifier {
                    pos: 0,
                    name: "include".into(),
                },
                Arg::String {
                    pos: 8,
                    quoted: "\"x\"".into(),
                    value: "x".into(),
                },
                Arg::Dot(12),
            ],
        };
        assert_eq!(cmd.to_string(), "include \"x\" .");
    }
}
