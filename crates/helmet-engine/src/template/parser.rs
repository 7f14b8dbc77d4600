//! Go template parser
//!
//! Parsing runs in three passes:
//! 1. pest turns the source into a flat list of text and action items
//! 2. trim markers (`{{-`, `-}}`) strip whitespace from neighbouring text
//! 3. a recursive descent over the items assembles `if`/`range`/`with`
//!    blocks, extracts `define`/`block` bodies as separate trees, checks
//!    variable scoping and that every called function exists

use std::collections::HashMap;
use std::sync::Arc;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use super::ast::*;
use super::error::ParseError;

#[derive(Parser)]
#[grammar = "template/go_template.pest"]
struct GoTemplateParser;

type Result<T> = std::result::Result<T, ParseError>;

/// Parse `text` as template `name`
///
/// Returns the top-level tree under `name` plus one tree per `define` and
/// `block`. `has_function` decides whether an identifier names a function.
pub fn parse(
    name: &str,
    text: &str,
    has_function: &dyn Fn(&str) -> bool,
) -> Result<HashMap<String, Arc<Tree>>> {
    let source: Arc<str> = Arc::from(text);
    let items = lex_items(name, &source)?;
    let items = apply_trim(items);

    let mut builder = Builder {
        name,
        source: &source,
        items,
        idx: 0,
        vars: vec!["$".to_string()],
        range_depth: 0,
        has_function,
        defines: Vec::new(),
    };
    let root = builder.parse_top()?;

    let mut trees = HashMap::new();
    for tree in builder.defines {
        trees.insert(tree.name.clone(), Arc::new(tree));
    }
    trees.insert(
        name.to_string(),
        Arc::new(Tree {
            name: name.to_string(),
            parse_name: name.to_string(),
            source: source.clone(),
            root,
        }),
    );
    Ok(trees)
}

// ---------------------------------------------------------------------------
// Pass 1: pest -> items
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Item {
    Text {
        text: String,
    },
    Action {
        pos: usize,
        trim_left: bool,
        trim_right: bool,
        body: Body,
    },
}

#[derive(Debug)]
enum Body {
    Comment,
    If(Pipeline),
    ElseIf(Pipeline),
    ElseWith(Pipeline),
    Else,
    End,
    Range(Pipeline),
    With(Pipeline),
    Define(String),
    Template(String, Option<Pipeline>),
    Block(String, Pipeline),
    Break,
    Continue,
    Pipeline(Pipeline),
}

fn lex_items(name: &str, source: &str) -> Result<Vec<Item>> {
    let pairs = GoTemplateParser::parse(Rule::template, source)
        .map_err(|e| pest_error(name, source, e))?;

    let mut items = Vec::new();
    for pair in pairs {
        if pair.as_rule() != Rule::template {
            continue;
        }
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::text => items.push(Item::Text {
                    text: inner.as_str().to_string(),
                }),
                Rule::comment | Rule::action => items.push(parse_action(name, source, inner)?),
                _ => {}
            }
        }
    }
    Ok(items)
}

fn pest_error(name: &str, source: &str, err: pest::error::Error<Rule>) -> ParseError {
    let pos = match err.location {
        pest::error::InputLocation::Pos(pos) => pos,
        pest::error::InputLocation::Span((start, _)) => start,
    };
    let (line, _) = line_col(source, pos);
    let rest = &source[pos.min(source.len())..];

    let message = if rest.is_empty() {
        "unclosed action".to_string()
    } else if rest.starts_with("}}") || rest.starts_with("-}}") {
        "missing value for command".to_string()
    } else {
        let token: String = rest
            .chars()
            .take_while(|c| !c.is_whitespace())
            .take(16)
            .collect();
        format!("unexpected \"{}\" in operand", token)
    };
    ParseError::new(name, line, message)
}

fn parse_action(name: &str, source: &str, pair: Pair<'_, Rule>) -> Result<Item> {
    let pos = pair.as_span().start();
    let is_comment = pair.as_rule() == Rule::comment;
    let mut trim_left = false;
    let mut trim_right = false;
    let mut body = Body::Comment;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::left_delim => trim_left = inner.as_str() == "{{-",
            Rule::right_delim => trim_right = inner.as_str() == "-}}",
            Rule::comment_text => {}
            _ if is_comment => {}
            _ => body = parse_body(name, source, inner)?,
        }
    }

    Ok(Item::Action {
        pos,
        trim_left,
        trim_right,
        body,
    })
}

fn parse_body(name: &str, source: &str, pair: Pair<'_, Rule>) -> Result<Body> {
    let ctx = Ctx { name, source };
    let rule = pair.as_rule();
    let pipeline = |pair: &Pair<'_, Rule>| -> Result<Option<Pipeline>> {
        match pair
            .clone()
            .into_inner()
            .find(|p| p.as_rule() == Rule::pipeline)
        {
            Some(p) => ctx.pipeline(p).map(Some),
            None => Ok(None),
        }
    };
    let required = |pair: &Pair<'_, Rule>| -> Result<Pipeline> {
        pipeline(pair)?.ok_or_else(|| ctx.error(pair.as_span().start(), "missing pipeline"))
    };

    let body = match rule {
        Rule::if_action => Body::If(required(&pair)?),
        Rule::else_if_action => Body::ElseIf(required(&pair)?),
        Rule::else_with_action => Body::ElseWith(required(&pair)?),
        Rule::else_action => Body::Else,
        Rule::end_action => Body::End,
        Rule::range_action => Body::Range(required(&pair)?),
        Rule::with_action => Body::With(required(&pair)?),
        Rule::define_action => Body::Define(ctx.template_name(&pair)?),
        Rule::template_action => Body::Template(ctx.template_name(&pair)?, pipeline(&pair)?),
        Rule::block_action => Body::Block(ctx.template_name(&pair)?, required(&pair)?),
        Rule::break_action => Body::Break,
        Rule::continue_action => Body::Continue,
        Rule::pipeline => Body::Pipeline(ctx.pipeline(pair)?),
        other => return Err(ctx.error(pair.as_span().start(), format!("unexpected {:?}", other))),
    };
    Ok(body)
}

/// Conversion of pest pairs into AST nodes
#[derive(Clone, Copy)]
struct Ctx<'s> {
    name: &'s str,
    source: &'s str,
}

impl Ctx<'_> {
    fn error(&self, pos: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(self.name, line_col(self.source, pos).0, message)
    }

    fn template_name(&self, pair: &Pair<'_, Rule>) -> Result<String> {
        let name = pair
            .clone()
            .into_inner()
            .find(|p| matches!(p.as_rule(), Rule::string_lit | Rule::raw_string))
            .ok_or_else(|| self.error(pair.as_span().start(), "missing template name"))?;
        self.unquote(&name)
    }

    fn pipeline(&self, pair: Pair<'_, Rule>) -> Result<Pipeline> {
        let pos = pair.as_span().start();
        let mut pipe = Pipeline {
            pos,
            decl: Vec::new(),
            is_assign: false,
            cmds: Vec::new(),
        };

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::declaration => {
                    for part in inner.into_inner() {
                        match part.as_rule() {
                            Rule::variable => pipe.decl.push(part.as_str().to_string()),
                            Rule::decl_op => pipe.is_assign = part.as_str() == "=",
                            _ => {}
                        }
                    }
                }
                Rule::command => pipe.cmds.push(self.command(inner)?),
                _ => {}
            }
        }
        Ok(pipe)
    }

    fn command(&self, pair: Pair<'_, Rule>) -> Result<Command> {
        let pos = pair.as_span().start();
        let args = pair
            .into_inner()
            .map(|operand| self.operand(operand))
            .collect::<Result<Vec<_>>>()?;
        Ok(Command { pos, args })
    }

    fn operand(&self, pair: Pair<'_, Rule>) -> Result<Arg> {
        let mut inner = pair.into_inner();
        let first = inner
            .next()
            .ok_or_else(|| self.error(0, "empty operand"))?;
        let path = inner.next();

        let node = self.term(first)?;
        match path {
            None => Ok(node),
            Some(path) => {
                let pos = path.as_span().start();
                let fields = split_fields(path.as_str());
                match node {
                    Arg::Variable { mut idents, .. } => {
                        idents.extend(fields);
                        Ok(Arg::Variable { pos, idents })
                    }
                    other => Ok(Arg::Chain {
                        pos,
                        node: Box::new(other),
                        fields,
                    }),
                }
            }
        }
    }

    fn term(&self, pair: Pair<'_, Rule>) -> Result<Arg> {
        let pos = pair.as_span().start();
        let text = pair.as_str();
        let arg = match pair.as_rule() {
            Rule::paren => {
                let inner = pair
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::pipeline)
                    .ok_or_else(|| self.error(pos, "missing parenthesized pipeline"))?;
                Arg::Pipe(Box::new(self.pipeline(inner)?))
            }
            Rule::field => {
                let idents = split_fields(text);
                let pos = match idents.first() {
                    Some(first) if idents.len() > 1 => pos + 1 + first.len(),
                    _ => pos,
                };
                Arg::Field { pos, idents }
            }
            Rule::variable => Arg::Variable {
                pos,
                idents: vec![text.to_string()],
            },
            Rule::dot => Arg::Dot(pos),
            Rule::identifier => Arg::Identifier {
                pos,
                name: text.to_string(),
            },
            Rule::nil_lit => Arg::Nil(pos),
            Rule::bool_lit => Arg::Bool {
                pos,
                value: text == "true",
            },
            Rule::string_lit | Rule::raw_string => Arg::String {
                pos,
                quoted: text.to_string(),
                value: self.unquote(&pair)?,
            },
            Rule::char_lit => {
                let c = self.unquote_char(pos, text)?;
                Arg::Number {
                    pos,
                    text: text.to_string(),
                    value: Number::Int(c as i64),
                }
            }
            Rule::number => Arg::Number {
                pos,
                text: text.to_string(),
                value: self.number(pos, text)?,
            },
            other => return Err(self.error(pos, format!("unexpected {:?} in operand", other))),
        };
        Ok(arg)
    }

    fn number(&self, pos: usize, text: &str) -> Result<Number> {
        let invalid = || self.error(pos, format!("bad number syntax: \"{}\"", text));
        let cleaned = text.replace('_', "");
        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };
        let lower = digits.to_ascii_lowercase();

        let radix = if lower.starts_with("0x") {
            Some((16, &digits[2..]))
        } else if lower.starts_with("0o") {
            Some((8, &digits[2..]))
        } else if lower.starts_with("0b") {
            Some((2, &digits[2..]))
        } else {
            None
        };

        if let Some((radix, body)) = radix {
            let n = i64::from_str_radix(body, radix).map_err(|_| invalid())?;
            return Ok(Number::Int(if negative { -n } else { n }));
        }

        if digits.contains(['.', 'e', 'E']) {
            let f: f64 = digits.parse().map_err(|_| invalid())?;
            return Ok(Number::Float(if negative { -f } else { f }));
        }

        // Go reads a leading zero as octal
        let n = if digits.len() > 1 && digits.starts_with('0') {
            i64::from_str_radix(&digits[1..], 8).map_err(|_| invalid())?
        } else {
            digits.parse::<i64>().map_err(|_| invalid())?
        };
        Ok(Number::Int(if negative { -n } else { n }))
    }

    fn unquote(&self, pair: &Pair<'_, Rule>) -> Result<String> {
        let text = pair.as_str();
        if let Some(raw) = text.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
            return Ok(raw.replace('\r', ""));
        }
        let inner = text
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .ok_or_else(|| self.error(pair.as_span().start(), format!("bad string: {}", text)))?;
        unescape(inner).ok_or_else(|| {
            self.error(
                pair.as_span().start(),
                format!("invalid syntax in string {}", text),
            )
        })
    }

    fn unquote_char(&self, pos: usize, text: &str) -> Result<char> {
        let inner = text
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap_or(text);
        let value = unescape(inner).unwrap_or_default();
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(self.error(pos, format!("malformed character constant: {}", text))),
        }
    }
}

fn split_fields(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Interpret Go escape sequences
fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0c}',
            'v' => '\u{0b}',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'x' => hex_char(&mut chars, 2)?,
            'u' => hex_char(&mut chars, 4)?,
            'U' => hex_char(&mut chars, 8)?,
            d @ '0'..='7' => {
                let rest: String = chars.by_ref().take(2).collect();
                let code = u32::from_str_radix(&format!("{}{}", d, rest), 8).ok()?;
                char::from_u32(code)?
            }
            _ => return None,
        };
        out.push(escaped);
    }
    Some(out)
}

fn hex_char(chars: &mut std::str::Chars<'_>, len: usize) -> Option<char> {
    let digits: String = chars.by_ref().take(len).collect();
    if digits.len() != len {
        return None;
    }
    char::from_u32(u32::from_str_radix(&digits, 16).ok()?)
}

// ---------------------------------------------------------------------------
// Pass 2: trim markers
// ---------------------------------------------------------------------------

fn is_trim_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn apply_trim(mut items: Vec<Item>) -> Vec<Item> {
    for i in 0..items.len() {
        let (trim_left, trim_right) = match &items[i] {
            Item::Action {
                trim_left,
                trim_right,
                ..
            } => (*trim_left, *trim_right),
            Item::Text { .. } => continue,
        };
        if trim_left && i > 0 {
            if let Item::Text { text } = &mut items[i - 1] {
                let len = text.trim_end_matches(is_trim_space).len();
                text.truncate(len);
            }
        }
        if trim_right && i + 1 < items.len() {
            if let Item::Text { text } = &mut items[i + 1] {
                *text = text.trim_start_matches(is_trim_space).to_string();
            }
        }
    }

    items
        .into_iter()
        .filter(|item| match item {
            Item::Text { text } => !text.is_empty(),
            Item::Action { body, .. } => !matches!(body, Body::Comment),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 3: block structure
// ---------------------------------------------------------------------------

/// What ended a list of nodes
enum Terminator {
    End,
    Else(usize),
    ElseIf(usize, Pipeline),
    ElseWith(usize, Pipeline),
    Eof,
}

struct Builder<'a> {
    name: &'a str,
    source: &'a Arc<str>,
    items: Vec<Item>,
    idx: usize,
    vars: Vec<String>,
    range_depth: usize,
    has_function: &'a dyn Fn(&str) -> bool,
    defines: Vec<Tree>,
}

impl Builder<'_> {
    fn error(&self, pos: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(self.name, line_col(self.source, pos).0, message)
    }

    fn eof_pos(&self) -> usize {
        self.source.len()
    }

    fn parse_top(&mut self) -> Result<Vec<Node>> {
        let (nodes, terminator) = self.parse_list(true)?;
        match terminator {
            Terminator::Eof => Ok(nodes),
            Terminator::End => Err(self.error(self.eof_pos(), "unexpected {{end}}")),
            Terminator::Else(pos) | Terminator::ElseIf(pos, _) | Terminator::ElseWith(pos, _) => {
                Err(self.error(pos, "unexpected {{else}}"))
            }
        }
    }

    fn take(&mut self) -> Option<Item> {
        let item = self
            .items
            .get_mut(self.idx)
            .map(|slot| std::mem::replace(slot, Item::Text { text: String::new() }));
        self.idx += 1;
        item
    }

    fn parse_list(&mut self, top: bool) -> Result<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();
        loop {
            let Some(item) = self.take() else {
                return Ok((nodes, Terminator::Eof));
            };
            let (pos, body) = match item {
                Item::Text { text } => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action { pos, body, .. } => (pos, body),
            };

            match body {
                Body::End => {
                    if top {
                        return Err(self.error(pos, "unexpected {{end}}"));
                    }
                    return Ok((nodes, Terminator::End));
                }
                Body::Else => {
                    if top {
                        return Err(self.error(pos, "unexpected {{else}}"));
                    }
                    return Ok((nodes, Terminator::Else(pos)));
                }
                Body::ElseIf(pipe) => {
                    if top {
                        return Err(self.error(pos, "unexpected {{else}}"));
                    }
                    return Ok((nodes, Terminator::ElseIf(pos, pipe)));
                }
                Body::ElseWith(pipe) => {
                    if top {
                        return Err(self.error(pos, "unexpected {{else}}"));
                    }
                    return Ok((nodes, Terminator::ElseWith(pos, pipe)));
                }
                Body::Define(name) => {
                    if !top {
                        return Err(self.error(pos, "unexpected {{define}}"));
                    }
                    self.parse_define(name)?;
                }
                Body::Block(name, pipe) => {
                    self.check_pipeline(&pipe, "block")?;
                    self.parse_define(name.clone())?;
                    nodes.push(Node::Template {
                        pos,
                        name,
                        pipe: Some(pipe),
                    });
                }
                Body::Template(name, pipe) => {
                    if let Some(pipe) = &pipe {
                        self.check_pipeline(pipe, "template clause")?;
                    }
                    nodes.push(Node::Template { pos, name, pipe });
                }
                Body::If(pipe) => nodes.push(Node::If(self.parse_if(pos, pipe)?)),
                Body::With(pipe) => nodes.push(Node::With(self.parse_with(pos, pipe)?)),
                Body::Range(pipe) => nodes.push(Node::Range(self.parse_range(pos, pipe)?)),
                Body::Break => {
                    if self.range_depth == 0 {
                        return Err(self.error(pos, "{{break}} outside {{range}}"));
                    }
                    nodes.push(Node::Break(pos));
                }
                Body::Continue => {
                    if self.range_depth == 0 {
                        return Err(self.error(pos, "{{continue}} outside {{range}}"));
                    }
                    nodes.push(Node::Continue(pos));
                }
                Body::Pipeline(pipe) => {
                    self.check_pipeline(&pipe, "command")?;
                    nodes.push(Node::Action(pipe));
                }
                Body::Comment => {}
            }
        }
    }

    fn parse_define(&mut self, name: String) -> Result<()> {
        let saved_vars = std::mem::replace(&mut self.vars, vec!["$".to_string()]);
        let saved_range = std::mem::replace(&mut self.range_depth, 0);

        let (root, terminator) = self.parse_list(false)?;

        self.vars = saved_vars;
        self.range_depth = saved_range;

        match terminator {
            Terminator::End => {}
            Terminator::Eof => return Err(self.error(self.eof_pos(), "unexpected EOF")),
            Terminator::Else(p) | Terminator::ElseIf(p, _) | Terminator::ElseWith(p, _) => {
                return Err(self.error(p, "unexpected {{else}} in definition"));
            }
        }

        self.defines.push(Tree {
            name,
            parse_name: self.name.to_string(),
            source: self.source.clone(),
            root,
        });
        Ok(())
    }

    fn parse_if(&mut self, pos: usize, pipe: Pipeline) -> Result<Branch> {
        let mark = self.vars.len();
        self.check_pipeline(&pipe, "if")?;
        let (list, terminator) = self.parse_list(false)?;

        let else_list = match terminator {
            Terminator::End => Vec::new(),
            Terminator::Eof => return Err(self.error(self.eof_pos(), "unexpected EOF")),
            Terminator::Else(_) => self.parse_else_body()?,
            Terminator::ElseIf(p, next) => vec![Node::If(self.parse_if(p, next)?)],
            Terminator::ElseWith(p, _) => {
                return Err(self.error(p, "unexpected {{else with}} in if"));
            }
        };

        self.vars.truncate(mark);
        Ok(Branch {
            pos,
            pipe,
            list,
            else_list,
        })
    }

    fn parse_with(&mut self, pos: usize, pipe: Pipeline) -> Result<Branch> {
        let mark = self.vars.len();
        self.check_pipeline(&pipe, "with")?;
        let (list, terminator) = self.parse_list(false)?;

        let else_list = match terminator {
            Terminator::End => Vec::new(),
            Terminator::Eof => return Err(self.error(self.eof_pos(), "unexpected EOF")),
            Terminator::Else(_) => self.parse_else_body()?,
            Terminator::ElseWith(p, next) => vec![Node::With(self.parse_with(p, next)?)],
            Terminator::ElseIf(p, _) => {
                return Err(self.error(p, "unexpected {{else if}} in with"));
            }
        };

        self.vars.truncate(mark);
        Ok(Branch {
            pos,
            pipe,
            list,
            else_list,
        })
    }

    fn parse_range(&mut self, pos: usize, pipe: Pipeline) -> Result<Branch> {
        let mark = self.vars.len();
        self.check_pipeline(&pipe, "range")?;

        self.range_depth += 1;
        let result = self.parse_list(false);
        self.range_depth -= 1;
        let (list, terminator) = result?;

        let else_list = match terminator {
            Terminator::End => Vec::new(),
            Terminator::Eof => return Err(self.error(self.eof_pos(), "unexpected EOF")),
            Terminator::Else(_) => self.parse_else_body()?,
            Terminator::ElseIf(p, _) | Terminator::ElseWith(p, _) => {
                return Err(self.error(p, "expected end; found {{else}}"));
            }
        };

        self.vars.truncate(mark);
        Ok(Branch {
            pos,
            pipe,
            list,
            else_list,
        })
    }

    /// Body of a plain `{{else}}`, which must be closed by `{{end}}`
    fn parse_else_body(&mut self) -> Result<Vec<Node>> {
        let (list, terminator) = self.parse_list(false)?;
        match terminator {
            Terminator::End => Ok(list),
            Terminator::Eof => Err(self.error(self.eof_pos(), "unexpected EOF")),
            Terminator::Else(p) | Terminator::ElseIf(p, _) | Terminator::ElseWith(p, _) => {
                Err(self.error(p, "expected end; found {{else}}"))
            }
        }
    }

    /// Declare variables and check every variable and function reference
    fn check_pipeline(&mut self, pipe: &Pipeline, context: &str) -> Result<()> {
        if pipe.decl.len() > 1 && context != "range" {
            return Err(self.error(pipe.pos, format!("too many declarations in {}", context)));
        }
        self.vars.extend(pipe.decl.iter().cloned());
        if pipe.cmds.is_empty() {
            return Err(self.error(pipe.pos, format!("missing value for {}", context)));
        }
        for cmd in &pipe.cmds {
            for arg in &cmd.args {
                self.check_arg(arg)?;
            }
        }
        Ok(())
    }

    fn check_arg(&mut self, arg: &Arg) -> Result<()> {
        match arg {
            Arg::Variable { pos, idents } => {
                let name = idents.first().map(String::as_str).unwrap_or("$");
                if !self.vars.iter().any(|v| v == name) {
                    return Err(self.error(*pos, format!("undefined variable \"{}\"", name)));
                }
                Ok(())
            }
            Arg::Identifier { pos, name } => {
                if !(self.has_function)(name) {
                    return Err(self.error(*pos, format!("function \"{}\" not defined", name)));
                }
                Ok(())
            }
            Arg::Pipe(pipe) => self.check_pipeline(pipe, "parenthesized pipeline"),
            Arg::Chain { node, .. } => self.check_arg(node),
            _ => Ok(()),
        }
    }
}
