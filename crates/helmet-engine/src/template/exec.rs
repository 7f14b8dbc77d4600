//! Template execution
//!
//! A [`Namespace`] holds every compiled tree of one render. An [`Executor`]
//! runs trees from that namespace against data, carrying the per-render
//! mutable state: the `include` recursion counters and the stack of
//! transient namespaces pushed by `tpl`. Both are local to the executor, so
//! concurrent renders never share anything but the read-only namespace.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ast::*;
use super::error::{ExecError, FuncError, TemplateError};
use super::format::go_quote;
use super::parser;
use super::value::Value;
use crate::functions::{Arity, FunctionTable};
use crate::lookup::ClientProvider;

/// Name of the template set, and of the trees `tpl` compiles
pub const TPL_NAME: &str = "gotpl";

/// Maximum nesting of `include` calls for a single template name
pub const MAX_INCLUDE_DEPTH: usize = 1000;

/// Maximum nesting of template executions
pub const MAX_EXEC_DEPTH: usize = 1500;

/// Stack headroom required before entering a nested template
const STACK_RED_ZONE: usize = 256 * 1024;

/// Size of each stack segment allocated once the headroom runs out
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

/// Run `f` on a fresh stack segment when the current one is nearly full
///
/// Nested templates recurse on the native stack, so deep `include` chains
/// would otherwise overflow small thread stacks before hitting the
/// recursion ceilings above.
fn with_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, f)
}

type ExecResult<T> = Result<T, TemplateError>;

/// A set of compiled templates addressable by name
#[derive(Debug, Default, Clone)]
pub struct Namespace {
    trees: HashMap<String, Arc<Tree>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the trees produced by parsing `parse_name`
    ///
    /// The top-level tree always replaces an existing one. A `define` with an
    /// empty body does not replace an existing definition of the same name.
    pub fn add_parsed(&mut self, parse_name: &str, trees: HashMap<String, Arc<Tree>>) {
        for (name, tree) in trees {
            if name != parse_name && tree.is_empty() && self.trees.contains_key(&name) {
                continue;
            }
            self.trees.insert(name, tree);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Tree>> {
        self.trees.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

/// Runs templates of one namespace for one render
pub struct Executor<'a> {
    namespace: &'a Namespace,
    funcs: &'a FunctionTable,
    strict: bool,
    lint: bool,
    client: Option<&'a dyn ClientProvider>,
    overlays: RefCell<Vec<HashMap<String, Arc<Tree>>>>,
    include_counts: RefCell<HashMap<String, usize>>,
}

impl<'a> Executor<'a> {
    pub fn new(namespace: &'a Namespace, funcs: &'a FunctionTable) -> Self {
        Self {
            namespace,
            funcs,
            strict: false,
            lint: false,
            client: None,
            overlays: RefCell::new(Vec::new()),
            include_counts: RefCell::new(HashMap::new()),
        }
    }

    /// Fail on missing map keys instead of yielding nil
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn lint(mut self, lint: bool) -> Self {
        self.lint = lint;
        self
    }

    pub fn client_provider(mut self, client: Option<&'a dyn ClientProvider>) -> Self {
        self.client = client;
        self
    }

    /// Execute template `name` with `data` as dot
    pub fn execute(&self, name: &str, data: &Value) -> Result<String, TemplateError> {
        self.execute_at(name, data.clone(), 0)
    }

    fn lookup_tree(&self, name: &str) -> Option<Arc<Tree>> {
        let overlays = self.overlays.borrow();
        overlays
            .iter()
            .rev()
            .find_map(|overlay| overlay.get(name).cloned())
            .or_else(|| self.namespace.get(name).cloned())
    }

    fn execute_at(&self, name: &str, data: Value, depth: usize) -> ExecResult<String> {
        let tree = self
            .lookup_tree(name)
            .ok_or_else(|| ExecError::NoTemplate {
                name: name.to_string(),
                parent: TPL_NAME.to_string(),
            })?;

        with_stack(|| -> ExecResult<String> {
            let mut state = State {
                exec: self,
                tree: tree.clone(),
                vars: vec![("$".to_string(), data.clone())],
                depth,
            };
            let mut out = String::new();
            state.walk_list(&data, &tree.root, &mut out)?;
            Ok(out)
        })
    }

    fn include(&self, name: &str, data: Value, depth: usize) -> Result<String, FuncError> {
        if depth >= MAX_EXEC_DEPTH {
            return Err(FuncError::msg(format!(
                "exceeded maximum template depth ({})",
                MAX_EXEC_DEPTH
            )));
        }
        {
            let mut counts = self.include_counts.borrow_mut();
            let count = counts.entry(name.to_string()).or_insert(0);
            if *count > MAX_INCLUDE_DEPTH {
                return Err(FuncError::msg(format!(
                    "rendering template has a nested reference name: {}: unable to execute template",
                    name
                )));
            }
            *count += 1;
        }

        let result = self.execute_at(name, data, depth + 1);

        if let Some(count) = self.include_counts.borrow_mut().get_mut(name) {
            *count = count.saturating_sub(1);
        }
        result.map_err(FuncError::from)
    }

    fn tpl(&self, text: &str, data: Value, depth: usize) -> Result<String, FuncError> {
        let funcs = self.funcs;
        let trees = parser::parse(TPL_NAME, text, &|name| funcs.contains(name)).map_err(
            |source| FuncError::TplParse {
                quoted: go_quote(text),
                source,
            },
        )?;

        let mut overlay = HashMap::new();
        for (name, tree) in trees {
            if name != TPL_NAME && tree.is_empty() && self.lookup_tree(&name).is_some() {
                continue;
            }
            overlay.insert(name, tree);
        }

        self.overlays.borrow_mut().push(overlay);
        let result = if depth >= MAX_EXEC_DEPTH {
            Err(FuncError::msg(format!(
                "exceeded maximum template depth ({})",
                MAX_EXEC_DEPTH
            )))
        } else {
            self.execute_at(TPL_NAME, data, depth + 1)
                .map_err(|source| FuncError::Tpl {
                    quoted: go_quote(text),
                    source: Box::new(source),
                })
        };
        self.overlays.borrow_mut().pop();
        result
    }
}

/// Render-scoped services available to template functions
pub struct FuncContext<'a> {
    exec: &'a Executor<'a>,
    depth: usize,
}

impl FuncContext<'_> {
    /// Execute a named template and return its output
    pub fn include(&self, name: &str, data: Value) -> Result<String, FuncError> {
        self.exec.include(name, data, self.depth)
    }

    /// Compile `text` as a transient template and execute it
    pub fn tpl(&self, text: &str, data: Value) -> Result<String, FuncError> {
        self.exec.tpl(text, data, self.depth)
    }

    pub fn is_lint(&self) -> bool {
        self.exec.lint
    }

    pub fn is_strict(&self) -> bool {
        self.exec.strict
    }

    pub fn client_provider(&self) -> Option<&dyn ClientProvider> {
        self.exec.client
    }
}

/// Outcome of walking a list of nodes
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Execution state of one tree
struct State<'e, 'a> {
    exec: &'e Executor<'a>,
    tree: Arc<Tree>,
    vars: Vec<(String, Value)>,
    depth: usize,
}

impl State<'_, '_> {
    fn error(&self, pos: usize, context: &dyn fmt::Display, message: impl Into<String>) -> TemplateError {
        ExecError::At {
            location: self.tree.location(pos),
            name: self.tree.name.clone(),
            context: context.to_string(),
            message: message.into(),
            source: None,
        }
        .into()
    }

    fn call_error(&self, pos: usize, context: &dyn fmt::Display, name: &str, err: FuncError) -> TemplateError {
        let (text, source) = err.into_template_source();
        ExecError::At {
            location: self.tree.location(pos),
            name: self.tree.name.clone(),
            context: context.to_string(),
            message: format!("error calling {}: {}", name, text),
            source,
        }
        .into()
    }

    fn walk_list(&mut self, dot: &Value, nodes: &[Node], out: &mut String) -> ExecResult<Flow> {
        for node in nodes {
            match self.walk(dot, node, out)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn walk(&mut self, dot: &Value, node: &Node, out: &mut String) -> ExecResult<Flow> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(pipe) => {
                let value = self.eval_pipeline(dot, pipe)?;
                if pipe.decl.is_empty() {
                    out.push_str(&value.to_output());
                }
            }
            Node::If(branch) => return self.walk_if_or_with(dot, branch, false, out),
            Node::With(branch) => return self.walk_if_or_with(dot, branch, true, out),
            Node::Range(branch) => return self.walk_range(dot, branch, out),
            Node::Template { pos, name, pipe } => self.walk_template(dot, *pos, name, pipe.as_ref(), out)?,
            Node::Break(_) => return Ok(Flow::Break),
            Node::Continue(_) => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn walk_if_or_with(
        &mut self,
        dot: &Value,
        branch: &Branch,
        is_with: bool,
        out: &mut String,
    ) -> ExecResult<Flow> {
        let mark = self.vars.len();
        let value = self.eval_pipeline(dot, &branch.pipe)?;

        let flow = if value.is_truthy() {
            let new_dot = if is_with { &value } else { dot };
            self.walk_list(new_dot, &branch.list, out)
        } else {
            self.walk_list(dot, &branch.else_list, out)
        };

        self.vars.truncate(mark);
        flow
    }

    fn walk_range(&mut self, dot: &Value, branch: &Branch, out: &mut String) -> ExecResult<Flow> {
        let mark = self.vars.len();
        let pipe = &branch.pipe;
        let value = match self.eval_commands(dot, pipe)? {
            Value::Object(object) => object.to_value(),
            value => value,
        };

        let items: Vec<(Value, Value)> = match &value {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (Value::Int(i as i64), item.clone()))
                .collect(),
            Value::Map(map) => map
                .borrow()
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            Value::Int(n) => {
                if pipe.decl.len() > 1 {
                    return Err(self.error(
                        branch.pos,
                        &RangeDisplay(branch),
                        format!("can't use {} to iterate over more than one variable", n),
                    ));
                }
                (0..*n).map(|i| (Value::Int(i), Value::Int(i))).collect()
            }
            Value::Null => Vec::new(),
            other => {
                return Err(self.error(
                    branch.pos,
                    &RangeDisplay(branch),
                    format!("range can't iterate over {}", other),
                ));
            }
        };

        if items.is_empty() {
            let flow = self.walk_list(dot, &branch.else_list, out);
            self.vars.truncate(mark);
            return flow;
        }

        if !pipe.is_assign {
            for name in &pipe.decl {
                self.vars.push((name.clone(), Value::Null));
            }
        }
        let body_mark = self.vars.len();

        for (index, elem) in items {
            match (pipe.decl.len(), pipe.is_assign) {
                (0, _) => {}
                (1, false) => self.vars[mark].1 = elem.clone(),
                (_, false) => {
                    self.vars[mark].1 = index;
                    self.vars[mark + 1].1 = elem.clone();
                }
                (1, true) => self.set_var(branch.pos, &pipe.decl[0], elem.clone())?,
                (_, true) => {
                    self.set_var(branch.pos, &pipe.decl[0], index)?;
                    self.set_var(branch.pos, &pipe.decl[1], elem.clone())?;
                }
            }

            let flow = self.walk_list(&elem, &branch.list, out);
            self.vars.truncate(body_mark);
            match flow {
                Ok(Flow::Break) => break,
                Ok(_) => {}
                Err(err) => {
                    self.vars.truncate(mark);
                    return Err(err);
                }
            }
        }

        self.vars.truncate(mark);
        Ok(Flow::Normal)
    }

    fn walk_template(
        &mut self,
        dot: &Value,
        pos: usize,
        name: &str,
        pipe: Option<&Pipeline>,
        out: &mut String,
    ) -> ExecResult<()> {
        let display = TemplateDisplay { name, pipe };
        let tree = self
            .exec
            .lookup_tree(name)
            .ok_or_else(|| self.error(pos, &display, format!("template {} not defined", go_quote(name))))?;
        if self.depth >= MAX_EXEC_DEPTH {
            return Err(self.error(
                pos,
                &display,
                format!("exceeded maximum template depth ({})", MAX_EXEC_DEPTH),
            ));
        }

        let new_dot = match pipe {
            Some(pipe) => self.eval_pipeline(dot, pipe)?,
            None => Value::Null,
        };

        let mut state = State {
            exec: self.exec,
            tree: tree.clone(),
            vars: vec![("$".to_string(), new_dot.clone())],
            depth: self.depth + 1,
        };
        with_stack(|| state.walk_list(&new_dot, &tree.root, out))?;
        Ok(())
    }

    fn var_value(&self, pos: usize, name: &str) -> ExecResult<Value> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| self.error(pos, &name, format!("undefined variable: {}", name)))
    }

    fn set_var(&mut self, pos: usize, name: &str, value: Value) -> ExecResult<()> {
        match self.vars.iter_mut().rev().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1 = value;
                Ok(())
            }
            None => Err(self.error(pos, &name, format!("undefined variable: {}", name))),
        }
    }

    /// Evaluate a pipeline and bind its declared variables
    fn eval_pipeline(&mut self, dot: &Value, pipe: &Pipeline) -> ExecResult<Value> {
        let value = self.eval_commands(dot, pipe)?;
        for name in &pipe.decl {
            if pipe.is_assign {
                self.set_var(pipe.pos, name, value.clone())?;
            } else {
                self.vars.push((name.clone(), value.clone()));
            }
        }
        Ok(value)
    }

    fn eval_commands(&mut self, dot: &Value, pipe: &Pipeline) -> ExecResult<Value> {
        let mut value = None;
        for cmd in &pipe.cmds {
            value = Some(self.eval_command(dot, cmd, value)?);
        }
        Ok(value.unwrap_or_default())
    }

    fn eval_command(&mut self, dot: &Value, cmd: &Command, last: Option<Value>) -> ExecResult<Value> {
        let Some(first) = cmd.args.first() else {
            return Err(self.error(cmd.pos, cmd, "empty command"));
        };
        let args = &cmd.args[1..];

        match first {
            Arg::Field { pos, idents } => {
                return self.eval_field_chain(dot, dot.clone(), true, *pos, first, idents, args, last);
            }
            Arg::Chain { pos, node, fields } => {
                if matches!(node.as_ref(), Arg::Nil(_)) {
                    return Err(self.error(*pos, first, format!("indirection through explicit nil in {}", first)));
                }
                let receiver = self.eval_arg(dot, node)?;
                return self.eval_field_chain(dot, receiver, false, *pos, first, fields, args, last);
            }
            Arg::Identifier { pos, name } => {
                return self.eval_function(dot, *pos, name, cmd.pos, cmd, args, last);
            }
            Arg::Variable { pos, idents } => {
                let value = self.var_value(*pos, &idents[0])?;
                if idents.len() == 1 {
                    self.not_a_function(*pos, first, args, &last)?;
                    return Ok(value);
                }
                return self.eval_field_chain(dot, value, false, *pos, first, &idents[1..], args, last);
            }
            Arg::Pipe(pipe) => {
                self.not_a_function(pipe.pos, first, args, &last)?;
                return self.eval_pipeline(dot, pipe);
            }
            _ => {}
        }

        self.not_a_function(first.pos(), first, args, &last)?;
        match first {
            Arg::Nil(pos) => Err(self.error(*pos, first, "nil is not a command")),
            other => self.eval_arg(dot, other),
        }
    }

    fn not_a_function(
        &self,
        pos: usize,
        node: &Arg,
        args: &[Arg],
        last: &Option<Value>,
    ) -> ExecResult<()> {
        if !args.is_empty() || last.is_some() {
            return Err(self.error(pos, node, format!("can't give argument to non-function {}", node)));
        }
        Ok(())
    }

    /// Evaluate an operand used as an argument
    fn eval_arg(&mut self, dot: &Value, arg: &Arg) -> ExecResult<Value> {
        match arg {
            Arg::Dot(_) => Ok(dot.clone()),
            Arg::Nil(_) => Ok(Value::Null),
            Arg::Bool { value, .. } => Ok(Value::Bool(*value)),
            Arg::Number { value, .. } => Ok(match value {
                Number::Int(i) => Value::Int(*i),
                Number::Float(f) => Value::Float(*f),
            }),
            Arg::String { value, .. } => Ok(Value::String(value.clone())),
            Arg::Field { pos, idents } => {
                self.eval_field_chain(dot, dot.clone(), true, *pos, arg, idents, &[], None)
            }
            Arg::Variable { pos, idents } => {
                let value = self.var_value(*pos, &idents[0])?;
                if idents.len() == 1 {
                    return Ok(value);
                }
                self.eval_field_chain(dot, value, false, *pos, arg, &idents[1..], &[], None)
            }
            Arg::Chain { pos, node, fields } => {
                let receiver = self.eval_arg(dot, node)?;
                self.eval_field_chain(dot, receiver, false, *pos, arg, fields, &[], None)
            }
            Arg::Pipe(pipe) => self.eval_pipeline(dot, pipe),
            Arg::Identifier { pos, name } => self.eval_function(dot, *pos, name, *pos, arg, &[], None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_field_chain(
        &mut self,
        dot: &Value,
        receiver: Value,
        from_dot: bool,
        pos: usize,
        node: &Arg,
        idents: &[String],
        args: &[Arg],
        last: Option<Value>,
    ) -> ExecResult<Value> {
        // Fields of a nil dot are nil themselves
        if from_dot && receiver.is_null() {
            if self.exec.strict {
                let key = idents.first().map(String::as_str).unwrap_or_default();
                return Err(self.error(pos, node, format!("nil data; no entry for key {}", go_quote(key))));
            }
            return Ok(Value::Null);
        }

        let Some((final_ident, path)) = idents.split_last() else {
            return Ok(receiver);
        };
        let mut receiver = receiver;
        for ident in path {
            receiver = self.eval_field(dot, pos, node, ident, &[], None, receiver)?;
        }
        self.eval_field(dot, pos, node, final_ident, args, last, receiver)
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_field(
        &mut self,
        dot: &Value,
        pos: usize,
        node: &Arg,
        name: &str,
        args: &[Arg],
        last: Option<Value>,
        receiver: Value,
    ) -> ExecResult<Value> {
        let has_args = !args.is_empty() || last.is_some();

        match &receiver {
            Value::Null => Err(self.error(
                pos,
                node,
                format!("nil pointer evaluating interface {{}}.{}", name),
            )),
            Value::Map(map) => {
                if has_args {
                    return Err(self.error(pos, node, format!("{} is not a method but has arguments", name)));
                }
                let found = map.borrow().get(name).cloned();
                match found {
                    Some(value) => Ok(value),
                    None if self.exec.strict => Err(self.error(
                        pos,
                        node,
                        format!("map has no entry for key {}", go_quote(name)),
                    )),
                    None => Ok(Value::Null),
                }
            }
            Value::Object(object) => {
                if object.has_method(name) {
                    let mut argv = Vec::with_capacity(args.len() + 1);
                    for arg in args {
                        argv.push(self.eval_arg(dot, arg)?);
                    }
                    if let Some(last) = last {
                        argv.push(last);
                    }
                    return object
                        .call_method(name, &argv)
                        .map_err(|err| self.call_error(pos, node, name, err));
                }
                match object.get_field(name) {
                    Some(_) if has_args => Err(self.error(
                        pos,
                        node,
                        format!("{} is not a method but has arguments", name),
                    )),
                    Some(value) => Ok(value),
                    None => Err(self.error(
                        pos,
                        node,
                        format!("can't evaluate field {} in type {}", name, object.type_name()),
                    )),
                }
            }
            other => Err(self.error(
                pos,
                node,
                format!("can't evaluate field {} in type {}", name, other.go_type_name()),
            )),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_function(
        &mut self,
        dot: &Value,
        ident_pos: usize,
        name: &str,
        call_pos: usize,
        call: &dyn fmt::Display,
        args: &[Arg],
        last: Option<Value>,
    ) -> ExecResult<Value> {
        let Some(function) = self.exec.funcs.get(name).cloned() else {
            return Err(self.error(ident_pos, &name, format!("{} is not a defined function", go_quote(name))));
        };

        let given = args.len() + usize::from(last.is_some());
        match function.arity() {
            Arity::Exact(n) if given != n => {
                return Err(self.error(
                    ident_pos,
                    &name,
                    format!("wrong number of args for {}: want {} got {}", name, n, given),
                ));
            }
            Arity::AtLeast(n) if given < n => {
                return Err(self.error(
                    ident_pos,
                    &name,
                    format!("wrong number of args for {}: want at least {} got {}", name, n, given),
                ));
            }
            _ => {}
        }

        if name == "and" || name == "or" {
            return self.eval_and_or(dot, name == "or", args, last);
        }

        let mut argv = Vec::with_capacity(given);
        for arg in args {
            argv.push(self.eval_arg(dot, arg)?);
        }
        if let Some(last) = last {
            argv.push(last);
        }

        let ctx = FuncContext {
            exec: self.exec,
            depth: self.depth,
        };
        function
            .call(&ctx, &argv)
            .map_err(|err| self.call_error(call_pos, call, name, err))
    }

    /// `and` returns the first falsy argument, `or` the first truthy one, else the last
    fn eval_and_or(
        &mut self,
        dot: &Value,
        is_or: bool,
        args: &[Arg],
        last: Option<Value>,
    ) -> ExecResult<Value> {
        let mut value = Value::Null;
        for arg in args {
            value = self.eval_arg(dot, arg)?;
            if value.is_truthy() == is_or {
                return Ok(value);
            }
        }
        Ok(last.unwrap_or(value))
    }
}

struct RangeDisplay<'n>(&'n Branch);

impl fmt::Display for RangeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{range {}}}}}", self.0.pipe)
    }
}

struct TemplateDisplay<'n> {
    name: &'n str,
    pipe: Option<&'n Pipeline>,
}

impl fmt::Display for TemplateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pipe {
            Some(pipe) => write!(f, "{{{{template {} {}}}}}", go_quote(self.name), pipe),
            None => write!(f, "{{{{template {}}}}}", go_quote(self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{Function, FunctionTable, build_functions, FunctionOptions};
    use serde_json::json;

    fn namespace(templates: &[(&str, &str)], funcs: &FunctionTable) -> Namespace {
        let mut ns = Namespace::new();
        for (name, text) in templates {
            let trees = parser::parse(name, text, &|f| funcs.contains(f)).unwrap();
            ns.add_parsed(name, trees);
        }
        ns
    }

    fn render_with(templates: &[(&str, &str)], data: serde_json::Value, strict: bool) -> Result<String, TemplateError> {
        let funcs = build_functions(&FunctionOptions::default(), &FunctionTable::new());
        let ns = namespace(templates, &funcs);
        Executor::new(&ns, &funcs)
            .strict(strict)
            .execute(templates[0].0, &Value::from_json(&data))
    }

    fn render(text: &str, data: serde_json::Value) -> String {
        render_with(&[("t", text)], data, false).unwrap()
    }

    #[test]
    fn test_exec_fields_and_missing_keys() {
        let data = json!({"a": {"b": "x"}, "n": 3});
        assert_eq!(render("{{ .a.b }}-{{ .n }}-{{ .missing }}", data.clone()), "x-3-");

        let err = render_with(&[("t", "{{ .a.c.d }}")], data.clone(), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "template: t:1:5: executing \"t\" at <.a.c.d>: nil pointer evaluating interface {}.d"
        );

        let err = render_with(&[("t", "{{ .missing }}")], data, true).unwrap_err();
        assert!(err.to_string().ends_with("map has no entry for key \"missing\""));
    }

    #[test]
    fn test_exec_field_on_scalar() {
        let err = render_with(&[("t", "{{ .n.x }}")], json!({"n": "s"}), false).unwrap_err();
        assert!(err.to_string().ends_with("can't evaluate field x in type string"));
    }

    #[test]
    fn test_exec_if_else_with() {
        let data = json!({"on": true, "off": false, "obj": {"k": "v"}});
        assert_eq!(render("{{ if .off }}a{{ else if .on }}b{{ else }}c{{ end }}", data.clone()), "b");
        assert_eq!(render("{{ with .obj }}{{ .k }}{{ end }}", data.clone()), "v");
        assert_eq!(render("{{ with .none }}x{{ else with .obj }}{{ .k }}{{ end }}", data.clone()), "v");
        assert_eq!(render("{{ with .none }}x{{ else }}y{{ end }}", data), "y");
    }

    #[test]
    fn test_exec_range_forms() {
        let data = json!({"list": ["a", "b", "c"], "map": {"z": 1, "a": 2}, "empty": []});
        assert_eq!(render("{{ range .list }}{{ . }}{{ end }}", data.clone()), "abc");
        assert_eq!(render("{{ range $i, $v := .list }}{{ $i }}{{ $v }}{{ end }}", data.clone()), "0a1b2c");
        assert_eq!(render("{{ range $k, $v := .map }}{{ $k }}={{ $v }};{{ end }}", data.clone()), "a=2;z=1;");
        assert_eq!(render("{{ range .empty }}x{{ else }}none{{ end }}", data.clone()), "none");
        assert_eq!(render("{{ range 3 }}{{ . }}{{ end }}", data.clone()), "012");
        assert_eq!(
            render("{{ range .list }}{{ if eq . \"b\" }}{{ continue }}{{ end }}{{ if eq . \"c\" }}{{ break }}{{ end }}{{ . }}{{ end }}", data),
            "a"
        );
    }

    #[test]
    fn test_exec_variables() {
        let data = json!({"x": "one"});
        assert_eq!(render("{{ $v := .x }}{{ $v = \"two\" }}{{ $v }}", data.clone()), "two");
        assert_eq!(render("{{ range $i := until 2 }}{{ $.x }}{{ end }}", data), "oneone");
    }

    #[test]
    fn test_exec_template_and_define() {
        let out = render_with(
            &[
                ("main", "[{{ template \"inner\" .name }}]"),
                ("_helpers", "{{ define \"inner\" }}hi {{ . }}{{ end }}"),
            ],
            json!({"name": "moby"}),
            false,
        )
        .unwrap();
        assert_eq!(out, "[hi moby]");
    }

    #[test]
    fn test_exec_template_not_defined() {
        let err = render_with(&[("t", "{{ template \"nope\" . }}")], json!({}), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "template: t:1:3: executing \"t\" at <{{template \"nope\" .}}>: template \"nope\" not defined"
        );
    }

    #[test]
    fn test_exec_empty_define_keeps_previous() {
        let funcs = build_functions(&FunctionOptions::default(), &FunctionTable::new());
        let ns = namespace(
            &[
                ("a", "{{ define \"x\" }}first{{ end }}"),
                ("b", "{{ define \"x\" }}  {{ end }}"),
                ("c", "{{ template \"x\" }}"),
            ],
            &funcs,
        );
        let out = Executor::new(&ns, &funcs).execute("c", &Value::Null).unwrap();
        assert_eq!(out, "first");
    }

    #[test]
    fn test_exec_function_errors() {
        let err = render_with(&[("t", "x: {{ trunc }}")], json!({}), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "template: t:1:6: executing \"t\" at <trunc>: wrong number of args for trunc: want 2 got 0"
        );

        let err = render_with(&[("t", "{{ fail \"boom\" }}")], json!({}), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "template: t:1:3: executing \"t\" at <fail \"boom\">: error calling fail: boom"
        );
    }

    #[test]
    fn test_exec_and_or_short_circuit() {
        let data = json!({"a": "", "b": "x"});
        assert_eq!(render("{{ or .a .b }}", data.clone()), "x");
        assert_eq!(render("{{ and .b .a 1 }}", data.clone()), "");
        assert_eq!(render("{{ and .b 1 }}", data.clone()), "1");
        assert_eq!(render("{{ or .a (fail \"never\") | default \"y\" }}", json!({"a": "z"})), "z");
    }

    #[test]
    fn test_exec_pipeline_passes_last_value() {
        assert_eq!(render("{{ \"abc\" | upper | printf \"%s!\" }}", json!({})), "ABC!");
    }

    #[test]
    fn test_exec_include_and_tpl() {
        let out = render_with(
            &[
                ("main", "{{ include \"h\" . }}|{{ tpl \"{{ .name | upper }}\" . }}"),
                ("_h", "{{ define \"h\" }}{{ .name }}{{ end }}"),
            ],
            json!({"name": "ahab"}),
            false,
        )
        .unwrap();
        assert_eq!(out, "ahab|AHAB");
    }

    #[test]
    fn test_exec_tpl_defines_do_not_leak() {
        let out = render_with(
            &[
                (
                    "main",
                    "{{ tpl \"{{ define \\\"h\\\" }}inner{{ end }}{{ include \\\"h\\\" . }}\" . }}|{{ include \"h\" . }}",
                ),
                ("_h", "{{ define \"h\" }}outer{{ end }}"),
            ],
            json!({}),
            false,
        )
        .unwrap();
        assert_eq!(out, "inner|outer");
    }

    #[test]
    fn test_exec_include_missing_template() {
        let err = render_with(&[("t", "{{ include \"nope\" . }}")], json!({}), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "template: t:1:3: executing \"t\" at <include \"nope\" .>: error calling include: \
             template: no template \"nope\" associated with template \"gotpl\""
        );
    }

    #[test]
    fn test_exec_custom_function() {
        let mut custom = FunctionTable::new();
        custom.insert("shout", Function::exact(1, |_, args| Ok(Value::from(format!("{}!", args[0])))));
        let funcs = build_functions(&FunctionOptions::default(), &custom);
        let ns = namespace(&[("t", "{{ shout \"hey\" }}")], &funcs);
        let out = Executor::new(&ns, &funcs).execute("t", &Value::Null).unwrap();
        assert_eq!(out, "hey!");
    }
}
