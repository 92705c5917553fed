//! Program runtime
//!
//! One [`Runtime`] lives for a single compile. It owns the part table shared by every view the
//! compile touches and the stack of views being rendered, which is what cycle detection and the
//! depth limit look at.
//!
//! Generations count parent hops from the compiled view: the view itself is generation 0, its
//! parent 1 and so on. Included views render at their caller's generation.

use super::parts::{OutputStack, PartTable, PARENT_PLACEHOLDER};
use super::program::{Op, Program};
use super::Transpiler;
use crate::quill::error::{ScriptError, TranspileError};
use crate::quill::lexing::trim_blank_lines;
use crate::quill::script::{display, execute, truthy, Evaluator, Expr};
use crate::quill::view::{Vars, View};
use serde_json::{Map, Value};

pub(crate) struct Runtime<'t> {
    transpiler: &'t Transpiler,
    parts: PartTable,
    active: Vec<String>,
}

/// State of one running view.
struct Frame<'v> {
    view: &'v str,
    scope: Vars,
    output: OutputStack,
    parent: Option<String>,
}

impl<'t> Runtime<'t> {
    pub fn new(transpiler: &'t Transpiler) -> Self {
        Runtime {
            transpiler,
            parts: PartTable::new(),
            active: Vec::new(),
        }
    }

    /// Render `view` with `scope`, then its parent if it extends one.
    pub fn render(
        &mut self,
        view: &mut View,
        scope: Vars,
        generation: usize,
    ) -> Result<String, TranspileError> {
        self.enter(view.name())?;
        let result = self.render_active(view, scope, generation);
        self.active.pop();
        result
    }

    fn enter(&mut self, name: &str) -> Result<(), TranspileError> {
        let max_depth = self.transpiler.max_depth();
        if self.active.len() >= max_depth {
            return Err(TranspileError::DepthExceeded { max_depth });
        }
        if !name.is_empty() {
            if let Some(start) = self.active.iter().position(|active| active == name) {
                let mut chain = self.active[start..].to_vec();
                chain.push(name.to_string());
                return Err(TranspileError::InheritanceCycle { chain });
            }
        }
        self.active.push(name.to_string());
        Ok(())
    }

    fn render_active(
        &mut self,
        view: &mut View,
        scope: Vars,
        generation: usize,
    ) -> Result<String, TranspileError> {
        let program = self.transpiler.generate(view)?;
        let mut frame = Frame {
            view: view.name(),
            scope,
            output: OutputStack::new(),
            parent: None,
        };
        self.run(&program, &mut frame, generation)?;

        let Frame {
            scope,
            output,
            parent,
            ..
        } = frame;
        let output = output.finish()?;
        let mut rendered = trim_blank_lines(&output).0.to_string();

        if let Some(parent_name) = parent {
            let mut parent = self.transpiler.factory().create_view(&parent_name)?;
            let mut parent_scope = parent.vars().clone();
            parent_scope.extend(scope);
            let parent_output = self.render(&mut parent, parent_scope, generation + 1)?;
            let inherited = view.inherit_vars_from(&parent);
            tracing::debug!(
                view = view.name(),
                parent = %parent_name,
                inherited,
                "bound parent view"
            );
            rendered.push_str(&parent_output);
            rendered = trim_blank_lines(&rendered).0.to_string();
        }

        Ok(rendered)
    }

    fn run(
        &mut self,
        program: &Program,
        frame: &mut Frame<'_>,
        generation: usize,
    ) -> Result<(), TranspileError> {
        let ops = program.ops();
        let mut loops: Vec<Loop<'_>> = Vec::new();
        let mut pc = 0;

        while let Some((op, line)) = ops.get(pc) {
            let line = *line;
            pc += 1;
            match op {
                Op::Text(text) => frame.output.push_str(text),
                Op::Echo { expr, sanitize } => {
                    let text = display(&self.eval(expr, &frame.scope, line)?);
                    if *sanitize {
                        frame.output.push_str(&self.transpiler.sanitizer().run(&text));
                    } else {
                        frame.output.push_str(&text);
                    }
                }
                Op::Exec(statements) => {
                    let mut echoed = String::new();
                    execute(
                        statements,
                        &mut frame.scope,
                        self.transpiler,
                        &mut echoed,
                    )
                    .map_err(|error| TranspileError::runtime(line, error))?;
                    frame.output.push_str(&echoed);
                }
                Op::Extends(expr) => {
                    let parent = display(&self.eval(expr, &frame.scope, line)?);
                    if let Some(existing) = &frame.parent {
                        return Err(TranspileError::MultipleParents {
                            name: frame.view.to_string(),
                            parent: existing.clone(),
                            line,
                        });
                    }
                    frame.parent = Some(parent);
                }
                Op::Include { name, vars } => {
                    let name = display(&self.eval(name, &frame.scope, line)?);
                    let explicit = match vars {
                        Some(expr) => variable_map(self.eval(expr, &frame.scope, line)?, line)?,
                        None => Map::new(),
                    };
                    let mut included = self.transpiler.factory().create_view(&name)?;
                    let mut scope = frame.scope.clone();
                    scope.extend(included.vars().clone());
                    scope.extend(explicit);
                    tracing::debug!(view = frame.view, include = %name, line, "including view");
                    let text = self.render(&mut included, scope, generation)?;
                    frame.output.push_str(&text);
                }
                Op::StartPart(expr) => {
                    let name = display(&self.eval(expr, &frame.scope, line)?);
                    frame.output.open(name, line);
                }
                Op::EndPart => {
                    let (name, text) = frame.output.close().ok_or_else(|| {
                        TranspileError::NoOpenPart {
                            directive: "endpart".to_string(),
                            line,
                        }
                    })?;
                    self.define(&name, generation, text);
                }
                Op::Parent => {
                    if !frame.output.is_capturing() {
                        return Err(TranspileError::NoOpenPart {
                            directive: "parent".to_string(),
                            line,
                        });
                    }
                    frame.output.push_str(PARENT_PLACEHOLDER);
                }
                Op::Show(None) => {
                    let name = match frame.output.close() {
                        Some((name, text)) => {
                            self.define(&name, generation, text);
                            Some(name)
                        }
                        None => self.parts.last_defined().map(str::to_string),
                    };
                    if let Some(name) = name {
                        frame.output.push_str(&self.parts.resolve(&name));
                    }
                }
                Op::Show(Some(expr)) => {
                    let name = display(&self.eval(expr, &frame.scope, line)?);
                    frame.output.push_str(&self.parts.resolve(&name));
                }
                Op::JumpUnless { condition, target } => {
                    if !truthy(&self.eval(condition, &frame.scope, line)?) {
                        pc = *target;
                    }
                }
                Op::Jump(target) => pc = *target,
                Op::LoopStart {
                    subject,
                    key,
                    value,
                    exit,
                } => {
                    let subject = self.eval(subject, &frame.scope, line)?;
                    let mut state = Loop {
                        items: iterate(subject, line)?.into_iter(),
                        key: key.as_deref(),
                        value,
                    };
                    if state.advance(&mut frame.scope) {
                        loops.push(state);
                    } else {
                        pc = *exit;
                    }
                }
                Op::LoopNext { body } => {
                    let more = match loops.last_mut() {
                        Some(state) => state.advance(&mut frame.scope),
                        None => false,
                    };
                    if more {
                        pc = *body;
                    } else {
                        loops.pop();
                    }
                }
            }
        }
        Ok(())
    }

    fn define(&mut self, name: &str, generation: usize, text: String) {
        tracing::trace!(part = name, generation, "defined part");
        self.parts.define(name, generation, text);
    }

    fn eval(&self, expr: &Expr, scope: &Vars, line: usize) -> Result<Value, TranspileError> {
        Evaluator::new(scope, self.transpiler)
            .eval(expr)
            .map_err(|error| TranspileError::runtime(line, error))
    }
}

/// Key/value pairs of a collection; arrays are keyed by index.
fn iterate(subject: Value, line: usize) -> Result<Vec<(Value, Value)>, TranspileError> {
    match subject {
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (Value::from(index), item))
            .collect()),
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, item)| (Value::String(key), item))
            .collect()),
        other => Err(TranspileError::runtime(
            line,
            ScriptError::Type(format!("foreach expects a collection, got {}", display_type(&other))),
        )),
    }
}

/// A running `foreach`.
struct Loop<'p> {
    items: std::vec::IntoIter<(Value, Value)>,
    key: Option<&'p str>,
    value: &'p str,
}

impl Loop<'_> {
    /// Bind the next item into `scope`. Returns false once the items run out.
    fn advance(&mut self, scope: &mut Vars) -> bool {
        let Some((key, value)) = self.items.next() else {
            return false;
        };
        if let Some(name) = self.key {
            scope.insert(name.to_string(), key);
        }
        scope.insert(self.value.to_string(), value);
        true
    }
}

fn variable_map(value: Value, line: usize) -> Result<Vars, TranspileError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Array(items) if items.is_empty() => Ok(Map::new()),
        Value::Null => Ok(Map::new()),
        other => Err(TranspileError::runtime(
            line,
            ScriptError::InvalidArgument {
                function: "include".to_string(),
                message: format!("expected a map of variables, got {}", display_type(&other)),
            },
        )),
    }
}

fn display_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}
