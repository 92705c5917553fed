//! Script evaluation
//!
//! Values are plain JSON data. Conversions follow the loose rules template authors expect:
//! `null`, `false`, `0`, `""`, `"0"` and empty collections are falsy; `null` displays as the
//! empty string and `true` as `1`; arithmetic accepts numeric strings.

use super::ast::{AssignOp, BinaryOp, Expr, Stmt, UnaryOp};
use super::natives;
use crate::quill::error::{FunctionError, ScriptError};
use crate::quill::view::Vars;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Dispatch for the calls made from script.
pub trait ViewFunctions {
    fn call_view_function(&self, name: &str, args: &[Value]) -> Result<Value, FunctionError>;

    /// Call a plain (passthrough) function. Only the built-in natives are known by default.
    fn call_native(&self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        let native =
            natives::lookup(name).ok_or_else(|| ScriptError::UnknownNative(name.to_string()))?;
        native(args)
    }
}

/// Evaluates expressions against a read-only scope.
pub struct Evaluator<'a> {
    vars: &'a Vars,
    functions: &'a dyn ViewFunctions,
}

impl<'a> Evaluator<'a> {
    pub fn new(vars: &'a Vars, functions: &'a dyn ViewFunctions) -> Self {
        Evaluator { vars, functions }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| ScriptError::UndefinedVariable(name.clone())),
            Expr::Array(entries) => self.array(entries),
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Expr::Property(target, name) => {
                let target = self.eval(target)?;
                index_value(&target, &Value::String(name.clone()))
            }
            Expr::Call { name, args } => {
                let args = self.eval_all(args)?;
                self.functions.call_native(name, &args)
            }
            Expr::ViewCall { name, args } => {
                let args = self.eval_all(args)?;
                Ok(self.functions.call_view_function(name, &args)?)
            }
            Expr::MethodCall { name, .. } => Err(ScriptError::MethodCall(name.clone())),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Negate => arithmetic(BinaryOp::Subtract, &Value::from(0), &value),
                }
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                let result = truthy(&self.eval(left)?) || truthy(&self.eval(right)?);
                Ok(Value::Bool(result))
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                let result = truthy(&self.eval(left)?) && truthy(&self.eval(right)?);
                Ok(Value::Bool(result))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Expr::Coalesce(left, right) => match self.eval(left) {
                Ok(Value::Null)
                | Err(ScriptError::UndefinedVariable(_))
                | Err(ScriptError::UndefinedIndex(_)) => self.eval(right),
                other => other,
            },
            Expr::Ternary(condition, then, otherwise) => {
                if truthy(&self.eval(condition)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn eval_all(&self, exprs: &[Expr]) -> Result<Vec<Value>, ScriptError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn array(&self, entries: &[(Option<Expr>, Expr)]) -> Result<Value, ScriptError> {
        if entries.iter().all(|(key, _)| key.is_none()) {
            let items = entries
                .iter()
                .map(|(_, value)| self.eval(value))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::Array(items));
        }

        let mut map = Map::new();
        let mut next_index = 0usize;
        for (key, value) in entries {
            let key = match key {
                Some(key) => display(&self.eval(key)?),
                None => {
                    while map.contains_key(&next_index.to_string()) {
                        next_index += 1;
                    }
                    next_index.to_string()
                }
            };
            map.insert(key, self.eval(value)?);
        }
        Ok(Value::Object(map))
    }
}

/// Run statements against a mutable scope, appending echoed text to `out`.
pub fn execute(
    statements: &[Stmt],
    vars: &mut Vars,
    functions: &dyn ViewFunctions,
    out: &mut String,
) -> Result<(), ScriptError> {
    for statement in statements {
        match statement {
            Stmt::Echo(values) => {
                for value in values {
                    let value = Evaluator::new(vars, functions).eval(value)?;
                    out.push_str(&display(&value));
                }
            }
            Stmt::Expr(expr) => {
                Evaluator::new(vars, functions).eval(expr)?;
            }
            Stmt::Assign { target, op, value } => {
                let evaluator = Evaluator::new(vars, functions);
                let value = evaluator.eval(value)?;
                let combine = match op {
                    AssignOp::Set => None,
                    AssignOp::Concat => Some(BinaryOp::Concat),
                    AssignOp::Add => Some(BinaryOp::Add),
                    AssignOp::Subtract => Some(BinaryOp::Subtract),
                };
                let value = match combine {
                    Some(op) => binary(op, &current(&evaluator, target)?, &value)?,
                    None => value,
                };
                assign(target, value, vars, functions)?;
            }
            Stmt::Increment(target) | Stmt::Decrement(target) => {
                let op = if matches!(statement, Stmt::Increment(_)) {
                    BinaryOp::Add
                } else {
                    BinaryOp::Subtract
                };
                let evaluator = Evaluator::new(vars, functions);
                let value = arithmetic(op, &current(&evaluator, target)?, &Value::from(1))?;
                assign(target, value, vars, functions)?;
            }
        }
    }
    Ok(())
}

/// Current value of an assignment target; unset places read as `null`.
fn current(evaluator: &Evaluator<'_>, target: &Expr) -> Result<Value, ScriptError> {
    match evaluator.eval(target) {
        Err(ScriptError::UndefinedVariable(_)) | Err(ScriptError::UndefinedIndex(_)) => {
            Ok(Value::Null)
        }
        other => other,
    }
}

/// One step of an assignment path.
enum Segment {
    Key(Value),
    Property(String),
}

fn assign(
    target: &Expr,
    value: Value,
    vars: &mut Vars,
    functions: &dyn ViewFunctions,
) -> Result<(), ScriptError> {
    let mut segments = Vec::new();
    let mut cursor = target;
    let root = loop {
        match cursor {
            Expr::Variable(name) => break name.clone(),
            Expr::Index(inner, index) => {
                let key = Evaluator::new(vars, functions).eval(index)?;
                segments.push(Segment::Key(key));
                cursor = inner;
            }
            Expr::Property(inner, name) => {
                segments.push(Segment::Property(name.clone()));
                cursor = inner;
            }
            other => return Err(ScriptError::InvalidAssignment(format!("{:?}", other))),
        }
    };
    segments.reverse();

    let mut place = vars.entry(root).or_insert(Value::Null);
    for segment in segments {
        if place.is_null() {
            *place = Value::Object(Map::new());
        }
        place = match (place, segment) {
            (Value::Array(items), Segment::Key(key)) => {
                let index = key
                    .as_u64()
                    .map(|index| index as usize)
                    .ok_or_else(|| ScriptError::Type(format!("cannot index a list with {}", key)))?;
                if index == items.len() {
                    items.push(Value::Null);
                }
                items
                    .get_mut(index)
                    .ok_or_else(|| ScriptError::UndefinedIndex(index.to_string()))?
            }
            (Value::Object(map), Segment::Key(key)) => {
                map.entry(display(&key)).or_insert(Value::Null)
            }
            (Value::Object(map), Segment::Property(name)) => {
                map.entry(name).or_insert(Value::Null)
            }
            (other, _) => {
                return Err(ScriptError::Type(format!(
                    "cannot assign into {}",
                    type_name(other)
                )))
            }
        };
    }
    *place = value;
    Ok(())
}

fn index_value(target: &Value, index: &Value) -> Result<Value, ScriptError> {
    let missing = || ScriptError::UndefinedIndex(display(index));
    match target {
        Value::Array(items) => {
            let position = to_index(index).ok_or_else(missing)?;
            items.get(position).cloned().ok_or_else(missing)
        }
        Value::Object(map) => map.get(&display(index)).cloned().ok_or_else(missing),
        Value::String(text) => {
            let position = to_index(index).ok_or_else(missing)?;
            text.chars()
                .nth(position)
                .map(|c| Value::String(c.to_string()))
                .ok_or_else(missing)
        }
        other => Err(ScriptError::Type(format!(
            "cannot index {}",
            type_name(other)
        ))),
    }
}

fn to_index(index: &Value) -> Option<usize> {
    match index {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// Truthiness of a value.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text a value renders as.
///
/// Collections render as JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn display_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Null => Some(0),
        Value::Bool(b) => Some(*b as i64),
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    match op {
        BinaryOp::Or => Ok(Value::Bool(truthy(left) || truthy(right))),
        BinaryOp::And => Ok(Value::Bool(truthy(left) && truthy(right))),
        BinaryOp::Equal => Ok(Value::Bool(loose_equal(left, right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!loose_equal(left, right))),
        BinaryOp::Identical => Ok(Value::Bool(left == right)),
        BinaryOp::NotIdentical => Ok(Value::Bool(left != right)),
        BinaryOp::Less => Ok(Value::Bool(compare(left, right) == Ordering::Less)),
        BinaryOp::LessEqual => Ok(Value::Bool(compare(left, right) != Ordering::Greater)),
        BinaryOp::Greater => Ok(Value::Bool(compare(left, right) == Ordering::Greater)),
        BinaryOp::GreaterEqual => Ok(Value::Bool(compare(left, right) != Ordering::Less)),
        BinaryOp::Concat => Ok(Value::String(display(left) + &display(right))),
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => arithmetic(op, left, right),
    }
}

fn loose_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == truthy(other),
        (Value::Null, other) | (other, Value::Null) => !truthy(other),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (to_number(left), to_number(right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Ordering {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        if a.trim().parse::<f64>().is_err() || b.trim().parse::<f64>().is_err() {
            return a.cmp(b);
        }
    }
    match (to_number(left), to_number(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => display(left).cmp(&display(right)),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    let type_error = |value: &Value| {
        ScriptError::Type(format!(
            "unsupported operand {} for arithmetic",
            type_name(value)
        ))
    };
    let a = to_number(left).ok_or_else(|| type_error(left))?;
    let b = to_number(right).ok_or_else(|| type_error(right))?;

    if matches!(op, BinaryOp::Divide | BinaryOp::Modulo) && b == 0.0 {
        return Err(ScriptError::DivisionByZero);
    }

    if let (Some(x), Some(y)) = (to_integer(left), to_integer(right)) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Subtract => x.checked_sub(y),
            BinaryOp::Multiply => x.checked_mul(y),
            BinaryOp::Divide if x.checked_rem(y) == Some(0) => x.checked_div(y),
            BinaryOp::Modulo => x.checked_rem(y),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }

    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        _ => return Err(ScriptError::Type(format!("{:?} is not arithmetic", op))),
    };
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| ScriptError::Type("arithmetic result is not a finite number".into()))
}
