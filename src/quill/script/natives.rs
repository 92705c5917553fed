//! Native functions
//!
//! Plain functions callable from script without going through the view-function registry.
//! Their names make up the default passthrough set of the lexer's call rewriter, so
//! `count($items)` stays a native call while `page_title("Home")` becomes a view-function call.

use super::eval::{display, truthy};
use crate::quill::error::ScriptError;
use crate::quill::sanitizer::escape_html;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

pub type NativeFn = fn(&[Value]) -> Result<Value, ScriptError>;

static NATIVES: Lazy<HashMap<&'static str, NativeFn>> = Lazy::new(|| {
    let mut natives: HashMap<&'static str, NativeFn> = HashMap::new();
    natives.insert("count", count);
    natives.insert("strlen", strlen);
    natives.insert("strtoupper", strtoupper);
    natives.insert("strtolower", strtolower);
    natives.insert("ucfirst", ucfirst);
    natives.insert("trim", trim);
    natives.insert("implode", implode);
    natives.insert("json_encode", json_encode);
    natives.insert("empty", empty);
    natives.insert("is_null", is_null);
    natives.insert("in_array", in_array);
    natives.insert("htmlspecialchars", htmlspecialchars);
    natives.insert("range", range);
    natives.insert("str_repeat", str_repeat);
    natives.insert("array_keys", array_keys);
    natives
});

/// Look up a native function by name.
pub fn lookup(name: &str) -> Option<NativeFn> {
    NATIVES.get(name).copied()
}

/// Names of all native functions, sorted.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = NATIVES.keys().copied().collect();
    names.sort_unstable();
    names
}

fn arg<'a>(function: &str, args: &'a [Value], index: usize) -> Result<&'a Value, ScriptError> {
    args.get(index).ok_or_else(|| ScriptError::InvalidArgument {
        function: function.to_string(),
        message: format!("missing argument {}", index + 1),
    })
}

fn count(args: &[Value]) -> Result<Value, ScriptError> {
    match arg("count", args, 0)? {
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(map) => Ok(Value::from(map.len())),
        other => Err(ScriptError::InvalidArgument {
            function: "count".into(),
            message: format!("expected an array, got {}", other),
        }),
    }
}

fn strlen(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::from(display(arg("strlen", args, 0)?).chars().count()))
}

fn strtoupper(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::from(display(arg("strtoupper", args, 0)?).to_uppercase()))
}

fn strtolower(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::from(display(arg("strtolower", args, 0)?).to_lowercase()))
}

fn ucfirst(args: &[Value]) -> Result<Value, ScriptError> {
    let text = display(arg("ucfirst", args, 0)?);
    let mut chars = text.chars();
    let result: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    Ok(Value::from(result))
}

fn trim(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::from(display(arg("trim", args, 0)?).trim()))
}

fn implode(args: &[Value]) -> Result<Value, ScriptError> {
    let separator = display(arg("implode", args, 0)?);
    let pieces: Vec<String> = match arg("implode", args, 1)? {
        Value::Array(items) => items.iter().map(display).collect(),
        Value::Object(map) => map.values().map(display).collect(),
        other => {
            return Err(ScriptError::InvalidArgument {
                function: "implode".into(),
                message: format!("expected an array, got {}", other),
            })
        }
    };
    Ok(Value::from(pieces.join(&separator)))
}

fn json_encode(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::from(arg("json_encode", args, 0)?.to_string()))
}

fn empty(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::from(!truthy(arg("empty", args, 0)?)))
}

fn is_null(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::from(arg("is_null", args, 0)?.is_null()))
}

fn in_array(args: &[Value]) -> Result<Value, ScriptError> {
    let needle = arg("in_array", args, 0)?;
    let found = match arg("in_array", args, 1)? {
        Value::Array(items) => items.iter().any(|item| item == needle),
        Value::Object(map) => map.values().any(|item| item == needle),
        _ => false,
    };
    Ok(Value::from(found))
}

fn htmlspecialchars(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::from(escape_html(&display(arg(
        "htmlspecialchars",
        args,
        0,
    )?))))
}

fn integer(function: &str, value: &Value) -> Result<i64, ScriptError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| ScriptError::InvalidArgument {
                function: function.to_string(),
                message: format!("{} is out of range", n),
            }),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ScriptError::InvalidArgument {
                function: function.to_string(),
                message: format!("expected an integer, got \"{}\"", s),
            }),
        other => Err(ScriptError::InvalidArgument {
            function: function.to_string(),
            message: format!("expected an integer, got {}", other),
        }),
    }
}

/// Largest number of items `range` may produce.
pub const MAX_RANGE_ITEMS: u64 = 1_000_000;

/// Largest string, in bytes, `str_repeat` may produce.
pub const MAX_REPEAT_BYTES: usize = 16 * 1024 * 1024;

fn range(args: &[Value]) -> Result<Value, ScriptError> {
    let start = integer("range", arg("range", args, 0)?)?;
    let end = integer("range", arg("range", args, 1)?)?;
    let (low, high) = if start <= end { (start, end) } else { (end, start) };
    let span = (high as i128 - low as i128) as u128 + 1;
    if span > MAX_RANGE_ITEMS as u128 {
        return Err(ScriptError::InvalidArgument {
            function: "range".into(),
            message: format!("range of {} items exceeds the limit of {}", span, MAX_RANGE_ITEMS),
        });
    }
    let items: Vec<Value> = if start <= end {
        (start..=end).map(Value::from).collect()
    } else {
        (end..=start).rev().map(Value::from).collect()
    };
    Ok(Value::Array(items))
}

fn str_repeat(args: &[Value]) -> Result<Value, ScriptError> {
    let text = display(arg("str_repeat", args, 0)?);
    let times = integer("str_repeat", arg("str_repeat", args, 1)?)?;
    let times = usize::try_from(times).map_err(|_| ScriptError::InvalidArgument {
        function: "str_repeat".into(),
        message: "repeat count must not be negative".into(),
    })?;
    match text.len().checked_mul(times) {
        Some(len) if len <= MAX_REPEAT_BYTES => Ok(Value::from(text.repeat(times))),
        _ => Err(ScriptError::InvalidArgument {
            function: "str_repeat".into(),
            message: format!("result exceeds the limit of {} bytes", MAX_REPEAT_BYTES),
        }),
    }
}

fn array_keys(args: &[Value]) -> Result<Value, ScriptError> {
    match arg("array_keys", args, 0)? {
        Value::Array(items) => Ok(Value::Array((0..items.len()).map(Value::from).collect())),
        Value::Object(map) => Ok(Value::Array(
            map.keys().map(|key| Value::from(key.as_str())).collect(),
        )),
        other => Err(ScriptError::InvalidArgument {
            function: "array_keys".into(),
            message: format!("expected an array, got {}", other),
        }),
    }
}
