//! Built-in directives
//!
//! Every generator receives the raw expression text of its directive, parenthesised as written
//! (`("foo")` for `<% show("foo") %>`, empty for `<% endif %>`), and returns the instructions
//! to emit.
//!
//!     extends(name)                 render `name` after this view and append its output
//!     include(name, vars?)          render `name` inline
//!     part(name) / endpart          capture output as a named part
//!     parent                        placeholder for the next-outer definition of the open part
//!     show(name?)                   output a resolved part
//!     if / elseif / else / endif
//!     foreach($list as [$k =>] $v) / endforeach
//!     for(init; condition; step) / endfor
//!     while(condition) / endwhile

use super::program::Instruction;
use super::registry::DirectiveRegistry;
use crate::quill::error::DirectiveError;
use crate::quill::script::{parse_arguments, parse_expression, parse_statements};
use once_cell::sync::Lazy;
use regex::Regex;

static FOREACH_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*(?P<subject>.+?)\s+as\s+(?:\$(?P<key>\w+)\s*=>\s*)?\$(?P<value>\w+)\s*$")
        .expect("foreach clause pattern is valid")
});

/// Register every built-in directive.
pub fn register_defaults(registry: &mut DirectiveRegistry) {
    registry.register("extends", |expr| {
        let name = required("extends", expr, "a view name")?;
        Ok(vec![Instruction::Extends(parse_expression(name)?)])
    });
    registry.register("include", include);
    registry.register("part", |expr| {
        let name = required("part", expr, "a part name")?;
        Ok(vec![Instruction::StartPart(parse_expression(name)?)])
    });
    registry.register("endpart", |expr| bare("endpart", expr, Instruction::EndPart));
    registry.register("parent", |expr| bare("parent", expr, Instruction::Parent));
    registry.register("show", |expr| {
        let name = strip_parens(expr);
        if name.is_empty() {
            Ok(vec![Instruction::Show(None)])
        } else {
            Ok(vec![Instruction::Show(Some(parse_expression(name)?))])
        }
    });

    registry.register("if", |expr| {
        let condition = required("if", expr, "a condition")?;
        Ok(vec![Instruction::If(parse_expression(condition)?)])
    });
    registry.register("elseif", |expr| {
        let condition = required("elseif", expr, "a condition")?;
        Ok(vec![Instruction::ElseIf(parse_expression(condition)?)])
    });
    registry.register("else", |expr| bare("else", expr, Instruction::Else));
    registry.register("endif", |expr| bare("endif", expr, Instruction::EndIf));

    registry.register("foreach", foreach);
    registry.register("endforeach", |expr| {
        bare("endforeach", expr, Instruction::EndForEach)
    });
    registry.register("for", for_loop);
    registry.register("endfor", |expr| bare("endfor", expr, Instruction::EndFor));
    registry.register("while", |expr| {
        let condition = required("while", expr, "a condition")?;
        Ok(vec![Instruction::While(parse_expression(condition)?)])
    });
    registry.register("endwhile", |expr| bare("endwhile", expr, Instruction::EndWhile));
}

fn include(expr: &str) -> Result<Vec<Instruction>, DirectiveError> {
    let expected = "a view name and an optional map of variables";
    let args = parse_arguments(required("include", expr, expected)?)?;
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(name), vars, None) => Ok(vec![Instruction::Include { name, vars }]),
        _ => Err(invalid("include", expected)),
    }
}

fn foreach(expr: &str) -> Result<Vec<Instruction>, DirectiveError> {
    let expected = "`$items as $item` or `$items as $key => $item`";
    let clause = required("foreach", expr, expected)?;
    let captures = FOREACH_CLAUSE
        .captures(clause)
        .ok_or_else(|| invalid("foreach", expected))?;
    let subject = parse_expression(&captures["subject"])?;
    Ok(vec![Instruction::ForEach {
        subject,
        key: captures.name("key").map(|key| key.as_str().to_string()),
        value: captures["value"].to_string(),
    }])
}

fn for_loop(expr: &str) -> Result<Vec<Instruction>, DirectiveError> {
    let expected = "`init; condition; step`";
    let clauses = split_top_level(required("for", expr, expected)?, ';');
    let [init, condition, step] = clauses.as_slice() else {
        return Err(invalid("for", expected));
    };
    let condition = condition.trim();
    Ok(vec![Instruction::For {
        init: parse_statements(init)?,
        condition: if condition.is_empty() {
            None
        } else {
            Some(parse_expression(condition)?)
        },
        step: parse_statements(step)?,
    }])
}

fn invalid(directive: &str, expected: &str) -> DirectiveError {
    DirectiveError::InvalidExpression {
        directive: directive.to_string(),
        expected: expected.to_string(),
    }
}

/// The unwrapped expression, which must not be empty.
fn required<'e>(directive: &str, expr: &'e str, expected: &str) -> Result<&'e str, DirectiveError> {
    let inner = strip_parens(expr);
    if inner.is_empty() {
        Err(invalid(directive, expected))
    } else {
        Ok(inner)
    }
}

/// A directive that takes no expression.
fn bare(
    directive: &str,
    expr: &str,
    instruction: Instruction,
) -> Result<Vec<Instruction>, DirectiveError> {
    if strip_parens(expr).is_empty() {
        Ok(vec![instruction])
    } else {
        Err(invalid(directive, "no expression"))
    }
}

/// Remove one pair of parentheses wrapping the whole expression.
pub fn strip_parens(expr: &str) -> &str {
    let trimmed = expr.trim();
    if !trimmed.starts_with('(') {
        return trimmed;
    }
    match closing_paren(trimmed) {
        Some(close) if close == trimmed.len() - 1 => trimmed[1..close].trim(),
        _ => trimmed,
    }
}

/// Byte offset of the paren closing the one at offset 0.
fn closing_paren(source: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, c) in source.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `separator` outside of strings and brackets.
pub fn split_top_level(source: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (offset, c) in source.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(&source[start..offset]);
                start = offset + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}
