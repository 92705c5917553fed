//! Function call rewriting
//!
//! Bare calls inside construct bodies are view functions unless they are natives (the
//! passthrough set). They are rewritten into the explicit invocation form before the body is
//! emitted, so `foo(bar("baz"))` becomes `__view_fn("foo", __view_fn("bar", "baz"))`.
//!
//! The rewrite works on token spans and copies everything between rewritten calls verbatim,
//! so whitespace, comments and text that does not tokenize survive untouched.

use super::VIEW_FUNCTION_CALL;
use crate::quill::script::tokens::{tokenize_with_spans, ScriptToken};
use std::collections::HashSet;

const KEYWORDS: &[&str] = &[
    "as", "echo", "else", "elseif", "false", "fn", "for", "foreach", "function", "if", "null",
    "return", "true", "while",
];

/// Rewrite every bare call in `source` that is not in `passthrough`.
pub fn rewrite_calls(source: &str, passthrough: &HashSet<String>) -> String {
    let tokens = tokenize_with_spans(source);
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;

    for (i, (token, span)) in tokens.iter().enumerate() {
        let ScriptToken::Ident(name) = token else {
            continue;
        };
        let Some((ScriptToken::OpenParen, paren)) = tokens.get(i + 1) else {
            continue;
        };
        if paren.start != span.end {
            continue;
        }
        let previous = i.checked_sub(1).and_then(|j| tokens.get(j)).map(|(t, _)| t);
        match previous {
            Some(ScriptToken::Arrow) | Some(ScriptToken::DoubleColon) => continue,
            Some(ScriptToken::Ident(word)) if word == "function" || word == "fn" => continue,
            _ => {}
        }
        if name == VIEW_FUNCTION_CALL
            || KEYWORDS.contains(&name.as_str())
            || passthrough.contains(name)
        {
            continue;
        }

        out.push_str(&source[copied..span.start]);
        out.push_str(VIEW_FUNCTION_CALL);
        out.push_str("(\"");
        out.push_str(name);
        out.push('"');
        copied = paren.end;

        if !matches!(tokens.get(i + 2), Some((ScriptToken::CloseParen, _))) {
            out.push_str(", ");
            let rest = &source[copied..];
            copied += rest.len() - rest.trim_start().len();
        }
    }

    out.push_str(&source[copied..]);
    out
}
