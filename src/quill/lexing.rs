//! Lexer
//!
//!     Scans template text into a flat stream of [`Token`]s in one left-to-right pass.
//!
//! Scanning
//!
//!     At every position the open markers of all constructs are tried longest first, so with the
//!     default delimiters `{{!` is recognised before `{{`. Text that opens nothing accumulates in
//!     a buffer that is flushed as one `ExpressionText` token when the next construct opens.
//!
//!     Construct bodies are scanned up to the close marker. Tag, directive and host-code bodies
//!     are expressions: quoted strings are skipped as units and `(`/`[` nesting is tracked, so a
//!     close marker only counts at depth zero. Comment bodies end at the first close marker.
//!
//! Escaping
//!
//!     A backslash right before an open marker emits the marker as literal text. A doubled
//!     backslash emits one literal backslash and the construct is lexed normally.
//!
//! Lines
//!
//!     Every consumed newline advances the line counter, including those inside bodies. Leading
//!     and trailing blank lines are trimmed before scanning but still count toward line numbers.

pub mod calls;

use crate::quill::error::LexError;
use crate::quill::script::natives;
use crate::quill::token::{Construct, Token, TokenKind};
use crate::quill::view::{Delimiters, View, HOST_CODE_CLOSE, HOST_CODE_OPEN};
use std::collections::HashSet;

pub use calls::rewrite_calls;

/// Name of the explicit view-function invocation bare calls are rewritten to.
pub const VIEW_FUNCTION_CALL: &str = "__view_fn";

#[derive(Debug, Clone)]
struct Marker {
    construct: Construct,
    open: String,
    close: String,
}

/// Template lexer for one delimiter configuration.
#[derive(Debug, Clone)]
pub struct Lexer {
    /// Sorted by open marker length, longest first.
    markers: Vec<Marker>,
    passthrough: HashSet<String>,
}

impl Lexer {
    pub fn new(delimiters: &Delimiters) -> Result<Self, LexError> {
        let mut markers = Vec::new();
        for (kind, open, close) in delimiters.iter() {
            if open.is_empty() || close.is_empty() {
                return Err(LexError::InvalidDelimiters(format!(
                    "{} delimiters must not be empty",
                    kind
                )));
            }
            markers.push(Marker {
                construct: kind.into(),
                open: open.to_string(),
                close: close.to_string(),
            });
        }
        markers.push(Marker {
            construct: Construct::HostCode,
            open: HOST_CODE_OPEN.to_string(),
            close: HOST_CODE_CLOSE.to_string(),
        });

        for (i, a) in markers.iter().enumerate() {
            if let Some(b) = markers[i + 1..].iter().find(|b| b.open == a.open) {
                return Err(LexError::InvalidDelimiters(format!(
                    "{} and {} share the open marker '{}'",
                    a.construct, b.construct, a.open
                )));
            }
        }
        markers.sort_by(|a, b| b.open.len().cmp(&a.open.len()));

        Ok(Lexer {
            markers,
            passthrough: natives::names().into_iter().map(String::from).collect(),
        })
    }

    /// A lexer for the delimiters configured on `view`.
    pub fn for_view(view: &View) -> Result<Self, LexError> {
        Self::new(view.delimiters())
    }

    /// Add names that the call rewriter must leave alone.
    pub fn with_passthrough<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.passthrough.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn passthrough(&self) -> &HashSet<String> {
        &self.passthrough
    }

    pub fn lex(&self, source: &str) -> Result<Vec<Token>, LexError> {
        let (body, skipped) = trim_blank_lines(source);
        let tokens = Scanner::new(self, body, 1 + skipped).run()?;
        tracing::trace!(tokens = tokens.len(), "lexed template");
        Ok(tokens)
    }

    fn match_open(&self, rest: &str) -> Option<&Marker> {
        self.markers
            .iter()
            .find(|marker| rest.starts_with(marker.open.as_str()))
    }
}

/// Trim leading and trailing whitespace-only lines.
///
/// Returns the remaining text and how many leading lines were dropped.
pub fn trim_blank_lines(source: &str) -> (&str, usize) {
    let mut start = 0;
    let mut skipped = 0;
    for line in source.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
        skipped += 1;
    }

    let rest = &source[start..];
    match rest.rfind(|c: char| !c.is_whitespace()) {
        Some(last) => {
            let end = rest[last..].find('\n').map_or(rest.len(), |n| last + n);
            let kept = &rest[..end];
            (kept.strip_suffix('\r').unwrap_or(kept), skipped)
        }
        None => ("", skipped),
    }
}

struct Scanner<'a> {
    lexer: &'a Lexer,
    source: &'a str,
    pos: usize,
    line: usize,
    buffer: String,
    buffer_line: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn new(lexer: &'a Lexer, source: &'a str, line: usize) -> Self {
        Scanner {
            lexer,
            source,
            pos: 0,
            line,
            buffer: String::new(),
            buffer_line: line,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let lexer = self.lexer;
        let source = self.source;
        while self.pos < source.len() {
            let rest = &source[self.pos..];
            if let Some(after) = rest.strip_prefix('\\') {
                if let Some(escaped) = after.strip_prefix('\\') {
                    if lexer.match_open(escaped).is_some() {
                        self.push_text("\\");
                        self.pos += 2;
                        continue;
                    }
                }
                if let Some(marker) = lexer.match_open(after) {
                    self.push_text(&marker.open);
                    self.pos += 1 + marker.open.len();
                    continue;
                }
            }

            if let Some(marker) = lexer.match_open(rest) {
                self.construct(marker)?;
                continue;
            }

            let c = match rest.chars().next() {
                Some(c) => c,
                None => break,
            };
            let mut encoded = [0u8; 4];
            self.push_text(c.encode_utf8(&mut encoded));
            self.pos += c.len_utf8();
        }
        self.flush();
        Ok(self.tokens)
    }

    fn push_text(&mut self, text: &str) {
        if self.buffer.is_empty() {
            self.buffer_line = self.line;
        }
        self.buffer.push_str(text);
        self.line += text.matches('\n').count();
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let text = std::mem::take(&mut self.buffer);
            self.tokens
                .push(Token::new(TokenKind::ExpressionText, text, self.buffer_line));
        }
    }

    fn emit(&mut self, kind: TokenKind, text: impl Into<String>, line: usize) {
        self.tokens.push(Token::new(kind, text, line));
    }

    fn construct(&mut self, marker: &'a Marker) -> Result<(), LexError> {
        self.flush();
        let start_line = self.line;
        self.emit(marker.construct.open_kind(), marker.open.as_str(), start_line);
        self.pos += marker.open.len();

        match marker.construct {
            Construct::Directive => return self.directive(marker, start_line),
            Construct::Comment => {
                let body_line = self.line;
                let body = self.comment_body(marker, start_line)?;
                let text = rewrite_calls(body.trim(), &self.lexer.passthrough);
                self.emit(TokenKind::ExpressionText, text, body_line);
            }
            _ => {
                let body_line = self.line;
                let body = self.expression_body(marker, start_line)?;
                let text = rewrite_calls(body.trim(), &self.lexer.passthrough);
                self.emit(TokenKind::ExpressionText, text, body_line);
            }
        }
        self.emit(marker.construct.close_kind(), marker.close.as_str(), self.line);
        Ok(())
    }

    fn directive(&mut self, marker: &'a Marker, start_line: usize) -> Result<(), LexError> {
        self.skip_whitespace();
        if self.pos >= self.source.len() {
            return Err(LexError::Unterminated {
                construct: Construct::Directive,
                line: start_line,
            });
        }

        let source = self.source;
        let rest = &source[self.pos..];
        let name_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if name_len == 0 {
            return Err(LexError::MissingDirectiveName { line: start_line });
        }
        let name = &rest[..name_len];
        self.emit(TokenKind::DirectiveName, name, self.line);
        self.pos += name_len;

        let body_line = self.line;
        let body = self.expression_body(marker, start_line)?;
        let body = body.trim();
        if !body.is_empty() {
            let text = rewrite_calls(body, &self.lexer.passthrough);
            self.emit(TokenKind::ExpressionText, text, body_line);
        }
        self.emit(TokenKind::DirectiveClose, marker.close.as_str(), self.line);
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        let source = self.source;
        let rest = &source[self.pos..];
        let trimmed = rest.trim_start();
        let skipped = &rest[..rest.len() - trimmed.len()];
        self.line += skipped.matches('\n').count();
        self.pos += skipped.len();
    }

    /// Scan an expression body, consuming its close marker.
    fn expression_body(&mut self, marker: &Marker, start_line: usize) -> Result<&'a str, LexError> {
        let source = self.source;
        let start = self.pos;
        let mut stack: Vec<char> = Vec::new();

        loop {
            let rest = &source[self.pos..];
            if stack.is_empty() && rest.starts_with(marker.close.as_str()) {
                let body = &source[start..self.pos];
                self.pos += marker.close.len();
                return Ok(body);
            }
            let c = match rest.chars().next() {
                Some(c) => c,
                None => {
                    return Err(LexError::Unterminated {
                        construct: marker.construct,
                        line: start_line,
                    })
                }
            };
            match c {
                '"' | '\'' => {
                    self.skip_string(c);
                    continue;
                }
                '(' | '[' => stack.push(c),
                ')' | ']' => {
                    let expected = if c == ')' { '(' } else { '[' };
                    if stack.pop() != Some(expected) {
                        return Err(LexError::UnbalancedBracket {
                            construct: marker.construct,
                            bracket: c,
                            line: self.line,
                        });
                    }
                }
                '\n' => self.line += 1,
                _ => {}
            }
            self.pos += c.len_utf8();
        }
    }

    /// Skip a quoted string starting at the current position. An unterminated string runs to
    /// the end of input.
    fn skip_string(&mut self, quote: char) {
        let source = self.source;
        let mut chars = source[self.pos..].char_indices().skip(1);
        let mut end = source.len();
        while let Some((offset, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, '\n')) = chars.next() {
                        self.line += 1;
                    }
                }
                '\n' => self.line += 1,
                c if c == quote => {
                    end = self.pos + offset + c.len_utf8();
                    break;
                }
                _ => {}
            }
        }
        self.pos = end;
    }

    /// Scan a comment body up to the first close marker, consuming it.
    fn comment_body(&mut self, marker: &Marker, start_line: usize) -> Result<&'a str, LexError> {
        let source = self.source;
        let rest = &source[self.pos..];
        match rest.find(marker.close.as_str()) {
            Some(offset) => {
                let body = &rest[..offset];
                self.line += body.matches('\n').count();
                self.pos += offset + marker.close.len();
                Ok(body)
            }
            None => Err(LexError::Unterminated {
                construct: marker.construct,
                line: start_line,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quill::view::DelimiterKind;

    fn lex(source: &str) -> Result<Vec<Token>, LexError> {
        Lexer::new(&Delimiters::default())?.lex(source)
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|token| token.kind).collect()
    }

    #[test]
    fn test_plain_text() {
        let tokens = lex("hello world").unwrap();
        assert_eq!(tokens, vec![Token::new(TokenKind::ExpressionText, "hello world", 1)]);
    }

    #[test]
    fn test_sanitized_tag() {
        let tokens = lex("Hi {{ $name }}!").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::ExpressionText,
                TokenKind::SanitizedTagOpen,
                TokenKind::ExpressionText,
                TokenKind::SanitizedTagClose,
                TokenKind::ExpressionText,
            ]
        );
        assert_eq!(tokens[2].text, "$name");
    }

    #[test]
    fn test_longest_open_marker_wins() {
        let tokens = lex("{{! $html !}}").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::UnsanitizedTagOpen,
                TokenKind::ExpressionText,
                TokenKind::UnsanitizedTagClose,
            ]
        );
        assert_eq!(tokens[1].text, "$html");
    }

    #[test]
    fn test_directive_with_nested_calls() {
        let tokens = lex(r#"<% show(foo(bar("baz"))) %>"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::DirectiveOpen, "<%", 1),
                Token::new(TokenKind::DirectiveName, "show", 1),
                Token::new(
                    TokenKind::ExpressionText,
                    r#"(__view_fn("foo", __view_fn("bar", "baz")))"#,
                    1
                ),
                Token::new(TokenKind::DirectiveClose, "%>", 1),
            ]
        );
    }

    #[test]
    fn test_directive_without_expression() {
        let tokens = lex("<% endif %>").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::DirectiveOpen,
                TokenKind::DirectiveName,
                TokenKind::DirectiveClose,
            ]
        );
    }

    #[test]
    fn test_unmatched_close_paren() {
        assert!(matches!(
            lex(r#"<% show(foo(bar("baz")))) %>"#),
            Err(LexError::UnbalancedBracket { bracket: ')', .. })
        ));
    }

    #[test]
    fn test_close_marker_inside_string() {
        let tokens = lex(r#"{{ "a }} b" }}"#).unwrap();
        assert_eq!(tokens[1].text, r#""a }} b""#);
    }

    #[test]
    fn test_escaped_open_marker() {
        let tokens = lex(r"\{{foo}}").unwrap();
        assert_eq!(tokens, vec![Token::new(TokenKind::ExpressionText, "{{foo}}", 1)]);
    }

    #[test]
    fn test_double_backslash_before_open_marker() {
        let tokens = lex(r"\\{{ $foo }}").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::ExpressionText,
                TokenKind::SanitizedTagOpen,
                TokenKind::ExpressionText,
                TokenKind::SanitizedTagClose,
            ]
        );
        assert_eq!(tokens[0].text, "\\");
    }

    #[test]
    fn test_backslash_elsewhere_is_literal() {
        let tokens = lex(r"C:\path").unwrap();
        assert_eq!(tokens[0].text, r"C:\path");
    }

    #[test]
    fn test_unterminated_construct_reports_start_line() {
        assert_eq!(
            lex("a\nb\n{{ $x"),
            Err(LexError::Unterminated {
                construct: Construct::SanitizedTag,
                line: 3
            })
        );
        assert_eq!(
            lex("<?host echo 1;"),
            Err(LexError::Unterminated {
                construct: Construct::HostCode,
                line: 1
            })
        );
    }

    #[test]
    fn test_line_numbers_span_constructs() {
        let tokens = lex("{#\nmulti\nline\n#}\n{{ $a }}").unwrap();
        let open = tokens
            .iter()
            .find(|token| token.kind == TokenKind::SanitizedTagOpen)
            .unwrap();
        assert_eq!(open.line, 5);
    }

    #[test]
    fn test_leading_blank_lines_still_count() {
        let tokens = lex("\n  \n{{ $a }}\n\n").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::SanitizedTagOpen);
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::SanitizedTagClose);
    }

    #[test]
    fn test_comment_is_plain_text_body() {
        let tokens = lex("{# don't (panic #}").unwrap();
        assert_eq!(tokens[1].text, "don't (panic");
    }

    #[test]
    fn test_host_code_block() {
        let tokens = lex("<?host $x = 1; ?>").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::HostCodeOpen,
                TokenKind::ExpressionText,
                TokenKind::HostCodeClose,
            ]
        );
        assert_eq!(tokens[1].text, "$x = 1;");
    }

    #[test]
    fn test_missing_directive_name() {
        assert_eq!(
            lex("<% (1) %>"),
            Err(LexError::MissingDirectiveName { line: 1 })
        );
    }

    #[test]
    fn test_custom_delimiters() {
        let mut delimiters = Delimiters::default();
        delimiters.set(DelimiterKind::SanitizedTag, "^^", "$$");
        let tokens = Lexer::new(&delimiters).unwrap().lex("{{x}} ^^ $a $$").unwrap();
        assert_eq!(tokens[0].text, "{{x}} ");
        assert_eq!(tokens[2].text, "$a");
    }

    #[test]
    fn test_duplicate_open_markers_are_rejected() {
        let mut delimiters = Delimiters::default();
        delimiters.set(DelimiterKind::Comment, "<%", "%>");
        assert!(matches!(
            Lexer::new(&delimiters),
            Err(LexError::InvalidDelimiters(_))
        ));
    }

    #[test]
    fn test_trim_blank_lines() {
        assert_eq!(trim_blank_lines("\n\n  a\n b \n \n"), ("  a\n b ", 2));
        assert_eq!(trim_blank_lines("   \n\t\n"), ("", 2));
        assert_eq!(trim_blank_lines("x"), ("x", 0));
    }
}
