//! Escaping, delimiter configuration and call rewriting, end to end

use quill::quill::{
    Compiler, DelimiterKind, Delimiters, LexError, Lexer, MemoryViewFactory, TokenKind,
    TranspileError, Transpiler, View,
};
use rstest::rstest;
use std::sync::Arc;

fn compile(view: &View) -> Result<String, TranspileError> {
    let transpiler = Transpiler::new(Arc::new(MemoryViewFactory::new()));
    Compiler::without_cache(Arc::new(transpiler)).compile(view)
}

#[rstest]
#[case::sanitized_tag(r"\{{foo}}", "{{foo}}")]
#[case::unsanitized_tag(r"\{{!foo!}}", "{{!foo!}}")]
#[case::directive(r"\<%foo%>", "<%foo%>")]
#[case::comment(r"\{#foo#}", "{#foo#}")]
fn test_escaped_open_delimiter_is_literal(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(compile(&View::new("escaped", source)).unwrap(), expected);
}

#[rstest]
#[case::sanitized_tag(r"\\{{ $foo }}", r"\bar")]
#[case::unsanitized_tag(r"\\{{! $foo !}}", r"\bar")]
#[case::comment(r"\\{# $foo #}", r"\")]
#[case::directive(r"\\<% if(true) %>x<% endif %>", r"\x")]
fn test_escaped_backslash_keeps_construct(#[case] source: &str, #[case] expected: &str) {
    let view = View::new("escaped", source).with_var("foo", "bar");
    assert_eq!(compile(&view).unwrap(), expected);
}

#[rstest]
#[case(DelimiterKind::SanitizedTag, "[[", "]]", "[[ $x ]]", "&lt;i&gt;")]
#[case(DelimiterKind::UnsanitizedTag, "[[!", "!]]", "[[! $x !]]", "<i>")]
#[case(DelimiterKind::Directive, "[%", "%]", "[% if(true) %][[!! $x !!]][% endif %]", "[[!! $x !!]]")]
#[case(DelimiterKind::Comment, "/*", "*/", "a/* $x */b", "ab")]
fn test_custom_delimiters(
    #[case] kind: DelimiterKind,
    #[case] open: &str,
    #[case] close: &str,
    #[case] source: &str,
    #[case] expected: &str,
) {
    let mut view = View::new("custom", source).with_var("x", "<i>");
    view.set_delimiters(kind, open, close);
    assert_eq!(compile(&view).unwrap(), expected);
}

#[test]
fn test_text_without_constructs_round_trips() {
    let source = "\n\n  <p>Plain text</p>\n  <p>{ not a tag }</p>\n\n\n";
    assert_eq!(
        compile(&View::new("plain", source)).unwrap(),
        "  <p>Plain text</p>\n  <p>{ not a tag }</p>"
    );
}

#[test]
fn test_nested_calls_lex_as_one_expression() {
    let lexer = Lexer::new(&Delimiters::default()).unwrap();
    let tokens = lexer.lex(r#"<% show(foo(bar("baz"))) %>"#).unwrap();
    let kinds: Vec<_> = tokens.iter().map(|token| token.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::DirectiveOpen,
            TokenKind::DirectiveName,
            TokenKind::ExpressionText,
            TokenKind::DirectiveClose,
        ]
    );
    assert_eq!(
        tokens[2].text,
        r#"(__view_fn("foo", __view_fn("bar", "baz")))"#
    );
}

#[test]
fn test_unmatched_paren_is_a_lex_error() {
    let lexer = Lexer::new(&Delimiters::default()).unwrap();
    assert!(matches!(
        lexer.lex(r#"<% show(foo(bar("baz")))) %>"#),
        Err(LexError::UnbalancedBracket { .. })
    ));
}

#[test]
fn test_unterminated_construct_reports_start_line() {
    let result = compile(&View::new("broken", "one\ntwo {{ $x\nthree"));
    assert!(matches!(
        result,
        Err(TranspileError::Lex(LexError::Unterminated { line: 2, .. }))
    ));
}
