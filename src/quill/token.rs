//! Template tokens
//!
//! The lexer produces a flat stream of [`Token`]s in source order. Every construct is bracketed
//! by an open and a close token; the text between them (and the literal text between
//! constructs) is carried by `ExpressionText` tokens. Directives additionally carry a
//! `DirectiveName` token right after their open token.

use crate::quill::view::DelimiterKind;
use std::fmt;

/// All token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    DirectiveOpen,
    DirectiveName,
    DirectiveClose,
    ExpressionText,
    SanitizedTagOpen,
    SanitizedTagClose,
    UnsanitizedTagOpen,
    UnsanitizedTagClose,
    CommentOpen,
    CommentClose,
    HostCodeOpen,
    HostCodeClose,
}

impl TokenKind {
    /// The construct this token opens or closes, if any.
    pub fn construct(self) -> Option<Construct> {
        match self {
            TokenKind::DirectiveOpen | TokenKind::DirectiveName | TokenKind::DirectiveClose => {
                Some(Construct::Directive)
            }
            TokenKind::SanitizedTagOpen | TokenKind::SanitizedTagClose => {
                Some(Construct::SanitizedTag)
            }
            TokenKind::UnsanitizedTagOpen | TokenKind::UnsanitizedTagClose => {
                Some(Construct::UnsanitizedTag)
            }
            TokenKind::CommentOpen | TokenKind::CommentClose => Some(Construct::Comment),
            TokenKind::HostCodeOpen | TokenKind::HostCodeClose => Some(Construct::HostCode),
            TokenKind::ExpressionText => None,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(
            self,
            TokenKind::DirectiveOpen
                | TokenKind::SanitizedTagOpen
                | TokenKind::UnsanitizedTagOpen
                | TokenKind::CommentOpen
                | TokenKind::HostCodeOpen
        )
    }

    pub fn is_close(self) -> bool {
        matches!(
            self,
            TokenKind::DirectiveClose
                | TokenKind::SanitizedTagClose
                | TokenKind::UnsanitizedTagClose
                | TokenKind::CommentClose
                | TokenKind::HostCodeClose
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::DirectiveOpen => "DirectiveOpen",
            TokenKind::DirectiveName => "DirectiveName",
            TokenKind::DirectiveClose => "DirectiveClose",
            TokenKind::ExpressionText => "ExpressionText",
            TokenKind::SanitizedTagOpen => "SanitizedTagOpen",
            TokenKind::SanitizedTagClose => "SanitizedTagClose",
            TokenKind::UnsanitizedTagOpen => "UnsanitizedTagOpen",
            TokenKind::UnsanitizedTagClose => "UnsanitizedTagClose",
            TokenKind::CommentOpen => "CommentOpen",
            TokenKind::CommentClose => "CommentClose",
            TokenKind::HostCodeOpen => "HostCodeOpen",
            TokenKind::HostCodeClose => "HostCodeClose",
        };
        f.write_str(name)
    }
}

/// A single lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based line the token starts on.
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
        }
    }
}

/// The bracketed constructs a template can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    SanitizedTag,
    UnsanitizedTag,
    Directive,
    Comment,
    HostCode,
}

impl Construct {
    pub fn open_kind(self) -> TokenKind {
        match self {
            Construct::SanitizedTag => TokenKind::SanitizedTagOpen,
            Construct::UnsanitizedTag => TokenKind::UnsanitizedTagOpen,
            Construct::Directive => TokenKind::DirectiveOpen,
            Construct::Comment => TokenKind::CommentOpen,
            Construct::HostCode => TokenKind::HostCodeOpen,
        }
    }

    pub fn close_kind(self) -> TokenKind {
        match self {
            Construct::SanitizedTag => TokenKind::SanitizedTagClose,
            Construct::UnsanitizedTag => TokenKind::UnsanitizedTagClose,
            Construct::Directive => TokenKind::DirectiveClose,
            Construct::Comment => TokenKind::CommentClose,
            Construct::HostCode => TokenKind::HostCodeClose,
        }
    }
}

impl From<DelimiterKind> for Construct {
    fn from(kind: DelimiterKind) -> Self {
        match kind {
            DelimiterKind::SanitizedTag => Construct::SanitizedTag,
            DelimiterKind::UnsanitizedTag => Construct::UnsanitizedTag,
            DelimiterKind::Directive => Construct::Directive,
            DelimiterKind::Comment => Construct::Comment,
        }
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Construct::HostCode => f.write_str("host-code block"),
            Construct::SanitizedTag => DelimiterKind::SanitizedTag.fmt(f),
            Construct::UnsanitizedTag => DelimiterKind::UnsanitizedTag.fmt(f),
            Construct::Directive => DelimiterKind::Directive.fmt(f),
            Construct::Comment => DelimiterKind::Comment.fmt(f),
        }
    }
}
