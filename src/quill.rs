//! Template compiler
//!
//! A view goes through these stages:
//!
//! 1. Lexing: the raw contents are scanned into [`Token`]s. Delimiters are configured per
//!    view; bare function calls inside constructs are rewritten into view-function calls.
//! 2. Parsing: tokens become an [`Ast`], an arena of typed nodes.
//! 3. Transpiling: the AST is lowered into a [`Program`] (directives are resolved through the
//!    [`DirectiveRegistry`]), and the program is executed by a per-compile runtime that owns
//!    the part buffers and resolves `extends`/`include`.
//! 4. Caching: the [`Compiler`] stores the output keyed by the view fingerprint.
//!
//! ```text
//! use std::sync::Arc;
//! use quill::quill::{Compiler, MemoryViewFactory, Transpiler, View};
//!
//! let factory = Arc::new(MemoryViewFactory::new());
//! let compiler = Compiler::without_cache(Arc::new(Transpiler::new(factory)));
//! let view = View::new("hello", "Hello, {{ $name }}!").with_var("name", "Dave");
//! assert_eq!(compiler.compile(&view).unwrap(), "Hello, Dave!");
//! ```

pub mod caching;
pub mod compiler;
pub mod config;
pub mod error;
pub mod factory;
pub mod formats;
pub mod lexing;
pub mod parsing;
pub mod sanitizer;
pub mod script;
pub mod token;
pub mod transpiling;
pub mod view;

pub use caching::{fingerprint, Cache, CacheStatistics, InMemoryCache, NullCache};
pub use compiler::{Compiler, ViewTranspiler};
pub use config::{Loader, QuillConfig};
pub use error::{
    DirectiveError, FactoryError, FunctionError, LexError, ParseError, ScriptError,
    TranspileError,
};
pub use factory::{MemoryViewFactory, ViewFactory};
pub use lexing::Lexer;
pub use parsing::{Ast, Node, NodeId, NodeKind, Parser};
pub use sanitizer::{HtmlSanitizer, Sanitizer};
pub use token::{Construct, Token, TokenKind};
pub use transpiling::{
    DirectiveRegistry, Instruction, Program, Transpiler, ViewFunctionRegistry,
};
pub use view::{DelimiterKind, Delimiters, Vars, View};
