//! # quill
//!
//! A compiler for view templates.
//!
//! Templates mix literal text with four configurable kinds of constructs (sanitized tags,
//! unsanitized tags, directives and comments) plus fixed host-code blocks. Compiling a view runs
//! it through the lexer, the parser and the transpiler, and the compiled output is cached by a
//! fingerprint of the view.
//!
//! File Layout
//!
//! The layout follows the pipeline stages:
//! src/quill
//!   ├── view.rs         Views, variables and delimiter configuration
//!   ├── lexing          Scanning source text into tokens (and rewriting function calls)
//!   ├── parsing         Building the arena AST from tokens
//!   ├── script          The small expression/statement language used inside constructs
//!   ├── transpiling     Code generation, registries and the inheritance runtime
//!   ├── factory.rs      Loading the views named by `extends` and `include`
//!   ├── caching.rs      Compiled output caches
//!   ├── config.rs       Layered TOML configuration
//!   ├── formats.rs      Treeviz dump of the AST
//!   └── compiler.rs     The façade that ties the stages and the cache together

pub mod quill;
