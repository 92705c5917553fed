//! Script language
//!
//! The small language written inside tags, directive expressions and host-code blocks:
//! variables (`$name`), index and property access, literals, the usual operators, native
//! function calls and view-function calls. Host-code blocks and `for` clauses additionally
//! accept `;`-separated statements (assignments, `++`/`--`, `echo`).
//!
//! Values are [`serde_json::Value`]s, so variables passed to a view can be any JSON data.

pub mod ast;
pub mod eval;
pub mod natives;
pub mod parser;
pub mod tokens;

pub use ast::{AssignOp, BinaryOp, Expr, Stmt, UnaryOp};
pub use eval::{display, execute, truthy, Evaluator, ViewFunctions};
pub use parser::{parse_arguments, parse_expression, parse_statements};
pub use tokens::ScriptToken;
