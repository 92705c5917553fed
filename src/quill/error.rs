//! Error types for every stage of the pipeline
//!
//! Each stage has its own enum. [`TranspileError`] wraps the earlier stages and is what
//! [`Compiler::compile`](crate::quill::Compiler::compile) returns.

use crate::quill::token::Construct;
use thiserror::Error;

/// Errors produced while scanning template text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated {construct} starting on line {line}")]
    Unterminated { construct: Construct, line: usize },

    #[error("unbalanced '{bracket}' in {construct} on line {line}")]
    UnbalancedBracket {
        construct: Construct,
        bracket: char,
        line: usize,
    },

    #[error("directive on line {line} has no name")]
    MissingDirectiveName { line: usize },

    #[error("invalid delimiters: {0}")]
    InvalidDelimiters(String),
}

/// Errors produced while building the AST from a token stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("'{token}' on line {line} closes nothing")]
    UnbalancedClose { token: String, line: usize },

    #[error("'{token}' on line {line} does not close the open {open}")]
    MismatchedClose {
        token: String,
        open: String,
        line: usize,
    },

    #[error("unexpected '{token}' on line {line}")]
    UnexpectedToken { token: String, line: usize },

    #[error("malformed {construct} on line {line}: {reason}")]
    Malformed {
        construct: String,
        line: usize,
        reason: String,
    },

    #[error("{construct} opened on line {line} is never closed")]
    Unclosed { construct: String, line: usize },
}

/// Errors raised by view functions themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
    #[error("view function '{0}' is not registered")]
    Unknown(String),

    #[error("view function '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

/// Errors in script source or while evaluating it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("undefined variable ${0}")]
    UndefinedVariable(String),

    #[error("undefined index {0}")]
    UndefinedIndex(String),

    #[error("call to undefined function {0}()")]
    UnknownNative(String),

    #[error("{function}(): {message}")]
    InvalidArgument { function: String, message: String },

    #[error("type error: {0}")]
    Type(String),

    #[error("method calls are not supported: ->{0}()")]
    MethodCall(String),

    #[error("cannot assign to {0}")]
    InvalidAssignment(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error(transparent)]
    Function(#[from] FunctionError),
}

/// Errors returned by directive generators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectiveError {
    #[error("{directive} expects {expected}")]
    InvalidExpression {
        directive: String,
        expected: String,
    },

    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Errors returned by view factories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("view '{0}' not found")]
    NotFound(String),

    #[error("could not load view '{name}': {message}")]
    Load { name: String, message: String },
}

/// Errors produced while transpiling a view (and everything it pulls in).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranspileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no transpiler registered for directive '{name}' (line {line})")]
    UnknownDirective { name: String, line: usize },

    #[error("directive '{name}' on line {line}: {source}")]
    Directive {
        name: String,
        line: usize,
        #[source]
        source: DirectiveError,
    },

    #[error("invalid expression on line {line}: {source}")]
    Expression {
        line: usize,
        #[source]
        source: ScriptError,
    },

    #[error("'{found}' on line {line}: {reason}")]
    UnbalancedBlock {
        found: String,
        line: usize,
        reason: String,
    },

    #[error("'{directive}' opened on line {line} is never closed")]
    UnclosedBlock { directive: String, line: usize },

    #[error("line {line}: {source}")]
    Runtime {
        line: usize,
        #[source]
        source: ScriptError,
    },

    #[error("view function '{name}' is not registered (line {line})")]
    UnknownFunction { name: String, line: usize },

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error("view '{name}' already extends '{parent}' (line {line})")]
    MultipleParents {
        name: String,
        parent: String,
        line: usize,
    },

    #[error("'{directive}' on line {line} has no open part")]
    NoOpenPart { directive: String, line: usize },

    #[error("part '{name}' opened on line {line} is never ended")]
    UnclosedPart { name: String, line: usize },

    #[error("inheritance cycle: {}", chain.join(" -> "))]
    InheritanceCycle { chain: Vec<String> },

    #[error("views nest deeper than {max_depth} levels")]
    DepthExceeded { max_depth: usize },
}

impl TranspileError {
    /// Attach a line to a script error raised while running a view.
    ///
    /// Unknown view functions get their own variant so callers can match on the name.
    pub fn runtime(line: usize, error: ScriptError) -> Self {
        match error {
            ScriptError::Function(FunctionError::Unknown(name)) => {
                TranspileError::UnknownFunction { name, line }
            }
            source => TranspileError::Runtime { line, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_names_construct_and_line() {
        let error = LexError::Unterminated {
            construct: Construct::Directive,
            line: 3,
        };
        assert_eq!(error.to_string(), "unterminated directive starting on line 3");
    }

    #[test]
    fn test_unknown_function_is_lifted() {
        let error = TranspileError::runtime(
            7,
            ScriptError::Function(FunctionError::Unknown("foo".into())),
        );
        assert_eq!(
            error,
            TranspileError::UnknownFunction {
                name: "foo".into(),
                line: 7
            }
        );
    }

    #[test]
    fn test_cycle_message_lists_chain() {
        let error = TranspileError::InheritanceCycle {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(error.to_string(), "inheritance cycle: a -> b -> a");
    }
}
