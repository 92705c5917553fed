//! Parser
//!
//! Builds an [`Ast`] from the lexer's token stream. The current node is tracked with an
//! explicit stack of arena ids: open tokens push a new node, close tokens check the node's
//! children and pop it.

pub mod ast;

pub use ast::{Ast, Node, NodeId, NodeKind};

use crate::quill::error::ParseError;
use crate::quill::token::{Construct, Token, TokenKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Parser
    }

    pub fn parse(&self, tokens: &[Token]) -> Result<Ast, ParseError> {
        let mut ast = Ast::new();
        let mut stack: Vec<NodeId> = vec![Ast::ROOT];

        for token in tokens {
            let current = stack.last().copied().unwrap_or(Ast::ROOT);
            match token.kind {
                TokenKind::ExpressionText => {
                    ast.append(current, NodeKind::Expression(token.text.clone()), token.line);
                }
                TokenKind::DirectiveName => {
                    let node = ast.node(current);
                    if node.kind != NodeKind::Directive || !node.children.is_empty() {
                        return Err(ParseError::UnexpectedToken {
                            token: token.text.clone(),
                            line: token.line,
                        });
                    }
                    ast.append(current, NodeKind::DirectiveName(token.text.clone()), token.line);
                }
                kind if kind.is_open() => {
                    let node_kind = match kind.construct() {
                        Some(construct) => node_kind(construct),
                        None => {
                            return Err(ParseError::UnexpectedToken {
                                token: token.text.clone(),
                                line: token.line,
                            })
                        }
                    };
                    let id = ast.append(current, node_kind, token.line);
                    stack.push(id);
                }
                _ => {
                    if stack.len() == 1 {
                        return Err(ParseError::UnbalancedClose {
                            token: token.text.clone(),
                            line: token.line,
                        });
                    }
                    let node = ast.node(current);
                    let expected = token.kind.construct().map(node_kind);
                    if expected.as_ref() != Some(&node.kind) {
                        return Err(ParseError::MismatchedClose {
                            token: token.text.clone(),
                            open: node.kind.label().to_string(),
                            line: token.line,
                        });
                    }
                    validate(&ast, current)?;
                    stack.pop();
                }
            }
        }

        if let Some(&open) = stack.get(1) {
            let node = ast.node(open);
            return Err(ParseError::Unclosed {
                construct: node.kind.label().to_string(),
                line: node.line,
            });
        }

        tracing::trace!(nodes = ast.len(), "parsed template");
        Ok(ast)
    }
}

fn node_kind(construct: Construct) -> NodeKind {
    match construct {
        Construct::SanitizedTag => NodeKind::SanitizedTag,
        Construct::UnsanitizedTag => NodeKind::UnsanitizedTag,
        Construct::Directive => NodeKind::Directive,
        Construct::Comment => NodeKind::Comment,
        Construct::HostCode => NodeKind::HostCode,
    }
}

/// Check that a closing node has exactly the children its kind requires.
fn validate(ast: &Ast, id: NodeId) -> Result<(), ParseError> {
    let node = ast.node(id);
    let kinds: Vec<&NodeKind> = node
        .children
        .iter()
        .map(|child| &ast.node(*child).kind)
        .collect();
    let malformed = |reason: &str| ParseError::Malformed {
        construct: node.kind.label().to_string(),
        line: node.line,
        reason: reason.to_string(),
    };

    match node.kind {
        NodeKind::Directive => match kinds.as_slice() {
            [NodeKind::DirectiveName(_)] | [NodeKind::DirectiveName(_), NodeKind::Expression(_)] => {
                Ok(())
            }
            [] => Err(malformed("missing directive name")),
            _ => Err(malformed("expected a name and at most one expression")),
        },
        _ => match kinds.as_slice() {
            [NodeKind::Expression(_)] => Ok(()),
            _ => Err(malformed("expected exactly one expression")),
        },
    }
}
