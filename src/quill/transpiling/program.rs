//! Generated programs
//!
//! Code generation lowers every AST node to [`Instruction`]s. Block directives are emitted as
//! separate open/close instructions; [`Program::assemble`] links them into jumps so the runtime
//! only ever sees flat [`Op`]s with resolved targets.

use crate::quill::error::TranspileError;
use crate::quill::script::{Expr, Stmt};

/// What nodes and directive generators produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Text(String),
    Echo {
        expr: Expr,
        sanitize: bool,
    },
    Comment(String),
    Exec(Vec<Stmt>),
    Extends(Expr),
    Include {
        name: Expr,
        vars: Option<Expr>,
    },
    StartPart(Expr),
    EndPart,
    Parent,
    Show(Option<Expr>),
    If(Expr),
    ElseIf(Expr),
    Else,
    EndIf,
    ForEach {
        subject: Expr,
        key: Option<String>,
        value: String,
    },
    EndForEach,
    For {
        init: Vec<Stmt>,
        condition: Option<Expr>,
        step: Vec<Stmt>,
    },
    EndFor,
    While(Expr),
    EndWhile,
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Text(_) => "text",
            Instruction::Echo { .. } => "echo",
            Instruction::Comment(_) => "comment",
            Instruction::Exec(_) => "exec",
            Instruction::Extends(_) => "extends",
            Instruction::Include { .. } => "include",
            Instruction::StartPart(_) => "part",
            Instruction::EndPart => "endpart",
            Instruction::Parent => "parent",
            Instruction::Show(_) => "show",
            Instruction::If(_) => "if",
            Instruction::ElseIf(_) => "elseif",
            Instruction::Else => "else",
            Instruction::EndIf => "endif",
            Instruction::ForEach { .. } => "foreach",
            Instruction::EndForEach => "endforeach",
            Instruction::For { .. } => "for",
            Instruction::EndFor => "endfor",
            Instruction::While(_) => "while",
            Instruction::EndWhile => "endwhile",
        }
    }
}

/// A linked operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text(String),
    Echo {
        expr: Expr,
        sanitize: bool,
    },
    Exec(Vec<Stmt>),
    Extends(Expr),
    Include {
        name: Expr,
        vars: Option<Expr>,
    },
    StartPart(Expr),
    EndPart,
    Parent,
    Show(Option<Expr>),
    /// Continue at `target` when `condition` is falsy.
    JumpUnless {
        condition: Expr,
        target: usize,
    },
    Jump(usize),
    /// Start iterating `subject`, or continue at `exit` when it is empty.
    LoopStart {
        subject: Expr,
        key: Option<String>,
        value: String,
        exit: usize,
    },
    /// Bind the next item and continue at `body`, or finish the loop.
    LoopNext {
        body: usize,
    },
}

enum Block {
    If {
        pending: Option<usize>,
        exits: Vec<usize>,
        has_else: bool,
        line: usize,
    },
    ForEach {
        start: usize,
        line: usize,
    },
    For {
        top: usize,
        check: usize,
        step: Vec<Stmt>,
        line: usize,
    },
    While {
        top: usize,
        check: usize,
        line: usize,
    },
}

impl Block {
    fn name(&self) -> &'static str {
        match self {
            Block::If { .. } => "if",
            Block::ForEach { .. } => "foreach",
            Block::For { .. } => "for",
            Block::While { .. } => "while",
        }
    }

    fn line(&self) -> usize {
        match self {
            Block::If { line, .. }
            | Block::ForEach { line, .. }
            | Block::For { line, .. }
            | Block::While { line, .. } => *line,
        }
    }
}

/// An assembled program: ops paired with the source line they came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    ops: Vec<(Op, usize)>,
}

impl Program {
    pub fn ops(&self) -> &[(Op, usize)] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Link block instructions into jumps.
    pub fn assemble(instructions: Vec<(Instruction, usize)>) -> Result<Program, TranspileError> {
        let mut ops: Vec<(Op, usize)> = Vec::with_capacity(instructions.len());
        let mut blocks: Vec<Block> = Vec::new();

        for (instruction, line) in instructions {
            let name = instruction.name();
            match instruction {
                Instruction::Text(text) => {
                    if !text.is_empty() {
                        ops.push((Op::Text(text), line));
                    }
                }
                Instruction::Echo { expr, sanitize } => {
                    ops.push((Op::Echo { expr, sanitize }, line));
                }
                Instruction::Comment(_) => {}
                Instruction::Exec(statements) => ops.push((Op::Exec(statements), line)),
                Instruction::Extends(expr) => ops.push((Op::Extends(expr), line)),
                Instruction::Include { name, vars } => {
                    ops.push((Op::Include { name, vars }, line));
                }
                Instruction::StartPart(expr) => ops.push((Op::StartPart(expr), line)),
                Instruction::EndPart => ops.push((Op::EndPart, line)),
                Instruction::Parent => ops.push((Op::Parent, line)),
                Instruction::Show(expr) => ops.push((Op::Show(expr), line)),

                Instruction::If(condition) => {
                    let at = ops.len();
                    ops.push((Op::JumpUnless { condition, target: 0 }, line));
                    blocks.push(Block::If {
                        pending: Some(at),
                        exits: Vec::new(),
                        has_else: false,
                        line,
                    });
                }
                Instruction::ElseIf(condition) => {
                    let (pending, exits) = open_if(&mut blocks, name, line)?;
                    exits.push(ops.len());
                    ops.push((Op::Jump(0), line));
                    if let Some(at) = pending.take() {
                        let next = ops.len();
                        patch(&mut ops, at, next);
                    }
                    *pending = Some(ops.len());
                    ops.push((Op::JumpUnless { condition, target: 0 }, line));
                }
                Instruction::Else => {
                    let (pending, exits) = open_if(&mut blocks, name, line)?;
                    exits.push(ops.len());
                    ops.push((Op::Jump(0), line));
                    if let Some(at) = pending.take() {
                        let next = ops.len();
                        patch(&mut ops, at, next);
                    }
                    if let Some(Block::If { has_else, .. }) = blocks.last_mut() {
                        *has_else = true;
                    }
                }
                Instruction::EndIf => match close(&mut blocks, name, line, "if")? {
                    Block::If { pending, exits, .. } => {
                        let end = ops.len();
                        for at in pending.into_iter().chain(exits) {
                            patch(&mut ops, at, end);
                        }
                    }
                    _ => unreachable_block(name, line)?,
                },

                Instruction::ForEach {
                    subject,
                    key,
                    value,
                } => {
                    let start = ops.len();
                    ops.push((
                        Op::LoopStart {
                            subject,
                            key,
                            value,
                            exit: 0,
                        },
                        line,
                    ));
                    blocks.push(Block::ForEach { start, line });
                }
                Instruction::EndForEach => match close(&mut blocks, name, line, "foreach")? {
                    Block::ForEach { start, .. } => {
                        ops.push((Op::LoopNext { body: start + 1 }, line));
                        let end = ops.len();
                        patch(&mut ops, start, end);
                    }
                    _ => unreachable_block(name, line)?,
                },

                Instruction::For {
                    init,
                    condition,
                    step,
                } => {
                    if !init.is_empty() {
                        ops.push((Op::Exec(init), line));
                    }
                    let top = ops.len();
                    let condition = condition.unwrap_or(Expr::Literal(true.into()));
                    ops.push((Op::JumpUnless { condition, target: 0 }, line));
                    blocks.push(Block::For {
                        top,
                        check: top,
                        step,
                        line,
                    });
                }
                Instruction::EndFor => match close(&mut blocks, name, line, "for")? {
                    Block::For {
                        top, check, step, ..
                    } => {
                        if !step.is_empty() {
                            ops.push((Op::Exec(step), line));
                        }
                        ops.push((Op::Jump(top), line));
                        let end = ops.len();
                        patch(&mut ops, check, end);
                    }
                    _ => unreachable_block(name, line)?,
                },

                Instruction::While(condition) => {
                    let top = ops.len();
                    ops.push((Op::JumpUnless { condition, target: 0 }, line));
                    blocks.push(Block::While {
                        top,
                        check: top,
                        line,
                    });
                }
                Instruction::EndWhile => match close(&mut blocks, name, line, "while")? {
                    Block::While { top, check, .. } => {
                        ops.push((Op::Jump(top), line));
                        let end = ops.len();
                        patch(&mut ops, check, end);
                    }
                    _ => unreachable_block(name, line)?,
                },
            }
        }

        if let Some(block) = blocks.pop() {
            return Err(TranspileError::UnclosedBlock {
                directive: block.name().to_string(),
                line: block.line(),
            });
        }

        Ok(Program { ops })
    }
}

/// The innermost block, which must be an `if` that has not seen `else` yet.
fn open_if<'b>(
    blocks: &'b mut [Block],
    found: &str,
    line: usize,
) -> Result<(&'b mut Option<usize>, &'b mut Vec<usize>), TranspileError> {
    match blocks.last_mut() {
        Some(Block::If {
            pending,
            exits,
            has_else: false,
            ..
        }) => Ok((pending, exits)),
        Some(Block::If { .. }) => Err(TranspileError::UnbalancedBlock {
            found: found.to_string(),
            line,
            reason: "follows 'else'".to_string(),
        }),
        Some(other) => Err(TranspileError::UnbalancedBlock {
            found: found.to_string(),
            line,
            reason: format!("inside '{}' opened on line {}", other.name(), other.line()),
        }),
        None => Err(TranspileError::UnbalancedBlock {
            found: found.to_string(),
            line,
            reason: "no open 'if'".to_string(),
        }),
    }
}

/// Pop the innermost block, which must be of kind `expected`.
fn close(
    blocks: &mut Vec<Block>,
    found: &str,
    line: usize,
    expected: &str,
) -> Result<Block, TranspileError> {
    match blocks.last() {
        Some(block) if block.name() == expected => blocks
            .pop()
            .ok_or_else(|| unbalanced(found, line, format!("no open '{}'", expected))),
        Some(block) => Err(unbalanced(
            found,
            line,
            format!("'{}' opened on line {} is still open", block.name(), block.line()),
        )),
        None => Err(unbalanced(found, line, format!("no open '{}'", expected))),
    }
}

fn unbalanced(found: &str, line: usize, reason: String) -> TranspileError {
    TranspileError::UnbalancedBlock {
        found: found.to_string(),
        line,
        reason,
    }
}

fn unreachable_block(found: &str, line: usize) -> Result<(), TranspileError> {
    Err(unbalanced(found, line, "block kind mismatch".to_string()))
}

fn patch(ops: &mut [(Op, usize)], at: usize, to: usize) {
    match ops.get_mut(at) {
        Some((Op::JumpUnless { target, .. }, _)) | Some((Op::Jump(target), _)) => *target = to,
        Some((Op::LoopStart { exit, .. }, _)) => *exit = to,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(name: &str) -> Expr {
        Expr::Variable(name.to_string())
    }

    fn text(t: &str) -> Instruction {
        Instruction::Text(t.to_string())
    }

    #[test]
    fn test_if_elseif_else() {
        let program = Program::assemble(vec![
            (Instruction::If(cond("a")), 1),
            (text("A"), 1),
            (Instruction::ElseIf(cond("b")), 2),
            (text("B"), 2),
            (Instruction::Else, 3),
            (text("C"), 3),
            (Instruction::EndIf, 4),
        ])
        .unwrap();

        let ops: Vec<_> = program.ops().iter().map(|(op, _)| op.clone()).collect();
        assert_eq!(
            ops,
            vec![
                Op::JumpUnless {
                    condition: cond("a"),
                    target: 3
                },
                Op::Text("A".into()),
                Op::Jump(7),
                Op::JumpUnless {
                    condition: cond("b"),
                    target: 6
                },
                Op::Text("B".into()),
                Op::Jump(7),
                Op::Text("C".into()),
            ]
        );
    }

    #[test]
    fn test_foreach_links_loop() {
        let program = Program::assemble(vec![
            (
                Instruction::ForEach {
                    subject: cond("items"),
                    key: None,
                    value: "item".into(),
                },
                1,
            ),
            (text("x"), 1),
            (Instruction::EndForEach, 1),
        ])
        .unwrap();

        assert_eq!(
            program.ops()[0].0,
            Op::LoopStart {
                subject: cond("items"),
                key: None,
                value: "item".into(),
                exit: 3
            }
        );
        assert_eq!(program.ops()[2].0, Op::LoopNext { body: 1 });
    }

    #[test]
    fn test_comments_are_dropped() {
        let program =
            Program::assemble(vec![(Instruction::Comment("note".into()), 1), (text(""), 1)])
                .unwrap();
        assert!(program.is_empty());
    }

    #[test]
    fn test_endif_without_if() {
        assert!(matches!(
            Program::assemble(vec![(Instruction::EndIf, 5)]),
            Err(TranspileError::UnbalancedBlock { line: 5, .. })
        ));
    }

    #[test]
    fn test_crossed_blocks() {
        let result = Program::assemble(vec![
            (Instruction::If(cond("a")), 1),
            (Instruction::While(cond("b")), 2),
            (Instruction::EndIf, 3),
        ]);
        assert!(matches!(
            result,
            Err(TranspileError::UnbalancedBlock { line: 3, .. })
        ));
    }

    #[test]
    fn test_unclosed_block() {
        assert_eq!(
            Program::assemble(vec![(Instruction::If(cond("a")), 2)]),
            Err(TranspileError::UnclosedBlock {
                directive: "if".into(),
                line: 2
            })
        );
    }

    #[test]
    fn test_else_after_else() {
        let result = Program::assemble(vec![
            (Instruction::If(cond("a")), 1),
            (Instruction::Else, 2),
            (Instruction::Else, 3),
        ]);
        assert!(matches!(
            result,
            Err(TranspileError::UnbalancedBlock { line: 3, .. })
        ));
    }
}
