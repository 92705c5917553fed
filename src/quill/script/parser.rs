//! Script parser
//!
//! A precedence-climbing parser over [`ScriptToken`]s. Binary operators are handled by
//! [`BinaryOp::precedence`]; `??` and the ternary sit below all of them.

use super::ast::{AssignOp, BinaryOp, Expr, Stmt, UnaryOp};
use super::tokens::{tokenize, ScriptToken};
use crate::quill::error::ScriptError;
use crate::quill::lexing::VIEW_FUNCTION_CALL;
use serde_json::Value;

/// Parse a single expression that must consume the whole source.
pub fn parse_expression(source: &str) -> Result<Expr, ScriptError> {
    let mut parser = ScriptParser::new(source)?;
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a comma separated list of expressions. Empty source gives an empty list.
pub fn parse_arguments(source: &str) -> Result<Vec<Expr>, ScriptError> {
    let mut parser = ScriptParser::new(source)?;
    let mut args = Vec::new();
    if parser.at_end() {
        return Ok(args);
    }
    loop {
        args.push(parser.expression()?);
        if !parser.eat(&ScriptToken::Comma) {
            break;
        }
    }
    parser.expect_end()?;
    Ok(args)
}

/// Parse `;` separated statements.
pub fn parse_statements(source: &str) -> Result<Vec<Stmt>, ScriptError> {
    let mut parser = ScriptParser::new(source)?;
    let mut statements = Vec::new();
    while !parser.at_end() {
        if parser.eat(&ScriptToken::Semicolon) {
            continue;
        }
        statements.push(parser.statement()?);
        if !parser.at_end() {
            parser.expect(&ScriptToken::Semicolon, "';' between statements")?;
        }
    }
    Ok(statements)
}

struct ScriptParser {
    tokens: Vec<(ScriptToken, logos::Span)>,
    pos: usize,
    end: usize,
}

impl ScriptParser {
    fn new(source: &str) -> Result<Self, ScriptError> {
        let tokens = tokenize(source).map_err(|offset| ScriptError::Syntax {
            offset,
            message: "unrecognised character".to_string(),
        })?;
        Ok(ScriptParser {
            tokens,
            pos: 0,
            end: source.len(),
        })
    }

    fn peek(&self) -> Option<&ScriptToken> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.end, |(_, span)| span.start)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<ScriptToken> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &ScriptToken) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Syntax {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &ScriptToken, what: &str) -> Result<(), ScriptError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn expect_end(&self) -> Result<(), ScriptError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        if matches!(self.peek(), Some(ScriptToken::Ident(name)) if name == "echo") {
            self.pos += 1;
            let mut values = vec![self.expression()?];
            while self.eat(&ScriptToken::Comma) {
                values.push(self.expression()?);
            }
            return Ok(Stmt::Echo(values));
        }
        if self.eat(&ScriptToken::Increment) {
            let target = self.assignable()?;
            return Ok(Stmt::Increment(target));
        }
        if self.eat(&ScriptToken::Decrement) {
            let target = self.assignable()?;
            return Ok(Stmt::Decrement(target));
        }

        let expr = self.expression()?;
        let op = match self.peek() {
            Some(ScriptToken::Assign) => AssignOp::Set,
            Some(ScriptToken::ConcatAssign) => AssignOp::Concat,
            Some(ScriptToken::PlusAssign) => AssignOp::Add,
            Some(ScriptToken::MinusAssign) => AssignOp::Subtract,
            Some(ScriptToken::Increment) => {
                self.pos += 1;
                return Ok(Stmt::Increment(check_assignable(expr)?));
            }
            Some(ScriptToken::Decrement) => {
                self.pos += 1;
                return Ok(Stmt::Decrement(check_assignable(expr)?));
            }
            _ => return Ok(Stmt::Expr(expr)),
        };
        self.pos += 1;
        let target = check_assignable(expr)?;
        let value = self.expression()?;
        Ok(Stmt::Assign { target, op, value })
    }

    fn assignable(&mut self) -> Result<Expr, ScriptError> {
        let expr = self.postfix()?;
        check_assignable(expr)
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        let left = self.ternary()?;
        if self.eat(&ScriptToken::Coalesce) {
            let right = self.expression()?;
            return Ok(Expr::Coalesce(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn ternary(&mut self) -> Result<Expr, ScriptError> {
        let condition = self.binary(1)?;
        if !self.eat(&ScriptToken::Question) {
            return Ok(condition);
        }
        let then = self.expression()?;
        self.expect(&ScriptToken::Colon, "':' in ternary")?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        while let Some(op) = self.peek().and_then(binary_op) {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let right = self.binary(precedence + 1)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&ScriptToken::Not) {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat(&ScriptToken::Minus) {
            return Ok(Expr::Unary(UnaryOp::Negate, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&ScriptToken::OpenBracket) {
                let index = self.expression()?;
                self.expect(&ScriptToken::CloseBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat(&ScriptToken::Arrow) {
                let name = match self.advance() {
                    Some(ScriptToken::Ident(name)) => name,
                    _ => return Err(self.error("expected a property name after '->'")),
                };
                if self.eat(&ScriptToken::OpenParen) {
                    let args = self.call_arguments()?;
                    expr = Expr::MethodCall {
                        target: Box::new(expr),
                        name,
                        args,
                    };
                } else {
                    expr = Expr::Property(Box::new(expr), name);
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let offset = self.offset();
        let token = self
            .advance()
            .ok_or_else(|| self.error("unexpected end of expression"))?;
        match token {
            ScriptToken::Variable(name) => Ok(Expr::Variable(name)),
            ScriptToken::Integer(n) => Ok(Expr::Literal(Value::from(n))),
            ScriptToken::Float(n) => Ok(Expr::Literal(Value::from(n))),
            ScriptToken::Str(s) => Ok(Expr::Literal(Value::String(s))),
            ScriptToken::OpenParen => {
                let expr = self.expression()?;
                self.expect(&ScriptToken::CloseParen, "')'")?;
                Ok(expr)
            }
            ScriptToken::OpenBracket => self.array(),
            ScriptToken::Ident(name) => self.identifier(name),
            other => Err(ScriptError::Syntax {
                offset,
                message: format!("unexpected {:?}", other),
            }),
        }
    }

    fn identifier(&mut self, name: String) -> Result<Expr, ScriptError> {
        match name.to_ascii_lowercase().as_str() {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            _ => {}
        }

        if name == VIEW_FUNCTION_CALL {
            self.expect(&ScriptToken::OpenParen, "'(' after view function call")?;
            let function = match self.advance() {
                Some(ScriptToken::Str(function)) => function,
                _ => return Err(self.error("expected the view function name")),
            };
            let args = if self.eat(&ScriptToken::Comma) {
                self.call_arguments()?
            } else {
                self.expect(&ScriptToken::CloseParen, "')'")?;
                Vec::new()
            };
            return Ok(Expr::ViewCall {
                name: function,
                args,
            });
        }

        if self.eat(&ScriptToken::DoubleColon) {
            let member = match self.advance() {
                Some(ScriptToken::Ident(member)) => member,
                _ => return Err(self.error("expected a name after '::'")),
            };
            self.expect(&ScriptToken::OpenParen, "'(' after static call")?;
            let args = self.call_arguments()?;
            return Ok(Expr::Call {
                name: format!("{}::{}", name, member),
                args,
            });
        }

        if self.eat(&ScriptToken::OpenParen) {
            let args = self.call_arguments()?;
            return Ok(Expr::Call { name, args });
        }

        Err(self.error(format!("bare identifier '{}'", name)))
    }

    /// Arguments after an already consumed `(`, through the closing `)`.
    fn call_arguments(&mut self) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        if self.eat(&ScriptToken::CloseParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&ScriptToken::CloseParen) {
                return Ok(args);
            }
            self.expect(&ScriptToken::Comma, "',' or ')' in argument list")?;
        }
    }

    /// Array literal after an already consumed `[`.
    fn array(&mut self) -> Result<Expr, ScriptError> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&ScriptToken::CloseBracket) {
                return Ok(Expr::Array(entries));
            }
            let first = self.expression()?;
            if self.eat(&ScriptToken::FatArrow) {
                let value = self.expression()?;
                entries.push((Some(first), value));
            } else {
                entries.push((None, first));
            }
            if !self.eat(&ScriptToken::Comma) && self.peek() != Some(&ScriptToken::CloseBracket) {
                return Err(self.error("expected ',' or ']' in array literal"));
            }
        }
    }
}

fn binary_op(token: &ScriptToken) -> Option<BinaryOp> {
    let op = match token {
        ScriptToken::Or => BinaryOp::Or,
        ScriptToken::And => BinaryOp::And,
        ScriptToken::Equal => BinaryOp::Equal,
        ScriptToken::NotEqual => BinaryOp::NotEqual,
        ScriptToken::Identical => BinaryOp::Identical,
        ScriptToken::NotIdentical => BinaryOp::NotIdentical,
        ScriptToken::Less => BinaryOp::Less,
        ScriptToken::LessEqual => BinaryOp::LessEqual,
        ScriptToken::Greater => BinaryOp::Greater,
        ScriptToken::GreaterEqual => BinaryOp::GreaterEqual,
        ScriptToken::Plus => BinaryOp::Add,
        ScriptToken::Minus => BinaryOp::Subtract,
        ScriptToken::Dot => BinaryOp::Concat,
        ScriptToken::Star => BinaryOp::Multiply,
        ScriptToken::Slash => BinaryOp::Divide,
        ScriptToken::Percent => BinaryOp::Modulo,
        _ => return None,
    };
    Some(op)
}

fn check_assignable(expr: Expr) -> Result<Expr, ScriptError> {
    fn is_place(expr: &Expr) -> bool {
        match expr {
            Expr::Variable(_) => true,
            Expr::Index(target, _) | Expr::Property(target, _) => is_place(target),
            _ => false,
        }
    }
    if is_place(&expr) {
        Ok(expr)
    } else {
        Err(ScriptError::InvalidAssignment(format!("{:?}", expr)))
    }
}
