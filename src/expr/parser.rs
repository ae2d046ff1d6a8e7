//! Recursive-descent parser and AST for condition expressions.

use std::collections::BTreeSet;

use crate::error::OpSpecError;

use super::lexer::{Token, TokenKind};

/// Receiver name that introduces a static call to a built-in math function.
const MATH: &str = "Math";

#[derive(Debug, Clone, PartialEq)]
/// Expression AST node.
pub enum Expr {
    /// Integer literal.
    Int(i64),
    /// Floating-point literal.
    Float(f64),
    /// String literal.
    String(String),
    /// Character literal.
    Char(char),
    /// Boolean literal.
    Bool(bool),
    /// Null literal.
    Null,
    /// Identifier bound by the condition's identifier binding.
    Var(String),
    /// Field read (`a.length`, `obj.count`).
    Field {
        target: Box<Expr>,
        name: String,
    },
    /// Instance-method call (`s.isEmpty()`, `a.equals(b)`).
    MethodCall {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// Built-in function call (`Math.abs(x)`).
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Unary operators.
pub enum UnaryOp {
    /// Arithmetic negation (`-x`).
    Neg,
    /// Boolean negation (`!x`).
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Binary operators in the expression language.
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl Expr {
    /// Names of the identifiers this expression reads.
    pub fn referenced_identifiers(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Field { target, .. } => target.collect_identifiers(out),
            Expr::MethodCall { target, args, .. } => {
                target.collect_identifiers(out);
                for arg in args {
                    arg.collect_identifiers(out);
                }
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_identifiers(out);
                }
            }
            Expr::Unary { expr, .. } => expr.collect_identifiers(out),
            Expr::Binary { left, right, .. } => {
                left.collect_identifiers(out);
                right.collect_identifiers(out);
            }
            _ => {}
        }
    }
}

/// Parses token stream into an expression AST.
pub fn parse(tokens: &[Token]) -> Result<Expr, OpSpecError> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if !matches!(parser.current().kind, TokenKind::Eof) {
        return Err(OpSpecError::Expression(format!(
            "unexpected token after expression at position {}",
            parser.current().pos
        )));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_or(&mut self) -> Result<Expr, OpSpecError> {
        let mut expr = self.parse_and()?;
        while self.consume_if(|k| matches!(k, TokenKind::OrOr)).is_some() {
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, OpSpecError> {
        let mut expr = self.parse_equality()?;
        while self
            .consume_if(|k| matches!(k, TokenKind::AndAnd))
            .is_some()
        {
            let right = self.parse_equality()?;
            expr = binary(BinaryOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, OpSpecError> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = if self.consume_if(|k| matches!(k, TokenKind::EqEq)).is_some() {
                BinaryOp::Eq
            } else if self.consume_if(|k| matches!(k, TokenKind::NotEq)).is_some() {
                BinaryOp::NotEq
            } else {
                break;
            };
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, OpSpecError> {
        let mut expr = self.parse_term()?;
        loop {
            let op = if self.consume_if(|k| matches!(k, TokenKind::Lt)).is_some() {
                BinaryOp::Lt
            } else if self.consume_if(|k| matches!(k, TokenKind::Lte)).is_some() {
                BinaryOp::Lte
            } else if self.consume_if(|k| matches!(k, TokenKind::Gt)).is_some() {
                BinaryOp::Gt
            } else if self.consume_if(|k| matches!(k, TokenKind::Gte)).is_some() {
                BinaryOp::Gte
            } else {
                break;
            };
            let right = self.parse_term()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, OpSpecError> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = if self.consume_if(|k| matches!(k, TokenKind::Plus)).is_some() {
                BinaryOp::Add
            } else if self.consume_if(|k| matches!(k, TokenKind::Minus)).is_some() {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.parse_factor()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, OpSpecError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = if self.consume_if(|k| matches!(k, TokenKind::Star)).is_some() {
                BinaryOp::Mul
            } else if self.consume_if(|k| matches!(k, TokenKind::Slash)).is_some() {
                BinaryOp::Div
            } else if self
                .consume_if(|k| matches!(k, TokenKind::Percent))
                .is_some()
            {
                BinaryOp::Mod
            } else {
                break;
            };
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, OpSpecError> {
        if self.consume_if(|k| matches!(k, TokenKind::Minus)).is_some() {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }

        if self.consume_if(|k| matches!(k, TokenKind::Bang)).is_some() {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, OpSpecError> {
        let mut expr = self.parse_primary()?;
        while self.consume_if(|k| matches!(k, TokenKind::Dot)).is_some() {
            let name = match &self.current().kind {
                TokenKind::Ident(v) => v.clone(),
                _ => {
                    return Err(OpSpecError::Expression(format!(
                        "expected identifier after '.' at {}",
                        self.current().pos
                    )))
                }
            };
            self.pos += 1;

            if self
                .consume_if(|k| matches!(k, TokenKind::LParen))
                .is_some()
            {
                let args = self.parse_arguments()?;
                expr = match expr {
                    Expr::Var(receiver) if receiver == MATH => Expr::Call { name, args },
                    target => Expr::MethodCall {
                        target: Box::new(target),
                        name,
                        args,
                    },
                };
            } else {
                expr = Expr::Field {
                    target: Box::new(expr),
                    name,
                };
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, OpSpecError> {
        let mut args = Vec::new();
        if self
            .consume_if(|k| matches!(k, TokenKind::RParen))
            .is_some()
        {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.consume_if(|k| matches!(k, TokenKind::Comma)).is_some() {
                continue;
            }
            self.expect(
                |k| matches!(k, TokenKind::RParen),
                "expected ')' after call",
            )?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, OpSpecError> {
        let token = self.current().clone();
        let expr = match token.kind {
            TokenKind::Int(n) => Expr::Int(n),
            TokenKind::Float(n) => Expr::Float(n),
            TokenKind::String(s) => Expr::String(s),
            TokenKind::Char(c) => Expr::Char(c),
            TokenKind::Bool(v) => Expr::Bool(v),
            TokenKind::Null => Expr::Null,
            TokenKind::Ident(name) => Expr::Var(name),
            TokenKind::LParen => {
                self.pos += 1;
                let expr = self.parse_or()?;
                self.expect(
                    |k| matches!(k, TokenKind::RParen),
                    "expected ')' after expression",
                )?;
                return Ok(expr);
            }
            other => {
                return Err(OpSpecError::Expression(format!(
                    "unexpected token {:?} at {}",
                    other, token.pos
                )))
            }
        };
        self.pos += 1;
        Ok(expr)
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn consume_if(&mut self, predicate: fn(&TokenKind) -> bool) -> Option<&Token> {
        if predicate(&self.current().kind) {
            let current = &self.tokens[self.pos];
            self.pos += 1;
            Some(current)
        } else {
            None
        }
    }

    fn expect(
        &mut self,
        predicate: fn(&TokenKind) -> bool,
        message: &str,
    ) -> Result<(), OpSpecError> {
        if self.consume_if(predicate).is_some() {
            Ok(())
        } else {
            Err(OpSpecError::Expression(format!(
                "{} at {}",
                message,
                self.current().pos
            )))
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::tokenize;

    fn parse_str(input: &str) -> Expr {
        parse(&tokenize(input).unwrap()).unwrap()
    }

    #[test]
    fn postfix_chains_bind_tighter_than_operators() {
        let expr = parse_str("s.length() > 0");
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Gt);
        assert!(matches!(*left, Expr::MethodCall { ref name, .. } if name == "length"));
    }

    #[test]
    fn math_receiver_becomes_builtin_call() {
        let expr = parse_str("Math.abs(x) < 3");
        assert_eq!(
            expr.referenced_identifiers().into_iter().collect::<Vec<_>>(),
            vec!["x".to_string()]
        );
    }

    #[test]
    fn identifiers_are_collected_through_calls_and_fields() {
        let expr = parse_str("a.equals(b) && c.length == d + 1");
        let ids: Vec<String> = expr.referenced_identifiers().into_iter().collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let tokens = tokenize("a b").unwrap();
        assert!(parse(&tokens).is_err());
    }
}
