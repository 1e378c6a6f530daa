//! Recursive-descent parser.
//!
//! Precedence, loosest first:
//!
//! | level    | operators          |
//! |----------|--------------------|
//! | bit-or   | `\|`               |
//! | bit-xor  | `^`                |
//! | bit-and  | `&`                |
//! | shift    | `<<` `>>` `>>>`    |
//! | additive | `+` `-`            |
//! | term     | `*` `/` `%`        |
//! | unary    | `-` `+` `~`        |
//! | primary  | number, `'string'`, `$N`, `int(..)`, `len(..)`, `( .. )` |
//!
//! All binary operators are left-associative.
//!
//! Every level returns the subtree together with its height. Evaluation and
//! drop both recurse over the tree, so a formula whose tree grows taller than
//! [`MAX_HEIGHT`] is a syntax error, however it was written.

use crate::id::VertexId;

use super::lexer::{Spanned, Token};
use super::{BinaryOp, Builtin, Expr, ExprError, UnaryOp};

/// Nesting limit for parentheses and unary chains.
const MAX_DEPTH: usize = 256;

/// Height limit for the finished expression tree.
pub(crate) const MAX_HEIGHT: usize = 1024;

/// A subtree and its height. Leaves have height 1.
type Node = (Expr, usize);

pub(crate) fn parse(tokens: &[Spanned], args: &[VertexId]) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        args,
        depth: 0,
    };
    let (expr, _) = parser.expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(extra) => Err(ExprError::Syntax {
            position: extra.position,
            message: format!("unexpected {:?}", extra.token),
        }),
    }
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    args: &'a [VertexId],
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let spanned = self.tokens.get(self.pos);
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn expect(&mut self, want: Token) -> Result<(), ExprError> {
        match self.advance() {
            Some(s) if s.token == want => Ok(()),
            Some(s) => Err(ExprError::Syntax {
                position: s.position,
                message: format!("expected {:?}, found {:?}", want, s.token),
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<Node, ExprError> {
        self.bit_or()
    }

    /// Wraps `expr` as a node of the given height, unless that is too tall.
    fn node(&self, expr: Expr, height: usize, position: usize) -> Result<Node, ExprError> {
        if height > MAX_HEIGHT {
            return Err(ExprError::Syntax {
                position,
                message: format!("expression nests deeper than {}", MAX_HEIGHT),
            });
        }
        Ok((expr, height))
    }

    // -----------------------------------------------------------------------
    // Binary levels
    // -----------------------------------------------------------------------

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Node, ExprError>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Node, ExprError> {
        let mut lhs = next(self)?;
        while let Some(op) = self.peek().and_then(op_for) {
            let position = self.tokens[self.pos].position;
            self.pos += 1;
            let (rhs, rhs_height) = next(self)?;
            let height = lhs.1.max(rhs_height) + 1;
            lhs = self.node(Expr::Binary(op, Box::new(lhs.0), Box::new(rhs)), height, position)?;
        }
        Ok(lhs)
    }

    fn bit_or(&mut self) -> Result<Node, ExprError> {
        self.binary_level(Self::bit_xor, |t| match t {
            Token::Pipe => Some(BinaryOp::BitOr),
            _ => None,
        })
    }

    fn bit_xor(&mut self) -> Result<Node, ExprError> {
        self.binary_level(Self::bit_and, |t| match t {
            Token::Caret => Some(BinaryOp::BitXor),
            _ => None,
        })
    }

    fn bit_and(&mut self) -> Result<Node, ExprError> {
        self.binary_level(Self::shift, |t| match t {
            Token::Amp => Some(BinaryOp::BitAnd),
            _ => None,
        })
    }

    fn shift(&mut self) -> Result<Node, ExprError> {
        self.binary_level(Self::additive, |t| match t {
            Token::Shl => Some(BinaryOp::Shl),
            Token::Shr => Some(BinaryOp::Shr),
            Token::UShr => Some(BinaryOp::UShr),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<Node, ExprError> {
        self.binary_level(Self::term, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn term(&mut self) -> Result<Node, ExprError> {
        self.binary_level(Self::unary, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    // -----------------------------------------------------------------------
    // Unary and primary
    // -----------------------------------------------------------------------

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let position = self.tokens.get(self.pos).map_or(0, |s| s.position);
            return Err(ExprError::Syntax {
                position,
                message: format!("nesting deeper than {}", MAX_DEPTH),
            });
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<Node, ExprError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Tilde) => UnaryOp::BitNot,
            _ => return self.primary(),
        };
        let position = self.tokens[self.pos].position;
        self.pos += 1;
        self.enter()?;
        let (operand, height) = self.unary()?;
        self.depth -= 1;
        self.node(Expr::Unary(op, Box::new(operand)), height + 1, position)
    }

    fn primary(&mut self) -> Result<Node, ExprError> {
        let spanned = self.advance().ok_or(ExprError::UnexpectedEnd)?;
        match &spanned.token {
            Token::Number(n) => Ok((Expr::Number(*n), 1)),
            Token::Str(s) => Ok((Expr::Str(s.clone()), 1)),
            Token::Ref(index) => index
                .checked_sub(1)
                .and_then(|i| self.args.get(i))
                .map(|id| (Expr::Ref(*id), 1))
                .ok_or(ExprError::UnresolvedReference {
                    index: *index,
                    available: self.args.len(),
                }),
            Token::Int | Token::Len => {
                let builtin = if spanned.token == Token::Int {
                    Builtin::Int
                } else {
                    Builtin::Len
                };
                self.expect(Token::LParen)?;
                let (inner, height) = self.nested()?;
                self.expect(Token::RParen)?;
                self.node(Expr::Call(builtin, Box::new(inner)), height + 1, spanned.position)
            }
            Token::LParen => {
                let inner = self.nested()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(ExprError::Syntax {
                position: spanned.position,
                message: format!("unexpected {:?}", other),
            }),
        }
    }

    fn nested(&mut self) -> Result<Node, ExprError> {
        self.enter()?;
        let inner = self.expr()?;
        self.depth -= 1;
        Ok(inner)
    }
}
