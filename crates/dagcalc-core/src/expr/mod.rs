//! Formula compiler for Math vertices.
//!
//! A formula goes through four stages:
//!
//! 1. [`sanitize`] drops every character outside the formula alphabet.
//! 2. `$N` references are checked against the vertex's upstream arguments.
//!    An out-of-range reference is a hard compile error.
//! 3. The lexer and the recursive-descent parser build an [`Expr`] tree in
//!    which every reference is already bound to the upstream [`VertexId`].
//! 4. [`Expr::eval`] walks the tree against a value lookup.
//!
//! Syntax errors do not fail compilation. They produce
//! [`CompiledFormula::Malformed`], which fails every evaluation, so the
//! vertex yields undefined and its fallback applies.

mod eval;
mod lexer;
mod parser;
mod sanitize;

pub use sanitize::sanitize;

use thiserror::Error;

use crate::id::VertexId;
use crate::value::Value;

/// Errors produced while compiling or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// `$N` names an input the vertex does not have (`$0` and a bare `$` included).
    #[error("unresolved reference ${index}: vertex has {available} input(s)")]
    UnresolvedReference { index: usize, available: usize },

    /// The formula is not well formed.
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    /// The formula ended where an operand was expected.
    #[error("unexpected end of formula")]
    UnexpectedEnd,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    BitNot,
}

/// Binary operators, in no particular precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

/// The two built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Parses the leading base-10 integer of the argument's string form.
    Int,
    /// Length of the argument's string form, in UTF-16 code units.
    Len,
}

/// A parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    /// Output of an upstream vertex.
    Ref(VertexId),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Builtin, Box<Expr>),
}

/// Result of compiling a formula whose references all resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledFormula {
    Ready(Expr),
    /// Syntax error, reported again on every evaluation.
    Malformed(ExprError),
}

impl CompiledFormula {
    /// Evaluates the formula, reading upstream outputs through `lookup`.
    pub fn evaluate<F>(&self, lookup: F) -> Result<Value, ExprError>
    where
        F: Fn(VertexId) -> Value,
    {
        match self {
            CompiledFormula::Ready(expr) => Ok(expr.eval(&lookup)),
            CompiledFormula::Malformed(err) => Err(err.clone()),
        }
    }
}

/// Compiles `source` for a vertex whose upstream arguments are `args`.
///
/// # Errors
///
/// Returns [`ExprError::UnresolvedReference`] if a `$N` reference falls
/// outside `1..=args.len()`. Syntax errors are folded into
/// [`CompiledFormula::Malformed`] instead.
pub fn compile(source: &str, args: &[VertexId]) -> Result<CompiledFormula, ExprError> {
    let clean = sanitize(source);

    for index in lexer::reference_indices(&clean) {
        if index == 0 || index > args.len() {
            return Err(ExprError::UnresolvedReference {
                index,
                available: args.len(),
            });
        }
    }

    let parsed = lexer::tokenize(&clean).and_then(|tokens| parser::parse(&tokens, args));
    Ok(match parsed {
        Ok(expr) => CompiledFormula::Ready(expr),
        Err(err) => CompiledFormula::Malformed(err),
    })
}
