//! Tree-walking evaluation of parsed formulas.
//!
//! Evaluation is total: every operator coerces its operands instead of
//! failing, so a well-formed formula always produces a [`Value`].

use crate::id::VertexId;
use crate::value::Value;

use super::{BinaryOp, Builtin, Expr, UnaryOp};

impl Expr {
    /// Evaluates the expression, reading upstream outputs through `lookup`.
    pub fn eval<F>(&self, lookup: &F) -> Value
    where
        F: Fn(VertexId) -> Value,
    {
        match self {
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::String(s.clone()),
            Expr::Ref(id) => lookup(*id),
            Expr::Unary(op, operand) => eval_unary(*op, &operand.eval(lookup)),
            Expr::Binary(op, lhs, rhs) => eval_binary(*op, &lhs.eval(lookup), &rhs.eval(lookup)),
            Expr::Call(builtin, arg) => eval_builtin(*builtin, &arg.eval(lookup)),
        }
    }
}

fn eval_unary(op: UnaryOp, val: &Value) -> Value {
    match op {
        UnaryOp::Neg => Value::Number(-val.to_number()),
        UnaryOp::Plus => Value::Number(val.to_number()),
        UnaryOp::BitNot => Value::Number(!val.to_int32() as f64),
    }
}

fn eval_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    let n = match op {
        BinaryOp::Add => return add(lhs, rhs),
        BinaryOp::Sub => lhs.to_number() - rhs.to_number(),
        BinaryOp::Mul => lhs.to_number() * rhs.to_number(),
        BinaryOp::Div => lhs.to_number() / rhs.to_number(),
        BinaryOp::Rem => lhs.to_number() % rhs.to_number(),
        BinaryOp::BitAnd => (lhs.to_int32() & rhs.to_int32()) as f64,
        BinaryOp::BitOr => (lhs.to_int32() | rhs.to_int32()) as f64,
        BinaryOp::BitXor => (lhs.to_int32() ^ rhs.to_int32()) as f64,
        BinaryOp::Shl => lhs.to_int32().wrapping_shl(shift_count(rhs)) as f64,
        BinaryOp::Shr => lhs.to_int32().wrapping_shr(shift_count(rhs)) as f64,
        BinaryOp::UShr => lhs.to_uint32().wrapping_shr(shift_count(rhs)) as f64,
    };
    Value::Number(n)
}

/// `+` concatenates when either side is string-like, otherwise adds.
fn add(lhs: &Value, rhs: &Value) -> Value {
    let stringy = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if stringy(lhs) || stringy(rhs) {
        let mut s = lhs.to_display_string();
        s.push_str(&rhs.to_display_string());
        Value::String(s)
    } else {
        Value::Number(lhs.to_number() + rhs.to_number())
    }
}

fn shift_count(rhs: &Value) -> u32 {
    rhs.to_uint32() & 31
}

fn eval_builtin(builtin: Builtin, arg: &Value) -> Value {
    match builtin {
        Builtin::Int => Value::Number(parse_int(&arg.to_display_string())),
        Builtin::Len => Value::Number(arg.to_display_string().encode_utf16().count() as f64),
    }
}

/// Parses the leading base-10 integer, ignoring leading whitespace. NaN if none.
fn parse_int(s: &str) -> f64 {
    let t = s.trim_start();
    let (negative, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return f64::NAN;
    }
    let magnitude: f64 = digits[..end].parse().unwrap_or(f64::NAN);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}
