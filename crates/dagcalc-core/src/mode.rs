//! Vertex evaluation modes.
//!
//! A vertex has exactly one active [`VertexMode`]. Setting a mode replaces
//! the whole variant, so no configuration of a previous mode survives.
//!
//! The configuration types here also know their positional value form
//! (`[operand, operator, operand, format]` and so on), which is what the
//! snapshot records store. Parsing that form validates it.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::value::{PathKey, Value};

/// Configuration of a Math vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum MathSource {
    /// Formula text, sanitized and compiled lazily.
    Formula(String),
    /// A pre-evaluated constant.
    Constant(f64),
}

impl From<&str> for MathSource {
    fn from(s: &str) -> Self {
        MathSource::Formula(s.to_string())
    }
}

impl From<String> for MathSource {
    fn from(s: String) -> Self {
        MathSource::Formula(s)
    }
}

impl From<f64> for MathSource {
    fn from(n: f64) -> Self {
        MathSource::Constant(n)
    }
}

impl From<i32> for MathSource {
    fn from(n: i32) -> Self {
        MathSource::Constant(n as f64)
    }
}

impl MathSource {
    /// The persisted form: formula text, or the constant as a number.
    ///
    /// JSON has no infinities or NaN, so a non-finite constant is written as
    /// a formula that evaluates to the same number.
    pub fn to_value(&self) -> Value {
        match self {
            MathSource::Formula(s) => Value::String(s.clone()),
            MathSource::Constant(n) if n.is_nan() => Value::from("0 / 0"),
            MathSource::Constant(n) if n.is_infinite() => {
                Value::from(if *n > 0.0 { "1 / 0" } else { "-1 / 0" })
            }
            MathSource::Constant(n) => Value::Number(*n),
        }
    }
}

// ---------------------------------------------------------------------------
// Comparator and band building blocks
// ---------------------------------------------------------------------------

/// Comparison operator. `==`/`!=` use loose equality, `===`/`!==` strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::StrictEq => "===",
            CmpOp::Ne => "!=",
            CmpOp::StrictNe => "!==",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// Applies the operator. Unordered relational comparisons are false.
    pub fn apply(&self, lhs: &Value, rhs: &Value) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Eq => lhs.loose_eq(rhs),
            CmpOp::Ne => !lhs.loose_eq(rhs),
            CmpOp::StrictEq => lhs.strict_eq(rhs),
            CmpOp::StrictNe => !lhs.strict_eq(rhs),
            CmpOp::Lt => matches!(lhs.relate(rhs), Some(Less)),
            CmpOp::Le => matches!(lhs.relate(rhs), Some(Less | Equal)),
            CmpOp::Gt => matches!(lhs.relate(rhs), Some(Greater)),
            CmpOp::Ge => matches!(lhs.relate(rhs), Some(Greater | Equal)),
        }
    }
}

impl FromStr for CmpOp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => CmpOp::Eq,
            "===" => CmpOp::StrictEq,
            "!=" => CmpOp::Ne,
            "!==" => CmpOp::StrictNe,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            other => return Err(CoreError::InvalidOperator(other.to_string())),
        })
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a comparator or band emits on pass and on fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// `vu`: the tested value on pass, else undefined.
    ValueOrUndefined,
    /// `10`: 1 on pass, else 0.
    OneZero,
    /// `tf`: `true` on pass, else `false`.
    TrueFalse,
    /// `ab`: the tested value on pass, else the alternate (second operand or clamp stop).
    PassOrAlternate,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::ValueOrUndefined => "vu",
            OutputFormat::OneZero => "10",
            OutputFormat::TrueFalse => "tf",
            OutputFormat::PassOrAlternate => "ab",
        }
    }

    /// Produces the output for a test result.
    pub fn emit(&self, pass: bool, value: Value, alternate: Value) -> Value {
        match self {
            OutputFormat::ValueOrUndefined => {
                if pass {
                    value
                } else {
                    Value::Undefined
                }
            }
            OutputFormat::OneZero => Value::Number(if pass { 1.0 } else { 0.0 }),
            OutputFormat::TrueFalse => Value::Bool(pass),
            OutputFormat::PassOrAlternate => {
                if pass {
                    value
                } else {
                    alternate
                }
            }
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "vu" => OutputFormat::ValueOrUndefined,
            "10" => OutputFormat::OneZero,
            "tf" => OutputFormat::TrueFalse,
            "ab" => OutputFormat::PassOrAlternate,
            other => return Err(CoreError::InvalidOutputFormat(other.to_string())),
        })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comparator or band operand: a constant or a `$N` input reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// 1-indexed upstream input. An index past the inputs reads undefined.
    Ref(usize),
    Const(f64),
}

impl Operand {
    /// Parses a number, or a string of the form `$N` with `N >= 1`.
    pub fn parse(value: &Value) -> Result<Operand, CoreError> {
        match value {
            Value::Number(n) if n.is_finite() => Ok(Operand::Const(*n)),
            Value::String(s) => s
                .trim()
                .strip_prefix('$')
                .and_then(|digits| digits.parse::<usize>().ok())
                .filter(|n| *n >= 1)
                .map(Operand::Ref)
                .ok_or_else(|| CoreError::InvalidOperand(format!("'{}'", s))),
            other => Err(CoreError::InvalidOperand(other.to_display_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Operand::Ref(n) => Value::String(format!("${}", n)),
            Operand::Const(n) => Value::Number(*n),
        }
    }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Const(n)
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Operand::Const(n as f64)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Ref(n) => write!(f, "${}", n),
            Operand::Const(n) => f.write_str(&crate::value::format_number(*n)),
        }
    }
}

fn expect_len<'v>(what: &str, values: &'v [Value], n: usize) -> Result<&'v [Value], CoreError> {
    if values.len() == n {
        Ok(values)
    } else {
        Err(CoreError::InvalidOperand(format!(
            "{} expects {} elements, got {}",
            what,
            n,
            values.len()
        )))
    }
}

fn parse_str<T: FromStr<Err = CoreError>>(value: &Value) -> Result<T, CoreError> {
    match value {
        Value::String(s) => s.parse(),
        other => other.to_display_string().parse(),
    }
}

/// Configuration of a Comparator vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparator {
    pub lhs: Operand,
    pub op: CmpOp,
    pub rhs: Operand,
    pub format: OutputFormat,
}

impl Comparator {
    /// Parses `[lhs, op, rhs, format]`.
    pub fn from_values(values: &[Value]) -> Result<Self, CoreError> {
        let v = expect_len("comparator", values, 4)?;
        Ok(Comparator {
            lhs: Operand::parse(&v[0])?,
            op: parse_str(&v[1])?,
            rhs: Operand::parse(&v[2])?,
            format: parse_str(&v[3])?,
        })
    }

    pub fn to_values(&self) -> Vec<Value> {
        vec![
            self.lhs.to_value(),
            Value::from(self.op.as_str()),
            self.rhs.to_value(),
            Value::from(self.format.as_str()),
        ]
    }
}

/// Configuration of a Range (band) vertex. Stops may be given in any order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub value: Operand,
    pub stop1: Operand,
    pub stop2: Operand,
    pub format: OutputFormat,
}

impl Band {
    /// Parses `[value, stop1, stop2, format]`.
    pub fn from_values(values: &[Value]) -> Result<Self, CoreError> {
        let v = expect_len("range", values, 4)?;
        Ok(Band {
            value: Operand::parse(&v[0])?,
            stop1: Operand::parse(&v[1])?,
            stop2: Operand::parse(&v[2])?,
            format: parse_str(&v[3])?,
        })
    }

    pub fn to_values(&self) -> Vec<Value> {
        vec![
            self.value.to_value(),
            self.stop1.to_value(),
            self.stop2.to_value(),
            Value::from(self.format.as_str()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Data access
// ---------------------------------------------------------------------------

/// Configuration of a DataPath vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataPath {
    /// The `[null]` path: return the source unchanged.
    Passthrough,
    /// A non-empty key/index path.
    Keys(Vec<PathKey>),
}

impl DataPath {
    /// Parses `[null]` or a non-empty list of strings and non-negative integers.
    pub fn from_values(values: &[Value]) -> Result<Self, CoreError> {
        if let [Value::Null] = values {
            return Ok(DataPath::Passthrough);
        }
        if values.is_empty() {
            return Err(CoreError::InvalidPath("empty path".to_string()));
        }
        values
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(PathKey::Key(s.clone())),
                Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(PathKey::Index(*n as u64)),
                other => Err(CoreError::InvalidPath(format!(
                    "element {} is not a key or index",
                    other.to_display_string()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(DataPath::Keys)
    }

    pub fn to_values(&self) -> Vec<Value> {
        match self {
            DataPath::Passthrough => vec![Value::Null],
            DataPath::Keys(keys) => keys
                .iter()
                .map(|k| match k {
                    PathKey::Key(s) => Value::String(s.clone()),
                    PathKey::Index(i) => Value::Number(*i as f64),
                })
                .collect(),
        }
    }
}

impl<K: Into<PathKey>> FromIterator<K> for DataPath {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let keys: Vec<PathKey> = iter.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            DataPath::Passthrough
        } else {
            DataPath::Keys(keys)
        }
    }
}

/// Which member of an event record an EventCode vertex reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventAccess {
    #[default]
    Data,
    Desc,
    Code,
}

impl EventAccess {
    /// Case-insensitive parse; anything unknown selects [`EventAccess::Data`].
    pub fn from_selector(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "desc" => EventAccess::Desc,
            "code" => EventAccess::Code,
            _ => EventAccess::Data,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventAccess::Data => "data",
            EventAccess::Desc => "desc",
            EventAccess::Code => "code",
        }
    }
}

impl fmt::Display for EventAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// The mode itself
// ---------------------------------------------------------------------------

/// The active evaluation mode of a vertex.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum VertexMode {
    /// No configuration: the vertex always yields its fallback.
    #[default]
    Constant,
    Math(MathSource),
    /// Ordered `(key, value)` pairs, keys unique under same-value-zero.
    Enumerator(Vec<(Value, Value)>),
    /// Rounds input 1 to this many decimal digits.
    Rounding(i32),
    Comparator(Comparator),
    Range(Band),
    DataPath(DataPath),
    EventCode { code: i64, access: EventAccess },
}

impl VertexMode {
    /// Short name of the mode, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VertexMode::Constant => "constant",
            VertexMode::Math(_) => "math",
            VertexMode::Enumerator(_) => "enumerator",
            VertexMode::Rounding(_) => "rounding",
            VertexMode::Comparator(_) => "comparator",
            VertexMode::Range(_) => "range",
            VertexMode::DataPath(_) => "data-path",
            VertexMode::EventCode { .. } => "event-code",
        }
    }
}
