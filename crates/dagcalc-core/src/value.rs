//! Runtime value representation for vertex evaluation.
//!
//! [`Value`] is what flows along every edge of the graph and what the
//! external caller supplies as the solve payload. It is a JSON-shaped value
//! with one extra variant, [`Value::Undefined`], which means "no result" and
//! is the only value that makes a vertex fall back to its configured default.
//!
//! # Coercion table
//!
//! | from       | `to_number`                         | `to_display_string`  |
//! |------------|-------------------------------------|----------------------|
//! | Undefined  | NaN                                 | `undefined`          |
//! | Null       | 0                                   | `null`               |
//! | Bool       | 1 / 0                               | `true` / `false`     |
//! | Number     | itself                              | shortest form, exponent past 1e21 or below 1e-6, `NaN`, `Infinity` |
//! | String     | trimmed numeric parse, `""` is 0, otherwise NaN | itself   |
//! | Array      | parse of the comma-joined elements  | comma-joined elements |
//! | Object     | NaN                                 | `[object Object]`    |
//!
//! Equality comes in three strengths, see [`Value::strict_eq`],
//! [`Value::loose_eq`] and [`Value::same_value_zero`].

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A dynamic value produced or consumed by a vertex.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No result. Triggers the vertex fallback.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// Object members in insertion order.
    Object(IndexMap<String, Value>),
}

/// One step of a data path: a mapping key or a sequence index.
///
/// Lookups are lenient in the same way in both directions: an index applied
/// to an object looks up its decimal key, and a numeric key applied to an
/// array is parsed as an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathKey {
    Index(u64),
    Key(String),
}

impl From<&str> for PathKey {
    fn from(key: &str) -> Self {
        PathKey::Key(key.to_string())
    }
}

impl From<String> for PathKey {
    fn from(key: String) -> Self {
        PathKey::Key(key)
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        PathKey::Index(index as u64)
    }
}

impl From<i32> for PathKey {
    fn from(index: i32) -> Self {
        if index >= 0 {
            PathKey::Index(index as u64)
        } else {
            PathKey::Key(index.to_string())
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Index(i) => write!(f, "{}", i),
            PathKey::Key(k) => f.write_str(k),
        }
    }
}

impl Value {
    /// Returns `true` for [`Value::Undefined`].
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns a human-readable name of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "Undefined",
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
        }
    }

    /// Returns the inner number, without coercion.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the inner string, without coercion.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Coercion
    // -----------------------------------------------------------------------

    /// Numeric coercion, see the module-level table.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_numeric(s),
            Value::Array(_) => parse_numeric(&self.to_display_string()),
            Value::Object(_) => f64::NAN,
        }
    }

    /// String coercion, see the module-level table.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Coerces to a signed 32-bit integer (modular, NaN and infinities are 0).
    pub fn to_int32(&self) -> i32 {
        self.to_uint32() as i32
    }

    /// Coerces to an unsigned 32-bit integer (modular, NaN and infinities are 0).
    pub fn to_uint32(&self) -> u32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        n.trunc().rem_euclid(4_294_967_296.0) as u32
    }

    // -----------------------------------------------------------------------
    // Equality and ordering
    // -----------------------------------------------------------------------

    /// Strict equality (`===`): same variant and equal payload.
    ///
    /// NaN never equals anything; `0` equals `-0`. Arrays and objects compare
    /// element-wise with the same rule.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.strict_eq(w)))
            }
            _ => false,
        }
    }

    /// Loose equality (`==`).
    ///
    /// - `Undefined` and `Null` equal each other and nothing else.
    /// - A number and a string compare numerically.
    /// - A boolean is converted to a number and the comparison retried.
    /// - Everything else uses [`strict_eq`](Self::strict_eq).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_eq(other),
            (_, Value::Bool(_)) => self.loose_eq(&Value::Number(other.to_number())),
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_eq(other),
        }
    }

    /// Same-value-zero: strict equality, except that NaN matches NaN.
    ///
    /// Used for enumerator key matching.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_eq(other),
        }
    }

    /// Relational ordering used by `<`, `<=`, `>`, `>=`.
    ///
    /// Two strings compare lexicographically; otherwise both sides are
    /// coerced to numbers. `None` means the values are unordered (a NaN was
    /// involved), which makes every relational operator false.
    pub fn relate(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }

    // -----------------------------------------------------------------------
    // Structural access
    // -----------------------------------------------------------------------

    /// Looks up one key. Returns `None` where the lookup would yield undefined.
    pub fn get_key(&self, key: &PathKey) -> Option<&Value> {
        match (self, key) {
            (Value::Array(items), PathKey::Index(i)) => items.get(*i as usize),
            (Value::Array(items), PathKey::Key(k)) => {
                k.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            (Value::Object(members), PathKey::Key(k)) => members.get(k),
            (Value::Object(members), PathKey::Index(i)) => members.get(&i.to_string()),
            _ => None,
        }
    }

    /// Follows a path into nested arrays and objects.
    ///
    /// Any missing step yields [`Value::Undefined`].
    pub fn get_path(&self, path: &[PathKey]) -> Value {
        let mut current = self;
        for (depth, key) in path.iter().enumerate() {
            if let Value::String(s) = current {
                // Indexing into a string yields a one-character string.
                return index_str(s, key).get_path(&path[depth + 1..]);
            }
            match current.get_key(key) {
                Some(next) => current = next,
                None => return Value::Undefined,
            }
        }
        current.clone()
    }

    // -----------------------------------------------------------------------
    // JSON bridge
    // -----------------------------------------------------------------------

    /// Converts to a JSON value.
    ///
    /// `Undefined` and non-finite numbers become `null`; integral numbers
    /// become JSON integers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(members) => serde_json::Value::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Rounds `n` to `precision` decimal digits, halves toward positive infinity.
///
/// A negative precision rounds to tens, hundreds, and so on.
pub fn round_to(n: f64, precision: i32) -> f64 {
    let factor = 10f64.powi(precision);
    (n * factor + 0.5).floor() / factor
}

/// Formats a number the way it is shown to humans and to string concatenation.
///
/// Magnitudes from 1e-6 up to but excluding 1e21 print as plain decimals;
/// anything outside that band prints in exponent form with an explicit sign,
/// as in `1e+21` or `1.5e-7`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else if (1e-6..1e21).contains(&n.abs()) {
        format!("{}", n)
    } else {
        let text = format!("{:e}", n);
        match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => text,
        }
    }
}

fn parse_numeric(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    // Rust accepts "inf" and "nan" spellings; the coercion table does not.
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

fn index_str(s: &str, key: &PathKey) -> Value {
    let index = match key {
        PathKey::Index(i) => Some(*i as usize),
        PathKey::Key(k) => k.parse::<usize>().ok(),
    };
    index
        .and_then(|i| s.chars().nth(i))
        .map(|c| Value::String(c.to_string()))
        .unwrap_or(Value::Undefined)
}

fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if !n.is_finite() {
        serde_json::Value::Null
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(members) => Value::Object(
                members
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}
