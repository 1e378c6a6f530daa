//! Evaluator factories, one per vertex mode.
//!
//! [`compile_mode`] turns a mode configuration plus the vertex's ordered
//! upstream arguments into an [`Evaluator`]: a pure function of the
//! per-call [`SolveMap`]. Evaluators are reference-counted and `Send + Sync`,
//! so a compiled plan can be shared across threads.

use std::fmt;
use std::sync::Arc;

use crate::expr::{self, ExprError};
use crate::id::VertexId;
use crate::mode::{Band, CmpOp, Comparator, DataPath, EventAccess, MathSource, Operand, VertexMode};
use crate::solver::SolveMap;
use crate::value::{round_to, PathKey, Value};

/// A compiled vertex function.
#[derive(Clone)]
pub struct Evaluator(Arc<dyn Fn(&SolveMap) -> Value + Send + Sync>);

impl Evaluator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SolveMap) -> Value + Send + Sync + 'static,
    {
        Evaluator(Arc::new(f))
    }

    /// An evaluator that always yields undefined.
    pub fn undefined() -> Self {
        Evaluator::new(|_| Value::Undefined)
    }

    pub fn call(&self, map: &SolveMap) -> Value {
        (self.0)(map)
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Evaluator(..)")
    }
}

/// Compiles `mode` for a vertex whose inputs are `args`, in argument order.
///
/// # Errors
///
/// Only Math formulas can fail, with [`ExprError::UnresolvedReference`].
/// Every other mode is validated when it is set.
pub fn compile_mode(mode: &VertexMode, args: &[VertexId]) -> Result<Evaluator, ExprError> {
    Ok(match mode {
        VertexMode::Constant => Evaluator::undefined(),
        VertexMode::Math(source) => math(source, args)?,
        VertexMode::Enumerator(pairs) => enumerator(pairs, args),
        VertexMode::Rounding(precision) => rounding(*precision, args),
        VertexMode::Comparator(cmp) => comparator(cmp, args),
        VertexMode::Range(band) => range(band, args),
        VertexMode::DataPath(path) => data_path(path, args),
        VertexMode::EventCode { code, access } => event_code(*code, *access),
    })
}

/// Resolves a 1-indexed input position to the upstream id, if there is one.
fn input_id(args: &[VertexId], n: usize) -> Option<VertexId> {
    n.checked_sub(1).and_then(|i| args.get(i)).copied()
}

fn read(map: &SolveMap, id: Option<VertexId>) -> Value {
    id.map_or(Value::Undefined, |id| map.get(id).clone())
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

fn math(source: &MathSource, args: &[VertexId]) -> Result<Evaluator, ExprError> {
    match source {
        MathSource::Constant(n) => {
            let n = *n;
            Ok(Evaluator::new(move |_| Value::Number(n)))
        }
        MathSource::Formula(text) => {
            let formula = expr::compile(text, args)?;
            Ok(Evaluator::new(move |map| {
                formula
                    .evaluate(|id| map.get(id).clone())
                    .unwrap_or(Value::Undefined)
            }))
        }
    }
}

/// What an enumerator entry yields when its key matches.
enum Outcome {
    Literal(Value),
    Input(Option<VertexId>),
}

fn enumerator(pairs: &[(Value, Value)], args: &[VertexId]) -> Evaluator {
    let table: Vec<(Value, Outcome)> = pairs
        .iter()
        .map(|(key, value)| {
            let outcome = match Operand::parse(value) {
                Ok(Operand::Ref(n)) => Outcome::Input(input_id(args, n)),
                _ => Outcome::Literal(value.clone()),
            };
            (key.clone(), outcome)
        })
        .collect();
    let selector = input_id(args, 1);

    Evaluator::new(move |map| {
        let selected = read(map, selector);
        table
            .iter()
            .find(|(key, _)| key.same_value_zero(&selected))
            .map_or(Value::Undefined, |(_, outcome)| match outcome {
                Outcome::Literal(v) => v.clone(),
                Outcome::Input(id) => read(map, *id),
            })
    })
}

fn rounding(precision: i32, args: &[VertexId]) -> Evaluator {
    let input = input_id(args, 1);
    Evaluator::new(move |map| Value::Number(round_to(read(map, input).to_number(), precision)))
}

fn operand_reader(
    operand: Operand,
    args: &[VertexId],
) -> impl Fn(&SolveMap) -> Value + Send + Sync + 'static {
    let source = match operand {
        Operand::Ref(n) => Err(input_id(args, n)),
        Operand::Const(c) => Ok(c),
    };
    move |map| match source {
        Ok(c) => Value::Number(c),
        Err(id) => read(map, id),
    }
}

fn comparator(cmp: &Comparator, args: &[VertexId]) -> Evaluator {
    let lhs = operand_reader(cmp.lhs, args);
    let rhs = operand_reader(cmp.rhs, args);
    let (op, format) = (cmp.op, cmp.format);

    Evaluator::new(move |map| {
        let (a, b) = (lhs(map), rhs(map));
        let pass = op.apply(&a, &b);
        format.emit(pass, a, b)
    })
}

/// `min`/`max` that propagate NaN instead of ignoring it.
fn nan_min_max(a: f64, b: f64) -> (f64, f64) {
    if a.is_nan() || b.is_nan() {
        (f64::NAN, f64::NAN)
    } else {
        (a.min(b), a.max(b))
    }
}

fn range(band: &Band, args: &[VertexId]) -> Evaluator {
    let value = operand_reader(band.value, args);
    let stop1 = operand_reader(band.stop1, args);
    let stop2 = operand_reader(band.stop2, args);
    let format = band.format;

    Evaluator::new(move |map| {
        let input = value(map);
        let (min, max) = nan_min_max(stop1(map).to_number(), stop2(map).to_number());
        let (min, max) = (Value::Number(min), Value::Number(max));

        let above_min = CmpOp::Ge.apply(&input, &min);
        if above_min && CmpOp::Le.apply(&input, &max) {
            format.emit(true, input, min)
        } else if above_min {
            format.emit(false, input, max)
        } else {
            format.emit(false, input, min)
        }
    })
}

fn data_path(path: &DataPath, args: &[VertexId]) -> Evaluator {
    let upstream = args.first().copied();
    let keys = match path {
        DataPath::Passthrough => None,
        DataPath::Keys(keys) => Some(keys.clone()),
    };

    Evaluator::new(move |map| {
        let source = match upstream {
            Some(id) => map.get(id),
            None => map.data(),
        };
        match &keys {
            None => source.clone(),
            Some(keys) => source.get_path(keys),
        }
    })
}

fn event_code(code: i64, access: EventAccess) -> Evaluator {
    let path = [
        PathKey::from("_ev"),
        PathKey::Key(code.to_string()),
        PathKey::from(access.as_str()),
    ];
    Evaluator::new(move |map| map.data().get_path(&path))
}
