//! Vertex: a single configurable computation node.
//!
//! A [`Vertex`] owns its configuration (name, fallback, active mode) and a
//! lazily compiled evaluator. Its ordered upstream argument list is owned by
//! the vertex but only mutated by the graph, which keeps it equal to the
//! vertex's inbound edges in connection order.
//!
//! Every configuration change marks the vertex [`CompileState::Dirty`]; the
//! next solve recompiles it.

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::compile::{compile_mode, Evaluator};
use crate::id::VertexId;
use crate::mode::{Band, Comparator, DataPath, EventAccess, MathSource, VertexMode};
use crate::solver::SolveMap;
use crate::value::{round_to, Value};

/// Ordered upstream argument ids. Most vertices have a handful of inputs.
pub type Args = SmallVec<[VertexId; 4]>;

/// Compilation status of a vertex.
#[derive(Debug, Clone, Default)]
pub enum CompileState {
    /// Configuration or arguments changed since the last compile.
    #[default]
    Dirty,
    /// Compiled and ready to evaluate.
    Ready(Evaluator),
    /// Compilation failed; the vertex yields undefined until reconfigured.
    Failed(String),
}

impl CompileState {
    pub fn is_dirty(&self) -> bool {
        matches!(self, CompileState::Dirty)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, CompileState::Ready(_))
    }

    /// The failure reason, if compilation failed.
    pub fn failure(&self) -> Option<&str> {
        match self {
            CompileState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Writes one vertex result into `map`.
    ///
    /// A ready evaluator's undefined result is replaced by `fallback`; any
    /// other result, falsy ones included, is written as is. A dirty or failed
    /// state writes undefined and records an error for `id`.
    pub(crate) fn apply(&self, id: VertexId, fallback: &Value, map: &mut SolveMap) {
        match self {
            CompileState::Ready(evaluator) => {
                let result = evaluator.call(map);
                let result = if result.is_undefined() {
                    fallback.clone()
                } else {
                    result
                };
                map.insert(id, result);
            }
            CompileState::Failed(reason) => {
                map.insert(id, Value::Undefined);
                map.record_error(id, reason.clone());
            }
            CompileState::Dirty => {
                map.insert(id, Value::Undefined);
                map.record_error(id, "vertex was not compiled".to_string());
            }
        }
    }
}

/// A node in the computation graph.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Stable identity, unique within one graph.
    id: VertexId,
    /// Display name. Not unique.
    name: String,
    /// Upstream vertex ids in connection order. `$N` binds to `args[N - 1]`.
    args: Args,
    /// Result used when the evaluator yields undefined.
    fallback: Value,
    /// The single active evaluation mode.
    mode: VertexMode,
    /// Derived; never persisted.
    state: CompileState,
}

impl Vertex {
    /// Creates a vertex with an explicit id, no inputs and no mode.
    ///
    /// Graphs allocate ids through [`Dag::make_node`](crate::graph::Dag::make_node);
    /// this constructor is for rebuilding vertices with known ids.
    pub fn with_id(id: VertexId, name: impl Into<String>) -> Self {
        Vertex {
            id,
            name: name.into(),
            args: Args::new(),
            fallback: Value::Undefined,
            mode: VertexMode::Constant,
            state: CompileState::Dirty,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Upstream argument ids in connection order.
    pub fn args(&self) -> &[VertexId] {
        &self.args
    }

    pub fn fallback(&self) -> &Value {
        &self.fallback
    }

    pub fn mode(&self) -> &VertexMode {
        &self.mode
    }

    pub fn state(&self) -> &CompileState {
        &self.state
    }

    /// The formula or constant, if this is a Math vertex.
    pub fn math(&self) -> Option<&MathSource> {
        match &self.mode {
            VertexMode::Math(source) => Some(source),
            _ => None,
        }
    }

    /// The enumerator pairs; empty unless this is an Enumerator vertex.
    pub fn enum_pairs(&self) -> &[(Value, Value)] {
        match &self.mode {
            VertexMode::Enumerator(pairs) => pairs,
            _ => &[],
        }
    }

    // -----------------------------------------------------------------------
    // Mode setters
    // -----------------------------------------------------------------------

    /// Replaces the active mode.
    pub fn set_mode(&mut self, mode: VertexMode) -> &mut Self {
        self.mode = mode;
        self.state = CompileState::Dirty;
        self
    }

    /// Makes this a Math vertex with a formula or a constant.
    pub fn set_math(&mut self, source: impl Into<MathSource>) -> &mut Self {
        self.set_mode(VertexMode::Math(source.into()))
    }

    /// Adds or updates an enumerator entry.
    ///
    /// Existing entries are kept only if the vertex already is an
    /// Enumerator. Updating a key keeps its position. An undefined key is
    /// ignored.
    pub fn add_enum(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        if key.is_undefined() {
            return self;
        }
        let value = value.into();
        let mut pairs = match std::mem::take(&mut self.mode) {
            VertexMode::Enumerator(pairs) => pairs,
            _ => Vec::new(),
        };
        match pairs.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some(entry) => entry.1 = value,
            None => pairs.push((key, value)),
        }
        self.set_mode(VertexMode::Enumerator(pairs))
    }

    /// Removes an enumerator entry. No-op for other modes.
    pub fn del_enum(&mut self, key: &Value) -> &mut Self {
        if let VertexMode::Enumerator(pairs) = &mut self.mode {
            pairs.retain(|(k, _)| !k.same_value_zero(key));
            self.state = CompileState::Dirty;
        }
        self
    }

    /// Makes this a Rounding vertex.
    ///
    /// The precision is itself rounded to an integer. A non-finite
    /// precision is ignored.
    pub fn set_round(&mut self, precision: impl Into<f64>) -> &mut Self {
        let precision = precision.into();
        if !precision.is_finite() {
            return self;
        }
        let digits = round_to(precision, 0).clamp(i32::MIN as f64, i32::MAX as f64) as i32;
        self.set_mode(VertexMode::Rounding(digits))
    }

    pub fn set_comparator(&mut self, comparator: Comparator) -> &mut Self {
        self.set_mode(VertexMode::Comparator(comparator))
    }

    pub fn set_range(&mut self, band: Band) -> &mut Self {
        self.set_mode(VertexMode::Range(band))
    }

    pub fn set_path(&mut self, path: DataPath) -> &mut Self {
        self.set_mode(VertexMode::DataPath(path))
    }

    pub fn set_event_code(&mut self, code: i64, access: EventAccess) -> &mut Self {
        self.set_mode(VertexMode::EventCode { code, access })
    }

    pub fn set_fallback(&mut self, fallback: impl Into<Value>) -> &mut Self {
        self.fallback = fallback.into();
        self
    }

    /// Clears the mode and the fallback. Id, name and arguments stay.
    pub fn reset(&mut self) -> &mut Self {
        self.fallback = Value::Undefined;
        self.set_mode(VertexMode::Constant)
    }

    // -----------------------------------------------------------------------
    // Arguments (graph-managed)
    // -----------------------------------------------------------------------

    pub(crate) fn push_arg(&mut self, id: VertexId) {
        self.args.push(id);
        self.state = CompileState::Dirty;
    }

    pub(crate) fn remove_arg(&mut self, id: VertexId) {
        let before = self.args.len();
        self.args.retain(|a| *a != id);
        if self.args.len() != before {
            self.state = CompileState::Dirty;
        }
    }

    pub(crate) fn replace_args(&mut self, args: Args) {
        self.args = args;
        self.state = CompileState::Dirty;
    }

    // -----------------------------------------------------------------------
    // Compile and solve
    // -----------------------------------------------------------------------

    /// Recompiles the evaluator from the current mode and arguments.
    pub fn compile(&mut self) -> &CompileState {
        self.state = match compile_mode(&self.mode, &self.args) {
            Ok(evaluator) => {
                trace!(vertex = %self.id, mode = self.mode.kind(), "compiled vertex");
                CompileState::Ready(evaluator)
            }
            Err(err) => {
                warn!(vertex = %self.id, name = %self.name, error = %err, "vertex failed to compile");
                CompileState::Failed(err.to_string())
            }
        };
        &self.state
    }

    /// Compiles only if the vertex is dirty.
    pub fn ensure_compiled(&mut self) -> &CompileState {
        if self.state.is_dirty() {
            self.compile();
        }
        &self.state
    }

    /// Solves this vertex against `map`, writing its result under its id.
    ///
    /// Upstream results must already be in the map.
    pub fn solve(&mut self, map: &mut SolveMap) {
        self.ensure_compiled();
        self.state.apply(self.id, &self.fallback, map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{CmpOp, Operand, OutputFormat};

    fn solve_alone(v: &mut Vertex) -> Value {
        let mut map = SolveMap::new(Value::Null);
        v.solve(&mut map);
        map.get(v.id()).clone()
    }

    #[test]
    fn setters_replace_the_whole_mode() {
        let mut v = Vertex::with_id(VertexId(1), "A");
        v.add_enum(1, "one").set_math("1 + 1");
        assert!(v.enum_pairs().is_empty());
        v.set_round(2).add_enum(1, "one");
        assert_eq!(v.mode(), &VertexMode::Enumerator(vec![(Value::from(1), Value::from("one"))]));
    }

    #[test]
    fn add_enum_last_write_wins_in_place() {
        let mut v = Vertex::with_id(VertexId(1), "A");
        v.add_enum(1, "a").add_enum("x", "b").add_enum(1, "c");
        assert_eq!(
            v.enum_pairs(),
            &[(Value::from(1), Value::from("c")), (Value::from("x"), Value::from("b"))]
        );
        v.add_enum(Value::Undefined, "ignored");
        assert_eq!(v.enum_pairs().len(), 2);
        v.del_enum(&Value::from(1));
        assert_eq!(v.enum_pairs(), &[(Value::from("x"), Value::from("b"))]);
    }

    #[test]
    fn round_precision_is_rounded() {
        let mut v = Vertex::with_id(VertexId(1), "A");
        v.set_round(2.6);
        assert_eq!(v.mode(), &VertexMode::Rounding(3));
        v.set_round(f64::NAN);
        assert_eq!(v.mode(), &VertexMode::Rounding(3));
    }

    #[test]
    fn mutation_marks_dirty() {
        let mut v = Vertex::with_id(VertexId(1), "A");
        v.set_math(5);
        assert!(v.compile().is_ready());
        v.set_math(6);
        assert!(v.state().is_dirty());
        v.compile();
        v.push_arg(VertexId(2));
        assert!(v.state().is_dirty());
    }

    #[test]
    fn fallback_only_replaces_undefined() {
        let mut v = Vertex::with_id(VertexId(1), "A");
        v.set_fallback(100).set_comparator(Comparator {
            lhs: Operand::Const(1.0),
            op: CmpOp::Gt,
            rhs: Operand::Const(2.0),
            format: OutputFormat::ValueOrUndefined,
        });
        assert_eq!(solve_alone(&mut v), Value::from(100));

        v.set_comparator(Comparator {
            lhs: Operand::Const(1.0),
            op: CmpOp::Gt,
            rhs: Operand::Const(2.0),
            format: OutputFormat::TrueFalse,
        });
        assert_eq!(solve_alone(&mut v), Value::Bool(false));

        v.set_math(0);
        assert_eq!(solve_alone(&mut v), Value::from(0));
    }

    #[test]
    fn constant_vertex_yields_fallback() {
        let mut v = Vertex::with_id(VertexId(1), "A");
        assert_eq!(solve_alone(&mut v), Value::Undefined);
        v.set_fallback("fallback");
        assert_eq!(solve_alone(&mut v), Value::from("fallback"));
    }

    #[test]
    fn failed_compile_records_error_and_skips_fallback() {
        let mut v = Vertex::with_id(VertexId(4), "A");
        v.set_fallback(1).set_math("$1 * 2");
        let mut map = SolveMap::new(Value::Null);
        v.solve(&mut map);
        assert_eq!(map.get(VertexId(4)), &Value::Undefined);
        assert!(map.error(VertexId(4)).is_some());
        assert!(v.state().failure().is_some());
    }

    #[test]
    fn malformed_formula_uses_fallback() {
        let mut v = Vertex::with_id(VertexId(1), "A");
        v.set_fallback(7).set_math("blah - blah * blah");
        assert_eq!(solve_alone(&mut v), Value::from(7));
    }

    #[test]
    fn reset_clears_mode_and_fallback() {
        let mut v = Vertex::with_id(VertexId(1), "A");
        v.set_fallback(3).set_math(1).reset();
        assert_eq!(v.mode(), &VertexMode::Constant);
        assert_eq!(v.fallback(), &Value::Undefined);
        assert_eq!(v.name(), "A");
    }
}
