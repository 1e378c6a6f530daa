//! Reusable evaluation plans.
//!
//! A [`Solver`] is built once from a graph (see
//! [`Dag::solver`](crate::graph::Dag::solver)) and then run against any
//! number of payloads. Building it fixes the evaluation order (the
//! topological order restricted to vertices that reach the root) and
//! compiles every vertex in that order.
//!
//! The plan is immutable. Each run gets its own [`SolveMap`], so one solver
//! can be shared by several threads.
//!
//! # Configuration
//!
//! [`SolverConfig::trace_enabled`] selects what [`Solver::run`] returns:
//! the root value, or a [`SolveTrace`] of every vertex.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::VertexId;
use crate::value::Value;
use crate::vertex::CompileState;

static UNDEFINED: Value = Value::Undefined;

/// Per-run result map: the payload plus every vertex result so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveMap {
    data: Value,
    values: IndexMap<VertexId, Value>,
    errors: IndexMap<VertexId, String>,
}

impl SolveMap {
    /// Creates an empty map around a payload.
    pub fn new(data: Value) -> Self {
        SolveMap {
            data,
            values: IndexMap::new(),
            errors: IndexMap::new(),
        }
    }

    /// The external payload of this run.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The result of a vertex, or undefined if it has none yet.
    pub fn get(&self, id: VertexId) -> &Value {
        self.values.get(&id).unwrap_or(&UNDEFINED)
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn insert(&mut self, id: VertexId, value: Value) {
        self.values.insert(id, value);
    }

    /// Records why a vertex could not produce a result.
    pub fn record_error(&mut self, id: VertexId, reason: String) {
        self.errors.insert(id, reason);
    }

    pub fn error(&self, id: VertexId) -> Option<&str> {
        self.errors.get(&id).map(String::as_str)
    }

    /// Results in evaluation order.
    pub fn values(&self) -> &IndexMap<VertexId, Value> {
        &self.values
    }

    pub fn errors(&self) -> &IndexMap<VertexId, String> {
        &self.errors
    }
}

/// Solver configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Return a [`SolveTrace`] instead of the root value.
    pub trace_enabled: bool,
}

/// Everything one run computed.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveTrace {
    /// Evaluation order.
    pub topo_ids: Vec<VertexId>,
    /// Vertex names, aligned with `topo_ids`.
    pub topo_names: Vec<String>,
    /// The payload of the run.
    pub data: Value,
    /// Result of every evaluated vertex.
    pub values: IndexMap<VertexId, Value>,
    /// Vertices that failed to compile, with the reason.
    pub errors: IndexMap<VertexId, String>,
}

impl SolveTrace {
    pub fn value(&self, id: VertexId) -> &Value {
        self.values.get(&id).unwrap_or(&UNDEFINED)
    }

    /// Results in evaluation order.
    pub fn ordered_values(&self) -> Vec<&Value> {
        self.topo_ids.iter().map(|id| self.value(*id)).collect()
    }
}

/// Output of [`Solver::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutput {
    Value(Value),
    Trace(SolveTrace),
}

impl SolveOutput {
    /// The root value, taken from the trace if this is one.
    pub fn into_value(self, root: VertexId) -> Value {
        match self {
            SolveOutput::Value(v) => v,
            SolveOutput::Trace(mut t) => t.values.shift_remove(&root).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PlanStep {
    pub id: VertexId,
    pub name: String,
    pub state: CompileState,
    pub fallback: Value,
}

/// A compiled, reusable evaluation plan.
#[derive(Debug, Clone)]
pub struct Solver {
    root: VertexId,
    steps: Vec<PlanStep>,
    config: SolverConfig,
}

impl Solver {
    pub(crate) fn new(root: VertexId, steps: Vec<PlanStep>, config: SolverConfig) -> Self {
        Solver {
            root,
            steps,
            config,
        }
    }

    pub fn config(&self) -> SolverConfig {
        self.config
    }

    /// Evaluation order.
    pub fn topo_ids(&self) -> Vec<VertexId> {
        self.steps.iter().map(|s| s.id).collect()
    }

    /// Vertex names in evaluation order.
    pub fn topo_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Runs every step against `data` and returns the full map.
    pub fn evaluate(&self, data: impl Into<Value>) -> SolveMap {
        let mut map = SolveMap::new(data.into());
        for step in &self.steps {
            step.state.apply(step.id, &step.fallback, &mut map);
        }
        map
    }

    /// Returns the root value for `data`. Undefined if nothing feeds the root.
    pub fn solve(&self, data: impl Into<Value>) -> Value {
        let mut map = self.evaluate(data);
        map.values.shift_remove(&self.root).unwrap_or_default()
    }

    /// Returns every vertex result for `data`.
    pub fn trace(&self, data: impl Into<Value>) -> SolveTrace {
        let map = self.evaluate(data);
        SolveTrace {
            topo_ids: self.topo_ids(),
            topo_names: self.steps.iter().map(|s| s.name.clone()).collect(),
            data: map.data,
            values: map.values,
            errors: map.errors,
        }
    }

    /// Runs according to the configuration.
    pub fn run(&self, data: impl Into<Value>) -> SolveOutput {
        if self.config.trace_enabled {
            SolveOutput::Trace(self.trace(data))
        } else {
            SolveOutput::Value(self.solve(data))
        }
    }
}
