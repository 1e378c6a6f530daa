//! Dependency-graph computation engine.
//!
//! A [`Dag`] holds [`Vertex`] nodes, each with one declarative evaluation
//! mode (formula, lookup table, rounding, comparator, range filter, data
//! path, event code or constant). Solving the graph evaluates every vertex
//! feeding the root in topological order and returns the root's value.
//!
//! # Modules
//!
//! - [`value`]: the dynamic [`Value`] type and its coercion rules
//! - [`expr`]: the sandboxed formula compiler used by Math vertices
//! - [`mode`]: mode configuration types
//! - [`compile`]: per-mode evaluator factories
//! - [`vertex`]: the vertex entity and its compile cache
//! - [`topology`]: in-degrees, topological sort, orphan pruning
//! - [`graph`]: the [`Dag`] container and its invariants
//! - [`solver`]: reusable evaluation plans and traces

pub mod compile;
pub mod error;
pub mod expr;
pub mod graph;
pub mod id;
pub mod mode;
pub mod solver;
pub mod topology;
pub mod value;
pub mod vertex;

// Re-export commonly used types
pub use error::{CoreError, EdgeRejection};
pub use expr::ExprError;
pub use graph::{Dag, GraphRef};
pub use id::VertexId;
pub use mode::{Band, CmpOp, Comparator, DataPath, EventAccess, MathSource, Operand, OutputFormat, VertexMode};
pub use solver::{SolveMap, SolveOutput, SolveTrace, Solver, SolverConfig};
pub use value::{PathKey, Value};
pub use vertex::{CompileState, Vertex};
