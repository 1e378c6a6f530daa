//! Core error types for dagcalc-core.
//!
//! Graph mutations that the engine rejects are no-ops on the public
//! chaining API; these variants exist so callers that ask for the reason
//! (e.g. [`Dag::try_connect`](crate::graph::Dag::try_connect)) can match on it.

use std::fmt;

use thiserror::Error;

use crate::id::VertexId;

/// Why an edge was refused by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRejection {
    /// The root may not feed anything.
    FromRoot,
    /// The root already has its single input.
    RootOccupied,
    /// One of the endpoints is not a member of the graph.
    NotMember,
    /// The edge already exists.
    AlreadyConnected,
    /// The edge would close a cycle.
    WouldCycle,
}

impl fmt::Display for EdgeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            EdgeRejection::FromRoot => "root has no outputs",
            EdgeRejection::RootOccupied => "root already has an input",
            EdgeRejection::NotMember => "vertex is not a member of the graph",
            EdgeRejection::AlreadyConnected => "edge already exists",
            EdgeRejection::WouldCycle => "edge would form a cycle",
        };
        f.write_str(reason)
    }
}

/// Errors produced by the dagcalc-core crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A vertex id was not found in the graph.
    #[error("vertex not found: VertexId({id})", id = id.0)]
    VertexNotFound { id: VertexId },

    /// A vertex with this id is already a member of the graph.
    #[error("duplicate vertex id: VertexId({id})", id = id.0)]
    DuplicateVertex { id: VertexId },

    /// A graph was seeded with a root whose id is not 0.
    #[error("root vertex must have id 0, got VertexId({id})", id = id.0)]
    InvalidRoot { id: VertexId },

    /// An edge was refused.
    #[error("illegal edge {from} -> {to}: {reason}")]
    IllegalEdge {
        from: VertexId,
        to: VertexId,
        reason: EdgeRejection,
    },

    /// An argument list is not a permutation of the vertex's inbound edges.
    #[error("invalid argument order for vertex {id}: {reason}")]
    InvalidArguments { id: VertexId, reason: String },

    /// Unknown comparison operator.
    #[error("unknown comparison operator: '{0}'")]
    InvalidOperator(String),

    /// Unknown output format code.
    #[error("unknown output format: '{0}'")]
    InvalidOutputFormat(String),

    /// An operand is neither a number nor a `$N` reference.
    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// A data path contains an element that is not a key or an index.
    #[error("invalid data path: {0}")]
    InvalidPath(String),
}
