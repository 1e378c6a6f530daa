//! Storage error types for dagcalc-storage.
//!
//! [`SnapshotError`] covers every way a snapshot can fail to become a
//! graph: malformed JSON, structural problems (missing root, dangling or
//! duplicated vertices, refused edges, argument lists that do not match the
//! edges) and vertex records whose mode fields do not validate. Writing
//! fails only for numbers JSON cannot represent.

use dagcalc_core::{CoreError, EdgeRejection, VertexId};
use thiserror::Error;

/// Errors produced while writing or reading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The adjacency list is empty or does not start with vertex 0.
    #[error("snapshot has no root vertex")]
    MissingRoot,

    /// An id appears in the adjacency list or the records, but not both.
    #[error("dangling vertex: VertexId({id})", id = id.0)]
    DanglingVertex { id: VertexId },

    /// The same id appears twice in the adjacency list or the records.
    #[error("duplicate vertex in snapshot: VertexId({id})", id = id.0)]
    DuplicateVertex { id: VertexId },

    /// The rebuilt graph refused an edge.
    #[error("snapshot edge {from} -> {to} rejected: {reason}")]
    RejectedEdge {
        from: VertexId,
        to: VertexId,
        reason: EdgeRejection,
    },

    /// A stored argument list is not a permutation of the vertex's inputs.
    #[error("argument mismatch for vertex {id}: {reason}")]
    ArgumentMismatch { id: VertexId, reason: String },

    /// A vertex record's fields do not describe a valid vertex.
    #[error("invalid record for vertex {id}: {reason}")]
    InvalidRecord { id: VertexId, reason: String },

    /// A vertex holds an infinity or NaN where JSON cannot carry one.
    #[error("vertex {id} cannot be written: field {field} holds a non-finite number")]
    NonFinite { id: VertexId, field: &'static str },

    /// The graph reference is an infinity or NaN.
    #[error("graph reference is not a finite number")]
    NonFiniteReference,

    /// A core operation failed while rebuilding the graph.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}
