//! Stable vertex identifier.
//!
//! Vertex identity is an explicit integer assigned by the graph, so all
//! adjacency and result maps are keyed by [`VertexId`] rather than by
//! reference identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable vertex identifier, unique within one graph.
///
/// The default is [`VertexId::ROOT`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VertexId(pub u32);

impl VertexId {
    /// The id every graph gives its root vertex.
    pub const ROOT: VertexId = VertexId(0);

    /// Returns the id that follows this one, or `None` at the top of the id space.
    pub fn next(self) -> Option<VertexId> {
        self.0.checked_add(1).map(VertexId)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VertexId {
    fn from(raw: u32) -> Self {
        VertexId(raw)
    }
}
