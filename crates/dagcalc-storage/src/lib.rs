//! JSON snapshots for dagcalc graphs.
//!
//! A graph is written with [`dump`] and read back with [`read`]. The read
//! side rebuilds the graph through the same checked operations a caller
//! would use, so a snapshot that describes an illegal graph is rejected
//! instead of loaded. [`restore`] replaces a live graph only when the read
//! succeeds.
//!
//! # Modules
//!
//! - [`error`]: SnapshotError enum with all failure modes
//! - [`snapshot`]: the serialized record types
//! - [`convert`]: Dag <-> snapshot conversions, dump/read/restore

pub mod convert;
pub mod error;
pub mod snapshot;

// Re-export key types for ergonomic use.
pub use convert::{dump, read, rebuild, restore, snapshot};
pub use error::SnapshotError;
pub use snapshot::{GraphSnapshot, SnapshotMeta, VertexRecord};
