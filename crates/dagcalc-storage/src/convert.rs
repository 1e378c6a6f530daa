//! Conversions between a [`Dag`] and its JSON snapshot.
//!
//! [`snapshot`] captures a graph as a [`GraphSnapshot`]; [`rebuild`] turns
//! one back into a graph, replaying every edge through the graph's own
//! checks. [`dump`] and [`read`] wrap both with the JSON text form.
//!
//! Reading builds a fresh graph and returns it only if every step
//! succeeded. [`restore`] uses that to replace a live graph all-or-nothing.

use std::collections::{HashMap, HashSet};

use dagcalc_core::{CoreError, Dag, Vertex, VertexId};
use tracing::{debug, warn};

use crate::error::SnapshotError;
use crate::snapshot::{GraphSnapshot, SnapshotMeta, VertexRecord};

/// Captures a graph.
///
/// Vertices in `G` keep insertion order; records in `N` follow the
/// topological order.
pub fn snapshot(dag: &Dag) -> GraphSnapshot {
    GraphSnapshot {
        meta: SnapshotMeta(
            Some(dag.description().to_string()),
            Some(dag.units().to_string()),
            dag.reference().cloned(),
        ),
        graph: dag
            .graph()
            .iter()
            .map(|(id, targets)| (*id, targets.iter().copied().collect()))
            .collect(),
        nodes: dag.topo().into_iter().map(VertexRecord::from_vertex).collect(),
    }
}

/// Rebuilds a graph from a snapshot.
///
/// The first vertex of `G` becomes the root. Vertices are added in `G`
/// order, edges are connected in `G` order, and finally every vertex's
/// argument order is set from its record.
///
/// # Errors
///
/// - [`SnapshotError::MissingRoot`] if `G` is empty or starts with a
///   non-zero id
/// - [`SnapshotError::DuplicateVertex`] if an id repeats in `G` or `N`
/// - [`SnapshotError::DanglingVertex`] if an id is in only one of `G` and `N`
/// - [`SnapshotError::InvalidRecord`] if a record does not parse
/// - [`SnapshotError::RejectedEdge`] if the graph refuses an edge
/// - [`SnapshotError::ArgumentMismatch`] if a stored argument list does not
///   match the rebuilt inputs
pub fn rebuild(snapshot: GraphSnapshot) -> Result<Dag, SnapshotError> {
    let mut records: HashMap<VertexId, VertexRecord> =
        HashMap::with_capacity(snapshot.nodes.len());
    for record in snapshot.nodes {
        let id = record.id;
        if records.insert(id, record).is_some() {
            return Err(SnapshotError::DuplicateVertex { id });
        }
    }

    match snapshot.graph.first() {
        Some((id, _)) if *id == VertexId::ROOT => {}
        _ => return Err(SnapshotError::MissingRoot),
    }

    let mut seen = HashSet::with_capacity(snapshot.graph.len());
    let mut vertices: Vec<Vertex> = Vec::with_capacity(snapshot.graph.len());
    let mut args: Vec<(VertexId, Vec<VertexId>)> = Vec::with_capacity(snapshot.graph.len());
    for (id, _) in &snapshot.graph {
        if !seen.insert(*id) {
            return Err(SnapshotError::DuplicateVertex { id: *id });
        }
        let record = records
            .remove(id)
            .ok_or(SnapshotError::DanglingVertex { id: *id })?;
        vertices.push(record.to_vertex()?);
        args.push((*id, record.args));
    }
    if let Some(id) = records.keys().min() {
        return Err(SnapshotError::DanglingVertex { id: *id });
    }

    let mut vertices = vertices.into_iter();
    let root = vertices.next().ok_or(SnapshotError::MissingRoot)?;
    let mut dag = Dag::from_root(root)?;
    for vertex in vertices {
        dag.add_node(vertex)?;
    }

    for (from, targets) in &snapshot.graph {
        for to in targets {
            dag.try_connect(*from, *to).map_err(|err| match err {
                CoreError::IllegalEdge { from, to, reason } => {
                    SnapshotError::RejectedEdge { from, to, reason }
                }
                other => SnapshotError::Core(other),
            })?;
        }
    }

    for (id, order) in &args {
        dag.set_args(*id, order)
            .map_err(|err| SnapshotError::ArgumentMismatch {
                id: *id,
                reason: err.to_string(),
            })?;
    }

    let SnapshotMeta(description, units, reference) = snapshot.meta;
    dag.set_description(description.unwrap_or_default())
        .set_units(units.unwrap_or_default())
        .set_reference(reference);

    debug!(
        vertices = dag.node_count(),
        edges = dag.edge_count(),
        "rebuilt graph from snapshot"
    );
    Ok(dag)
}

/// Writes a graph as compact JSON.
///
/// # Errors
///
/// Returns [`SnapshotError::NonFinite`] or
/// [`SnapshotError::NonFiniteReference`] if the graph holds an infinity or
/// NaN outside a Math constant, and [`SnapshotError::Json`] if
/// serialization fails.
pub fn dump(dag: &Dag) -> Result<String, SnapshotError> {
    let snapshot = snapshot(dag);
    snapshot.ensure_finite()?;
    Ok(serde_json::to_string(&snapshot)?)
}

/// Reads a graph from JSON written by [`dump`].
///
/// # Errors
///
/// Returns [`SnapshotError::Json`] for malformed JSON, otherwise whatever
/// [`rebuild`] reports.
pub fn read(json: &str) -> Result<Dag, SnapshotError> {
    let snapshot: GraphSnapshot = serde_json::from_str(json)?;
    rebuild(snapshot)
}

/// Replaces `dag` with the graph in `json`.
///
/// On any error `dag` is left exactly as it was. The caller's scratch
/// [`meta`](Dag::meta) carries over to the restored graph.
///
/// # Errors
///
/// Same as [`read`].
pub fn restore(dag: &mut Dag, json: &str) -> Result<(), SnapshotError> {
    match read(json) {
        Ok(mut restored) => {
            restored.set_meta(dag.meta().clone());
            *dag = restored;
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "snapshot rejected, graph left unchanged");
            Err(err)
        }
    }
}
