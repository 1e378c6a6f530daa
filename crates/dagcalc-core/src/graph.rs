//! Dag: the graph container.
//!
//! [`Dag`] owns every [`Vertex`] and the directed adjacency between them
//! (edge `a -> b` means "a's output is an input to b"). It is the only way
//! to change edges, and it keeps these invariants after every call:
//!
//! - the graph is acyclic;
//! - the root (id 0) feeds nothing and has at most one input;
//! - vertex ids are unique;
//! - a vertex's argument list equals its inbound vertices in connection
//!   order, so `$1`, `$2`, ... never silently rebind.
//!
//! Rejected mutations leave the graph unchanged. The chaining methods
//! ([`connect`](Dag::connect), [`disconnect`](Dag::disconnect)) swallow the
//! rejection; [`try_connect`](Dag::try_connect) reports it.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use petgraph::stable_graph::{NodeIndex, StableGraph};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, EdgeRejection};
use crate::id::VertexId;
use crate::solver::{PlanStep, SolveTrace, Solver, SolverConfig};
use crate::topology::{self, Adjacency};
use crate::value::Value;
use crate::vertex::{Args, Vertex};

/// Name given to the root vertex.
pub const ROOT_NAME: &str = "ROOT";

/// Formula of the root vertex: pass input 1 through.
pub const ROOT_FORMULA: &str = "$1";

/// Opaque external reference attached to a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphRef {
    Number(f64),
    Text(String),
}

impl GraphRef {
    pub fn to_value(&self) -> Value {
        match self {
            GraphRef::Number(n) => Value::Number(*n),
            GraphRef::Text(s) => Value::String(s.clone()),
        }
    }

    /// Accepts a number or a string; anything else is no reference.
    pub fn from_value(value: &Value) -> Option<GraphRef> {
        match value {
            Value::Number(n) => Some(GraphRef::Number(*n)),
            Value::String(s) => Some(GraphRef::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<f64> for GraphRef {
    fn from(n: f64) -> Self {
        GraphRef::Number(n)
    }
}

impl From<i32> for GraphRef {
    fn from(n: i32) -> Self {
        GraphRef::Number(n as f64)
    }
}

impl From<&str> for GraphRef {
    fn from(s: &str) -> Self {
        GraphRef::Text(s.to_string())
    }
}

/// A directed acyclic computation graph with a single root.
#[derive(Debug, Clone)]
pub struct Dag {
    /// Vertices in insertion order.
    vertices: IndexMap<VertexId, Vertex>,
    /// `vertex -> vertices it feeds`, keyed in the same order as `vertices`.
    adjacency: Adjacency,
    root: VertexId,
    /// Id handed to the next `make_node`. `None` once the counter passes
    /// the top of the id space.
    next_id: Option<VertexId>,
    description: String,
    units: String,
    reference: Option<GraphRef>,
    /// Caller-owned scratch data. Never persisted.
    meta: Value,
}

impl Default for Dag {
    fn default() -> Self {
        Dag::new()
    }
}

impl Dag {
    fn empty() -> Self {
        Dag {
            vertices: IndexMap::new(),
            adjacency: IndexMap::new(),
            root: VertexId::ROOT,
            next_id: Some(VertexId::ROOT),
            description: String::new(),
            units: String::new(),
            reference: None,
            meta: Value::Undefined,
        }
    }

    /// Creates a graph holding only the root vertex.
    pub fn new() -> Self {
        let mut dag = Dag::empty();
        dag.make_node(ROOT_NAME).set_math(ROOT_FORMULA);
        dag
    }

    /// Creates an empty graph whose root vertex is supplied by the caller.
    ///
    /// Used when rebuilding a graph from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRoot`] unless the vertex has id 0.
    pub fn from_root(root: Vertex) -> Result<Self, CoreError> {
        if root.id() != VertexId::ROOT {
            return Err(CoreError::InvalidRoot { id: root.id() });
        }
        let mut dag = Dag::empty();
        dag.add_node(root)?;
        Ok(dag)
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn set_units(&mut self, units: impl Into<String>) -> &mut Self {
        self.units = units.into();
        self
    }

    pub fn reference(&self) -> Option<&GraphRef> {
        self.reference.as_ref()
    }

    pub fn set_reference(&mut self, reference: Option<GraphRef>) -> &mut Self {
        self.reference = reference;
        self
    }

    /// Scratch data for the caller. Not part of snapshots.
    pub fn meta(&self) -> &Value {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: impl Into<Value>) -> &mut Self {
        self.meta = meta.into();
        self
    }

    // -----------------------------------------------------------------------
    // Vertex management
    // -----------------------------------------------------------------------

    pub fn root(&self) -> VertexId {
        self.root
    }

    /// Creates a new unconnected vertex with the next free id.
    ///
    /// Not idempotent: every call creates a distinct vertex, whatever the name.
    pub fn make_node(&mut self, name: impl Into<String>) -> &mut Vertex {
        let id = self.allocate_id();
        self.adjacency.insert(id, IndexSet::new());
        self.vertices
            .entry(id)
            .or_insert_with(|| Vertex::with_id(id, name))
    }

    /// Adds an existing vertex, unconnected.
    ///
    /// The vertex's argument list is cleared since it has no inbound edges
    /// here. New ids continue from the largest id in the graph, falling back
    /// to the lowest free id once that reaches `u32::MAX`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateVertex`] if the id is already taken.
    pub fn add_node(&mut self, mut vertex: Vertex) -> Result<&mut Vertex, CoreError> {
        let id = vertex.id();
        if self.vertices.contains_key(&id) {
            return Err(CoreError::DuplicateVertex { id });
        }
        vertex.replace_args(Args::new());
        self.adjacency.insert(id, IndexSet::new());
        self.next_id = self
            .vertices
            .keys()
            .copied()
            .chain(std::iter::once(id))
            .max()
            .unwrap_or(id)
            .next();
        Ok(self.vertices.entry(id).or_insert(vertex))
    }

    /// Takes the counter id, or the lowest free non-root id when the counter
    /// is spent or already taken.
    fn allocate_id(&mut self) -> VertexId {
        let id = match self.next_id {
            Some(id) if !self.vertices.contains_key(&id) => id,
            _ => self.lowest_free_id(),
        };
        self.next_id = id.next();
        id
    }

    fn lowest_free_id(&self) -> VertexId {
        if self.vertices.is_empty() {
            return VertexId::ROOT;
        }
        // A graph in memory holds far fewer than u32::MAX vertices, so the
        // search always finds a gap.
        (1..=u32::MAX)
            .map(VertexId)
            .find(|id| !self.vertices.contains_key(id))
            .unwrap_or(VertexId(u32::MAX))
    }

    /// Deletes a vertex and every edge touching it.
    ///
    /// Returns the removed vertex, or `None` for the root or an unknown id.
    pub fn del_node(&mut self, id: VertexId) -> Option<Vertex> {
        if id == self.root {
            return None;
        }
        let removed = self.vertices.shift_remove(&id)?;
        self.adjacency.shift_remove(&id);
        for targets in self.adjacency.values_mut() {
            targets.shift_remove(&id);
        }
        for vertex in self.vertices.values_mut() {
            vertex.remove_arg(id);
        }
        Some(removed)
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(&id)
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    /// Number of vertices, root included.
    pub fn node_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(IndexSet::len).sum()
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Makes `a` an input of `b`, appending `a` to `b`'s arguments.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalEdge`] with the reason if `a` is the
    /// root, `b` is the root and already has an input, either vertex is
    /// not a member, the edge exists, or the edge would close a cycle. The
    /// graph is unchanged in every error case.
    pub fn try_connect(&mut self, a: VertexId, b: VertexId) -> Result<(), CoreError> {
        let reject = |reason| CoreError::IllegalEdge {
            from: a,
            to: b,
            reason,
        };

        if a == self.root {
            return Err(reject(EdgeRejection::FromRoot));
        }
        if b == self.root && !self.in_degrees(b).is_empty() {
            return Err(reject(EdgeRejection::RootOccupied));
        }
        if !self.contains(a) || !self.contains(b) {
            return Err(reject(EdgeRejection::NotMember));
        }
        if self.adjacency.get(&a).is_some_and(|t| t.contains(&b)) {
            return Err(reject(EdgeRejection::AlreadyConnected));
        }

        self.insert_edge(a, b);
        if topology::has_cycle(&self.adjacency) {
            self.remove_edge(a, b);
            return Err(reject(EdgeRejection::WouldCycle));
        }
        Ok(())
    }

    /// Chaining form of [`try_connect`](Self::try_connect); rejections are no-ops.
    pub fn connect(&mut self, a: VertexId, b: VertexId) -> &mut Self {
        if let Err(err) = self.try_connect(a, b) {
            debug!(error = %err, "connect rejected");
        }
        self
    }

    /// Removes the edge `a -> b` and `a` from `b`'s arguments.
    pub fn disconnect(&mut self, a: VertexId, b: VertexId) -> &mut Self {
        self.remove_edge(a, b);
        self
    }

    fn insert_edge(&mut self, a: VertexId, b: VertexId) {
        if let Some(targets) = self.adjacency.get_mut(&a) {
            targets.insert(b);
        }
        if let Some(vertex) = self.vertices.get_mut(&b) {
            vertex.push_arg(a);
        }
    }

    fn remove_edge(&mut self, a: VertexId, b: VertexId) {
        if let Some(targets) = self.adjacency.get_mut(&a) {
            targets.shift_remove(&b);
        }
        if let Some(vertex) = self.vertices.get_mut(&b) {
            vertex.remove_arg(a);
        }
    }

    /// Reorders a vertex's arguments.
    ///
    /// # Errors
    ///
    /// `args` must be a permutation of the vertex's inbound vertices;
    /// otherwise [`CoreError::InvalidArguments`] is returned and nothing
    /// changes.
    pub fn set_args(&mut self, id: VertexId, args: &[VertexId]) -> Result<(), CoreError> {
        if !self.contains(id) {
            return Err(CoreError::VertexNotFound { id });
        }
        let inbound: IndexSet<VertexId> = self.in_degrees(id).into_iter().collect();
        let given: IndexSet<VertexId> = args.iter().copied().collect();
        if given.len() != args.len() || given.len() != inbound.len() || !given.is_subset(&inbound) {
            return Err(CoreError::InvalidArguments {
                id,
                reason: format!(
                    "expected a permutation of {:?}, got {:?}",
                    inbound.iter().map(|v| v.0).collect::<Vec<_>>(),
                    args.iter().map(|v| v.0).collect::<Vec<_>>()
                ),
            });
        }
        if let Some(vertex) = self.vertices.get_mut(&id) {
            vertex.replace_args(args.iter().copied().collect());
        }
        Ok(())
    }

    /// Deletes orphans until none are left, then recompiles every vertex.
    pub fn clean(&mut self) -> &mut Self {
        loop {
            let orphans = self.orphans();
            if orphans.is_empty() {
                break;
            }
            debug!(count = orphans.len(), "pruning orphans");
            for id in orphans {
                self.del_node(id);
            }
        }
        for vertex in self.vertices.values_mut() {
            vertex.compile();
        }
        self
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// The adjacency map: `vertex -> vertices it feeds`.
    pub fn graph(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Vertices in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn ids(&self) -> Vec<VertexId> {
        self.vertices.keys().copied().collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.vertices.values().map(Vertex::name).collect()
    }

    /// Topological order, orphans included.
    pub fn topo_ids(&self) -> Vec<VertexId> {
        topology::topological_sort(&self.adjacency)
    }

    pub fn topo(&self) -> Vec<&Vertex> {
        self.topo_ids()
            .into_iter()
            .filter_map(|id| self.vertices.get(&id))
            .collect()
    }

    pub fn topo_names(&self) -> Vec<&str> {
        self.topo().into_iter().map(Vertex::name).collect()
    }

    /// Vertices with no inputs. An unconnected root is a leaf.
    pub fn leafs(&self) -> Vec<VertexId> {
        topology::in_degrees(&self.adjacency).1
    }

    /// Non-root vertices that feed nothing.
    pub fn orphans(&self) -> Vec<VertexId> {
        topology::orphans(&self.adjacency, self.root)
    }

    /// Vertices feeding `id`, in insertion order.
    pub fn in_degrees(&self, id: VertexId) -> Vec<VertexId> {
        self.adjacency
            .iter()
            .filter(|(_, targets)| targets.contains(&id))
            .map(|(k, _)| *k)
            .collect()
    }

    /// Vertices `id` feeds, in connection order.
    pub fn out_degrees(&self, id: VertexId) -> Vec<VertexId> {
        self.adjacency
            .get(&id)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Exports the structure as a petgraph graph weighted by vertex id.
    pub fn to_stable_graph(&self) -> StableGraph<VertexId, ()> {
        let mut graph = StableGraph::with_capacity(self.node_count(), self.edge_count());
        let index: HashMap<VertexId, NodeIndex> = self
            .vertices
            .keys()
            .map(|id| (*id, graph.add_node(*id)))
            .collect();
        for (from, targets) in &self.adjacency {
            for to in targets {
                if let (Some(a), Some(b)) = (index.get(from), index.get(to)) {
                    graph.add_edge(*a, *b, ());
                }
            }
        }
        graph
    }

    // -----------------------------------------------------------------------
    // Solving
    // -----------------------------------------------------------------------

    /// Builds a reusable solver.
    ///
    /// The plan is the topological order restricted to vertices with a
    /// path to the root. Every planned vertex is compiled now; later
    /// changes to the graph do not affect an existing solver.
    pub fn solver(&mut self, config: SolverConfig) -> Solver {
        let mut reachable = self.adjacency.clone();
        topology::remove_orphans(&mut reachable, self.root);

        let steps: Vec<PlanStep> = self
            .topo_ids()
            .into_iter()
            .filter(|id| reachable.contains_key(id))
            .filter_map(|id| {
                let vertex = self.vertices.get_mut(&id)?;
                let state = vertex.ensure_compiled().clone();
                Some(PlanStep {
                    id,
                    name: vertex.name().to_string(),
                    state,
                    fallback: vertex.fallback().clone(),
                })
            })
            .collect();

        debug!(steps = steps.len(), "built solver");
        Solver::new(self.root, steps, config)
    }

    /// Solves the graph once for `data`.
    pub fn solve(&mut self, data: impl Into<Value>) -> Value {
        self.solver(SolverConfig::default()).solve(data)
    }

    /// Solves the graph once for `data` and returns every vertex result.
    pub fn debug(&mut self, data: impl Into<Value>) -> SolveTrace {
        self.solver(SolverConfig {
            trace_enabled: true,
        })
        .trace(data)
    }
}
