//! Graph algorithms over id-keyed adjacency.
//!
//! All functions work on an [`Adjacency`] map (`vertex -> set of vertices
//! it feeds`). Both the map and the sets preserve insertion order, which
//! makes every result here deterministic.

use indexmap::{IndexMap, IndexSet};

use crate::id::VertexId;

/// `vertex -> vertices it feeds`, in insertion order.
pub type Adjacency = IndexMap<VertexId, IndexSet<VertexId>>;

/// Counts inbound edges per vertex.
///
/// Returns the counts (keyed in adjacency order) and the vertices with no
/// inbound edge, also in adjacency order.
pub fn in_degrees(adj: &Adjacency) -> (IndexMap<VertexId, usize>, Vec<VertexId>) {
    let mut counts: IndexMap<VertexId, usize> = adj.keys().map(|k| (*k, 0)).collect();
    for targets in adj.values() {
        for t in targets {
            if let Some(c) = counts.get_mut(t) {
                *c += 1;
            }
        }
    }
    let zero = counts
        .iter()
        .filter(|(_, c)| **c == 0)
        .map(|(k, _)| *k)
        .collect();
    (counts, zero)
}

/// Kahn's algorithm with a stack.
///
/// Among vertices that are ready at the same time, the one made ready most
/// recently is emitted first. Vertices on a cycle are never emitted, so a
/// result shorter than the vertex count means the graph has a cycle.
pub fn topological_sort(adj: &Adjacency) -> Vec<VertexId> {
    let (mut counts, mut stack) = in_degrees(adj);
    let mut sorted = Vec::with_capacity(adj.len());

    while let Some(u) = stack.pop() {
        sorted.push(u);
        let Some(targets) = adj.get(&u) else {
            continue;
        };
        for v in targets {
            if let Some(c) = counts.get_mut(v) {
                *c -= 1;
                if *c == 0 {
                    stack.push(*v);
                }
            }
        }
    }
    sorted
}

/// Returns `true` if the adjacency contains a cycle.
pub fn has_cycle(adj: &Adjacency) -> bool {
    topological_sort(adj).len() < adj.len()
}

/// Vertices, other than `root`, that feed nothing.
pub fn orphans(adj: &Adjacency, root: VertexId) -> Vec<VertexId> {
    adj.iter()
        .filter(|(k, targets)| **k != root && targets.is_empty())
        .map(|(k, _)| *k)
        .collect()
}

/// Deletes orphans until none are left.
///
/// Removing an orphan can turn the vertices feeding it into orphans, so
/// this repeats to a fixed point. What remains is `root` and everything
/// with a path to it. Returns the removed ids in removal order.
pub fn remove_orphans(adj: &mut Adjacency, root: VertexId) -> Vec<VertexId> {
    let mut removed = Vec::new();
    loop {
        let doomed = orphans(adj, root);
        if doomed.is_empty() {
            break;
        }
        for id in &doomed {
            adj.shift_remove(id);
        }
        for targets in adj.values_mut() {
            for id in &doomed {
                targets.shift_remove(id);
            }
        }
        removed.extend(doomed);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(edges: &[(u32, &[u32])]) -> Adjacency {
        edges
            .iter()
            .map(|(k, vs)| (VertexId(*k), vs.iter().copied().map(VertexId).collect()))
            .collect()
    }

    fn raw(ids: &[VertexId]) -> Vec<u32> {
        ids.iter().map(|id| id.0).collect()
    }

    // A=1 B=2 C=3 D=4 E=5 F=6
    fn letters() -> Adjacency {
        adjacency(&[
            (1, &[2, 3]),
            (2, &[3, 4]),
            (3, &[4]),
            (5, &[6]),
            (6, &[3]),
            (4, &[]),
        ])
    }

    #[test]
    fn in_degrees_counts_inbound_edges() {
        let (counts, zero) = in_degrees(&letters());
        let counted: Vec<(u32, usize)> = counts.iter().map(|(k, c)| (k.0, *c)).collect();
        assert_eq!(counted, vec![(1, 0), (2, 1), (3, 3), (5, 0), (6, 1), (4, 2)]);
        assert_eq!(raw(&zero), vec![1, 5]);
    }

    #[test]
    fn stack_order_emits_most_recent_ready_first() {
        // E F A B C D
        assert_eq!(raw(&topological_sort(&letters())), vec![5, 6, 1, 2, 3, 4]);
    }

    #[test]
    fn cycle_shortens_the_sort() {
        let adj = adjacency(&[(1, &[2]), (2, &[3]), (3, &[1]), (4, &[])]);
        assert_eq!(raw(&topological_sort(&adj)), vec![4]);
        assert!(has_cycle(&adj));
        assert!(!has_cycle(&letters()));
    }

    #[test]
    fn remove_orphans_reaches_fixed_point() {
        // 3 -> 2 -> 1 -> 0, and 5 -> 4 dangling.
        let mut adj = adjacency(&[(0, &[]), (1, &[0]), (2, &[1]), (3, &[2]), (4, &[]), (5, &[4])]);
        let removed = remove_orphans(&mut adj, VertexId::ROOT);
        assert_eq!(raw(&removed), vec![4, 5]);
        assert_eq!(raw(&adj.keys().copied().collect::<Vec<_>>()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn remove_orphans_on_unconnected_root_leaves_root() {
        let mut adj = adjacency(&[(0, &[]), (1, &[2]), (2, &[])]);
        remove_orphans(&mut adj, VertexId::ROOT);
        assert_eq!(adj.len(), 1);
        assert!(adj.contains_key(&VertexId::ROOT));
    }

    #[test]
    fn orphans_exclude_root() {
        let adj = adjacency(&[(0, &[]), (1, &[0]), (2, &[])]);
        assert_eq!(raw(&orphans(&adj, VertexId::ROOT)), vec![2]);
    }
}
