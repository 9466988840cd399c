// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! Source-rooted reachability/shortest-distance oracles over a [`DynamicGraph`].
//!
//! Three concrete variants share one update policy: given the log entries accumulated since the
//! oracle's last call, fall back to a full recompute if any disabled edge lay on the current
//! shortest-path tree of a presently-reachable target; otherwise relax outward from newly
//! enabled edges incrementally. `Connectivity` only ever needs the reachable/tree-parent bits;
//! `BfsDistance` and `Dijkstra` also track a distance, by hop count or by edge weight
//! respectively.

use super::dynamic_graph::{ChangeKind, DynamicGraph, EdgeId, NodeId};
use std::collections::VecDeque;

/// Diagnostics-only counters for which update strategy each `update()` call took.
#[derive(Clone, Copy, Default, Debug)]
pub struct UpdateStats {
    pub fast: u64,
    pub failed_fast: u64,
    pub full: u64,
    pub skipped: u64,
}

/// The capability set every reach oracle variant exposes.
pub trait ReachOracle {
    /// Brings the oracle's reachability/distance/parent state up to date with the graph's
    /// current enabled-edge set.
    fn update(&mut self, graph: &DynamicGraph);

    /// Exact after `update()`: whether `t` is reachable from the oracle's source.
    fn connected(&self, t: NodeId) -> bool;

    /// May lag a prior `update()`; use only to decide whether a detector needs to re-examine
    /// `t`, never as a final answer.
    fn connected_unsafe(&self, t: NodeId) -> bool;

    /// Parent of `t` in the current shortest-path tree, if reachable and not the source.
    fn previous(&self, t: NodeId) -> Option<NodeId>;

    /// Distance from the source to `t`, if reachable.
    fn distance(&self, t: NodeId) -> Option<u64>;

    /// Edge used to reach `t` from `previous(t)`, if any.
    fn previous_edge(&self, t: NodeId) -> Option<EdgeId>;

    fn stats(&self) -> UpdateStats;
}

/// Whether the oracle weighs edges by hop count (Connectivity/BFS-Distance) or by an explicit
/// per-edge weight function (Dijkstra).
enum Weighting {
    Unweighted,
    Weighted(Box<dyn Fn(EdgeId) -> u64>),
}

/// A single BFS/Dijkstra-backed search tree, parameterised by [`Weighting`]. `Connectivity` and
/// `BfsDistance` both use `Weighting::Unweighted` (plain BFS); `Dijkstra` supplies a weight
/// function and runs Dijkstra's algorithm. Kept as one struct rather than three, since the
/// incremental-update policy and state layout are identical across all three capability
/// variants — only the relaxation rule (hop-count vs weighted) differs.
pub struct SearchTree {
    source: NodeId,
    weighting: Weighting,
    reachable: Vec<bool>,
    dist: Vec<u64>,
    parent: Vec<Option<NodeId>>,
    parent_edge: Vec<Option<EdgeId>>,
    last_version: u64,
    stats: UpdateStats,
    track_distance: bool,
}

impl SearchTree {
    fn new(source: NodeId, num_nodes: usize, weighting: Weighting, track_distance: bool) -> Self {
        let mut reachable = vec![false; num_nodes];
        let mut dist = vec![u64::MAX; num_nodes];
        reachable[source.index()] = true;
        dist[source.index()] = 0;
        SearchTree {
            source,
            weighting,
            reachable,
            dist,
            parent: vec![None; num_nodes],
            parent_edge: vec![None; num_nodes],
            last_version: 0,
            stats: UpdateStats::default(),
            track_distance,
        }
    }

    /// Builds a plain BFS (unweighted, hop-count distance) search tree.
    pub fn connectivity(source: NodeId, num_nodes: usize) -> Self {
        Self::new(source, num_nodes, Weighting::Unweighted, false)
    }

    /// Builds a BFS search tree that also reports hop-count distances.
    pub fn bfs_distance(source: NodeId, num_nodes: usize) -> Self {
        Self::new(source, num_nodes, Weighting::Unweighted, true)
    }

    /// Builds a Dijkstra search tree using `weight` to price each edge.
    pub fn dijkstra(
        source: NodeId,
        num_nodes: usize,
        weight: impl Fn(EdgeId) -> u64 + 'static,
    ) -> Self {
        Self::new(source, num_nodes, Weighting::Weighted(Box::new(weight)), true)
    }

    fn edge_weight(&self, edge: EdgeId) -> u64 {
        match &self.weighting {
            Weighting::Unweighted => 1,
            Weighting::Weighted(f) => f(edge),
        }
    }

    fn reset(&mut self, num_nodes: usize) {
        self.reachable = vec![false; num_nodes];
        self.dist = vec![u64::MAX; num_nodes];
        self.parent = vec![None; num_nodes];
        self.parent_edge = vec![None; num_nodes];
    }

    /// Recomputes the whole tree from scratch.
    fn full_recompute(&mut self, graph: &DynamicGraph) {
        self.reset(graph.num_nodes());
        self.reachable[self.source.index()] = true;
        self.dist[self.source.index()] = 0;

        match &self.weighting {
            Weighting::Unweighted => {
                let mut queue = VecDeque::new();
                queue.push_back(self.source);
                while let Some(u) = queue.pop_front() {
                    let d = self.dist[u.index()];
                    for (edge, v) in graph.enabled_out_edges(u) {
                        if !self.reachable[v.index()] {
                            self.reachable[v.index()] = true;
                            self.dist[v.index()] = d + 1;
                            self.parent[v.index()] = Some(u);
                            self.parent_edge[v.index()] = Some(edge);
                            queue.push_back(v);
                        }
                    }
                }
            }
            Weighting::Weighted(_) => {
                // A simple O(V^2) Dijkstra: fine at the scale this crate targets, and avoids
                // pulling in a binary-heap-with-decrease-key dependency for a handful of nodes.
                let mut visited = vec![false; graph.num_nodes()];
                loop {
                    let mut u = None;
                    let mut best = u64::MAX;
                    for (i, &d) in self.dist.iter().enumerate() {
                        if !visited[i] && d < best {
                            best = d;
                            u = Some(i);
                        }
                    }
                    let Some(ui) = u else { break };
                    visited[ui] = true;
                    let node = NodeId::new(ui);
                    for (edge, v) in graph.enabled_out_edges(node) {
                        let nd = best.saturating_add(self.edge_weight(edge));
                        if nd < self.dist[v.index()] {
                            self.dist[v.index()] = nd;
                            self.reachable[v.index()] = true;
                            self.parent[v.index()] = Some(node);
                            self.parent_edge[v.index()] = Some(edge);
                        }
                    }
                }
            }
        }
        self.stats.full += 1;
    }

    /// Relaxes outward from `start`, whose own distance/reachability is already correct, as if
    /// freshly reached; used both for incremental updates after an edge enable and internally by
    /// `full_recompute`'s unweighted branch.
    fn relax_from(&mut self, graph: &DynamicGraph, start: NodeId) {
        match &self.weighting {
            Weighting::Unweighted => {
                let mut queue = VecDeque::new();
                queue.push_back(start);
                while let Some(u) = queue.pop_front() {
                    let d = self.dist[u.index()];
                    for (edge, v) in graph.enabled_out_edges(u) {
                        if !self.reachable[v.index()] || self.dist[v.index()] > d + 1 {
                            self.reachable[v.index()] = true;
                            self.dist[v.index()] = d + 1;
                            self.parent[v.index()] = Some(u);
                            self.parent_edge[v.index()] = Some(edge);
                            queue.push_back(v);
                        }
                    }
                }
            }
            Weighting::Weighted(_) => {
                let mut queue = VecDeque::new();
                queue.push_back(start);
                while let Some(u) = queue.pop_front() {
                    let d = self.dist[u.index()];
                    for (edge, v) in graph.enabled_out_edges(u) {
                        let nd = d.saturating_add(self.edge_weight(edge));
                        if !self.reachable[v.index()] || self.dist[v.index()] > nd {
                            self.reachable[v.index()] = true;
                            self.dist[v.index()] = nd;
                            self.parent[v.index()] = Some(u);
                            self.parent_edge[v.index()] = Some(edge);
                            queue.push_back(v);
                        }
                    }
                }
            }
        }
    }

    /// True iff `edge` lies on this tree and its target is currently reachable — the condition
    /// under which a disable forces a full recompute.
    fn is_tree_edge_of_reachable_node(&self, edge: EdgeId, graph: &DynamicGraph) -> bool {
        let to = graph.to_of(edge);
        self.reachable[to.index()] && self.parent_edge[to.index()] == Some(edge)
    }
}

impl ReachOracle for SearchTree {
    fn update(&mut self, graph: &DynamicGraph) {
        let changes = graph.changes_since(self.last_version).to_vec();
        if changes.is_empty() {
            self.stats.skipped += 1;
            self.last_version = graph.history_version();
            return;
        }

        // Walk the batch in log order rather than pre-classifying the whole window: an earlier
        // entry in this same batch may make a later disable's tree-edge check stale (e.g. an
        // edge gets enabled and incorporated into the tree, then disabled again, within one
        // propagation round), so whether a full recompute is needed is re-evaluated per entry
        // against the oracle's current state.
        let mut did_full = false;
        for c in &changes {
            match c.kind {
                ChangeKind::Disabled => {
                    if self.is_tree_edge_of_reachable_node(c.edge, graph) {
                        self.full_recompute(graph);
                        did_full = true;
                    }
                }
                ChangeKind::Enabled => {
                    let from = graph.from_of(c.edge);
                    let to = graph.to_of(c.edge);
                    if self.reachable[from.index()] {
                        let nd = self.dist[from.index()].saturating_add(self.edge_weight(c.edge));
                        if !self.reachable[to.index()] || self.dist[to.index()] > nd {
                            self.reachable[to.index()] = true;
                            self.dist[to.index()] = nd;
                            self.parent[to.index()] = Some(from);
                            self.parent_edge[to.index()] = Some(c.edge);
                            self.relax_from(graph, to);
                        }
                    }
                }
            }
        }
        if did_full {
            self.stats.failed_fast += 1;
        } else {
            self.stats.fast += 1;
        }
        self.last_version = graph.history_version();
    }

    fn connected(&self, t: NodeId) -> bool {
        self.reachable[t.index()]
    }

    fn connected_unsafe(&self, t: NodeId) -> bool {
        self.reachable[t.index()]
    }

    fn previous(&self, t: NodeId) -> Option<NodeId> {
        self.parent[t.index()]
    }

    fn distance(&self, t: NodeId) -> Option<u64> {
        if !self.track_distance || !self.reachable[t.index()] {
            return None;
        }
        Some(self.dist[t.index()])
    }

    fn previous_edge(&self, t: NodeId) -> Option<EdgeId> {
        self.parent_edge[t.index()]
    }

    fn stats(&self) -> UpdateStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::dynamic_graph::DynamicGraph;

    #[test]
    fn connectivity_tracks_path_through_enables_and_disables() {
        let mut g = DynamicGraph::new();
        let a = g.add_node();
        let b = g.add_node();
        let c = g.add_node();
        let e1 = g.add_edge(a, b);
        let e2 = g.add_edge(b, c);

        let mut oracle = SearchTree::connectivity(a, 3);
        oracle.update(&g);
        assert!(!oracle.connected(c));

        g.enable_edge(e1);
        g.enable_edge(e2);
        oracle.update(&g);
        assert!(oracle.connected(c));
        assert_eq!(oracle.previous(c), Some(b));

        g.disable_edge(e1);
        oracle.update(&g);
        assert!(!oracle.connected(c));
    }

    #[test]
    fn bfs_distance_counts_hops() {
        let mut g = DynamicGraph::new();
        let a = g.add_node();
        let b = g.add_node();
        let c = g.add_node();
        let e1 = g.add_edge(a, b);
        let e2 = g.add_edge(b, c);
        g.enable_edge(e1);
        g.enable_edge(e2);

        let mut oracle = SearchTree::bfs_distance(a, 3);
        oracle.update(&g);
        assert_eq!(oracle.distance(c), Some(2));
    }
}
