// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! s-t min-cut over a weighted view of the graph, used to extract why-not-reachable
//! explanations.
//!
//! Weights: a disabled edge (its literal currently false) has capacity 1; an enabled or
//! unassigned edge has capacity [`INFINITE_CAPACITY`]. Max-flow/min-cut duality then guarantees
//! the returned cut consists only of disabled edges, as long as one exists — which it always
//! does when the detector calls this (it only runs in the already-established unreachable case).

use super::dynamic_graph::{DynamicGraph, EdgeId, NodeId};
use std::collections::{HashMap, VecDeque};

/// Stand-in for "infinite" capacity: large enough that no finite cut of disabled edges could
/// ever be out-weighed by including one enabled edge.
pub const INFINITE_CAPACITY: u64 = u32::MAX as u64;

/// A pluggable s-t max-flow algorithm, used only to derive a min-cut. Concrete variants are
/// selected at construction time rather than dispatched on a runtime flag.
pub trait MinCutAlgorithm {
    /// Returns the edges of an s-t min-cut: the disabled edges whose collective enabling is
    /// necessary for `source` to reach `sink`.
    fn min_cut(
        &self,
        graph: &DynamicGraph,
        capacity: &dyn Fn(EdgeId) -> u64,
        source: NodeId,
        sink: NodeId,
    ) -> Vec<EdgeId>;
}

/// Shared residual-network bookkeeping: flow pushed on each edge, looked up by edge index.
struct Residual {
    flow: HashMap<EdgeId, i64>,
}

impl Residual {
    fn new() -> Self {
        Residual { flow: HashMap::new() }
    }

    fn flow_of(&self, edge: EdgeId) -> i64 {
        *self.flow.get(&edge).unwrap_or(&0)
    }

    /// Residual capacity of the forward direction of `edge`.
    fn forward_residual(&self, edge: EdgeId, capacity: &dyn Fn(EdgeId) -> u64) -> i64 {
        capacity(edge) as i64 - self.flow_of(edge)
    }

    fn push(&mut self, edge: EdgeId, amount: i64) {
        *self.flow.entry(edge).or_insert(0) += amount;
    }
}

/// One step of residual-graph adjacency from `u`: forward arcs (original direction, residual
/// capacity `cap - flow`) and backward arcs (reverse of an edge with positive flow, residual
/// capacity `flow`).
fn residual_neighbors(
    graph: &DynamicGraph,
    residual: &Residual,
    capacity: &dyn Fn(EdgeId) -> u64,
    u: NodeId,
) -> Vec<(NodeId, EdgeId, bool)> {
    let mut out = Vec::new();
    for (edge, v) in graph.enabled_out_edges(u) {
        if residual.forward_residual(edge, capacity) > 0 {
            out.push((v, edge, true));
        }
    }
    for (edge, v) in graph.enabled_in_edges(u) {
        if residual.flow_of(edge) > 0 {
            out.push((v, edge, false));
        }
    }
    out
}

/// Runs a generic max-flow loop given a closure that finds one augmenting path (as a list of
/// `(to_node, edge, is_forward)` steps from `source`), pushing flow until none remains, then
/// returns the min-cut: edges from the residual-reachable side to the non-reachable side.
fn max_flow_then_cut(
    graph: &DynamicGraph,
    capacity: &dyn Fn(EdgeId) -> u64,
    source: NodeId,
    sink: NodeId,
    mut find_path: impl FnMut(&DynamicGraph, &Residual, &dyn Fn(EdgeId) -> u64, NodeId, NodeId) -> Option<Vec<(NodeId, EdgeId, bool)>>,
) -> Vec<EdgeId> {
    let mut residual = Residual::new();
    while let Some(path) = find_path(graph, &residual, capacity, source, sink) {
        let bottleneck = path
            .iter()
            .map(|&(_, edge, forward)| {
                if forward {
                    capacity(edge) as i64 - residual.flow_of(edge)
                } else {
                    residual.flow_of(edge)
                }
            })
            .min()
            .unwrap_or(0);
        if bottleneck <= 0 {
            break;
        }
        for &(_, edge, forward) in &path {
            if forward {
                residual.push(edge, bottleneck);
            } else {
                residual.push(edge, -bottleneck);
            }
        }
    }

    // Min-cut side: nodes reachable from `source` in the final residual graph.
    let mut reachable = vec![false; graph.num_nodes()];
    reachable[source.index()] = true;
    let mut queue = VecDeque::new();
    queue.push_back(source);
    while let Some(u) = queue.pop_front() {
        for (v, _, _) in residual_neighbors(graph, &residual, capacity, u) {
            if !reachable[v.index()] {
                reachable[v.index()] = true;
                queue.push_back(v);
            }
        }
    }

    let mut cut = Vec::new();
    for node in graph_nodes(graph) {
        if !reachable[node.index()] {
            continue;
        }
        for (edge, v) in graph.enabled_out_edges(node) {
            if !reachable[v.index()] {
                cut.push(edge);
            }
        }
    }
    cut
}

fn graph_nodes(graph: &DynamicGraph) -> impl Iterator<Item = NodeId> {
    (0..graph.num_nodes()).map(NodeId::new)
}

/// BFS augmenting-path max-flow (the classic Edmonds-Karp specialisation of Ford-Fulkerson).
#[derive(Debug, Default)]
pub struct EdmondsKarp;

impl MinCutAlgorithm for EdmondsKarp {
    fn min_cut(
        &self,
        graph: &DynamicGraph,
        capacity: &dyn Fn(EdgeId) -> u64,
        source: NodeId,
        sink: NodeId,
    ) -> Vec<EdgeId> {
        max_flow_then_cut(graph, capacity, source, sink, |graph, residual, capacity, source, sink| {
            let mut came_from: HashMap<NodeId, (NodeId, EdgeId, bool)> = HashMap::new();
            let mut visited = vec![false; graph.num_nodes()];
            visited[source.index()] = true;
            let mut queue = VecDeque::new();
            queue.push_back(source);
            while let Some(u) = queue.pop_front() {
                if u == sink {
                    break;
                }
                for (v, edge, forward) in residual_neighbors(graph, residual, capacity, u) {
                    if !visited[v.index()] {
                        visited[v.index()] = true;
                        came_from.insert(v, (u, edge, forward));
                        queue.push_back(v);
                    }
                }
            }
            reconstruct_path(sink, source, &came_from)
        })
    }
}

/// DFS augmenting-path max-flow.
#[derive(Debug, Default)]
pub struct FordFulkerson;

impl MinCutAlgorithm for FordFulkerson {
    fn min_cut(
        &self,
        graph: &DynamicGraph,
        capacity: &dyn Fn(EdgeId) -> u64,
        source: NodeId,
        sink: NodeId,
    ) -> Vec<EdgeId> {
        max_flow_then_cut(graph, capacity, source, sink, |graph, residual, capacity, source, sink| {
            let mut came_from: HashMap<NodeId, (NodeId, EdgeId, bool)> = HashMap::new();
            let mut visited = vec![false; graph.num_nodes()];
            visited[source.index()] = true;
            let mut stack = vec![source];
            while let Some(u) = stack.pop() {
                if u == sink {
                    break;
                }
                for (v, edge, forward) in residual_neighbors(graph, residual, capacity, u) {
                    if !visited[v.index()] {
                        visited[v.index()] = true;
                        came_from.insert(v, (u, edge, forward));
                        stack.push(v);
                    }
                }
            }
            reconstruct_path(sink, source, &came_from)
        })
    }
}

fn reconstruct_path(
    sink: NodeId,
    source: NodeId,
    came_from: &HashMap<NodeId, (NodeId, EdgeId, bool)>,
) -> Option<Vec<(NodeId, EdgeId, bool)>> {
    if sink == source {
        return None;
    }
    if !came_from.contains_key(&sink) {
        return None;
    }
    let mut path = Vec::new();
    let mut cur = sink;
    while cur != source {
        let &(prev, edge, forward) = came_from.get(&cur)?;
        path.push((cur, edge, forward));
        cur = prev;
    }
    path.reverse();
    Some(path)
}

/// Computes an s-t min-cut on demand, plugging in whichever [`MinCutAlgorithm`] the theory was
/// configured with.
pub struct MinCutOracle {
    algorithm: Box<dyn MinCutAlgorithm>,
}

impl MinCutOracle {
    pub fn new(algorithm: Box<dyn MinCutAlgorithm>) -> Self {
        MinCutOracle { algorithm }
    }

    pub fn min_cut(
        &self,
        graph: &DynamicGraph,
        capacity: &dyn Fn(EdgeId) -> u64,
        source: NodeId,
        sink: NodeId,
    ) -> Vec<EdgeId> {
        self.algorithm.min_cut(graph, capacity, source, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_diamond() -> (DynamicGraph, NodeId, NodeId, NodeId, NodeId, Vec<EdgeId>) {
        let mut g = DynamicGraph::new();
        let s = g.add_node();
        let a = g.add_node();
        let b = g.add_node();
        let t = g.add_node();
        let edges = vec![g.add_edge(s, a), g.add_edge(s, b), g.add_edge(a, t), g.add_edge(b, t)];
        for &e in &edges {
            g.enable_edge(e); // Gcut always contains every edge
        }
        (g, s, a, b, t, edges)
    }

    #[test]
    fn min_cut_finds_two_disabled_edges_blocking_all_paths() {
        let (g, s, _a, _b, t, edges) = build_diamond();
        // s->a and s->b both disabled (capacity 1); the a->t/b->t edges are "enabled" (infinite).
        let disabled = [edges[0], edges[1]];
        let capacity = |e: EdgeId| if disabled.contains(&e) { 1 } else { INFINITE_CAPACITY };

        let oracle = MinCutOracle::new(Box::new(EdmondsKarp));
        let cut = oracle.min_cut(&g, &capacity, s, t);
        assert_eq!(cut.len(), 2);
        assert!(cut.contains(&edges[0]));
        assert!(cut.contains(&edges[1]));
    }

    #[test]
    fn ford_fulkerson_agrees_with_edmonds_karp_on_a_single_path() {
        let mut g = DynamicGraph::new();
        let s = g.add_node();
        let m = g.add_node();
        let t = g.add_node();
        let e1 = g.add_edge(s, m);
        let e2 = g.add_edge(m, t);
        g.enable_edge(e1);
        g.enable_edge(e2);
        let disabled = [e2];
        let capacity = |e: EdgeId| if disabled.contains(&e) { 1 } else { INFINITE_CAPACITY };

        let ek = MinCutOracle::new(Box::new(EdmondsKarp)).min_cut(&g, &capacity, s, t);
        let ff = MinCutOracle::new(Box::new(FordFulkerson)).min_cut(&g, &capacity, s, t);
        assert_eq!(ek, vec![e2]);
        assert_eq!(ff, vec![e2]);
    }
}
