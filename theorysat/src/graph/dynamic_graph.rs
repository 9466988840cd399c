// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! A directed multigraph whose edges can be toggled enabled/disabled, with a change log that
//! lets oracles choose between incremental and full updates.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// Dense node identifier; a `petgraph::graph::NodeIndex` directly, since nodes are only ever
/// added and never removed, so indices stay stable for the graph's lifetime.
pub type NodeId = NodeIndex<u32>;
/// Dense edge identifier; same stability argument as [`NodeId`].
pub type EdgeId = EdgeIndex<u32>;

/// Per-edge mutable state: petgraph's edge weight.
#[derive(Clone, Copy, Debug)]
pub struct EdgeSlot {
    pub enabled: bool,
    from: NodeId,
    to: NodeId,
}

/// The kind of transition recorded in the change log.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChangeKind {
    Enabled,
    Disabled,
}

/// A single change-log entry: an edge transitioned at some point after the graph's creation.
#[derive(Clone, Copy, Debug)]
pub struct ChangeLogEntry {
    pub edge: EdgeId,
    pub kind: ChangeKind,
}

/// A directed multigraph with per-edge enable/disable and a monotonic version counter.
///
/// Backed by `petgraph::graph::DiGraph`: nodes and edges are append-only, so `NodeIndex`/
/// `EdgeIndex` double directly as dense node/edge identifiers. Disabled edges stay present in the
/// underlying graph (never removed) — adjacency iteration filters them out instead.
pub struct DynamicGraph {
    graph: DiGraph<(), EdgeSlot, u32>,
    history_version: u64,
    log: Vec<ChangeLogEntry>,
}

impl DynamicGraph {
    pub fn new() -> Self {
        DynamicGraph { graph: DiGraph::default(), history_version: 0, log: Vec::new() }
    }

    pub fn add_node(&mut self) -> NodeId {
        self.graph.add_node(())
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Adds a new edge, starting disabled. The caller's dense `edgeIndex` is expected to equal
    /// the returned `EdgeId`'s petgraph index, which holds as long as edges are always added
    /// through this method in order.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> EdgeId {
        self.graph.add_edge(from, to, EdgeSlot { enabled: false, from, to })
    }

    pub fn from_of(&self, edge: EdgeId) -> NodeId {
        self.graph[edge].from
    }

    pub fn to_of(&self, edge: EdgeId) -> NodeId {
        self.graph[edge].to
    }

    pub fn history_version(&self) -> u64 {
        self.history_version
    }

    pub fn edge_enabled(&self, edge: EdgeId) -> bool {
        self.graph[edge].enabled
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.graph.find_edge(from, to).is_some()
    }

    /// Enables `edge`; idempotent, only logs and bumps the version on an actual transition.
    pub fn enable_edge(&mut self, edge: EdgeId) {
        if !self.graph[edge].enabled {
            self.graph[edge].enabled = true;
            self.history_version += 1;
            self.log.push(ChangeLogEntry { edge, kind: ChangeKind::Enabled });
        }
    }

    /// Disables `edge`; idempotent, only logs and bumps the version on an actual transition.
    pub fn disable_edge(&mut self, edge: EdgeId) {
        if self.graph[edge].enabled {
            self.graph[edge].enabled = false;
            self.history_version += 1;
            self.log.push(ChangeLogEntry { edge, kind: ChangeKind::Disabled });
        }
    }

    /// Entries appended since `history_version` reached `since`. Oracles use this to decide
    /// incremental vs. full update without replaying the whole log each time.
    pub fn changes_since(&self, since: u64) -> &[ChangeLogEntry] {
        let count = (self.history_version - since.min(self.history_version)) as usize;
        let len = self.log.len();
        &self.log[len.saturating_sub(count)..]
    }

    /// Clears the change log. Called by `GraphTheory` only after every registered observer has
    /// advanced its cursor past the current log — `historyVersion` itself is not reset, so
    /// cursors recorded as absolute versions remain meaningful.
    pub fn clear_history(&mut self) {
        self.log.clear();
    }

    /// Enabled out-edges of `node`, skipping disabled entries.
    pub fn enabled_out_edges(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, NodeId)> + '_ {
        self.graph.edges_directed(node, Direction::Outgoing).filter_map(|e| {
            if e.weight().enabled {
                Some((e.id(), e.target()))
            } else {
                None
            }
        })
    }

    /// Enabled in-edges of `node`, used by the anti-graph min-cut construction.
    pub fn enabled_in_edges(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, NodeId)> + '_ {
        self.graph.edges_directed(node, Direction::Incoming).filter_map(|e| {
            if e.weight().enabled {
                Some((e.id(), e.source()))
            } else {
                None
            }
        })
    }
}

impl Default for DynamicGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_is_idempotent_and_logs_only_transitions() {
        let mut g = DynamicGraph::new();
        let a = g.add_node();
        let b = g.add_node();
        let e = g.add_edge(a, b);
        assert!(!g.edge_enabled(e));

        g.enable_edge(e);
        g.enable_edge(e);
        assert!(g.edge_enabled(e));
        assert_eq!(g.history_version(), 1);
        assert_eq!(g.changes_since(0).len(), 1);

        g.disable_edge(e);
        assert!(!g.edge_enabled(e));
        assert_eq!(g.history_version(), 2);
    }

    #[test]
    fn disabled_edges_are_skipped_in_adjacency() {
        let mut g = DynamicGraph::new();
        let a = g.add_node();
        let b = g.add_node();
        let e = g.add_edge(a, b);
        assert_eq!(g.enabled_out_edges(a).count(), 0);
        g.enable_edge(e);
        assert_eq!(g.enabled_out_edges(a).count(), 1);
    }
}
