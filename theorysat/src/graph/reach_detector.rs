// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! Binds a `(source, target, literal)` triple to a pair of reachability oracles and supplies
//! propagation and reason construction for it.

use super::dynamic_graph::{DynamicGraph, EdgeId, NodeId};
use super::mincut::MinCutOracle;
use super::reach_oracle::{ReachOracle, SearchTree};
use crate::core::{LBool, Lit, ReasonMarker, SolverApi, Var};
use std::collections::HashMap;

struct TargetBinding {
    target: NodeId,
    lit: Lit,
}

/// A single reach detector: one source node, any number of bound targets, sharing one pair of
/// oracles (`positive` over G⁺, `negative` over G⁻) plus an independent `path_oracle` used only
/// to extract reach reasons, kept distinct from `positive` so that a random-weighted decision
/// oracle never makes a reason non-shortest.
pub struct ReachDetector {
    pub source: NodeId,
    targets: Vec<TargetBinding>,
    var_to_target: HashMap<Var, usize>,
    positive: SearchTree,
    negative: SearchTree,
    path_oracle: SearchTree,
    mincut: MinCutOracle,
    reach_marker: ReasonMarker,
    non_reach_marker: ReasonMarker,
    /// Allocated for interface completeness but never dispatched: `decide` returns a plain
    /// decision literal, which by construction needs no reason.
    #[allow(dead_code)]
    forced_reach_marker: ReasonMarker,
    use_weighted_decisions: bool,
}

impl ReachDetector {
    pub fn new(
        source: NodeId,
        num_nodes: usize,
        use_weighted_decisions: bool,
        edge_weight: impl Fn(EdgeId) -> u64 + Clone + 'static,
        mincut: MinCutOracle,
        api: &mut dyn SolverApi,
        theory_index: usize,
    ) -> Self {
        let positive = if use_weighted_decisions {
            SearchTree::dijkstra(source, num_nodes, edge_weight.clone())
        } else {
            SearchTree::connectivity(source, num_nodes)
        };
        // Path reasons always walk an unweighted shortest path, regardless of whether decisions
        // use a weighted tiebreak, so a reason never contains more edges than necessary.
        let path_oracle = SearchTree::bfs_distance(source, num_nodes);
        // `negative` doubles as the path `decide()` walks to find a forced-reach edge: it must
        // track the same weighting as `positive` so a random-weighted decision heuristic actually
        // walks a random-weighted path, not an arbitrary unweighted one.
        let negative = if use_weighted_decisions {
            SearchTree::dijkstra(source, num_nodes, edge_weight)
        } else {
            SearchTree::connectivity(source, num_nodes)
        };

        ReachDetector {
            source,
            targets: Vec::new(),
            var_to_target: HashMap::new(),
            positive,
            negative,
            path_oracle,
            mincut,
            reach_marker: api.new_reason_marker(theory_index),
            non_reach_marker: api.new_reason_marker(theory_index),
            forced_reach_marker: api.new_reason_marker(theory_index),
            use_weighted_decisions,
        }
    }

    /// Binds `target` to `lit`: `lit` is true iff `source` can reach `target`.
    pub fn add_target(&mut self, target: NodeId, lit: Lit) {
        self.targets.push(TargetBinding { target, lit });
        // Targets must be visited in target-id order for deterministic conflict selection.
        self.targets.sort_by_key(|b| b.target.index());
        self.var_to_target.clear();
        for (i, b) in self.targets.iter().enumerate() {
            self.var_to_target.insert(b.lit.var(), i);
        }
    }

    pub fn owns_var(&self, var: Var) -> bool {
        self.var_to_target.contains_key(&var)
    }

    pub fn target_for_var(&self, var: Var) -> Option<NodeId> {
        self.var_to_target.get(&var).map(|&i| self.targets[i].target)
    }

    pub fn reach_marker(&self) -> ReasonMarker {
        self.reach_marker
    }

    pub fn non_reach_marker(&self) -> ReasonMarker {
        self.non_reach_marker
    }

    /// Updates both oracles against the current graph state and enqueues or conflicts on each
    /// bound target, in target-id order. `edge_lit` maps a dense edge id to its controlling
    /// literal, supplied by the owning `GraphTheory`.
    pub fn propagate(
        &mut self,
        g: &DynamicGraph,
        antig: &DynamicGraph,
        cutg: &DynamicGraph,
        api: &mut dyn SolverApi,
        edge_lit: &dyn Fn(EdgeId) -> Lit,
    ) -> Result<(), Vec<Lit>> {
        self.positive.update(g);
        self.negative.update(antig);
        self.path_oracle.update(g);

        for i in 0..self.targets.len() {
            let (target, lit) = (self.targets[i].target, self.targets[i].lit);
            let value = api.value(lit);

            if self.positive.connected(target) && value != LBool::True {
                if value == LBool::Undef {
                    api.enqueue(lit, self.reach_marker);
                } else {
                    return Err(self.build_reach_reason(target, lit, edge_lit));
                }
            }

            if !self.negative.connected(target) && value != LBool::False {
                if value == LBool::Undef {
                    api.enqueue(!lit, self.non_reach_marker);
                } else {
                    return Err(self.build_cut_reason(cutg, target, !lit, api, edge_lit));
                }
            }
        }
        Ok(())
    }

    /// Reconstructs the reach-path reason: `lit` itself, followed by the negation of every edge
    /// literal on the `path_oracle` parent chain from `target` back to `source`.
    pub fn build_reach_reason(
        &self,
        target: NodeId,
        lit: Lit,
        edge_lit: &dyn Fn(EdgeId) -> Lit,
    ) -> Vec<Lit> {
        let mut clause = vec![lit];
        let mut cur = target;
        while cur != self.source {
            let edge = self.path_oracle.previous_edge(cur).expect("reachable node has a parent edge");
            clause.push(!edge_lit(edge));
            cur = self.path_oracle.previous(cur).expect("edge implies a parent");
        }
        clause
    }

    /// Reconstructs the non-reach cut reason: `neg_lit` itself, followed by every s-t min-cut
    /// edge's own literal, emitted positively since those edges are currently false.
    ///
    /// Runs over `cutg` (every edge enabled, regardless of assignment), not `antig`: the min-cut
    /// needs to traverse edges that are currently false in order to find them as the cut, but
    /// `antig`'s adjacency lists skip disabled edges entirely, so a cut search over `antig` can
    /// never see a capacity-1 edge and always returns an empty (unsound) cut.
    pub fn build_cut_reason(
        &self,
        cutg: &DynamicGraph,
        target: NodeId,
        neg_lit: Lit,
        api: &mut dyn SolverApi,
        edge_lit: &dyn Fn(EdgeId) -> Lit,
    ) -> Vec<Lit> {
        let capacity = |edge: EdgeId| match api.value(edge_lit(edge)) {
            LBool::False => 1,
            _ => super::mincut::INFINITE_CAPACITY,
        };
        let mut clause = vec![neg_lit];
        for e in self.mincut.min_cut(cutg, &capacity, self.source, target) {
            clause.push(edge_lit(e));
        }
        clause
    }

    /// Optional forced-reach decision: an unassigned edge on the anti-graph's current path
    /// towards a target whose reach literal is true but not yet positively connected, or `None`.
    ///
    /// Walks `negative` rather than `positive`/`path_oracle`: both of those only ever see edges
    /// already assigned true, so for a target not yet positively connected they have no parent
    /// chain to walk at all. `negative` tracks G⁻ (edges not false), which is exactly the
    /// over-approximation that still contains a potential path through unassigned edges.
    pub fn decide(&self, api: &mut dyn SolverApi, edge_lit: &dyn Fn(EdgeId) -> Lit) -> Option<Lit> {
        for binding in &self.targets {
            if api.value(binding.lit) != LBool::True || self.positive.connected(binding.target) {
                continue;
            }
            let mut cur = binding.target;
            while let Some(edge) = self.negative.previous_edge(cur) {
                let lit = edge_lit(edge);
                if api.value(lit) == LBool::Undef {
                    return Some(lit);
                }
                cur = self.negative.previous(cur)?;
            }
        }
        None
    }

    pub fn uses_weighted_decisions(&self) -> bool {
        self.use_weighted_decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::mincut::EdmondsKarp;
    use crate::core::Solver;

    /// Property 5: every literal in a cut reason is currently assigned false, and the set is an
    /// s-t cut. Triangle 0->1 (a), 1->2 (b), 0->2 (c); a and c false, b unassigned, r=true bound
    /// to reach(0, 2) — the cut must be {a, c}, not empty.
    ///
    /// Regression for a bug where `build_cut_reason` ran the min-cut over `antig` (G⁻): in G⁻ a
    /// disabled edge is absent from the adjacency lists the max-flow traverses, so it can never
    /// appear in a cut. The fix runs the search over `cutg`, the all-edges-enabled view, instead.
    #[test]
    fn cut_reason_finds_the_disabled_edges_not_an_empty_cut() {
        let mut solver = Solver::new();
        let a = Lit::new(solver.new_var(), false);
        let b = Lit::new(solver.new_var(), false);
        let c = Lit::new(solver.new_var(), false);
        let r = Lit::new(solver.new_var(), false);
        solver.add_clause(vec![!a]);
        solver.add_clause(vec![!c]);
        solver.add_clause(vec![r]);
        solver.solve();
        assert_eq!(solver.value(a), LBool::False);
        assert_eq!(solver.value(c), LBool::False);
        assert_eq!(solver.value(r), LBool::True);
        // b is free (no clause constrains it): it gets assigned some value by the bare solver's
        // own decision loop, but either way it is not false, so it carries infinite capacity and
        // must not appear in the cut.
        assert_ne!(solver.value(b), LBool::False);

        let mut cutg = DynamicGraph::new();
        let n0 = cutg.add_node();
        let n1 = cutg.add_node();
        let n2 = cutg.add_node();
        let ea = cutg.add_edge(n0, n1);
        let eb = cutg.add_edge(n1, n2);
        let ec = cutg.add_edge(n0, n2);
        cutg.enable_edge(ea);
        cutg.enable_edge(eb);
        cutg.enable_edge(ec);

        let theory_index = solver.num_theories();
        let detector = ReachDetector::new(
            n0,
            3,
            false,
            |_| 1u64,
            MinCutOracle::new(Box::new(EdmondsKarp)),
            solver.api(),
            theory_index,
        );
        let edge_lit = |e: EdgeId| match e.index() {
            0 => a,
            1 => b,
            2 => c,
            _ => unreachable!(),
        };

        let clause = detector.build_cut_reason(&cutg, n2, !r, solver.api(), &edge_lit);
        assert!(clause.contains(&!r));
        assert!(clause.contains(&a), "clause {clause:?} is missing the disabled edge a");
        assert!(clause.contains(&c), "clause {clause:?} is missing the disabled edge c");
        assert_eq!(clause.len(), 3, "clause {clause:?} should contain exactly {{!r, a, c}}");
    }
}
