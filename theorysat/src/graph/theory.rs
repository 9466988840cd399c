// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! `GraphTheory`: the `Theory` implementation tying `DynamicGraph`, the reach oracles and
//! `MinCutOracle` together into the host's theory-cooperation protocol.

use super::dynamic_graph::{DynamicGraph, EdgeId, NodeId};
use super::mincut::{MinCutAlgorithm, MinCutOracle};
use super::reach_detector::ReachDetector;
use crate::core::{Lit, ReasonMarker, SolverApi, Theory, Var};
use log::trace;
use rand::Rng;
use std::collections::HashMap;

#[derive(Clone, Copy)]
struct EdgeTrailRecord {
    edge: EdgeId,
    enqueued_lit: Lit,
}

#[derive(Clone, Copy)]
struct MarkerInfo {
    detector: usize,
    is_reach: bool,
}

/// The graph-reachability theory: owns the three coupled `DynamicGraph` views and any
/// number of `ReachDetector`s registered against them.
pub struct GraphTheory {
    g: DynamicGraph,
    antig: DynamicGraph,
    cutg: DynamicGraph,
    edge_lits: Vec<Lit>,
    edge_weights: Vec<u64>,
    lit_to_edge: HashMap<Var, EdgeId>,
    detectors: Vec<ReachDetector>,
    marker_info: HashMap<ReasonMarker, MarkerInfo>,
    trail: Vec<EdgeTrailRecord>,
    level_marks: Vec<usize>,
    theory_index: usize,
}

impl GraphTheory {
    pub fn new(theory_index: usize) -> Self {
        GraphTheory {
            g: DynamicGraph::new(),
            antig: DynamicGraph::new(),
            cutg: DynamicGraph::new(),
            edge_lits: Vec::new(),
            edge_weights: Vec::new(),
            lit_to_edge: HashMap::new(),
            detectors: Vec::new(),
            marker_info: HashMap::new(),
            trail: Vec::new(),
            level_marks: Vec::new(),
            theory_index,
        }
    }

    /// Adds a node to all three coupled graph views, which stay in lockstep node-for-node.
    pub fn add_node(&mut self) -> NodeId {
        self.antig.add_node();
        self.cutg.add_node();
        self.g.add_node()
    }

    /// Adds an edge controlled by a fresh Boolean literal. The edge starts disabled in `G⁺`
    /// (nothing assigned yet) but enabled in `G⁻` and `Gcut`, matching their "not false" / "all
    /// edges" semantics for an as-yet-unassigned literal.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, api: &mut dyn SolverApi) -> (EdgeId, Lit) {
        let var = api.new_var();
        let lit = Lit::new(var, false);
        let e1 = self.g.add_edge(from, to);
        let e2 = self.antig.add_edge(from, to);
        let e3 = self.cutg.add_edge(from, to);
        debug_assert_eq!(e1, e2);
        debug_assert_eq!(e1, e3);
        self.antig.enable_edge(e2);
        self.cutg.enable_edge(e3);
        self.edge_lits.push(lit);
        self.edge_weights.push(1);
        self.lit_to_edge.insert(var, e1);
        (e1, lit)
    }

    /// Adds an edge controlled by an already-allocated literal (used by the parser, where the
    /// literal comes from the problem text's shared variable pool rather than being minted
    /// fresh). Otherwise identical to [`GraphTheory::add_edge`].
    pub fn bind_edge(&mut self, from: NodeId, to: NodeId, lit: Lit) -> EdgeId {
        let e1 = self.g.add_edge(from, to);
        let e2 = self.antig.add_edge(from, to);
        let e3 = self.cutg.add_edge(from, to);
        debug_assert_eq!(e1, e2);
        debug_assert_eq!(e1, e3);
        self.antig.enable_edge(e2);
        self.cutg.enable_edge(e3);
        self.edge_lits.push(lit);
        self.edge_weights.push(1);
        self.lit_to_edge.insert(lit.var(), e1);
        e1
    }

    pub fn edge_lit(&self, edge: EdgeId) -> Lit {
        self.edge_lits[edge.index()]
    }

    /// Registers a reach detector rooted at `source`, returning its index for `bind_target`.
    pub fn add_reach_detector(
        &mut self,
        source: NodeId,
        use_weighted_decisions: bool,
        mincut_algorithm: Box<dyn MinCutAlgorithm>,
        api: &mut dyn SolverApi,
    ) -> usize {
        if use_weighted_decisions {
            let mut rng = rand::thread_rng();
            for w in self.edge_weights.iter_mut() {
                *w = rng.gen_range(1..=1000);
            }
        }
        let num_nodes = self.g.num_nodes();
        let weights = self.edge_weights.clone();
        let detector = ReachDetector::new(
            source,
            num_nodes,
            use_weighted_decisions,
            move |e: EdgeId| weights[e.index()],
            MinCutOracle::new(mincut_algorithm),
            api,
            self.theory_index,
        );
        self.marker_info.insert(
            detector.reach_marker(),
            MarkerInfo { detector: self.detectors.len(), is_reach: true },
        );
        self.marker_info.insert(
            detector.non_reach_marker(),
            MarkerInfo { detector: self.detectors.len(), is_reach: false },
        );
        self.detectors.push(detector);
        self.detectors.len() - 1
    }

    pub fn bind_target(&mut self, detector: usize, target: NodeId, lit: Lit) {
        self.detectors[detector].add_target(target, lit);
    }

    fn undo_record(&mut self, record: EdgeTrailRecord) {
        if !record.enqueued_lit.is_negated() {
            self.g.disable_edge(record.edge);
        } else {
            self.antig.enable_edge(record.edge);
        }
    }
}

impl Theory for GraphTheory {
    fn enqueue_theory(&mut self, lit: Lit, _api: &mut dyn SolverApi) {
        if let Some(&edge) = self.lit_to_edge.get(&lit.var()) {
            self.trail.push(EdgeTrailRecord { edge, enqueued_lit: lit });
            if !lit.is_negated() {
                self.g.enable_edge(edge);
            } else {
                self.antig.disable_edge(edge);
            }
        }
    }

    fn propagate_theory(&mut self, api: &mut dyn SolverApi) -> Result<(), Vec<Lit>> {
        let edge_lits = &self.edge_lits;
        let edge_lit = |e: EdgeId| edge_lits[e.index()];
        for detector in self.detectors.iter_mut() {
            detector.propagate(&self.g, &self.antig, &self.cutg, api, &edge_lit)?;
        }
        Ok(())
    }

    fn build_reason(&mut self, lit: Lit, marker: ReasonMarker, api: &mut dyn SolverApi) -> Vec<Lit> {
        let info = *self.marker_info.get(&marker).expect("marker was allocated by this theory");
        let edge_lits = &self.edge_lits;
        let edge_lit = |e: EdgeId| edge_lits[e.index()];
        let target = self.detectors[info.detector]
            .target_for_var(lit.var())
            .expect("reason literal is bound to a target in this detector");
        if info.is_reach {
            self.detectors[info.detector].build_reach_reason(target, lit, &edge_lit)
        } else {
            self.detectors[info.detector].build_cut_reason(&self.cutg, target, lit, api, &edge_lit)
        }
    }

    fn backtrack_until(&mut self, level: usize) {
        if level < self.level_marks.len() {
            let target = self.level_marks[level];
            for i in (target..self.trail.len()).rev() {
                let record = self.trail[i];
                self.undo_record(record);
            }
            self.trail.truncate(target);
            self.level_marks.truncate(level);
        }
    }

    fn backtrack_until_lit(&mut self, lit: Lit) {
        if let Some(pos) = self.trail.iter().rposition(|r| r.enqueued_lit == lit) {
            for i in (pos + 1..self.trail.len()).rev() {
                let record = self.trail[i];
                self.undo_record(record);
            }
            self.trail.truncate(pos + 1);
            trace!("rewound graph theory state to just after {:?}", lit);
        }
    }

    fn new_decision_level(&mut self) {
        self.level_marks.push(self.trail.len());
    }

    fn decide_theory(&mut self, api: &mut dyn SolverApi) -> Option<Lit> {
        let edge_lits = &self.edge_lits;
        let edge_lit = |e: EdgeId| edge_lits[e.index()];
        for detector in self.detectors.iter() {
            if let Some(lit) = detector.decide(api, &edge_lit) {
                return Some(lit);
            }
        }
        None
    }

    fn check_solved(&mut self, api: &mut dyn SolverApi) -> bool {
        let edge_lits = &self.edge_lits;
        let edge_lit = |e: EdgeId| edge_lits[e.index()];
        for detector in self.detectors.iter_mut() {
            if detector.propagate(&self.g, &self.antig, &self.cutg, api, &edge_lit).is_err() {
                return false;
            }
        }
        true
    }
}
