// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! The graph-reachability theory: a dynamic directed graph whose edges are SAT literals, source-
//! rooted reachability oracles, s-t min-cut for why-not-reachable reasons, and the detector/
//! theory objects that tie them into the CDCL core.

pub mod dynamic_graph;
pub mod mincut;
pub mod reach_detector;
pub mod reach_oracle;
pub mod theory;

pub use dynamic_graph::{DynamicGraph, EdgeId, NodeId};
pub use mincut::{EdmondsKarp, FordFulkerson, MinCutAlgorithm, MinCutOracle};
pub use reach_detector::ReachDetector;
pub use reach_oracle::{ReachOracle, SearchTree, UpdateStats};
pub use theory::GraphTheory;
