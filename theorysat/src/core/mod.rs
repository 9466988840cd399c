// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! The Boolean CDCL core: variables, literals, the solver itself, and the narrow interface
//! theories use to cooperate with it.

pub mod solver;
pub mod theory;
pub mod types;

pub use solver::{SolveResult, Solver};
pub use theory::{ReasonMarker, SolverApi, Theory};
pub use types::{LBool, Lit, Var};
