// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! The narrow interface through which the CDCL core and a theory solver cooperate.
//!
//! [`SolverApi`] is what a theory is allowed to call on the host: allocate variables and reason
//! markers, read the current trail, and enqueue implied literals. [`Theory`] is the dual
//! interface the host calls on each registered theory. Neither side reaches into the other's
//! private state; a [`ReasonMarker`] is the only value that crosses the boundary linking an
//! enqueued literal back to the theory that can explain it.

use super::types::{Lit, Var};

/// An opaque token identifying which theory, and which semantic reason, produced an enqueued
/// literal. The host stores it alongside the literal on the trail; `build_reason` is later
/// called with it so the theory can dispatch to the right explanation routine.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ReasonMarker(pub u32);

/// Operations a theory may invoke on the SAT core it is registered with.
pub trait SolverApi {
    /// Allocates a fresh Boolean variable.
    fn new_var(&mut self) -> Var;

    /// Allocates a fresh reason marker bound to the calling theory.
    fn new_reason_marker(&mut self, theory_index: usize) -> ReasonMarker;

    /// Records that `solver_var` is shared with theory `theory_index`'s internal variable
    /// `inner_var` (used by theories, such as `BVSetTheory`, that alias another theory's bits).
    fn set_theory_var(&mut self, solver_var: Var, theory_index: usize, inner_var: Var);

    /// Current ternary value of a literal.
    fn value(&self, lit: Lit) -> super::types::LBool;

    /// Decision level at which `var` was assigned, or the current level if unassigned.
    fn level(&self, var: Var) -> usize;

    /// Enqueues `lit` as forced, with `marker` recorded as its reason.
    fn enqueue(&mut self, lit: Lit, marker: ReasonMarker);

    /// Adds a clause to the core's clause database (used for preprocessing-time clauses).
    fn add_clause(&mut self, clause: Vec<Lit>);
}

/// The dual interface the SAT core calls on every registered theory.
///
/// Every method that might need to read the trail or enqueue a literal takes `api: &mut dyn
/// SolverApi` as an explicit argument rather than holding a back-reference to the solver: the
/// solver owns its theories in a `Vec<Box<dyn Theory>>` alongside its own state, so a theory
/// reaching back into the solver that owns it would be a borrow cycle. Passing the handle in
/// per-call avoids that back-pointer, the same discipline a detector uses towards its own theory,
/// applied one level up at the core/theory boundary.
pub trait Theory {
    /// Called once per literal as it is pushed onto the trail, in trail order.
    fn enqueue_theory(&mut self, lit: Lit, api: &mut dyn SolverApi);

    /// Runs propagation; returns `Ok(())` at quiescence or `Err(conflict_clause)`.
    fn propagate_theory(&mut self, api: &mut dyn SolverApi) -> Result<(), Vec<Lit>>;

    /// Called once the Boolean core believes the trail is a complete, consistent model; gives
    /// the theory a last chance to propagate or conflict before the core reports SAT.
    fn solve_theory(&mut self, api: &mut dyn SolverApi) -> Result<(), Vec<Lit>> {
        self.propagate_theory(api)
    }

    /// Reconstructs the reason clause for `lit`, which was enqueued with `marker`. By convention
    /// the returned clause has `lit` itself (in its assigned polarity) as element 0, followed by
    /// the negated antecedents, matching the shape conflict analysis expects of any reason.
    fn build_reason(&mut self, lit: Lit, marker: ReasonMarker, api: &mut dyn SolverApi) -> Vec<Lit>;

    /// Undoes all theory state above `level`.
    fn backtrack_until(&mut self, level: usize);

    /// Rewinds theory state to the point immediately after `lit` was propagated (used by
    /// `build_reason` when called from an earlier decision level than the propagation).
    fn backtrack_until_lit(&mut self, lit: Lit);

    /// Called by the host when starting a new decision level.
    fn new_decision_level(&mut self);

    /// Called when `lit` (previously enqueued by this theory) is being undone.
    fn undecide_theory(&mut self, #[allow(unused_variables)] lit: Lit) {}

    /// Optionally proposes a decision literal; `None` means the theory has no guidance.
    fn decide_theory(&mut self, #[allow(unused_variables)] api: &mut dyn SolverApi) -> Option<Lit> {
        None
    }

    /// Checks that the final model is consistent with this theory's constraints.
    fn check_solved(&mut self, api: &mut dyn SolverApi) -> bool;

    /// Runs one-time, pre-search clause emission.
    fn preprocess(&mut self, #[allow(unused_variables)] api: &mut dyn SolverApi) {}
}
