// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! A minimal CDCL SAT core.
//!
//! This is deliberately small: no two-watched-literal propagation, no VSIDS decision heuristic,
//! no clause deletion or restarts — the graph and bitvector-set theories are the point, not the
//! decision heuristic or clause database internals of the Boolean core. What this core *does*
//! implement faithfully is the theory-cooperation protocol: the two-layer Boolean/theory
//! propagation fixpoint, lazy reason construction through [`Theory::build_reason`], and first-UIP
//! conflict analysis that resolves through theory reasons exactly like it resolves through clause
//! reasons.

use super::theory::{ReasonMarker, SolverApi, Theory};
use super::types::{LBool, Lit, Var};
use log::{debug, trace};

/// Why a variable currently holds the value it does.
enum Reason {
    /// Chosen by the search, not implied.
    Decision,
    /// Implied by unit propagation over `clauses[_]`.
    Clause(usize),
    /// Implied by theory `usize`, which can reconstruct the reason from `ReasonMarker` on
    /// demand.
    Theory(usize, ReasonMarker),
}

/// Outcome of [`Solver::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveResult {
    /// The problem is satisfiable; the trail holds a complete, theory-consistent model.
    Sat,
    /// The problem is unsatisfiable.
    Unsat,
}

/// The Boolean trail, clause database and assignment bookkeeping.
///
/// Split out from [`Solver`] so that a theory can be handed `&mut SolverCore` (via the
/// [`SolverApi`] trait object) while `Solver` still holds `&mut self.theories` disjointly — an
/// arena-and-index split that avoids a theory holding a back-pointer to its owning `Solver`.
pub struct SolverCore {
    assigns: Vec<LBool>,
    levels: Vec<Option<usize>>,
    reasons: Vec<Reason>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    clauses: Vec<Vec<Lit>>,
    qhead: usize,
    marker_theory: Vec<usize>,
    theory_var_links: Vec<(Var, usize, Var)>,
}

impl SolverCore {
    fn new() -> Self {
        SolverCore {
            assigns: Vec::new(),
            levels: Vec::new(),
            reasons: Vec::new(),
            trail: Vec::new(),
            trail_lim: Vec::new(),
            clauses: Vec::new(),
            qhead: 0,
            marker_theory: Vec::new(),
            theory_var_links: Vec::new(),
        }
    }

    fn num_vars(&self) -> usize {
        self.assigns.len()
    }

    fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    fn unchecked_enqueue(&mut self, lit: Lit, reason: Reason) {
        let v = lit.var();
        debug_assert_eq!(self.assigns[v.index()], LBool::Undef);
        self.assigns[v.index()] = if lit.is_negated() { LBool::False } else { LBool::True };
        self.levels[v.index()] = Some(self.decision_level());
        self.reasons[v.index()] = reason;
        self.trail.push(lit);
    }

    fn next_unassigned_var(&self) -> Option<Var> {
        self.assigns
            .iter()
            .position(|v| *v == LBool::Undef)
            .map(|i| Var(i as u32))
    }
}

impl SolverApi for SolverCore {
    fn new_var(&mut self) -> Var {
        let v = Var(self.assigns.len() as u32);
        self.assigns.push(LBool::Undef);
        self.levels.push(None);
        self.reasons.push(Reason::Decision);
        v
    }

    fn new_reason_marker(&mut self, theory_index: usize) -> ReasonMarker {
        let id = self.marker_theory.len() as u32;
        self.marker_theory.push(theory_index);
        ReasonMarker(id)
    }

    fn set_theory_var(&mut self, solver_var: Var, theory_index: usize, inner_var: Var) {
        self.theory_var_links.push((solver_var, theory_index, inner_var));
    }

    fn value(&self, lit: Lit) -> LBool {
        LBool::of_lit(self.assigns[lit.var().index()], lit)
    }

    fn level(&self, var: Var) -> usize {
        self.levels[var.index()].unwrap_or_else(|| self.decision_level())
    }

    fn enqueue(&mut self, lit: Lit, marker: ReasonMarker) {
        let theory_index = self.marker_theory[marker.0 as usize];
        self.unchecked_enqueue(lit, Reason::Theory(theory_index, marker));
    }

    fn add_clause(&mut self, clause: Vec<Lit>) {
        self.clauses.push(clause);
    }
}

/// The CDCL core together with its registered theories.
pub struct Solver {
    core: SolverCore,
    theories: Vec<Box<dyn Theory>>,
    theory_qhead: usize,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// Creates an empty solver with no variables, clauses or theories.
    pub fn new() -> Self {
        Solver { core: SolverCore::new(), theories: Vec::new(), theory_qhead: 0 }
    }

    /// Registers a theory, returning its index (used by the theory to tag its own markers).
    pub fn add_theory(&mut self, theory: Box<dyn Theory>) -> usize {
        self.theories.push(theory);
        self.theories.len() - 1
    }

    /// The index the next call to [`Solver::add_theory`] will assign. Building a theory requires
    /// knowing its own index up front (to tag the reason markers it allocates during
    /// construction), before it can be handed to `add_theory` — so callers reserve the index
    /// first: `let idx = solver.num_theories(); let theory = Theory::new(idx, solver.api());
    /// solver.add_theory(Box::new(theory));`
    pub fn num_theories(&self) -> usize {
        self.theories.len()
    }

    /// Allocates a fresh Boolean variable.
    pub fn new_var(&mut self) -> Var {
        self.core.new_var()
    }

    /// Number of variables allocated so far.
    pub fn num_vars(&self) -> usize {
        self.core.num_vars()
    }

    /// Current value of a literal.
    pub fn value(&self, lit: Lit) -> LBool {
        self.core.value(lit)
    }

    /// Adds a clause up front, before search begins (or during preprocessing).
    pub fn add_clause(&mut self, clause: Vec<Lit>) {
        self.core.add_clause(clause);
    }

    /// Gives mutable access to the core so a caller building the problem (e.g. the parser, or a
    /// theory during construction) can allocate reason markers / theory vars directly.
    pub fn api(&mut self) -> &mut dyn SolverApi {
        &mut self.core
    }

    fn new_decision_level(&mut self) {
        self.core.trail_lim.push(self.core.trail.len());
        for t in self.theories.iter_mut() {
            t.new_decision_level();
        }
    }

    /// Runs Boolean unit propagation to fixpoint by repeated linear clause scans.
    fn propagate_bool(&mut self) -> Result<(), Vec<Lit>> {
        loop {
            let mut progressed = false;
            for ci in 0..self.core.clauses.len() {
                let mut unassigned = None;
                let mut num_unassigned = 0usize;
                let mut satisfied = false;
                for &lit in &self.core.clauses[ci] {
                    match self.core.value(lit) {
                        LBool::True => {
                            satisfied = true;
                            break;
                        }
                        LBool::Undef => {
                            num_unassigned += 1;
                            unassigned = Some(lit);
                            if num_unassigned > 1 {
                                break;
                            }
                        }
                        LBool::False => {}
                    }
                }
                if satisfied {
                    continue;
                }
                if num_unassigned == 0 {
                    return Err(self.core.clauses[ci].clone());
                } else if num_unassigned == 1 {
                    let lit = unassigned.unwrap();
                    self.core.unchecked_enqueue(lit, Reason::Clause(ci));
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        self.core.qhead = self.core.trail.len();
        Ok(())
    }

    /// The two-layer Boolean/theory fixpoint: propagate Boolean units, hand every new
    /// trail literal to every theory in registration order, repeat until nothing changes.
    fn propagate(&mut self) -> Result<(), Vec<Lit>> {
        loop {
            self.propagate_bool()?;

            while self.theory_qhead < self.core.trail.len() {
                let lit = self.core.trail[self.theory_qhead];
                self.theory_qhead += 1;
                for t in self.theories.iter_mut() {
                    t.enqueue_theory(lit, &mut self.core);
                }
            }

            let trail_len_before = self.core.trail.len();
            for t in self.theories.iter_mut() {
                t.propagate_theory(&mut self.core)?;
            }
            if self.core.trail.len() == trail_len_before {
                return Ok(());
            }
        }
    }

    fn solve_theories(&mut self) -> Result<(), Vec<Lit>> {
        for t in self.theories.iter_mut() {
            t.solve_theory(&mut self.core)?;
        }
        Ok(())
    }

    fn check_solved(&mut self) -> bool {
        self.theories.iter_mut().all(|t| t.check_solved(&mut self.core))
    }

    /// Returns the reason clause for `p`'s assignment, canonicalised so that `clause[0] == p`.
    fn reason_clause(&mut self, p: Lit) -> Vec<Lit> {
        match self.core.reasons[p.var().index()] {
            Reason::Decision => unreachable!("analyze() never resolves through a decision"),
            Reason::Clause(ci) => {
                let mut lits = self.core.clauses[ci].clone();
                let pos = lits.iter().position(|&l| l.var() == p.var()).unwrap();
                lits.swap(0, pos);
                lits
            }
            Reason::Theory(ti, marker) => {
                self.theories[ti].backtrack_until_lit(p);
                self.theories[ti].build_reason(p, marker, &mut self.core)
            }
        }
    }

    /// First-UIP conflict analysis: resolves the conflicting clause backwards along the trail,
    /// through each literal's reason (Boolean clause or theory), until exactly one literal at
    /// the current decision level remains. Returns the learnt clause (asserting literal first)
    /// and the level to backtrack to.
    fn analyze(&mut self, conflict: Vec<Lit>) -> (Vec<Lit>, usize) {
        let num_vars = self.core.num_vars();
        let mut seen = vec![false; num_vars];
        let mut learnt: Vec<Lit> = vec![Lit::new(Var(0), false)]; // placeholder for slot 0
        let mut path_count = 0usize;
        let mut clause = conflict;
        let mut p: Option<Lit> = None;
        let mut trail_index = self.core.trail.len();

        loop {
            let start = if p.is_none() { 0 } else { 1 };
            for &q in &clause[start..] {
                let v = q.var();
                if !seen[v.index()] && self.core.level(v) > 0 {
                    seen[v.index()] = true;
                    if self.core.level(v) >= self.core.decision_level() {
                        path_count += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }

            loop {
                trail_index -= 1;
                if seen[self.core.trail[trail_index].var().index()] {
                    break;
                }
            }
            let next = self.core.trail[trail_index];
            seen[next.var().index()] = false;
            path_count -= 1;
            p = Some(next);
            if path_count == 0 {
                break;
            }
            clause = self.reason_clause(next);
        }

        let uip = p.unwrap();
        learnt[0] = !uip;

        let backtrack_level = if learnt.len() <= 1 {
            0
        } else {
            let mut max_level = 0;
            for lit in &learnt[1..] {
                let l = self.core.level(lit.var());
                if l > max_level {
                    max_level = l;
                }
            }
            max_level
        };
        debug!("learnt clause of size {} backtracking to level {}", learnt.len(), backtrack_level);
        (learnt, backtrack_level)
    }

    fn backtrack_to(&mut self, level: usize) {
        if self.core.trail_lim.len() > level {
            let target = self.core.trail_lim[level];
            for i in (target..self.core.trail.len()).rev() {
                let lit = self.core.trail[i];
                self.core.assigns[lit.var().index()] = LBool::Undef;
                self.core.levels[lit.var().index()] = None;
            }
            self.core.trail.truncate(target);
            self.core.trail_lim.truncate(level);
            self.core.qhead = self.core.qhead.min(self.core.trail.len());
            self.theory_qhead = self.theory_qhead.min(self.core.trail.len());
        }
        for t in self.theories.iter_mut() {
            t.backtrack_until(level);
        }
    }

    fn ask_theories_decide(&mut self) -> Option<Lit> {
        for t in self.theories.iter_mut() {
            if let Some(lit) = t.decide_theory(&mut self.core) {
                return Some(lit);
            }
        }
        None
    }

    fn run_preprocess(&mut self) {
        for t in self.theories.iter_mut() {
            t.preprocess(&mut self.core);
        }
    }

    /// Runs the CDCL search to completion.
    pub fn solve(&mut self) -> SolveResult {
        self.run_preprocess();
        loop {
            match self.propagate() {
                Err(conflict) => {
                    if self.core.decision_level() == 0 {
                        return SolveResult::Unsat;
                    }
                    let (learnt, level) = self.analyze(conflict);
                    self.backtrack_to(level);
                    let asserted = learnt[0];
                    let ci = self.core.clauses.len();
                    self.core.clauses.push(learnt);
                    self.core.unchecked_enqueue(asserted, Reason::Clause(ci));
                }
                Ok(()) => {
                    if let Some(v) = self.core.next_unassigned_var() {
                        let lit = self.ask_theories_decide().unwrap_or_else(|| Lit::new(v, false));
                        trace!("deciding {:?}", lit);
                        self.new_decision_level();
                        self.core.unchecked_enqueue(lit, Reason::Decision);
                    } else {
                        match self.solve_theories() {
                            Err(conflict) => {
                                if self.core.decision_level() == 0 {
                                    return SolveResult::Unsat;
                                }
                                let (learnt, level) = self.analyze(conflict);
                                self.backtrack_to(level);
                                let asserted = learnt[0];
                                let ci = self.core.clauses.len();
                                self.core.clauses.push(learnt);
                                self.core.unchecked_enqueue(asserted, Reason::Clause(ci));
                            }
                            Ok(()) => {
                                debug_assert!(self.check_solved());
                                return SolveResult::Sat;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_propagation_and_conflict() {
        let mut s = Solver::new();
        let a = s.new_var();
        let b = s.new_var();
        let la = Lit::new(a, false);
        let lb = Lit::new(b, false);
        // a, ~a \/ b  =>  b must be true
        s.add_clause(vec![la]);
        s.add_clause(vec![!la, lb]);
        assert_eq!(s.solve(), SolveResult::Sat);
        assert_eq!(s.value(lb), LBool::True);
    }

    #[test]
    fn pure_boolean_unsat() {
        let mut s = Solver::new();
        let a = s.new_var();
        let la = Lit::new(a, false);
        s.add_clause(vec![la]);
        s.add_clause(vec![!la]);
        assert_eq!(s.solve(), SolveResult::Unsat);
    }
}
