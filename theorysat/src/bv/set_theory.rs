// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! `BVSetTheory`: propagates "bitvector X belongs / does not belong to a finite set of
//! constants" under a Boolean condition, over bits shared with an enclosing bitvector.

use super::bitvector::{bit_of_const, BitVector};
use crate::core::{LBool, Lit, ReasonMarker, SolverApi, Theory, Var};
use crate::error::BuildError;
use itertools::iproduct;
use std::collections::{HashMap, HashSet};

/// One `(bvID, condLit, values)` constraint.
struct BVSet {
    bv_id: u32,
    cond: Lit,
    values: Vec<u64>,
    /// Bit indices where every member of `values` agrees — precomputed once at construction.
    equivalent_bits: Vec<usize>,
}

impl BVSet {
    fn equivalent_value_at(&self, i: usize) -> bool {
        bit_of_const(self.values[0], i)
    }
}

/// The bitvector-set membership theory.
pub struct BVSetTheory {
    bitvectors: Vec<BitVector>,
    sets: Vec<BVSet>,
    bit_var_to_bv: HashMap<Var, u32>,
    cond_var_to_bv: HashMap<Var, u32>,
    dirty: HashSet<u32>,
    set_included_marker: ReasonMarker,
    set_excluded_marker: ReasonMarker,
    /// Allocated for interface completeness but never dispatched here: the forced-bit clauses from
    /// `preprocess` are ordinary CNF clauses handed to `add_clause`, so the SAT core's own
    /// unit-propagation reasons (`Reason::Clause`) explain them, not this theory.
    #[allow(dead_code)]
    forced_bit_marker: ReasonMarker,
}

impl BVSetTheory {
    pub fn new(theory_index: usize, api: &mut dyn SolverApi) -> Self {
        BVSetTheory {
            bitvectors: Vec::new(),
            sets: Vec::new(),
            bit_var_to_bv: HashMap::new(),
            cond_var_to_bv: HashMap::new(),
            dirty: HashSet::new(),
            set_included_marker: api.new_reason_marker(theory_index),
            set_excluded_marker: api.new_reason_marker(theory_index),
            forced_bit_marker: api.new_reason_marker(theory_index),
        }
    }

    /// Registers a bitvector built from `bits`, returning its dense id.
    pub fn add_bitvector(&mut self, bits: Vec<Lit>) -> u32 {
        let bv_id = self.bitvectors.len() as u32;
        for &b in &bits {
            self.bit_var_to_bv.insert(b.var(), bv_id);
        }
        self.bitvectors.push(BitVector::new(bits));
        bv_id
    }

    /// Attaches `values` to `bv_id` under condition `cond`.
    pub fn add_set(&mut self, bv_id: u32, cond: Lit, values: Vec<u64>) -> Result<usize, BuildError> {
        let width = self.bitvectors[bv_id as usize].width();
        if values.is_empty() {
            return Err(BuildError::EmptyValueSet { bv_id });
        }
        let mut seen = HashSet::new();
        for &v in &values {
            if v >= (1u64 << width) {
                return Err(BuildError::ValueOutOfRange { value: v, width });
            }
            if !seen.insert(v) {
                return Err(BuildError::DuplicateValue { bv_id, value: v });
            }
        }

        let equivalent_bits = (0..width as usize)
            .filter(|&i| {
                let first = bit_of_const(values[0], i);
                values.iter().all(|&v| bit_of_const(v, i) == first)
            })
            .collect();

        self.cond_var_to_bv.insert(cond.var(), bv_id);
        self.sets.push(BVSet { bv_id, cond, values, equivalent_bits });
        Ok(self.sets.len() - 1)
    }

    fn bounds(&self, bv_id: u32, api: &dyn SolverApi) -> (u64, u64) {
        let bv = &self.bitvectors[bv_id as usize];
        let mut under = 0u64;
        let mut over = 0u64;
        for (i, &bit) in bv.bits.iter().enumerate() {
            match api.value(bit) {
                LBool::True => {
                    under |= 1 << i;
                    over |= 1 << i;
                }
                LBool::False => {}
                LBool::Undef => {
                    over |= 1 << i;
                }
            }
        }
        (under, over)
    }

    fn any_vals_included(&self, set: &BVSet, api: &dyn SolverApi) -> bool {
        let (under, over) = self.bounds(set.bv_id, api);
        set.values.iter().any(|&v| under <= v && v <= over)
    }

    fn all_non_equivalent_bits_set(&self, set: &BVSet, api: &dyn SolverApi) -> bool {
        let bv = &self.bitvectors[set.bv_id as usize];
        (0..bv.width() as usize)
            .filter(|i| !set.equivalent_bits.contains(i))
            .all(|i| api.value(bv.bit(i)).is_assigned())
    }

    /// The currently-true-valued literal of bit `i` of `bv_id` negated — the shape every reason
    /// clause here uses for an antecedent, so the clause is false under the current assignment.
    fn negated_current_lit(&self, bv_id: u32, i: usize, api: &dyn SolverApi) -> Lit {
        let bit = self.bitvectors[bv_id as usize].bit(i);
        match api.value(bit) {
            LBool::True => !bit,
            LBool::False => bit,
            LBool::Undef => unreachable!("only called on assigned bits"),
        }
    }

    /// For each value in `set.values` that disagrees with some currently assigned bit, the
    /// lowest such bit index.
    fn diffs(&self, set: &BVSet, api: &dyn SolverApi) -> Vec<usize> {
        let bv = &self.bitvectors[set.bv_id as usize];
        let mut out = HashSet::new();
        for &v in &set.values {
            for (i, &bit) in bv.bits.iter().enumerate() {
                if let LBool::True | LBool::False = api.value(bit) {
                    let assigned = api.value(bit) == LBool::True;
                    if bit_of_const(v, i) != assigned {
                        out.insert(i);
                        break;
                    }
                }
            }
        }
        out.into_iter().collect()
    }

    fn non_equivalent_assigned_bits(&self, set: &BVSet, api: &dyn SolverApi) -> Vec<usize> {
        let bv = &self.bitvectors[set.bv_id as usize];
        (0..bv.width() as usize)
            .filter(|i| !set.equivalent_bits.contains(i) && api.value(bv.bit(*i)).is_assigned())
            .collect()
    }

    fn propagate_set(&self, set_idx: usize, api: &mut dyn SolverApi) -> Result<(), Vec<Lit>> {
        let set = &self.sets[set_idx];
        let cond_value = api.value(set.cond);
        let any_included = self.any_vals_included(set, api);

        if cond_value == LBool::True && !any_included {
            let mut clause = vec![!set.cond];
            for i in self.diffs(set, api) {
                clause.push(self.negated_current_lit(set.bv_id, i, api));
            }
            return Err(clause);
        }

        let all_non_equiv_set = self.all_non_equivalent_bits_set(set, api);
        if cond_value == LBool::False && any_included && all_non_equiv_set {
            let mut clause = vec![set.cond];
            for i in self.non_equivalent_assigned_bits(set, api) {
                clause.push(self.negated_current_lit(set.bv_id, i, api));
            }
            return Err(clause);
        }

        if cond_value == LBool::Undef && all_non_equiv_set {
            if any_included {
                api.enqueue(set.cond, self.set_included_marker);
            } else {
                api.enqueue(!set.cond, self.set_excluded_marker);
            }
        }
        Ok(())
    }

    fn build_set_reason(&self, set_idx: usize, marker: ReasonMarker, lit: Lit, api: &mut dyn SolverApi) -> Vec<Lit> {
        let set = &self.sets[set_idx];
        let mut clause = vec![lit];
        if marker == self.set_included_marker {
            for i in self.non_equivalent_assigned_bits(set, api) {
                clause.push(self.negated_current_lit(set.bv_id, i, api));
            }
        } else {
            debug_assert_eq!(marker, self.set_excluded_marker);
            for i in self.diffs(set, api) {
                clause.push(self.negated_current_lit(set.bv_id, i, api));
            }
        }
        clause
    }

    /// Emits the subset/mutual-exclusion and forced-bit clauses ahead of search.
    pub fn preprocess_sets(&self, api: &mut dyn SolverApi) {
        for set in &self.sets {
            for &i in &set.equivalent_bits {
                let expected = set.equivalent_value_at(i);
                let bit = self.bitvectors[set.bv_id as usize].bit(i);
                let wanted = if expected { bit } else { !bit };
                api.add_clause(vec![!set.cond, wanted]);
            }
        }

        for (a, b) in iproduct!(0..self.sets.len(), 0..self.sets.len()) {
            if a == b || self.sets[a].bv_id != self.sets[b].bv_id {
                continue;
            }
            let (sa, sb) = (&self.sets[a], &self.sets[b]);
            let set_a: HashSet<u64> = sa.values.iter().copied().collect();
            let set_b: HashSet<u64> = sb.values.iter().copied().collect();
            if set_a.is_subset(&set_b) {
                api.add_clause(vec![!sa.cond, sb.cond]);
            } else if set_a.is_disjoint(&set_b) {
                api.add_clause(vec![!sa.cond, !sb.cond]);
            }
        }
    }
}

impl Theory for BVSetTheory {
    fn enqueue_theory(&mut self, lit: Lit, _api: &mut dyn SolverApi) {
        if let Some(&bv_id) = self.bit_var_to_bv.get(&lit.var()) {
            self.dirty.insert(bv_id);
        }
        if let Some(&bv_id) = self.cond_var_to_bv.get(&lit.var()) {
            self.dirty.insert(bv_id);
        }
    }

    fn propagate_theory(&mut self, api: &mut dyn SolverApi) -> Result<(), Vec<Lit>> {
        let mut dirty: Vec<u32> = self.dirty.drain().collect();
        dirty.sort_unstable();
        for bv_id in dirty {
            for set_idx in 0..self.sets.len() {
                if self.sets[set_idx].bv_id == bv_id {
                    self.propagate_set(set_idx, api)?;
                }
            }
        }
        Ok(())
    }

    fn build_reason(&mut self, lit: Lit, marker: ReasonMarker, api: &mut dyn SolverApi) -> Vec<Lit> {
        let set_idx = self
            .sets
            .iter()
            .position(|s| s.cond.var() == lit.var())
            .expect("reason literal is a set's condition");
        self.build_set_reason(set_idx, marker, lit, api)
    }

    fn backtrack_until(&mut self, _level: usize) {
        // No trail of our own: `any_vals_included`/`diffs` always read bit values live off the
        // SAT core, so there is nothing to undo beyond what the core already restores.
    }

    fn backtrack_until_lit(&mut self, _lit: Lit) {}

    fn new_decision_level(&mut self) {}

    fn check_solved(&mut self, api: &mut dyn SolverApi) -> bool {
        for set in &self.sets {
            let (under, over) = self.bounds(set.bv_id, api);
            debug_assert_eq!(under, over, "check_solved runs only once every bit is assigned");
            let value = under;
            let contains = set.values.contains(&value);
            match api.value(set.cond) {
                LBool::True if !contains => return false,
                LBool::False if contains => return false,
                _ => {}
            }
        }
        true
    }

    fn preprocess(&mut self, api: &mut dyn SolverApi) {
        self.preprocess_sets(api);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Solver;

    fn make_bits(solver: &mut Solver, width: u32) -> Vec<Lit> {
        (0..width).map(|_| Lit::new(solver.new_var(), false)).collect()
    }

    #[test]
    fn equivalent_bits_agree_across_single_element_set() {
        let mut solver = Solver::new();
        let idx = solver.num_theories();
        let bits = make_bits(&mut solver, 4);
        let mut theory = BVSetTheory::new(idx, solver.api());
        let bv = theory.add_bitvector(bits);
        let cond = Lit::new(solver.api().new_var(), false);
        theory.add_set(bv, cond, vec![5]).unwrap();
        assert_eq!(theory.sets[0].equivalent_bits.len(), 4);
    }

    #[test]
    fn subset_relationship_is_detected() {
        let mut solver = Solver::new();
        let idx = solver.num_theories();
        let bits = make_bits(&mut solver, 2);
        let mut theory = BVSetTheory::new(idx, solver.api());
        let bv = theory.add_bitvector(bits);
        let ca = Lit::new(solver.api().new_var(), false);
        let cb = Lit::new(solver.api().new_var(), false);
        theory.add_set(bv, ca, vec![1, 2, 3]).unwrap();
        theory.add_set(bv, cb, vec![2, 3]).unwrap();

        let set_a: HashSet<u64> = theory.sets[0].values.iter().copied().collect();
        let set_b: HashSet<u64> = theory.sets[1].values.iter().copied().collect();
        assert!(set_b.is_subset(&set_a));
    }

    /// Regression: the cond=True/¬included conflict clause must use the currently-*false*
    /// antecedent (`!bit0`, since `bit0` is assigned true), not `bit0` itself — a clause
    /// containing a currently-true literal is satisfied and therefore not a valid conflict.
    #[test]
    fn cond_true_conflict_uses_currently_false_antecedents() {
        let mut solver = Solver::new();
        let bit0 = Lit::new(solver.new_var(), false);
        let bit1 = Lit::new(solver.new_var(), false);
        let c = Lit::new(solver.new_var(), false);
        solver.add_clause(vec![c]);
        solver.add_clause(vec![bit0]);
        solver.add_clause(vec![!bit1]);
        solver.solve();
        assert_eq!(solver.value(bit0), LBool::True);
        assert_eq!(solver.value(bit1), LBool::False);
        assert_eq!(solver.value(c), LBool::True);

        let idx = solver.num_theories();
        let mut theory = BVSetTheory::new(idx, solver.api());
        let bv = theory.add_bitvector(vec![bit0, bit1]);
        theory.add_set(bv, c, vec![0]).unwrap();

        let clause = theory.propagate_set(0, solver.api()).unwrap_err();
        assert!(clause.contains(&!c));
        assert!(clause.contains(&!bit0), "clause {clause:?} must use the currently-false !bit0");
        assert!(!clause.contains(&bit0), "clause {clause:?} must not contain the currently-true bit0");
    }

    /// Same antecedent-polarity bug, on the `set_excluded` enqueue/reason path: the forced
    /// exclusion reason must also cite `!bit0`, not `bit0`.
    #[test]
    fn set_excluded_reason_uses_currently_false_antecedents() {
        let mut solver = Solver::new();
        let bit0 = Lit::new(solver.new_var(), false);
        let bit1 = Lit::new(solver.new_var(), false);
        solver.add_clause(vec![bit0]);
        solver.add_clause(vec![!bit1]);
        solver.solve();

        let idx = solver.num_theories();
        let mut theory = BVSetTheory::new(idx, solver.api());
        let bv = theory.add_bitvector(vec![bit0, bit1]);
        let c = Lit::new(solver.api().new_var(), false);
        theory.add_set(bv, c, vec![0]).unwrap();

        theory.propagate_set(0, solver.api()).unwrap();
        assert_eq!(solver.value(c), LBool::False);

        let marker = theory.set_excluded_marker;
        let clause = theory.build_set_reason(0, marker, !c, solver.api());
        assert!(clause.contains(&!c));
        assert!(clause.contains(&!bit0), "clause {clause:?} must use the currently-false !bit0");
        assert!(!clause.contains(&bit0), "clause {clause:?} must not contain the currently-true bit0");
    }
}
