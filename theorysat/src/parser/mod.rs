// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! An extended-DIMACS text format for problems mixing plain clauses with graph and
//! bitvector-set constructs. Deliberately thin: it builds the data model and performs
//! no validation beyond what construction itself requires (width/duplicate-value checks happen
//! in [`crate::bv::BVSetTheory`], not here).
//!
//! Grammar, one construct per line, tokens whitespace-separated:
//! - `c ...` a comment, ignored.
//! - `p cnf <nvars> <nclauses>` header; pre-allocates `nvars` Boolean variables 1-indexed.
//! - a clause: space-separated non-zero signed integers terminated by `0`.
//! - `node` allocates one graph node, 0-indexed in declaration order.
//! - `edge <from> <to> <lit>` adds an edge between two previously declared nodes, controlled by
//!   an existing header variable (signed, negative means the edge is controlled by that
//!   variable's negation).
//! - `reach <from> <to> <lit>` binds `lit` to whether `from` can reach `to`.
//! - `bv <id> <lit>* 0` declares bitvector `id` (dense, assigned in declaration order) from a
//!   0-terminated list of existing header variables, least-significant bit first.
//! - `set <bvid> <condLit> <value>+ 0` declares a value-membership set against bitvector `bvid`
//!   under `condLit`, with a 0-terminated list of distinct unsigned values (the list itself may
//!   not contain the literal value `0`; a bitvector's membership in `{0}` alone cannot be
//!   expressed in this text format — a corpus-level limitation recorded in `DESIGN.md`, not a
//!   restriction of `BVSetTheory` itself).
//!
//! This concretises set membership directly in terms of the data model `BVSetTheory` actually
//! uses: explicit numeric value sets over a bitvector's bits, not literal subsets.

use crate::bv::BVSetTheory;
use crate::core::{Lit, Solver, Var};
use crate::error::ParseError;
use crate::graph::{EdmondsKarp, GraphTheory, NodeId};
use std::collections::HashMap;
use std::io::BufRead;

/// Everything built from a problem text: a solver ready to call [`Solver::solve`]. The graph
/// and bitvector-set theories, if the text used either, are registered inside it at fixed
/// indices 0 and 1 respectively.
pub struct Problem {
    pub solver: Solver,
}

struct Parser<'a> {
    solver: &'a mut Solver,
    vars: Vec<Var>,
    nodes: Vec<NodeId>,
    graph: GraphTheory,
    bvset: BVSetTheory,
    detector_by_source: HashMap<NodeId, usize>,
    line_no: usize,
}

fn to_lit(vars: &[Var], tok: &str, line: usize) -> Result<Lit, ParseError> {
    let n: i64 = tok
        .parse()
        .map_err(|_| ParseError::Malformed { line, message: format!("not an integer: {tok}") })?;
    if n == 0 {
        return Err(ParseError::Malformed { line, message: "literal may not be 0".into() });
    }
    let index = n.unsigned_abs() as usize - 1;
    let var = *vars
        .get(index)
        .ok_or_else(|| ParseError::UnknownNode { line, node: n.unsigned_abs() as u32 })?;
    Ok(Lit::new(var, n < 0))
}

fn to_node(nodes: &[NodeId], tok: &str, line: usize) -> Result<NodeId, ParseError> {
    let n: usize = tok
        .parse()
        .map_err(|_| ParseError::Malformed { line, message: format!("not a node index: {tok}") })?;
    nodes.get(n).copied().ok_or(ParseError::UnknownNode { line, node: n as u32 })
}

impl<'a> Parser<'a> {
    /// Both theories are reserved and constructed up front, at fixed indices 0 (graph) and 1
    /// (bitvector sets), whether or not the problem text ends up using either — their indices
    /// are baked into every reason marker they allocate, so the index cannot depend on which
    /// constructs happen to appear in the text.
    fn new(solver: &'a mut Solver) -> Self {
        let graph = GraphTheory::new(0);
        let bvset = BVSetTheory::new(1, solver.api());
        Parser {
            solver,
            vars: Vec::new(),
            nodes: Vec::new(),
            graph,
            bvset,
            detector_by_source: HashMap::new(),
            line_no: 0,
        }
    }

    fn graph_mut(&mut self) -> &mut GraphTheory {
        &mut self.graph
    }

    fn bvset_mut(&mut self) -> &mut BVSetTheory {
        &mut self.bvset
    }

    fn header(&mut self, tokens: &[&str]) -> Result<(), ParseError> {
        if tokens.len() != 4 || tokens[1] != "cnf" {
            return Err(ParseError::Malformed {
                line: self.line_no,
                message: "expected `p cnf <vars> <clauses>`".into(),
            });
        }
        let nvars: usize = tokens[2].parse().map_err(|_| ParseError::Malformed {
            line: self.line_no,
            message: "bad variable count".into(),
        })?;
        for _ in 0..nvars {
            self.vars.push(self.solver.new_var());
        }
        Ok(())
    }

    fn clause(&mut self, tokens: &[&str]) -> Result<(), ParseError> {
        if tokens.last() != Some(&"0") {
            return Err(ParseError::UnterminatedList { line: self.line_no });
        }
        let mut clause = Vec::with_capacity(tokens.len() - 1);
        for &tok in &tokens[..tokens.len() - 1] {
            clause.push(to_lit(&self.vars, tok, self.line_no)?);
        }
        self.solver.add_clause(clause);
        Ok(())
    }

    fn node(&mut self) {
        let id = self.graph_mut().add_node();
        self.nodes.push(id);
    }

    fn edge(&mut self, tokens: &[&str]) -> Result<(), ParseError> {
        if tokens.len() != 4 {
            return Err(ParseError::Malformed {
                line: self.line_no,
                message: "expected `edge <from> <to> <lit>`".into(),
            });
        }
        let from = to_node(&self.nodes, tokens[1], self.line_no)?;
        let to = to_node(&self.nodes, tokens[2], self.line_no)?;
        let lit = to_lit(&self.vars, tokens[3], self.line_no)?;
        self.graph_mut().bind_edge(from, to, lit);
        Ok(())
    }

    fn reach(&mut self, tokens: &[&str]) -> Result<(), ParseError> {
        if tokens.len() != 4 {
            return Err(ParseError::Malformed {
                line: self.line_no,
                message: "expected `reach <from> <to> <lit>`".into(),
            });
        }
        let from = to_node(&self.nodes, tokens[1], self.line_no)?;
        let to = to_node(&self.nodes, tokens[2], self.line_no)?;
        let lit = to_lit(&self.vars, tokens[3], self.line_no)?;

        if !self.detector_by_source.contains_key(&from) {
            let api = self.solver.api();
            let detector = self.graph.add_reach_detector(from, false, Box::new(EdmondsKarp), api);
            self.detector_by_source.insert(from, detector);
        }
        let detector = self.detector_by_source[&from];
        self.graph.bind_target(detector, to, lit);
        Ok(())
    }

    fn bv(&mut self, tokens: &[&str]) -> Result<(), ParseError> {
        if tokens.last() != Some(&"0") || tokens.len() < 3 {
            return Err(ParseError::UnterminatedList { line: self.line_no });
        }
        let mut bits = Vec::with_capacity(tokens.len() - 2);
        for &tok in &tokens[2..tokens.len() - 1] {
            bits.push(to_lit(&self.vars, tok, self.line_no)?);
        }
        self.bvset_mut().add_bitvector(bits);
        Ok(())
    }

    fn set(&mut self, tokens: &[&str]) -> Result<(), ParseError> {
        if tokens.last() != Some(&"0") || tokens.len() < 5 {
            return Err(ParseError::UnterminatedList { line: self.line_no });
        }
        let bv_id: u32 = tokens[1].parse().map_err(|_| ParseError::Malformed {
            line: self.line_no,
            message: "bad bitvector id".into(),
        })?;
        let cond = to_lit(&self.vars, tokens[2], self.line_no)?;
        let mut values = Vec::with_capacity(tokens.len() - 4);
        for &tok in &tokens[3..tokens.len() - 1] {
            let v: u64 = tok.parse().map_err(|_| ParseError::Malformed {
                line: self.line_no,
                message: format!("not an unsigned value: {tok}"),
            })?;
            values.push(v);
        }
        self.bvset_mut()
            .add_set(bv_id, cond, values)
            .map_err(|e| ParseError::Malformed { line: self.line_no, message: e.to_string() })?;
        Ok(())
    }

    fn line(&mut self, text: &str) -> Result<(), ParseError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.first() {
            None | Some(&"c") => Ok(()),
            Some(&"p") => self.header(&tokens),
            Some(&"node") => {
                self.node();
                Ok(())
            }
            Some(&"edge") => self.edge(&tokens),
            Some(&"reach") => self.reach(&tokens),
            Some(&"bv") => self.bv(&tokens),
            Some(&"set") => self.set(&tokens),
            Some(first) if first.starts_with(['-', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9']) => {
                self.clause(&tokens)
            }
            Some(other) => Err(ParseError::Malformed {
                line: self.line_no,
                message: format!("unknown construct: {other}"),
            }),
        }
    }
}

/// Parses problem text from `reader` into a ready-to-solve [`Problem`].
///
/// Both theories are always registered, at indices 0 and 1, even if the text never used graph
/// or bitvector-set constructs — an empty `GraphTheory`/`BVSetTheory` costs nothing at solve
/// time (no detectors/sets means `propagate_theory`/`check_solved` are no-ops), and this keeps
/// reason-marker theory indices fixed regardless of which constructs a given problem text uses.
pub fn parse(reader: impl BufRead) -> Result<Problem, ParseError> {
    let mut solver = Solver::new();
    let (graph, bvset) = {
        let mut parser = Parser::new(&mut solver);
        for line in reader.lines() {
            let line = line.map_err(ParseError::Io)?;
            parser.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            parser.line(trimmed)?;
        }
        (parser.graph, parser.bvset)
    };
    solver.add_theory(Box::new(graph));
    solver.add_theory(Box::new(bvset));
    Ok(Problem { solver })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SolveResult;
    use std::io::Cursor;

    #[test]
    fn parses_plain_cnf_and_solves() {
        let text = "p cnf 2 2\n1 0\n-1 2 0\n";
        let mut problem = parse(Cursor::new(text)).unwrap();
        assert_eq!(problem.solver.solve(), SolveResult::Sat);
    }

    #[test]
    fn parses_reachability_scenario() {
        // a, b, c control the three edges; r is the reach(0, 2) literal.
        let text = "p cnf 4 0\n\
                     node\n\
                     node\n\
                     node\n\
                     edge 0 1 1\n\
                     edge 1 2 2\n\
                     edge 0 2 3\n\
                     reach 0 2 4\n";
        let mut problem = parse(Cursor::new(text)).unwrap();
        // a = false, b = false, c = false, r = true has no path, so it must conflict.
        problem.solver.add_clause(vec![Lit::new(Var(0), true)]);
        problem.solver.add_clause(vec![Lit::new(Var(1), true)]);
        problem.solver.add_clause(vec![Lit::new(Var(2), true)]);
        problem.solver.add_clause(vec![Lit::new(Var(3), false)]);
        assert_eq!(problem.solver.solve(), SolveResult::Unsat);
    }

    #[test]
    fn rejects_unterminated_clause() {
        let text = "p cnf 1 1\n1\n";
        assert!(parse(Cursor::new(text)).is_err());
    }
}
