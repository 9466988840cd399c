// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! `theorysat_cli`: reads an extended-DIMACS problem file, solves it, and prints the result.
//!
//! Parses args, initialises the logger, delegates into the library, and reports a result through
//! the process exit code — a single entry point with no subcommands, since there is exactly one
//! thing to do: solve one problem file.

use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use theorysat::core::{LBool, SolveResult};
use theorysat::parser;

/// Solve an extended-DIMACS problem mixing plain clauses with graph-reachability and
/// bitvector-set constructs.
#[derive(Parser, Debug)]
#[command(name = "theorysat", about)]
struct Cli {
    /// Problem file to read. Reads stdin if omitted.
    input: Option<PathBuf>,

    /// Print the satisfying assignment when the problem is SAT.
    #[arg(short, long)]
    model: bool,
}

fn open_input(path: Option<&PathBuf>) -> io::Result<Box<dyn BufRead>> {
    match path {
        Some(p) => Ok(Box::new(BufReader::new(File::open(p)?))),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let reader = match open_input(cli.input.as_ref()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("theorysat: {e}");
            return ExitCode::from(1);
        }
    };

    let mut problem = match parser::parse(reader) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("theorysat: {e}");
            return ExitCode::from(1);
        }
    };

    info!("problem has {} variables", problem.solver.num_vars());
    match problem.solver.solve() {
        SolveResult::Sat => {
            println!("SAT");
            if cli.model {
                let model: Vec<String> = (0..problem.solver.num_vars())
                    .map(|i| {
                        let var = theorysat::core::Var(i as u32);
                        let lit = theorysat::core::Lit::new(var, false);
                        match problem.solver.value(lit) {
                            LBool::True => format!("{}", i + 1),
                            LBool::False => format!("-{}", i + 1),
                            LBool::Undef => format!("{}", i + 1),
                        }
                    })
                    .collect();
                println!("v {} 0", model.join(" "));
            }
            ExitCode::from(10)
        }
        SolveResult::Unsat => {
            println!("UNSAT");
            ExitCode::from(20)
        }
    }
}
