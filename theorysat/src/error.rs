// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! Crate-wide error types: one top-level enum aggregating each subsystem's own error enum
//! through `#[from]` conversions.

use thiserror::Error;

/// Errors raised while reading the extended-DIMACS problem text.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("line {line}: expected a 0-terminated literal list")]
    UnterminatedList { line: usize },
    #[error("line {line}: reference to undeclared node {node}")]
    UnknownNode { line: usize, node: u32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while building theory state from construction-time input.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("value {value} does not fit in a bitvector of width {width}")]
    ValueOutOfRange { value: u64, width: u32 },
    #[error("value set for bitvector {bv_id} is empty")]
    EmptyValueSet { bv_id: u32 },
    #[error("value set for bitvector {bv_id} contains a duplicate entry {value}")]
    DuplicateValue { bv_id: u32, value: u64 },
}

/// The crate's top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Build(#[from] BuildError),
}
