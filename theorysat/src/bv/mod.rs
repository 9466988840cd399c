// theorysat — a theory-aware SAT engine.
// Licensed under the MIT License.

//! Bitvector-set membership support: a minimal [`bitvector::BitVector`] and the
//! [`set_theory::BVSetTheory`] that propagates over it.

pub mod bitvector;
pub mod set_theory;

pub use bitvector::{bit_of_const, BitVector};
pub use set_theory::BVSetTheory;
