//! Exhaustive optimal solver for cube involutions.
//!
//! An involution is a cube state equal to its own inverse. This crate finds
//! a minimum-length move sequence for every involution modulo symmetry and
//! records the results in a shared, resumable database. The state space is
//! decomposed into "cosets" (symmetry classes of the edge half of a state);
//! each coset is searched independently with iterative deepening over two
//! admissible pruning heuristics, and solved cosets seed their neighbors
//! through conjugated solution transfer.

pub mod cancel;
pub mod catalog;
pub mod coords;
pub mod cube;
pub mod moves;
pub mod neighbor;
pub mod pool;
pub mod prune;
pub mod region;
pub mod solver;
pub mod status;
pub mod sym;
pub mod tables;
pub mod tracker;

/// How a resumable long-running operation ended. Canceled runs leave the
/// database consistent and pick up where they stopped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    Done,
    Canceled,
}

/// Iterates the set bit positions of `mask`, lowest first.
pub fn bits(mut mask: u64) -> impl Iterator<Item = u32> {
    std::iter::from_fn(move || {
        if mask == 0 {
            None
        } else {
            let b = mask.trailing_zeros();
            mask &= mask - 1;
            Some(b)
        }
    })
}

/// Prefix for log messages that mark the start of a long-running phase.
#[macro_export]
macro_rules! start {
    ($msg:expr) => {
        concat!("⏳ ", $msg)
    };
}

/// Prefix for log messages within a long-running phase.
#[macro_export]
macro_rules! working {
    ($msg:expr) => {
        concat!("🛠  ", $msg)
    };
}

/// Prefix for log messages that mark the successful end of a phase.
#[macro_export]
macro_rules! success {
    ($msg:expr) => {
        concat!("✅ ", $msg)
    };
}
