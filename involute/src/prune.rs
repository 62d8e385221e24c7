//! Admissible distance lower bounds used to cut the search.

pub mod corner;
pub mod edge;
