//! Layout algorithms for graph visualization.
//!
//! The force module is the iterative solver that computes node positions by
//! balancing Barnes-Hut repulsion against edge springs; the scatter module
//! provides deterministic initial placement so the solver never starts from a
//! degenerate all-coincident state.

pub mod force;
pub mod scatter;

pub use force::{ForceConfig, ForceSolver, SolveStats};
