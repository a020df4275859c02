//! Graph data structures and operations.
//!
//! This module provides the core graph storage: petgraph for topology, with
//! Structure of Arrays (SoA) layout for positions, velocities, and masses to
//! enable cache-friendly iteration and zero-copy export to JavaScript.

mod engine;
mod node;

pub use engine::{SimBuffersMut, SpringGraph};
pub use node::{NodeId, NodeState};
