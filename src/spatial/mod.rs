//! Spatial indexing for the layout engine.
//!
//! Two structures with different jobs: the Barnes-Hut quad-tree approximates
//! n-body repulsion inside the force solver, and the R-tree answers
//! interactive hit-test queries between solver runs.

pub mod quadtree;
mod rtree;

pub use quadtree::{PointMass, QuadTree, Rect};
pub use rtree::{PickIndex, PickPoint};
