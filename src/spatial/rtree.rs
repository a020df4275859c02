//! R-tree based pick index using the rstar crate.
//!
//! Answers the interactive queries a host UI issues between layout runs:
//! - Nearest neighbor (cursor to node picking)
//! - Point-in-radius
//! - Rectangle intersection (rubber-band selection)
//!
//! The index is a snapshot: it is bulk-loaded from the position buffers and
//! rebuilt wholesale whenever positions change, never updated incrementally.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::graph::NodeId;

/// A node position snapshot stored in the pick index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickPoint {
    /// The node identifier.
    pub id: NodeId,
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

impl PickPoint {
    /// Create a new PickPoint.
    pub fn new(id: NodeId, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }
}

impl RTreeObject for PickPoint {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for PickPoint {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f32; 2]) -> bool {
        (self.x - point[0]).abs() < f32::EPSILON && (self.y - point[1]).abs() < f32::EPSILON
    }
}

/// Pick index over node positions.
///
/// Uses an R*-tree for O(log n) spatial queries.
pub struct PickIndex {
    tree: RTree<PickPoint>,
}

impl PickIndex {
    /// Create a new empty pick index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Rebuild the index from SoA position buffers; the slot order of the
    /// buffers defines the node ids.
    pub fn rebuild(&mut self, xs: &[f32], ys: &[f32]) {
        let points: Vec<_> = xs
            .iter()
            .zip(ys)
            .enumerate()
            .map(|(slot, (&x, &y))| PickPoint::new(NodeId(slot as u32), x, y))
            .collect();

        self.tree = RTree::bulk_load(points);
    }

    /// Find the nearest node to a point.
    pub fn nearest(&self, x: f32, y: f32) -> Option<NodeId> {
        self.tree.nearest_neighbor(&[x, y]).map(|point| point.id)
    }

    /// Find the nearest node within a maximum distance.
    pub fn nearest_within(&self, x: f32, y: f32, max_distance: f32) -> Option<NodeId> {
        let max_distance_sq = max_distance * max_distance;
        self.tree
            .nearest_neighbor(&[x, y])
            .filter(|point| point.distance_2(&[x, y]) <= max_distance_sq)
            .map(|point| point.id)
    }

    /// Find all nodes within a rectangle.
    pub fn in_rect(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<NodeId> {
        let envelope = AABB::from_corners([min_x, min_y], [max_x, max_y]);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|point| point.id)
            .collect()
    }

    /// Find all nodes within a radius of a point.
    pub fn in_radius(&self, x: f32, y: f32, radius: f32) -> Vec<NodeId> {
        let radius_sq = radius * radius;
        self.tree
            .locate_within_distance([x, y], radius_sq)
            .map(|point| point.id)
            .collect()
    }

    /// Clear all nodes from the index.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Get the number of nodes in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for PickIndex {
    fn default() -> Self {
        Self::new()
    }
}
