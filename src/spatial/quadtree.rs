//! Barnes-Hut quad-tree for approximate n-body repulsion.
//!
//! Recursively partitions a rectangular region into four quadrants, holding
//! at most one point per leaf. Every node keeps a running total mass and
//! center of mass for its whole subtree, so a force query can treat a distant
//! subtree as a single point-mass instead of visiting each contained point.
//!
//! # Algorithm Overview
//!
//! 1. **Insert:** route each point down to the leaf whose boundary contains
//!    it, folding the point into the mass aggregates of every node along the
//!    way. A full leaf subdivides into four equal quadrants and pushes its
//!    held point down before accepting the new one.
//! 2. **Force query:** walk the tree from the root. A subtree whose
//!    width-to-distance ratio is below `theta` is approximated as one
//!    point-mass at its center of mass; anything closer is recursed into, down
//!    to exact pairwise sums at the leaves.
//!
//! The tree is throwaway: the solver rebuilds it from current positions every
//! iteration, so points are stored by value and never updated in place.

use crate::graph::NodeId;

/// Maximum number of points a leaf holds before subdividing.
const NODE_CAPACITY: usize = 1;

/// Distance below which two points are treated as coincident and contribute
/// no force to each other.
const MIN_DISTANCE: f32 = 0.01;

/// A point-mass stored in the quad-tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMass {
    /// The node this point represents.
    pub id: NodeId,
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Mass, used to weight aggregates and repulsion.
    pub mass: f32,
}

impl PointMass {
    /// Create a point-mass with the default mass of 1.
    pub fn new(id: NodeId, x: f32, y: f32) -> Self {
        Self { id, x, y, mass: 1.0 }
    }

    /// Create a point-mass with an explicit mass.
    pub fn with_mass(id: NodeId, x: f32, y: f32, mass: f32) -> Self {
        Self { id, x, y, mass }
    }
}

/// An axis-aligned rectangle, closed on its min edges and open on its max
/// edges: a point on the right or bottom edge belongs to the neighbor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Horizontal extent.
    pub width: f32,
    /// Vertical extent.
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Half-open containment test: `[x, x + width)` by `[y, y + height)`.
    #[inline]
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// A Barnes-Hut quad-tree node.
///
/// The root is created over a boundary that must cover every point that will
/// be inserted; points outside the boundary are rejected, not grown into.
#[derive(Debug)]
pub struct QuadTree {
    /// Region covered by this node.
    boundary: Rect,
    /// Points held directly by this node (at most `NODE_CAPACITY` once
    /// routing has settled; empty after subdivision).
    points: Vec<PointMass>,
    /// Whether this node has been split into quadrants.
    divided: bool,
    /// Top-left child, present once divided.
    nw: Option<Box<QuadTree>>,
    /// Top-right child, present once divided.
    ne: Option<Box<QuadTree>>,
    /// Bottom-left child, present once divided.
    sw: Option<Box<QuadTree>>,
    /// Bottom-right child, present once divided.
    se: Option<Box<QuadTree>>,
    /// Total mass of every point in this subtree.
    total_mass: f32,
    /// X coordinate of the subtree's center of mass.
    com_x: f32,
    /// Y coordinate of the subtree's center of mass.
    com_y: f32,
}

impl QuadTree {
    /// Create an empty tree over the given boundary.
    pub fn new(boundary: Rect) -> Self {
        Self {
            boundary,
            points: Vec::new(),
            divided: false,
            nw: None,
            ne: None,
            sw: None,
            se: None,
            total_mass: 0.0,
            com_x: 0.0,
            com_y: 0.0,
        }
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Insert a point-mass into this subtree.
    ///
    /// Returns false, without touching the aggregates, when the point lies
    /// outside this node's boundary. The root boundary must cover the full
    /// extent of the data: a rejected point is silently absent from every
    /// subsequent force query.
    ///
    /// The mass aggregates of every node on the path to the insertion leaf
    /// fold the point in as the traversal passes through.
    pub fn insert(&mut self, point: PointMass) -> bool {
        if !self.boundary.contains(point.x, point.y) {
            return false;
        }

        self.fold_into_aggregates(&point);

        if !self.divided {
            if self.points.len() < NODE_CAPACITY {
                self.points.push(point);
                return true;
            }
            self.subdivide();
        }

        self.insert_into_children(point)
    }

    /// Split this node into four equal quadrants and move its held points
    /// down into them. Calling it on an already divided node is a no-op.
    pub fn subdivide(&mut self) {
        if self.divided {
            return;
        }

        let half_w = self.boundary.width / 2.0;
        let half_h = self.boundary.height / 2.0;
        let x = self.boundary.x;
        let y = self.boundary.y;

        self.nw = Some(Box::new(QuadTree::new(Rect::new(x, y, half_w, half_h))));
        self.ne = Some(Box::new(QuadTree::new(Rect::new(x + half_w, y, half_w, half_h))));
        self.sw = Some(Box::new(QuadTree::new(Rect::new(x, y + half_h, half_w, half_h))));
        self.se = Some(Box::new(QuadTree::new(Rect::new(x + half_w, y + half_h, half_w, half_h))));
        self.divided = true;

        let held = std::mem::take(&mut self.points);
        for point in held {
            self.insert_into_children(point);
        }
    }

    /// Try the four children in NW, NE, SW, SE order, stopping at the first
    /// that accepts the point.
    fn insert_into_children(&mut self, point: PointMass) -> bool {
        for child in [&mut self.nw, &mut self.ne, &mut self.sw, &mut self.se] {
            if let Some(child) = child {
                if child.insert(point) {
                    return true;
                }
            }
        }
        false
    }

    fn fold_into_aggregates(&mut self, point: &PointMass) {
        let combined = self.total_mass + point.mass;
        self.com_x = (self.com_x * self.total_mass + point.x * point.mass) / combined;
        self.com_y = (self.com_y * self.total_mass + point.y * point.mass) / combined;
        self.total_mass = combined;
    }

    // =========================================================================
    // Force Calculation
    // =========================================================================

    /// Compute the repulsive force this subtree exerts on `target`.
    ///
    /// Subtrees whose `width / distance` ratio is below `theta` are collapsed
    /// to a single point-mass at their center of mass with
    /// `F = repulsion_strength * mass_subtree * mass_target / distance²`,
    /// directed away from the center of mass. Closer subtrees are recursed
    /// into; leaves are summed pairwise, skipping the target itself and any
    /// point within [`MIN_DISTANCE`] of it.
    pub fn calculate_force(
        &self,
        target: &PointMass,
        theta: f32,
        repulsion_strength: f32,
    ) -> (f32, f32) {
        if self.total_mass == 0.0 {
            return (0.0, 0.0);
        }

        let dx = target.x - self.com_x;
        let dy = target.y - self.com_y;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance < MIN_DISTANCE {
            return (0.0, 0.0);
        }

        if self.boundary.width / distance < theta {
            let force = repulsion_strength * self.total_mass * target.mass / (distance * distance);
            return (force * dx / distance, force * dy / distance);
        }

        if self.divided {
            let mut fx = 0.0;
            let mut fy = 0.0;
            for child in [&self.nw, &self.ne, &self.sw, &self.se] {
                if let Some(child) = child {
                    let (cx, cy) = child.calculate_force(target, theta, repulsion_strength);
                    fx += cx;
                    fy += cy;
                }
            }
            return (fx, fy);
        }

        let mut fx = 0.0;
        let mut fy = 0.0;
        for point in &self.points {
            if point.id == target.id {
                continue;
            }
            let pdx = target.x - point.x;
            let pdy = target.y - point.y;
            let pdistance = (pdx * pdx + pdy * pdy).sqrt();
            if pdistance < MIN_DISTANCE {
                continue;
            }
            let force = repulsion_strength * point.mass * target.mass / (pdistance * pdistance);
            fx += force * pdx / pdistance;
            fy += force * pdy / pdistance;
        }
        (fx, fy)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Half-open containment test against this node's boundary.
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.boundary.contains(x, y)
    }

    /// The region covered by this node.
    #[inline]
    pub fn boundary(&self) -> Rect {
        self.boundary
    }

    /// Whether this node has been split into quadrants.
    #[inline]
    pub fn is_divided(&self) -> bool {
        self.divided
    }

    /// Total mass of every point folded into this subtree.
    #[inline]
    pub fn total_mass(&self) -> f32 {
        self.total_mass
    }

    /// Center of mass of this subtree, or None while it is empty.
    pub fn center_of_mass(&self) -> Option<(f32, f32)> {
        if self.total_mass == 0.0 {
            None
        } else {
            Some((self.com_x, self.com_y))
        }
    }

    /// Collect every point held anywhere in this subtree, in no particular
    /// order.
    pub fn all_points(&self) -> Vec<PointMass> {
        let mut out = Vec::new();
        self.collect_points(&mut out);
        out
    }

    fn collect_points(&self, out: &mut Vec<PointMass>) {
        out.extend_from_slice(&self.points);
        for child in [&self.nw, &self.ne, &self.sw, &self.se] {
            if let Some(child) = child {
                child.collect_points(out);
            }
        }
    }
}
