//! SpringGraph - graph topology plus simulation state.
//!
//! Stores the topology in a petgraph Graph (edge weight = spring strength
//! multiplier) and maintains SoA (Structure of Arrays) buffers for positions,
//! velocities, and masses to enable efficient GPU upload and cache-friendly
//! iteration. Node slots are dense: the petgraph index, the SoA index, and
//! the public NodeId are the same number, assigned in load order.

use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Directed;

use super::node::{NodeId, NodeState};
use crate::spatial::PickIndex;

/// The core graph engine.
///
/// This struct manages:
/// - Graph topology via petgraph
/// - Position/velocity/mass buffers in SoA layout
/// - Node state (pinned)
/// - Spatial index for hit testing, rebuilt lazily after positions change
pub struct SpringGraph {
    /// The underlying graph structure. Edges store the spring strength
    /// multiplier applied on top of the solver's global spring strength.
    graph: Graph<(), f32, Directed>,

    /// X positions (SoA layout)
    pos_x: Vec<f32>,

    /// Y positions (SoA layout)
    pos_y: Vec<f32>,

    /// X velocities (SoA layout)
    vel_x: Vec<f32>,

    /// Y velocities (SoA layout)
    vel_y: Vec<f32>,

    /// Node masses, weighting both repulsion and aggregate centers.
    mass: Vec<f32>,

    /// Node states (pinned)
    states: Vec<NodeState>,

    /// Spatial index for hit testing
    spatial: PickIndex,

    /// Whether the spatial index needs rebuilding before the next query
    spatial_dirty: bool,
}

/// Mutable view of the per-node simulation buffers.
///
/// Splits the borrow so an integrator can write positions and velocities
/// while reading node states, without going through per-slot method calls.
pub struct SimBuffersMut<'a> {
    /// X positions.
    pub pos_x: &'a mut [f32],
    /// Y positions.
    pub pos_y: &'a mut [f32],
    /// X velocities.
    pub vel_x: &'a mut [f32],
    /// Y velocities.
    pub vel_y: &'a mut [f32],
    /// Node states.
    pub states: &'a [NodeState],
}

impl SpringGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            pos_x: Vec::new(),
            pos_y: Vec::new(),
            vel_x: Vec::new(),
            vel_y: Vec::new(),
            mass: Vec::new(),
            states: Vec::new(),
            spatial: PickIndex::new(),
            spatial_dirty: false,
        }
    }

    /// Create a graph with pre-allocated capacity.
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            graph: Graph::with_capacity(node_capacity, edge_capacity),
            pos_x: Vec::with_capacity(node_capacity),
            pos_y: Vec::with_capacity(node_capacity),
            vel_x: Vec::with_capacity(node_capacity),
            vel_y: Vec::with_capacity(node_capacity),
            mass: Vec::with_capacity(node_capacity),
            states: Vec::with_capacity(node_capacity),
            spatial: PickIndex::new(),
            spatial_dirty: false,
        }
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Add a node at the specified position with the default mass of 1.
    pub fn add_node(&mut self, x: f32, y: f32) -> NodeId {
        let index = self.graph.add_node(());

        self.pos_x.push(x);
        self.pos_y.push(y);
        self.vel_x.push(0.0);
        self.vel_y.push(0.0);
        self.mass.push(1.0);
        self.states.push(NodeState::new());

        self.spatial_dirty = true;
        NodeId(index.index() as u32)
    }

    /// Add nodes in bulk from a positions array [x0, y0, x1, y1, ...].
    ///
    /// Returns the number of nodes added. A trailing unpaired value is
    /// ignored.
    pub fn load_nodes(&mut self, positions: &[f32]) -> u32 {
        let count = positions.len() / 2;

        self.pos_x.reserve(count);
        self.pos_y.reserve(count);
        self.vel_x.reserve(count);
        self.vel_y.reserve(count);
        self.mass.reserve(count);
        self.states.reserve(count);

        for i in 0..count {
            self.add_node(positions[i * 2], positions[i * 2 + 1]);
        }

        count as u32
    }

    /// Assign per-node masses, slot by slot.
    ///
    /// Entries beyond the current node count are ignored, as are
    /// non-positive or non-finite values, which keep the default mass of 1.
    pub fn load_masses(&mut self, masses: &[f32]) {
        for (slot, &mass) in masses.iter().enumerate().take(self.mass.len()) {
            if mass.is_finite() && mass > 0.0 {
                self.mass[slot] = mass;
            }
        }
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> u32 {
        self.graph.node_count() as u32
    }

    /// Get a node's position.
    pub fn get_node_position(&self, id: NodeId) -> Option<(f32, f32)> {
        let slot = id.0 as usize;
        if slot < self.pos_x.len() {
            Some((self.pos_x[slot], self.pos_y[slot]))
        } else {
            None
        }
    }

    /// Set a node's position. Unknown slots are ignored.
    pub fn set_node_position(&mut self, id: NodeId, x: f32, y: f32) {
        let slot = id.0 as usize;
        if slot < self.pos_x.len() {
            self.pos_x[slot] = x;
            self.pos_y[slot] = y;
            self.spatial_dirty = true;
        }
    }

    /// Pin a node so the solver holds it in place.
    pub fn pin_node(&mut self, id: NodeId) {
        if let Some(state) = self.states.get_mut(id.0 as usize) {
            state.set_pinned(true);
        }
    }

    /// Unpin a node.
    pub fn unpin_node(&mut self, id: NodeId) {
        if let Some(state) = self.states.get_mut(id.0 as usize) {
            state.set_pinned(false);
        }
    }

    /// Check if a node is pinned.
    pub fn is_node_pinned(&self, id: NodeId) -> bool {
        self.states
            .get(id.0 as usize)
            .map(|state| state.is_pinned())
            .unwrap_or(false)
    }

    // =========================================================================
    // Edge Operations
    // =========================================================================

    /// Add an edge between two nodes.
    ///
    /// Returns false when either endpoint names an unknown slot; the edge is
    /// dropped rather than stored dangling. Self-loops and parallel edges are
    /// stored as given.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, weight: f32) -> bool {
        let count = self.graph.node_count() as u32;
        if source.0 >= count || target.0 >= count {
            return false;
        }

        self.graph.add_edge(
            NodeIndex::new(source.0 as usize),
            NodeIndex::new(target.0 as usize),
            weight,
        );
        true
    }

    /// Add edges in bulk from pairs [src0, tgt0, src1, tgt1, ...], all with
    /// weight 1.0.
    ///
    /// Returns the number of edges stored; pairs naming unknown slots are
    /// skipped.
    pub fn load_edges(&mut self, edges: &[u32]) -> u32 {
        let count = edges.len() / 2;
        let mut added = 0;

        for i in 0..count {
            if self.add_edge(NodeId(edges[i * 2]), NodeId(edges[i * 2 + 1]), 1.0) {
                added += 1;
            }
        }

        added
    }

    /// Add edges in bulk with per-edge weights.
    ///
    /// `edges` holds pairs as in [`load_edges`](Self::load_edges); `weights`
    /// holds one multiplier per pair, defaulting to 1.0 where it runs short.
    /// Returns the number of edges stored.
    pub fn load_weighted_edges(&mut self, edges: &[u32], weights: &[f32]) -> u32 {
        let count = edges.len() / 2;
        let mut added = 0;

        for i in 0..count {
            let weight = weights.get(i).copied().unwrap_or(1.0);
            if self.add_edge(NodeId(edges[i * 2]), NodeId(edges[i * 2 + 1]), weight) {
                added += 1;
            }
        }

        added
    }

    /// Get the number of edges.
    pub fn edge_count(&self) -> u32 {
        self.graph.edge_count() as u32
    }

    /// Get neighbors of a node across both edge directions.
    ///
    /// Each neighbor appears once, regardless of parallel edges.
    pub fn neighbors(&self, id: NodeId) -> Vec<u32> {
        let slot = id.0 as usize;
        if slot >= self.graph.node_count() {
            return Vec::new();
        }

        let mut out: Vec<u32> = self
            .graph
            .neighbors_undirected(NodeIndex::new(slot))
            .map(|index| index.index() as u32)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Iterate over every stored edge as (source slot, target slot, weight).
    pub fn springs(&self) -> impl Iterator<Item = (u32, u32, f32)> + '_ {
        self.graph.edge_references().map(|edge| {
            (
                edge.source().index() as u32,
                edge.target().index() as u32,
                *edge.weight(),
            )
        })
    }

    // =========================================================================
    // Buffer Access
    // =========================================================================

    /// Get X positions slice.
    pub fn positions_x(&self) -> &[f32] {
        &self.pos_x
    }

    /// Get Y positions slice.
    pub fn positions_y(&self) -> &[f32] {
        &self.pos_y
    }

    /// Get X velocities slice.
    pub fn velocities_x(&self) -> &[f32] {
        &self.vel_x
    }

    /// Get Y velocities slice.
    pub fn velocities_y(&self) -> &[f32] {
        &self.vel_y
    }

    /// Get node masses slice.
    pub fn masses(&self) -> &[f32] {
        &self.mass
    }

    /// Borrow the simulation buffers mutably for an integration pass.
    ///
    /// Marks the spatial index dirty, since positions are expected to change
    /// through the returned view.
    pub fn sim_buffers_mut(&mut self) -> SimBuffersMut<'_> {
        self.spatial_dirty = true;
        SimBuffersMut {
            pos_x: &mut self.pos_x,
            pos_y: &mut self.pos_y,
            vel_x: &mut self.vel_x,
            vel_y: &mut self.vel_y,
            states: &self.states,
        }
    }

    /// Zero all node velocities.
    pub fn reset_velocities(&mut self) {
        self.vel_x.fill(0.0);
        self.vel_y.fill(0.0);
    }

    // =========================================================================
    // Spatial Queries
    // =========================================================================

    /// Find the nearest node to a point.
    pub fn find_nearest(&mut self, x: f32, y: f32) -> Option<NodeId> {
        self.refresh_spatial_index();
        self.spatial.nearest(x, y)
    }

    /// Find the nearest node within a maximum distance.
    pub fn find_nearest_within(&mut self, x: f32, y: f32, max_distance: f32) -> Option<NodeId> {
        self.refresh_spatial_index();
        self.spatial.nearest_within(x, y, max_distance)
    }

    /// Find all nodes in a rectangle.
    pub fn find_in_rect(&mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<u32> {
        self.refresh_spatial_index();
        self.spatial
            .in_rect(min_x, min_y, max_x, max_y)
            .into_iter()
            .map(|id| id.0)
            .collect()
    }

    /// Find all nodes within a radius of a point.
    pub fn find_in_radius(&mut self, x: f32, y: f32, radius: f32) -> Vec<u32> {
        self.refresh_spatial_index();
        self.spatial
            .in_radius(x, y, radius)
            .into_iter()
            .map(|id| id.0)
            .collect()
    }

    /// Rebuild the spatial index from current positions, even if it is not
    /// marked dirty.
    pub fn rebuild_spatial_index(&mut self) {
        self.spatial.rebuild(&self.pos_x, &self.pos_y);
        self.spatial_dirty = false;
    }

    fn refresh_spatial_index(&mut self) {
        if self.spatial_dirty {
            self.rebuild_spatial_index();
        }
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Get the bounding box of all nodes as (min_x, min_y, max_x, max_y).
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        if self.pos_x.is_empty() {
            return None;
        }

        let mut min_x = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_y = f32::NEG_INFINITY;

        for (&x, &y) in self.pos_x.iter().zip(&self.pos_y) {
            if x < min_x { min_x = x; }
            if x > max_x { max_x = x; }
            if y < min_y { min_y = y; }
            if y > max_y { max_y = y; }
        }

        if min_x == f32::INFINITY {
            return None;
        }

        Some((min_x, min_y, max_x, max_y))
    }

    /// Clear all nodes and edges, resetting the graph to its initial state.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.pos_x.clear();
        self.pos_y.clear();
        self.vel_x.clear();
        self.vel_y.clear();
        self.mass.clear();
        self.states.clear();
        self.spatial.clear();
        self.spatial_dirty = false;
    }
}

impl Default for SpringGraph {
    fn default() -> Self {
        Self::new()
    }
}
