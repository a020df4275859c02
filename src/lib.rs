//! Lodestone Graph - WASM Module
//!
//! This module provides the force-directed layout engine for the Lodestone
//! Graph visualization library. It is compiled to WebAssembly and exposes a
//! JavaScript-friendly API via wasm-bindgen.
//!
//! # Architecture
//!
//! - `graph`: Graph storage using petgraph topology plus SoA simulation buffers
//! - `spatial`: Barnes-Hut quad-tree for repulsion, R-tree for hit testing
//! - `layout`: The force solver and deterministic initial placement
//!
//! The engine only computes coordinates: rendering, DOM wiring, and all UI
//! live on the JavaScript side, which reads positions back through the
//! zero-copy views after each `step` or `solve`.

use js_sys::Float32Array;
use wasm_bindgen::prelude::*;

pub mod graph;
pub mod layout;
pub mod spatial;

use graph::{NodeId, SpringGraph};
use layout::{ForceConfig, ForceSolver};

/// Initialize the WASM module: route panics and log output to the browser
/// console.
#[wasm_bindgen(start)]
pub fn init() {
    let _ = console_log::init_with_level(log::Level::Debug);
    console_error_panic_hook::set_once();
}

/// Main entry point for the layout engine.
///
/// This struct wraps the internal SpringGraph and ForceSolver and provides
/// the public API exposed to JavaScript.
#[wasm_bindgen]
pub struct LodestoneGraphWasm {
    graph: SpringGraph,
    solver: ForceSolver,
}

#[wasm_bindgen]
impl LodestoneGraphWasm {
    /// Create a new empty layout engine with default solver configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            graph: SpringGraph::new(),
            solver: ForceSolver::with_defaults(),
        }
    }

    /// Create a layout engine with pre-allocated capacity.
    ///
    /// # Arguments
    ///
    /// * `node_capacity` - Expected number of nodes
    /// * `edge_capacity` - Expected number of edges
    #[wasm_bindgen(js_name = withCapacity)]
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            graph: SpringGraph::with_capacity(node_capacity, edge_capacity),
            solver: ForceSolver::with_defaults(),
        }
    }

    // =========================================================================
    // Graph Loading
    // =========================================================================

    /// Load nodes from a Float32Array of positions.
    ///
    /// The positions array should be [x0, y0, x1, y1, ...]. Node ids are
    /// assigned densely in load order. Returns the number of nodes added.
    #[wasm_bindgen(js_name = loadNodes)]
    pub fn load_nodes(&mut self, positions: &[f32]) -> u32 {
        self.graph.load_nodes(positions)
    }

    /// Assign per-node masses, one entry per node slot.
    ///
    /// Non-positive or non-finite entries keep the default mass of 1.
    #[wasm_bindgen(js_name = loadMasses)]
    pub fn load_masses(&mut self, masses: &[f32]) {
        self.graph.load_masses(masses);
    }

    /// Load edges from a Uint32Array of pairs.
    ///
    /// The edges array should be [src0, tgt0, src1, tgt1, ...]; all edges
    /// get weight 1.0. Pairs naming unknown node ids are skipped. Returns
    /// the number of edges actually stored.
    #[wasm_bindgen(js_name = loadEdges)]
    pub fn load_edges(&mut self, edges: &[u32]) -> u32 {
        self.graph.load_edges(edges)
    }

    /// Load edges with per-edge spring strength multipliers.
    ///
    /// `edges` holds pairs as in `loadEdges`; `weights` holds one multiplier
    /// per pair, defaulting to 1.0 where it runs short. Returns the number of
    /// edges actually stored.
    #[wasm_bindgen(js_name = loadWeightedEdges)]
    pub fn load_weighted_edges(&mut self, edges: &[u32], weights: &[f32]) -> u32 {
        self.graph.load_weighted_edges(edges, weights)
    }

    /// Get the number of nodes in the graph.
    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> u32 {
        self.graph.node_count()
    }

    /// Get the number of edges in the graph.
    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> u32 {
        self.graph.edge_count()
    }

    /// Get neighbors of a node across both edge directions.
    ///
    /// Returns a Uint32Array of neighbor node ids, each listed once.
    #[wasm_bindgen(js_name = getNeighbors)]
    pub fn get_neighbors(&self, node_id: u32) -> Vec<u32> {
        self.graph.neighbors(NodeId(node_id))
    }

    /// Clear all nodes and edges.
    pub fn clear(&mut self) {
        self.graph.clear();
    }

    // =========================================================================
    // Interaction
    // =========================================================================

    /// Get a node's X position.
    #[wasm_bindgen(js_name = getNodeX)]
    pub fn get_node_x(&self, node_id: u32) -> Option<f32> {
        self.graph.get_node_position(NodeId(node_id)).map(|(x, _)| x)
    }

    /// Get a node's Y position.
    #[wasm_bindgen(js_name = getNodeY)]
    pub fn get_node_y(&self, node_id: u32) -> Option<f32> {
        self.graph.get_node_position(NodeId(node_id)).map(|(_, y)| y)
    }

    /// Set a node's position, e.g. while the user drags it.
    #[wasm_bindgen(js_name = setNodePosition)]
    pub fn set_node_position(&mut self, node_id: u32, x: f32, y: f32) {
        self.graph.set_node_position(NodeId(node_id), x, y);
    }

    /// Pin a node so the solver holds it in place.
    #[wasm_bindgen(js_name = pinNode)]
    pub fn pin_node(&mut self, node_id: u32) {
        self.graph.pin_node(NodeId(node_id));
    }

    /// Unpin a node.
    #[wasm_bindgen(js_name = unpinNode)]
    pub fn unpin_node(&mut self, node_id: u32) {
        self.graph.unpin_node(NodeId(node_id));
    }

    /// Check if a node is pinned.
    #[wasm_bindgen(js_name = isNodePinned)]
    pub fn is_node_pinned(&self, node_id: u32) -> bool {
        self.graph.is_node_pinned(NodeId(node_id))
    }

    /// Spread all nodes over a sunflower spiral with the given spacing.
    ///
    /// Deterministic: the same node count always yields the same positions.
    /// Velocities are zeroed, since the previous motion is meaningless after
    /// a reposition. Call this after loading nodes that all share one
    /// position, which would otherwise give the solver no force directions
    /// to work with.
    #[wasm_bindgen(js_name = scatterNodes)]
    pub fn scatter_nodes(&mut self, spacing: f32) {
        for slot in 0..self.graph.node_count() {
            let (x, y) = layout::scatter::scatter_point(slot as usize, spacing);
            self.graph.set_node_position(NodeId(slot), x, y);
        }
        self.graph.reset_velocities();
    }

    // =========================================================================
    // Solver
    // =========================================================================

    /// Replace the solver configuration.
    ///
    /// Accepts a plain object with any subset of the ForceConfig fields
    /// (camelCase: theta, repulsionStrength, springLength, springStrength,
    /// damping, maxIterations, convergenceThreshold); missing fields keep
    /// their defaults. Returns an error if the object cannot be
    /// deserialized.
    pub fn configure(&mut self, config: JsValue) -> Result<(), JsValue> {
        let config: ForceConfig = serde_wasm_bindgen::from_value(config)?;
        self.solver.set_config(config);
        Ok(())
    }

    /// Advance the layout by a single iteration.
    ///
    /// Returns the sum of squared node displacements. Hosts animating the
    /// layout call this once per frame and stop whenever they choose; the
    /// positions are valid after every call.
    pub fn step(&mut self) -> f32 {
        self.solver.step(&mut self.graph)
    }

    /// Run the layout to convergence or the configured iteration cap.
    ///
    /// Returns a stats object { iterations, converged, totalDisplacement }.
    pub fn solve(&mut self) -> Result<JsValue, JsValue> {
        let stats = self.solver.run(&mut self.graph);
        Ok(serde_wasm_bindgen::to_value(&stats)?)
    }

    /// Iterations executed since the last solve started.
    #[wasm_bindgen(js_name = iterationsRun)]
    pub fn iterations_run(&self) -> u32 {
        self.solver.iterations_run()
    }

    /// Displacement sum measured by the most recent iteration.
    #[wasm_bindgen(js_name = lastDisplacement)]
    pub fn last_displacement(&self) -> f32 {
        self.solver.last_displacement()
    }

    // =========================================================================
    // Position Buffer Access (Zero-Copy)
    // =========================================================================

    /// Get a zero-copy view of X positions.
    ///
    /// # Safety
    ///
    /// The returned view is invalidated if any Rust allocation occurs.
    /// Use immediately for rendering or GPU upload, do not store.
    #[wasm_bindgen(js_name = getPositionsXView)]
    pub fn get_positions_x_view(&self) -> Float32Array {
        unsafe { Float32Array::view(self.graph.positions_x()) }
    }

    /// Get a zero-copy view of Y positions.
    ///
    /// # Safety
    ///
    /// The returned view is invalidated if any Rust allocation occurs.
    /// Use immediately for rendering or GPU upload, do not store.
    #[wasm_bindgen(js_name = getPositionsYView)]
    pub fn get_positions_y_view(&self) -> Float32Array {
        unsafe { Float32Array::view(self.graph.positions_y()) }
    }

    /// Get a zero-copy view of X velocities.
    #[wasm_bindgen(js_name = getVelocitiesXView)]
    pub fn get_velocities_x_view(&self) -> Float32Array {
        unsafe { Float32Array::view(self.graph.velocities_x()) }
    }

    /// Get a zero-copy view of Y velocities.
    #[wasm_bindgen(js_name = getVelocitiesYView)]
    pub fn get_velocities_y_view(&self) -> Float32Array {
        unsafe { Float32Array::view(self.graph.velocities_y()) }
    }

    /// Get a pointer to the X positions buffer.
    ///
    /// Used for creating views after WASM memory growth.
    #[wasm_bindgen(js_name = positionsXPtr)]
    pub fn positions_x_ptr(&self) -> *const f32 {
        self.graph.positions_x().as_ptr()
    }

    /// Get a pointer to the Y positions buffer.
    #[wasm_bindgen(js_name = positionsYPtr)]
    pub fn positions_y_ptr(&self) -> *const f32 {
        self.graph.positions_y().as_ptr()
    }

    /// Get the length of each positions buffer.
    #[wasm_bindgen(js_name = positionsLen)]
    pub fn positions_len(&self) -> usize {
        self.graph.positions_x().len()
    }

    /// Get the bounding box of all nodes.
    ///
    /// Returns [min_x, min_y, max_x, max_y], or None if the graph is empty.
    #[wasm_bindgen(js_name = getBounds)]
    pub fn get_bounds(&self) -> Option<Vec<f32>> {
        self.graph
            .bounds()
            .map(|(min_x, min_y, max_x, max_y)| vec![min_x, min_y, max_x, max_y])
    }

    // =========================================================================
    // Spatial Queries
    // =========================================================================

    /// Find the nearest node to a point.
    ///
    /// Returns the node id, or None if the graph is empty.
    #[wasm_bindgen(js_name = findNearestNode)]
    pub fn find_nearest_node(&mut self, x: f32, y: f32) -> Option<u32> {
        self.graph.find_nearest(x, y).map(|id| id.0)
    }

    /// Find the nearest node within a maximum distance.
    ///
    /// Returns the node id, or None if no node is within the distance.
    #[wasm_bindgen(js_name = findNearestNodeWithin)]
    pub fn find_nearest_node_within(&mut self, x: f32, y: f32, max_distance: f32) -> Option<u32> {
        self.graph.find_nearest_within(x, y, max_distance).map(|id| id.0)
    }

    /// Find all nodes within a rectangular region.
    ///
    /// Returns a Uint32Array of node ids.
    #[wasm_bindgen(js_name = findNodesInRect)]
    pub fn find_nodes_in_rect(&mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<u32> {
        self.graph.find_in_rect(min_x, min_y, max_x, max_y)
    }

    /// Find all nodes within a radius of a point.
    ///
    /// Returns a Uint32Array of node ids.
    #[wasm_bindgen(js_name = findNodesInRadius)]
    pub fn find_nodes_in_radius(&mut self, x: f32, y: f32, radius: f32) -> Vec<u32> {
        self.graph.find_in_radius(x, y, radius)
    }

    /// Rebuild the spatial index after position changes.
    ///
    /// Queries refresh the index lazily on their own; call this to pay the
    /// rebuild cost at a time of your choosing, e.g. right after a solve.
    #[wasm_bindgen(js_name = rebuildSpatialIndex)]
    pub fn rebuild_spatial_index(&mut self) {
        self.graph.rebuild_spatial_index();
    }
}

impl Default for LodestoneGraphWasm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::layout::scatter;

    /// Run the full pipeline on plain Rust types: scatter → load → solve →
    /// query. This is exactly what a JS host does through the wasm surface,
    /// minus the bindgen types.
    #[test]
    fn test_scatter_load_solve_pipeline() {
        let mut graph = SpringGraph::new();

        // A hub with three chains hanging off it, seeded on the spiral.
        let positions = scatter::scatter_positions(10, 10.0);
        assert_eq!(graph.load_nodes(&positions), 10);

        let edges = [0, 1, 1, 2, 2, 3, 0, 4, 4, 5, 5, 6, 0, 7, 7, 8, 8, 9];
        assert_eq!(graph.load_edges(&edges), 9);

        let mut solver = ForceSolver::new(ForceConfig {
            spring_length: 40.0,
            max_iterations: 500,
            convergence_threshold: 1e-4,
            ..ForceConfig::default()
        });
        let stats = solver.run(&mut graph);
        println!(
            "pipeline: {} iterations, converged={}, displacement={}",
            stats.iterations, stats.converged, stats.total_displacement
        );

        // Whether or not the run hit the threshold, positions must be usable.
        for (&x, &y) in graph.positions_x().iter().zip(graph.positions_y()) {
            assert!(x.is_finite() && y.is_finite(), "non-finite position ({x}, {y})");
        }

        // Edges should have relaxed toward the rest length: much longer than
        // the scatter spacing, far shorter than a blow-up.
        for (source, target, _) in graph.springs() {
            let dx = graph.positions_x()[source as usize] - graph.positions_x()[target as usize];
            let dy = graph.positions_y()[source as usize] - graph.positions_y()[target as usize];
            let gap = (dx * dx + dy * dy).sqrt();
            assert!(
                gap > 20.0 && gap < 120.0,
                "edge {source}->{target} settled at {gap}, expected near 40"
            );
        }

        // The layout must have spread well beyond the initial disc.
        let (min_x, min_y, max_x, max_y) = graph.bounds().unwrap();
        assert!(
            (max_x - min_x) > 60.0 || (max_y - min_y) > 60.0,
            "layout stayed collapsed: {:?}",
            (min_x, min_y, max_x, max_y)
        );
    }

    /// A star graph must spread its leaves around the hub rather than
    /// stacking them on one side.
    #[test]
    fn test_star_leaves_spread_around_hub() {
        let mut graph = SpringGraph::new();
        let leaf_count = 6usize;

        let positions = scatter::scatter_positions(leaf_count + 1, 5.0);
        graph.load_nodes(&positions);
        let mut edges = Vec::new();
        for leaf in 1..=leaf_count as u32 {
            edges.push(0);
            edges.push(leaf);
        }
        graph.load_edges(&edges);

        let mut solver = ForceSolver::new(ForceConfig {
            spring_length: 50.0,
            max_iterations: 800,
            convergence_threshold: 1e-5,
            ..ForceConfig::default()
        });
        solver.run(&mut graph);

        let hub = (graph.positions_x()[0], graph.positions_y()[0]);
        for leaf in 1..=leaf_count {
            let dx = graph.positions_x()[leaf] - hub.0;
            let dy = graph.positions_y()[leaf] - hub.1;
            let gap = (dx * dx + dy * dy).sqrt();
            // Repulsion between leaves stretches spokes past rest length.
            assert!(
                gap > 40.0 && gap < 150.0,
                "leaf {leaf} sits {gap} from the hub"
            );
        }

        // No two leaves may end up on top of each other.
        for a in 1..=leaf_count {
            for b in (a + 1)..=leaf_count {
                let dx = graph.positions_x()[a] - graph.positions_x()[b];
                let dy = graph.positions_y()[a] - graph.positions_y()[b];
                let gap = (dx * dx + dy * dy).sqrt();
                assert!(gap > 10.0, "leaves {a} and {b} collapsed to {gap} apart");
            }
        }
    }

    /// Dragging: pin a node, move it, and let the rest of the layout follow.
    #[test]
    fn test_pinned_drag_pulls_chain() {
        let mut graph = SpringGraph::new();
        graph.load_nodes(&scatter::scatter_positions(3, 10.0));
        graph.load_edges(&[0, 1, 1, 2]);

        graph.pin_node(NodeId(0));
        graph.set_node_position(NodeId(0), 500.0, 0.0);

        let mut solver = ForceSolver::new(ForceConfig {
            spring_length: 30.0,
            max_iterations: 1000,
            convergence_threshold: 1e-5,
            ..ForceConfig::default()
        });
        let stats = solver.run(&mut graph);
        assert!(stats.converged, "drag relaxation did not settle");

        // The anchor never moves; the chain is dragged into its vicinity.
        assert_eq!(graph.get_node_position(NodeId(0)), Some((500.0, 0.0)));
        for slot in 1..3usize {
            let dx = graph.positions_x()[slot] - 500.0;
            let dy = graph.positions_y()[slot];
            let gap = (dx * dx + dy * dy).sqrt();
            assert!(gap < 150.0, "node {slot} was left {gap} behind the anchor");
        }
    }

    /// Picking queries reflect solver output without an explicit rebuild.
    #[test]
    fn test_picking_after_solve() {
        let mut graph = SpringGraph::new();
        graph.load_nodes(&[0.0, 0.0, 200.0, 0.0]);
        graph.load_edges(&[0, 1]);

        let mut solver = ForceSolver::new(ForceConfig {
            spring_length: 50.0,
            max_iterations: 500,
            convergence_threshold: 1e-4,
            ..ForceConfig::default()
        });
        solver.run(&mut graph);

        // Each endpoint is the nearest node to its own settled position.
        let (x0, y0) = graph.get_node_position(NodeId(0)).unwrap();
        let (x1, y1) = graph.get_node_position(NodeId(1)).unwrap();
        assert_eq!(graph.find_nearest(x0, y0), Some(NodeId(0)));
        assert_eq!(graph.find_nearest(x1, y1), Some(NodeId(1)));

        // The whole settled pair fits in its own bounding box query.
        let (min_x, min_y, max_x, max_y) = graph.bounds().unwrap();
        let hits = graph.find_in_rect(min_x - 1.0, min_y - 1.0, max_x + 1.0, max_y + 1.0);
        assert_eq!(hits.len(), 2);
    }
}
