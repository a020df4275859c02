//! Force-directed layout solver.
//!
//! Runs the classic spring-embedder loop: every iteration rebuilds a
//! Barnes-Hut quad-tree over the current positions, accumulates approximate
//! n-body repulsion and exact per-edge spring attraction, then integrates
//! velocities with damping. Convergence is measured as the sum of squared
//! per-node displacements in one iteration.
//!
//! # Algorithm Overview
//!
//! 1. **Tree build:** a fresh quad-tree over the node bounding box plus
//!    margin, one point-mass per node. The tree lives for one iteration.
//! 2. **Read phase:** per node, aggregate repulsion from the tree; per edge,
//!    a Hooke spring force `strength * weight * (distance - rest_length)`
//!    applied equal-and-opposite to both endpoints. Forces accumulate in
//!    solver-owned scratch buffers; no position is written.
//! 3. **Write phase:** `vel = (vel + force) * damping; pos += vel`. Pinned
//!    nodes keep their position and shed their velocity.
//! 4. Repeat until the displacement sum falls below the convergence
//!    threshold, the iteration cap is reached, or a stop signal is raised.
//!
//! Nodes with no edges are driven by repulsion alone and drift apart without
//! bound; hosts that want a contained picture should pin anchors or re-center
//! between runs.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::graph::{NodeId, SpringGraph};
use crate::spatial::{PointMass, QuadTree, Rect};

/// Padding added around the node bounding box when building the quad-tree,
/// keeping nodes on the max edges inside the tree's half-open boundary.
const BOUNDS_MARGIN: f32 = 10.0;

/// Distance below which spring endpoints count as coincident and are
/// separated along a deterministic direction instead of a normalized one.
const MIN_DISTANCE: f32 = 0.01;

/// Tuning parameters for the force solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceConfig {
    /// Barnes-Hut accuracy threshold: subtrees with width/distance below
    /// this are approximated as a single point-mass. Smaller is more exact
    /// and slower.
    pub theta: f32,
    /// Scale of the inverse-square node-node repulsion.
    pub repulsion_strength: f32,
    /// Spring rest length; an edge at this distance exerts no force.
    pub spring_length: f32,
    /// Spring stiffness per unit of stretch, multiplied by the edge weight.
    pub spring_strength: f32,
    /// Velocity retention per iteration, in (0, 1). Lower settles faster.
    pub damping: f32,
    /// Hard cap on iterations per run.
    pub max_iterations: u32,
    /// Run stops once the sum of squared displacements drops below this.
    pub convergence_threshold: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            theta: 0.5,
            repulsion_strength: 100.0,
            spring_length: 50.0,
            spring_strength: 0.05,
            damping: 0.5,
            max_iterations: 300,
            convergence_threshold: 1e-3,
        }
    }
}

/// Outcome of a solver run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveStats {
    /// Iterations actually executed.
    pub iterations: u32,
    /// Whether the displacement sum fell below the convergence threshold.
    pub converged: bool,
    /// Sum of squared node displacements in the final iteration.
    pub total_displacement: f32,
}

/// The force-directed layout solver.
///
/// Holds the configuration, per-run counters, and the force scratch buffers
/// reused across iterations. All per-node state lives in the [`SpringGraph`].
pub struct ForceSolver {
    config: ForceConfig,
    forces_x: Vec<f32>,
    forces_y: Vec<f32>,
    iterations_run: u32,
    last_displacement: f32,
}

impl ForceSolver {
    /// Create a solver with the given configuration.
    pub fn new(config: ForceConfig) -> Self {
        Self {
            config,
            forces_x: Vec::new(),
            forces_y: Vec::new(),
            iterations_run: 0,
            last_displacement: 0.0,
        }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ForceConfig::default())
    }

    /// The active configuration.
    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next iteration.
    pub fn set_config(&mut self, config: ForceConfig) {
        self.config = config;
    }

    /// Iterations executed since the last run started.
    pub fn iterations_run(&self) -> u32 {
        self.iterations_run
    }

    /// Displacement sum measured by the most recent iteration.
    pub fn last_displacement(&self) -> f32 {
        self.last_displacement
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Advance the layout by one iteration.
    ///
    /// Returns the sum of squared node displacements, the same metric the
    /// run loop tests for convergence. Hosts driving an animated layout call
    /// this once per frame.
    pub fn step(&mut self, graph: &mut SpringGraph) -> f32 {
        if graph.node_count() == 0 {
            self.last_displacement = 0.0;
            return 0.0;
        }

        self.accumulate_forces(graph);
        let displacement = self.integrate(graph);

        self.iterations_run += 1;
        self.last_displacement = displacement;
        displacement
    }

    /// Run to convergence or the iteration cap.
    ///
    /// Velocities and run counters are reset at the start, so each run is a
    /// fresh descent from the current positions.
    pub fn run(&mut self, graph: &mut SpringGraph) -> SolveStats {
        let stop = AtomicBool::new(false);
        self.run_until(graph, &stop)
    }

    /// Run to convergence, the iteration cap, or an external stop signal.
    ///
    /// The signal is checked between iterations, never mid-iteration, so
    /// positions are always left in a consistent state. An empty graph
    /// converges immediately.
    pub fn run_until(&mut self, graph: &mut SpringGraph, stop: &AtomicBool) -> SolveStats {
        self.iterations_run = 0;
        self.last_displacement = 0.0;
        graph.reset_velocities();

        if graph.node_count() == 0 {
            return SolveStats {
                iterations: 0,
                converged: true,
                total_displacement: 0.0,
            };
        }

        let mut converged = false;
        for _ in 0..self.config.max_iterations {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let displacement = self.step(graph);
            if displacement < self.config.convergence_threshold {
                converged = true;
                break;
            }
        }

        log::debug!(
            "layout run finished: {} iterations, converged {}, displacement {}",
            self.iterations_run,
            converged,
            self.last_displacement
        );

        SolveStats {
            iterations: self.iterations_run,
            converged,
            total_displacement: self.last_displacement,
        }
    }

    // =========================================================================
    // Force Passes
    // =========================================================================

    /// Read phase: fill the scratch buffers with the net force on each node.
    fn accumulate_forces(&mut self, graph: &SpringGraph) {
        let count = graph.node_count() as usize;
        self.forces_x.clear();
        self.forces_x.resize(count, 0.0);
        self.forces_y.clear();
        self.forces_y.resize(count, 0.0);

        let pos_x = graph.positions_x();
        let pos_y = graph.positions_y();
        let masses = graph.masses();

        // Repulsion through a fresh quad-tree.
        if let Some((min_x, min_y, max_x, max_y)) = graph.bounds() {
            let boundary = Rect::new(
                min_x - BOUNDS_MARGIN,
                min_y - BOUNDS_MARGIN,
                (max_x - min_x) + 2.0 * BOUNDS_MARGIN,
                (max_y - min_y) + 2.0 * BOUNDS_MARGIN,
            );
            let mut tree = QuadTree::new(boundary);
            for slot in 0..count {
                tree.insert(PointMass::with_mass(
                    NodeId(slot as u32),
                    pos_x[slot],
                    pos_y[slot],
                    masses[slot],
                ));
            }

            for slot in 0..count {
                let target = PointMass::with_mass(
                    NodeId(slot as u32),
                    pos_x[slot],
                    pos_y[slot],
                    masses[slot],
                );
                let (fx, fy) =
                    tree.calculate_force(&target, self.config.theta, self.config.repulsion_strength);
                self.forces_x[slot] += fx;
                self.forces_y[slot] += fy;
            }
        }

        // Springs, exact per edge. Parallel edges each contribute.
        for (source, target, weight) in graph.springs() {
            if source == target {
                continue;
            }
            let s = source as usize;
            let t = target as usize;

            let dx = pos_x[t] - pos_x[s];
            let dy = pos_y[t] - pos_y[s];
            let distance_sq = dx * dx + dy * dy;

            let (ux, uy, distance) = if distance_sq < MIN_DISTANCE * MIN_DISTANCE {
                // Coincident endpoints have no meaningful direction; pick one
                // deterministically so the pair separates the same way every
                // run.
                let angle = pair_angle(source, target);
                (angle.cos(), angle.sin(), 0.0)
            } else {
                let distance = distance_sq.sqrt();
                (dx / distance, dy / distance, distance)
            };

            let magnitude =
                self.config.spring_strength * weight * (distance - self.config.spring_length);
            self.forces_x[s] += magnitude * ux;
            self.forces_y[s] += magnitude * uy;
            self.forces_x[t] -= magnitude * ux;
            self.forces_y[t] -= magnitude * uy;
        }
    }

    /// Write phase: apply accumulated forces to velocities and positions.
    /// Returns the sum of squared displacements.
    fn integrate(&mut self, graph: &mut SpringGraph) -> f32 {
        let damping = self.config.damping;
        let mut total = 0.0;

        let buffers = graph.sim_buffers_mut();
        for slot in 0..buffers.pos_x.len() {
            if buffers.states[slot].is_pinned() {
                buffers.vel_x[slot] = 0.0;
                buffers.vel_y[slot] = 0.0;
                continue;
            }

            let vx = (buffers.vel_x[slot] + self.forces_x[slot]) * damping;
            let vy = (buffers.vel_y[slot] + self.forces_y[slot]) * damping;
            buffers.vel_x[slot] = vx;
            buffers.vel_y[slot] = vy;
            buffers.pos_x[slot] += vx;
            buffers.pos_y[slot] += vy;
            total += vx * vx + vy * vy;
        }

        total
    }
}

/// Deterministic direction for a coincident spring endpoint pair, from the
/// fract-of-scaled-sine construction. Same slots, same angle, every run.
fn pair_angle(source: u32, target: u32) -> f32 {
    let seed = source as f32 * 12.9898 + target as f32 * 78.233;
    (seed.sin() * 43758.547).fract() * std::f32::consts::TAU
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_config() -> ForceConfig {
        ForceConfig {
            spring_length: 50.0,
            spring_strength: 0.5,
            max_iterations: 500,
            convergence_threshold: 1e-4,
            ..ForceConfig::default()
        }
    }

    fn distance(graph: &SpringGraph, a: usize, b: usize) -> f32 {
        let dx = graph.positions_x()[a] - graph.positions_x()[b];
        let dy = graph.positions_y()[a] - graph.positions_y()[b];
        (dx * dx + dy * dy).sqrt()
    }

    #[test]
    fn test_config_defaults() {
        let config = ForceConfig::default();
        assert_eq!(config.theta, 0.5);
        assert_eq!(config.repulsion_strength, 100.0);
        assert!(config.damping > 0.0 && config.damping < 1.0);
        assert!(config.max_iterations > 0);
    }

    #[test]
    fn test_connected_pair_settles_at_spring_length() {
        let mut graph = SpringGraph::new();
        graph.load_nodes(&[0.0, 0.0, 200.0, 0.0]);
        graph.load_edges(&[0, 1]);

        let mut solver = ForceSolver::new(two_node_config());
        let stats = solver.run(&mut graph);

        assert!(stats.converged, "did not converge in {} iterations", stats.iterations);
        assert!(stats.iterations < 500);

        let gap = distance(&graph, 0, 1);
        assert!(
            (gap - 50.0).abs() < 0.5,
            "expected spacing near the rest length of 50, got {gap}"
        );

        // Collinear symmetric setup: nothing should leave the x axis.
        assert_eq!(graph.positions_y(), &[0.0, 0.0]);
    }

    #[test]
    fn test_empty_graph_run_is_noop() {
        let mut graph = SpringGraph::new();
        let mut solver = ForceSolver::with_defaults();

        let stats = solver.run(&mut graph);
        assert_eq!(stats.iterations, 0);
        assert!(stats.converged);
        assert_eq!(stats.total_displacement, 0.0);
        assert_eq!(solver.step(&mut graph), 0.0);
    }

    #[test]
    fn test_lone_node_converges_immediately() {
        let mut graph = SpringGraph::new();
        graph.add_node(12.0, -7.0);

        let mut solver = ForceSolver::with_defaults();
        let stats = solver.run(&mut graph);

        assert_eq!(stats.iterations, 1);
        assert!(stats.converged);
        assert_eq!(graph.get_node_position(crate::graph::NodeId(0)), Some((12.0, -7.0)));
    }

    #[test]
    fn test_pinned_node_stays_put() {
        let mut graph = SpringGraph::new();
        graph.load_nodes(&[0.0, 0.0, 200.0, 0.0]);
        graph.load_edges(&[0, 1]);
        graph.pin_node(crate::graph::NodeId(0));

        let mut solver = ForceSolver::new(two_node_config());
        let stats = solver.run(&mut graph);

        assert!(stats.converged);
        assert_eq!(graph.positions_x()[0], 0.0);
        assert_eq!(graph.positions_y()[0], 0.0);
        assert_eq!(graph.velocities_x()[0], 0.0);

        // The free node does all the travelling.
        let gap = distance(&graph, 0, 1);
        assert!((gap - 50.0).abs() < 0.5, "gap was {gap}");
    }

    #[test]
    fn test_self_loop_exerts_no_force() {
        let mut graph = SpringGraph::new();
        graph.add_node(30.0, 40.0);
        graph.load_edges(&[0, 0]);

        let mut solver = ForceSolver::with_defaults();
        let stats = solver.run(&mut graph);

        assert_eq!(stats.iterations, 1);
        assert!(stats.converged);
        assert_eq!(graph.get_node_position(crate::graph::NodeId(0)), Some((30.0, 40.0)));
    }

    #[test]
    fn test_parallel_edges_accumulate() {
        let mut single = SpringGraph::new();
        single.load_nodes(&[0.0, 0.0, 200.0, 0.0]);
        single.load_edges(&[0, 1]);

        let mut doubled = SpringGraph::new();
        doubled.load_nodes(&[0.0, 0.0, 200.0, 0.0]);
        doubled.load_edges(&[0, 1, 0, 1]);

        let config = two_node_config();
        let first = ForceSolver::new(config.clone()).step(&mut single);
        let second = ForceSolver::new(config).step(&mut doubled);

        assert!(
            second > first * 1.5,
            "doubled spring should pull harder on the first step: {second} vs {first}"
        );
    }

    #[test]
    fn test_unconnected_nodes_repel() {
        let mut graph = SpringGraph::new();
        graph.load_nodes(&[0.0, 0.0, 60.0, 0.0, 120.0, 0.0]);

        let mut solver = ForceSolver::with_defaults();
        solver.step(&mut graph);

        // End nodes are pushed outward; the middle node sits exactly at the
        // aggregate center of mass, where the self-interaction guard yields
        // zero force.
        assert!(graph.positions_x()[0] < 0.0);
        assert!(graph.positions_x()[2] > 120.0);
        assert_eq!(graph.positions_x()[1], 60.0);
    }

    #[test]
    fn test_extreme_corner_nodes_feel_repulsion() {
        let mut graph = SpringGraph::new();
        graph.load_nodes(&[0.0, 0.0, 100.0, 100.0]);

        let mut solver = ForceSolver::with_defaults();
        let displacement = solver.step(&mut graph);

        // Both nodes, including the one on the bounding-box max corner, must
        // be inside the tree and pushed apart.
        assert!(displacement > 0.0);
        assert!(graph.positions_x()[0] < 0.0 && graph.positions_y()[0] < 0.0);
        assert!(graph.positions_x()[1] > 100.0 && graph.positions_y()[1] > 100.0);
    }

    #[test]
    fn test_coincident_connected_nodes_separate_deterministically() {
        let run_once = || {
            let mut graph = SpringGraph::new();
            graph.load_nodes(&[10.0, 10.0, 10.0, 10.0]);
            graph.load_edges(&[0, 1]);

            let mut solver = ForceSolver::with_defaults();
            let stats = solver.run(&mut graph);
            assert!(stats.converged);

            let gap = distance(&graph, 0, 1);
            assert!(gap > 40.0 && gap < 60.0, "gap was {gap}");
            (
                graph.positions_x().to_vec(),
                graph.positions_y().to_vec(),
            )
        };

        let (first_x, first_y) = run_once();
        let (second_x, second_y) = run_once();
        assert_eq!(first_x, second_x, "x positions differ between identical runs");
        assert_eq!(first_y, second_y, "y positions differ between identical runs");
    }

    #[test]
    fn test_solver_is_deterministic_on_a_mesh() {
        let run_once = || {
            let mut graph = SpringGraph::new();
            let positions =
                crate::layout::scatter::scatter_positions(12, 8.0);
            graph.load_nodes(&positions);
            graph.load_edges(&[0, 1, 1, 2, 2, 3, 3, 0, 0, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11]);

            let mut solver = ForceSolver::new(ForceConfig {
                max_iterations: 60,
                convergence_threshold: 0.0,
                ..ForceConfig::default()
            });
            solver.run(&mut graph);
            (graph.positions_x().to_vec(), graph.positions_y().to_vec())
        };

        let (first_x, first_y) = run_once();
        let (second_x, second_y) = run_once();
        assert_eq!(first_x, second_x);
        assert_eq!(first_y, second_y);
    }

    #[test]
    fn test_stop_signal_halts_run() {
        let mut graph = SpringGraph::new();
        graph.load_nodes(&[0.0, 0.0, 200.0, 0.0]);
        graph.load_edges(&[0, 1]);

        let stop = AtomicBool::new(true);
        let mut solver = ForceSolver::new(two_node_config());
        let stats = solver.run_until(&mut graph, &stop);

        assert_eq!(stats.iterations, 0);
        assert!(!stats.converged);
        // Positions untouched: the signal was checked before any iteration.
        assert_eq!(graph.positions_x(), &[0.0, 200.0]);
    }

    #[test]
    fn test_rerun_from_converged_state_settles_fast() {
        let mut graph = SpringGraph::new();
        graph.load_nodes(&[0.0, 0.0, 200.0, 0.0]);
        graph.load_edges(&[0, 1]);

        let mut solver = ForceSolver::new(two_node_config());
        let first = solver.run(&mut graph);
        assert!(first.converged);

        let second = solver.run(&mut graph);
        assert!(second.converged);
        assert!(
            second.iterations <= 5,
            "rerun from equilibrium took {} iterations",
            second.iterations
        );
    }

    #[test]
    fn test_step_tracks_counters() {
        let mut graph = SpringGraph::new();
        graph.load_nodes(&[0.0, 0.0, 200.0, 0.0]);
        graph.load_edges(&[0, 1]);

        let mut solver = ForceSolver::new(two_node_config());
        assert_eq!(solver.iterations_run(), 0);

        let displacement = solver.step(&mut graph);
        assert_eq!(solver.iterations_run(), 1);
        assert_eq!(solver.last_displacement(), displacement);
        assert!(displacement > 0.0);
    }
}
