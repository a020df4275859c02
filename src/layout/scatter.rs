//! Deterministic initial node placement.
//!
//! Hosts often hand the engine every node at the origin, which is the worst
//! possible starting state for a force layout: coincident points produce no
//! usable force directions. Scattering places nodes on a sunflower spiral
//! (Vogel's model), giving approximately uniform density over a disc with no
//! randomness, so the same node count always produces the same picture.

/// Position of one node on the sunflower spiral.
///
/// Index 0 sits at the origin; subsequent nodes wind outward by the golden
/// angle with ring radius growing as the square root of the index, which
/// keeps neighbor spacing near `spacing` everywhere on the disc.
pub fn scatter_point(index: usize, spacing: f32) -> (f32, f32) {
    // The golden angle ensures approximately uniform distribution.
    let golden_angle = std::f32::consts::TAU * (1.0 - 1.0 / ((1.0 + 5.0f32.sqrt()) / 2.0));

    let radius = spacing * (index as f32).sqrt();
    let angle = index as f32 * golden_angle;
    (radius * angle.cos(), radius * angle.sin())
}

/// Interleaved positions [x0, y0, x1, y1, ...] for `count` nodes on the
/// spiral.
pub fn scatter_positions(count: usize, spacing: f32) -> Vec<f32> {
    let mut positions = Vec::with_capacity(count * 2);
    for i in 0..count {
        let (x, y) = scatter_point(i, spacing);
        positions.push(x);
        positions.push(y);
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_point_is_origin() {
        assert_eq!(scatter_point(0, 10.0), (0.0, 0.0));
    }

    #[test]
    fn test_positions_are_interleaved_pairs() {
        let positions = scatter_positions(5, 10.0);
        assert_eq!(positions.len(), 10);

        let (x1, y1) = scatter_point(1, 10.0);
        assert_eq!(positions[2], x1);
        assert_eq!(positions[3], y1);
    }

    #[test]
    fn test_all_points_distinct() {
        let positions = scatter_positions(50, 5.0);
        for i in 0..50 {
            for j in (i + 1)..50 {
                let dx = positions[i * 2] - positions[j * 2];
                let dy = positions[i * 2 + 1] - positions[j * 2 + 1];
                let gap = (dx * dx + dy * dy).sqrt();
                assert!(gap > 1.0, "points {i} and {j} are only {gap} apart");
            }
        }
    }

    #[test]
    fn test_radius_grows_with_index() {
        let near = scatter_point(4, 10.0);
        let far = scatter_point(49, 10.0);
        let near_r = (near.0 * near.0 + near.1 * near.1).sqrt();
        let far_r = (far.0 * far.0 + far.1 * far.1).sqrt();

        assert!((near_r - 20.0).abs() < 1e-3, "ring 4 radius was {near_r}");
        assert!((far_r - 70.0).abs() < 1e-3, "ring 49 radius was {far_r}");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(scatter_positions(20, 7.5), scatter_positions(20, 7.5));
    }
}
