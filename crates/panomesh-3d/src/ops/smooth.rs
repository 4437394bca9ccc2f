use glam::DVec3;
use rayon::prelude::*;

use crate::mesh::{Mesh, MeshError};

/// Laplacian smoothing of the vertex positions.
///
/// Each iteration moves every vertex towards the mean of its one-ring neighbours,
/// `v <- v + lambda * (mean(ring) - v)`, using the positions of the previous iteration.
/// With `lambda = 1` a vertex is replaced by the mean of its neighbours. Vertices without
/// neighbours are left untouched and `iterations = 0` leaves the mesh unchanged.
///
/// # Arguments
///
/// * `mesh` - The mesh to smooth in place.
/// * `iterations` - The number of smoothing passes.
/// * `lambda` - The step size, must be finite.
pub fn smooth_laplacian(mesh: &mut Mesh, iterations: usize, lambda: f64) -> Result<(), MeshError> {
    if !lambda.is_finite() {
        return Err(MeshError::InvalidParameter("lambda", lambda));
    }
    if iterations == 0 {
        return Ok(());
    }
    mesh.validate()?;

    let adjacency = mesh.vertex_adjacency();
    let mut positions = mesh
        .vertices
        .iter()
        .map(|v| DVec3::from_array(*v))
        .collect::<Vec<_>>();

    for _ in 0..iterations {
        positions = positions
            .par_iter()
            .zip(adjacency.par_iter())
            .map(|(&p, ring)| {
                if ring.is_empty() {
                    return p;
                }
                let mean = ring.iter().fold(DVec3::ZERO, |acc, &j| acc + positions[j])
                    / ring.len() as f64;
                p + lambda * (mean - p)
            })
            .collect();
    }

    mesh.vertices = positions.into_iter().map(|p| p.to_array()).collect();
    log::debug!("laplacian smoothing: {iterations} iterations, lambda {lambda}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fan() -> Mesh {
        // center vertex lifted above a square ring, plus one isolated vertex
        Mesh::new(
            vec![
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [-1.0, 0.0, 0.0],
                [0.0, -1.0, 0.0],
                [7.0, 7.0, 7.0],
            ],
            vec![[0, 1, 2], [0, 2, 3], [0, 3, 4], [0, 4, 1]],
        )
    }

    #[test]
    fn test_zero_iterations_is_identity() -> Result<(), MeshError> {
        let mut mesh = fan();
        smooth_laplacian(&mut mesh, 0, 1.0)?;
        assert_eq!(mesh, fan());
        Ok(())
    }

    #[test]
    fn test_center_moves_to_ring_mean() -> Result<(), MeshError> {
        let mut mesh = fan();
        smooth_laplacian(&mut mesh, 1, 1.0)?;
        assert_relative_eq!(mesh.vertices[0][0], 0.0);
        assert_relative_eq!(mesh.vertices[0][1], 0.0);
        assert_relative_eq!(mesh.vertices[0][2], 0.0);
        assert_eq!(mesh.vertices[5], [7.0, 7.0, 7.0]);
        assert_eq!(mesh.triangles, fan().triangles);
        Ok(())
    }

    #[test]
    fn test_partial_step() -> Result<(), MeshError> {
        let mut mesh = fan();
        smooth_laplacian(&mut mesh, 1, 0.5)?;
        assert_relative_eq!(mesh.vertices[0][2], 0.5);
        Ok(())
    }

    #[test]
    fn test_invalid_lambda() {
        let mut mesh = fan();
        assert!(smooth_laplacian(&mut mesh, 1, f64::NAN).is_err());
    }
}
