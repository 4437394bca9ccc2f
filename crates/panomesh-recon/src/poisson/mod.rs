mod grid;
mod marching_cubes;
mod solver;
mod tables;

use glam::DVec3;
use panomesh_3d::mesh::Mesh;
use panomesh_3d::pointcloud::PointCloud;

use crate::error::ReconstructionError;
use grid::GridLayout;

/// Parameters of the Poisson surface reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoissonParams {
    /// The grid has `2^depth` cells along the longest axis of the bounding box.
    pub depth: u32,
    /// Vertices whose density is below this quantile of all densities are pruned, in `[0, 1]`.
    pub density_quantile: f64,
    /// Ratio between the grid side and the bounding box side.
    pub scale: f64,
    /// Iteration cap of the conjugate gradient solver.
    pub max_iterations: usize,
    /// Relative residual at which the solver stops.
    pub tolerance: f64,
}

impl Default for PoissonParams {
    fn default() -> Self {
        Self {
            depth: 7,
            density_quantile: 0.05,
            scale: 1.1,
            max_iterations: 500,
            tolerance: 1e-6,
        }
    }
}

/// Largest supported grid depth, a dense `2^depth` cube.
pub const MAX_POISSON_DEPTH: u32 = 8;

impl PoissonParams {
    pub(crate) fn validate(&self) -> Result<(), ReconstructionError> {
        if self.depth == 0 || self.depth > MAX_POISSON_DEPTH {
            return Err(ReconstructionError::InvalidParameter(
                "depth",
                self.depth as f64,
            ));
        }
        if !(0.0..=1.0).contains(&self.density_quantile) {
            return Err(ReconstructionError::InvalidParameter(
                "density_quantile",
                self.density_quantile,
            ));
        }
        if !(self.scale.is_finite() && self.scale >= 1.0) {
            return Err(ReconstructionError::InvalidParameter("scale", self.scale));
        }
        Ok(())
    }
}

/// Linear interpolated quantile of `values`, `q` in `[0, 1]`.
pub(crate) fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Poisson reconstruction from oriented points.
///
/// Returns the mesh and one density per vertex: the trilinearly interpolated sample weight
/// around the vertex. Triangles face the direction of the input normals.
pub(crate) fn reconstruct_poisson(
    point_cloud: &PointCloud,
    params: &PoissonParams,
) -> Result<(Mesh, Vec<f64>), ReconstructionError> {
    params.validate()?;
    let normals = point_cloud
        .normals()
        .ok_or(ReconstructionError::MissingNormals)?;
    let points = point_cloud.points();

    let grid = GridLayout::fit(
        point_cloud.get_min_bound(),
        point_cloud.get_max_bound(),
        params.depth,
        params.scale,
    );
    let num_nodes = grid.num_nodes();

    // splat the normal field and the sample density
    let mut field = [vec![0.0; num_nodes], vec![0.0; num_nodes], vec![0.0; num_nodes]];
    let mut density = vec![0.0; num_nodes];
    for (p, n) in points.iter().zip(normals.iter()) {
        for (i, w) in grid.trilinear(DVec3::from_array(*p)) {
            for axis in 0..3 {
                field[axis][i] += w * n[axis];
            }
            density[i] += w;
        }
    }

    // rhs of the scaled system: -h^2 div(V)
    let [nx, ny, nz] = grid.dims;
    let strides = [1, nx, nx * ny];
    let mut rhs = vec![0.0; num_nodes];
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let c = grid.index(x, y, z);
                let coords = [x, y, z];
                let mut div = 0.0;
                for axis in 0..3 {
                    let prev = if coords[axis] > 0 {
                        field[axis][c - strides[axis]]
                    } else {
                        0.0
                    };
                    let next = if coords[axis] + 1 < grid.dims[axis] {
                        field[axis][c + strides[axis]]
                    } else {
                        0.0
                    };
                    div += (next - prev) / (2.0 * grid.spacing);
                }
                rhs[c] = -div * grid.spacing * grid.spacing;
            }
        }
    }
    drop(field);

    let (chi, stats) =
        solver::conjugate_gradient(&grid, &rhs, params.max_iterations, params.tolerance);
    log::debug!(
        "poisson: grid {:?}, solver stopped after {} iterations at residual {:.3e}",
        grid.dims,
        stats.iterations,
        stats.relative_residual
    );
    if stats.relative_residual > params.tolerance {
        log::warn!(
            "poisson solver did not converge, residual {:.3e}",
            stats.relative_residual
        );
    }

    let iso = points
        .iter()
        .map(|p| grid.sample(&chi, DVec3::from_array(*p)))
        .sum::<f64>()
        / points.len().max(1) as f64;

    let (vertices, triangles) = marching_cubes::marching_cubes(&grid, &chi, iso);
    let mut mesh = Mesh::new(vertices, triangles);

    // the indicator grows along the normals, face the triangles that way
    let agreement = mesh
        .triangles
        .iter()
        .map(|tri| {
            let normal = mesh.triangle_normal(tri);
            let centroid = tri
                .iter()
                .fold(DVec3::ZERO, |acc, &i| acc + DVec3::from_array(mesh.vertices[i]))
                / 3.0;
            let step = normal.normalize_or_zero() * grid.spacing * 0.5;
            grid.sample(&chi, centroid + step) - grid.sample(&chi, centroid - step)
        })
        .filter(|d| *d != 0.0)
        .map(f64::signum)
        .sum::<f64>();
    if agreement < 0.0 {
        mesh.flip_winding();
    }

    let densities = mesh
        .vertices
        .iter()
        .map(|v| grid.sample(&density, DVec3::from_array(*v)))
        .collect();

    Ok((mesh, densities))
}

/// Drop the vertices whose density is below the `q` quantile, with their triangles.
///
/// Returns the densities of the kept vertices.
pub(crate) fn prune_by_density(
    mesh: &mut Mesh,
    densities: Vec<f64>,
    q: f64,
) -> Result<Vec<f64>, ReconstructionError> {
    let Some(threshold) = quantile(&densities, q) else {
        return Ok(densities);
    };
    let mask = densities.iter().map(|&d| d < threshold).collect::<Vec<_>>();
    mesh.remove_vertices_by_mask(&mask)?;

    let kept = densities
        .into_iter()
        .zip(mask.iter())
        .filter(|&(_, &removed)| !removed)
        .map(|(d, _)| d)
        .collect::<Vec<_>>();
    log::debug!(
        "density pruning at quantile {q} (threshold {threshold:.4}) kept {} vertices",
        kept.len()
    );
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fibonacci_sphere(n: usize, radius: f64) -> PointCloud {
        let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
        let normals = (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
                let r = (1.0 - y * y).sqrt();
                let phi = golden * i as f64;
                [r * phi.cos(), y, r * phi.sin()]
            })
            .collect::<Vec<_>>();
        let points = normals.iter().map(|n| n.map(|c| c * radius)).collect();
        PointCloud::new(points, None, Some(normals)).unwrap_or_default()
    }

    #[test]
    fn test_quantile() {
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[3.0, 1.0, 2.0], 0.0), Some(1.0));
        assert_eq!(quantile(&[3.0, 1.0, 2.0], 1.0), Some(3.0));
        assert_relative_eq!(quantile(&[0.0, 10.0], 0.25).unwrap_or_default(), 2.5);
    }

    #[test]
    fn test_sphere_reconstruction() -> Result<(), ReconstructionError> {
        let cloud = fibonacci_sphere(3000, 1.0);
        let params = PoissonParams {
            depth: 5,
            max_iterations: 2000,
            ..Default::default()
        };
        let (mesh, densities) = reconstruct_poisson(&cloud, &params)?;

        assert!(mesh.num_triangles() > 100);
        assert_eq!(densities.len(), mesh.num_vertices());
        mesh.validate()?;

        let radii = mesh
            .vertices
            .iter()
            .map(|v| DVec3::from_array(*v).length())
            .collect::<Vec<_>>();
        let mean = radii.iter().sum::<f64>() / radii.len() as f64;
        assert!((mean - 1.0).abs() < 0.15, "mean radius {mean}");

        // outward facing triangles
        let outward = mesh
            .triangles
            .iter()
            .filter(|tri| {
                let centroid = DVec3::from_array(mesh.vertices[tri[0]]);
                mesh.triangle_normal(tri).dot(centroid) > 0.0
            })
            .count();
        assert!(outward * 10 > mesh.num_triangles() * 9);
        Ok(())
    }

    #[test]
    fn test_prune_by_density() -> Result<(), ReconstructionError> {
        let cloud = fibonacci_sphere(2000, 1.0);
        let params = PoissonParams {
            depth: 4,
            max_iterations: 2000,
            ..Default::default()
        };
        let (mut mesh, densities) = reconstruct_poisson(&cloud, &params)?;
        let before = mesh.num_vertices();

        let kept = prune_by_density(&mut mesh, densities, 0.5)?;
        assert!(mesh.num_vertices() < before);
        assert_eq!(kept.len(), mesh.num_vertices());
        mesh.validate()?;
        Ok(())
    }

    #[test]
    fn test_missing_normals_and_params() {
        let cloud = PointCloud::new(vec![[0.0; 3]; 4], None, None).unwrap_or_default();
        assert_eq!(
            reconstruct_poisson(&cloud, &PoissonParams::default()),
            Err(ReconstructionError::MissingNormals)
        );

        let params = PoissonParams {
            density_quantile: 1.5,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        let params = PoissonParams {
            depth: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
