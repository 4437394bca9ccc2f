use panomesh_3d::mesh::Mesh;
use panomesh_3d::ops::simplify_vertex_clustering;
use panomesh_3d::pointcloud::PointCloud;

use crate::error::ReconstructionError;
use crate::poisson::{self, PoissonParams};
use crate::{global, radial};

/// Surface reconstruction algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconstructionStrategy {
    /// Delaunay triangulation per azimuthal slice in the (radius, height) plane.
    RadialSliceDelaunay {
        /// Number of slices over `[-pi/2, pi/2]`, at least 1.
        num_slices: usize,
    },
    /// A single Delaunay triangulation of the X-Z projection.
    GlobalDelaunay {
        /// Cell size of the optional vertex clustering applied to the result.
        simplify_voxel_size: Option<f64>,
    },
    /// Implicit surface fit from oriented normals followed by density pruning.
    Poisson(PoissonParams),
}

impl Default for ReconstructionStrategy {
    fn default() -> Self {
        ReconstructionStrategy::RadialSliceDelaunay { num_slices: 20 }
    }
}

impl ReconstructionStrategy {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ReconstructionStrategy::RadialSliceDelaunay { .. } => "radial-slice",
            ReconstructionStrategy::GlobalDelaunay { .. } => "global-delaunay",
            ReconstructionStrategy::Poisson(_) => "poisson",
        }
    }

    /// Check the strategy parameters.
    pub fn validate(&self) -> Result<(), ReconstructionError> {
        match self {
            ReconstructionStrategy::RadialSliceDelaunay { num_slices } => {
                if *num_slices == 0 {
                    return Err(ReconstructionError::InvalidParameter("num_slices", 0.0));
                }
            }
            ReconstructionStrategy::GlobalDelaunay {
                simplify_voxel_size: Some(size),
            } => {
                if !(size.is_finite() && *size > 0.0) {
                    return Err(ReconstructionError::InvalidParameter(
                        "simplify_voxel_size",
                        *size,
                    ));
                }
            }
            ReconstructionStrategy::GlobalDelaunay { .. } => {}
            ReconstructionStrategy::Poisson(params) => params.validate()?,
        }
        Ok(())
    }
}

/// Result of a surface reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// The reconstructed mesh, without colors.
    pub mesh: Mesh,
    /// Per-vertex sample density, only for the Poisson strategy.
    pub densities: Option<Vec<f64>>,
    /// Regions that produced no triangles, e.g. empty or collinear slices.
    pub empty_regions: usize,
}

/// Builds triangle meshes from point clouds with a configurable strategy.
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    /// The algorithm to run.
    pub strategy: ReconstructionStrategy,
}

impl Reconstructor {
    /// Create a reconstructor for `strategy`.
    pub fn new(strategy: ReconstructionStrategy) -> Self {
        Self { strategy }
    }

    /// Reconstruct a surface from the point cloud.
    ///
    /// Degenerate regions contribute no triangles and are only counted in
    /// [`Reconstruction::empty_regions`].
    ///
    /// # Errors
    ///
    /// Fails if the point cloud is empty, a parameter is invalid, the Poisson strategy gets a
    /// cloud without normals or no triangle at all could be built.
    pub fn reconstruct(
        &self,
        point_cloud: &PointCloud,
    ) -> Result<Reconstruction, ReconstructionError> {
        self.strategy.validate()?;
        if point_cloud.is_empty() {
            return Err(ReconstructionError::EmptyPointCloud);
        }

        let reconstruction = match self.strategy {
            ReconstructionStrategy::RadialSliceDelaunay { num_slices } => {
                let (mesh, empty_regions) =
                    radial::reconstruct_radial(point_cloud.points(), num_slices);
                Reconstruction {
                    mesh,
                    densities: None,
                    empty_regions,
                }
            }
            ReconstructionStrategy::GlobalDelaunay {
                simplify_voxel_size,
            } => {
                let (mesh, empty_regions) = match global::reconstruct_global(point_cloud.points())
                {
                    Some(mesh) => (mesh, 0),
                    None => (Mesh::default(), 1),
                };
                let mesh = match simplify_voxel_size {
                    Some(size) if !mesh.is_empty() => simplify_vertex_clustering(&mesh, size)?,
                    _ => mesh,
                };
                Reconstruction {
                    mesh,
                    densities: None,
                    empty_regions,
                }
            }
            ReconstructionStrategy::Poisson(params) => {
                let (mut mesh, densities) = poisson::reconstruct_poisson(point_cloud, &params)?;
                let densities =
                    poisson::prune_by_density(&mut mesh, densities, params.density_quantile)?;
                Reconstruction {
                    mesh,
                    densities: Some(densities),
                    empty_regions: 0,
                }
            }
        };

        if reconstruction.mesh.is_empty() {
            return Err(ReconstructionError::NoTriangles(self.strategy.name()));
        }

        log::info!(
            "{} reconstruction: {} vertices, {} triangles",
            self.strategy.name(),
            reconstruction.mesh.num_vertices(),
            reconstruction.mesh.num_triangles()
        );
        Ok(reconstruction)
    }
}
