use std::path::{Path, PathBuf};

use panomesh_3d::color::ColorTransfer;
use panomesh_3d::io::write_mesh;
use panomesh_3d::mesh::Mesh;
use panomesh_3d::ops::{decimate_quadric, remove_statistical_outliers, smooth_laplacian};
use panomesh_3d::pointcloud::PointCloud;
use panomesh_3d::voxel_grid::VoxelGrid;
use panomesh_image::{ColorImage, DepthMap};
use panomesh_recon::{ReconstructionError, ReconstructionStrategy, Reconstructor};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, ResourceError};

/// Produces a depth map from a color image, larger values meaning farther away.
///
/// Implemented outside this crate, e.g. by a monocular depth network.
pub trait DepthEstimator {
    /// The error returned when estimation fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Estimate a depth map of the same size as `color`.
    fn estimate(&self, color: &ColorImage) -> Result<DepthMap, Self::Error>;
}

/// Converts a color panorama and its depth map into a colored triangle mesh.
///
/// Every call is independent; the pipeline only holds its configuration.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline, validating the configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration of this pipeline.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the point cloud handed to the reconstruction.
    ///
    /// Unprojects the panorama, then applies the optional outlier removal, the optional voxel
    /// downsampling and, for the Poisson strategy, normal estimation.
    pub fn point_cloud(
        &self,
        color: &ColorImage,
        depth: &DepthMap,
    ) -> Result<PointCloud, PipelineError> {
        let config = &self.config;

        let mut cloud = config.unprojector().unproject(color, depth)?;
        log::info!(
            "unprojected {} points from a {} panorama",
            cloud.len(),
            depth.size()
        );
        if cloud.is_empty() {
            return Err(ReconstructionError::EmptyPointCloud.into());
        }

        if config.outliers.enabled {
            let (filtered, _) = remove_statistical_outliers(
                &cloud,
                config.outliers.nb_neighbors,
                config.outliers.std_ratio,
            )?;
            cloud = filtered;
        }

        if let Some(voxel_size) = config.downsample_voxel_size {
            let downsampled = VoxelGrid::new(voxel_size)?.downsample(&cloud);
            log::debug!(
                "voxel downsampling {} -> {} points",
                cloud.len(),
                downsampled.len()
            );
            cloud = downsampled;
        }

        if matches!(
            config.reconstruction_strategy(),
            ReconstructionStrategy::Poisson(_)
        ) {
            config.normal_estimator().estimate(&mut cloud)?;
        }

        Ok(cloud)
    }

    /// Run every stage up to the finished mesh, without writing it.
    pub fn build_mesh(&self, color: &ColorImage, depth: &DepthMap) -> Result<Mesh, PipelineError> {
        let config = &self.config;
        let cloud = self.point_cloud(color, depth)?;

        let reconstructor = Reconstructor::new(config.reconstruction_strategy());
        let reconstruction = reconstructor.reconstruct(&cloud)?;
        if reconstruction.empty_regions > 0 {
            log::debug!(
                "{} regions produced no triangles",
                reconstruction.empty_regions
            );
        }
        let mut mesh = reconstruction.mesh;

        ColorTransfer::new(&cloud)?.apply(&mut mesh);
        drop(cloud);

        if let Some(target) = config.decimation_target {
            let result = decimate_quadric(&mesh, target)?;
            log::debug!(
                "decimation {} -> {} triangles",
                result.original_triangles,
                result.final_triangles
            );
            mesh = result.mesh;
        }

        smooth_laplacian(
            &mut mesh,
            config.smoothing.iterations,
            config.smoothing.lambda,
        )?;

        if config.flip_winding {
            mesh.flip_winding();
        }
        mesh.compute_vertex_normals();

        log::info!(
            "mesh ready: {} vertices, {} triangles",
            mesh.num_vertices(),
            mesh.num_triangles()
        );
        Ok(mesh)
    }

    /// Build the mesh and write it atomically to `output`.
    ///
    /// The format follows the extension, `.ply` or `.obj`.
    ///
    /// # Returns
    ///
    /// The path of the written mesh.
    pub fn run(
        &self,
        color: &ColorImage,
        depth: &DepthMap,
        output: impl AsRef<Path>,
    ) -> Result<PathBuf, PipelineError> {
        let output = output.as_ref();
        let mesh = self.build_mesh(color, depth)?;
        write_mesh(output, &mesh)?;
        Ok(output.to_path_buf())
    }

    /// Read the color panorama and depth map from disk, then [`Pipeline::run`].
    pub fn run_files(
        &self,
        color_path: impl AsRef<Path>,
        depth_path: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<PathBuf, PipelineError> {
        let color = panomesh_io::functional::read_color_image(color_path)?;
        let depth = panomesh_io::functional::read_depth_map(depth_path)?;
        self.run(&color, &depth, output)
    }

    /// Estimate the depth with `estimator`, then [`Pipeline::run`].
    pub fn run_with_estimator<E: DepthEstimator>(
        &self,
        estimator: &E,
        color: &ColorImage,
        output: impl AsRef<Path>,
    ) -> Result<PathBuf, PipelineError> {
        let depth = estimator
            .estimate(color)
            .map_err(|e| PipelineError::Resource(ResourceError::Estimator(Box::new(e))))?;
        self.run(color, &depth, output)
    }
}
