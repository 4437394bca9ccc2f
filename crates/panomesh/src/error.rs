use panomesh_3d::camera::CameraError;
use panomesh_3d::color::ColorTransferError;
use panomesh_3d::io::ExportError;
use panomesh_3d::mesh::MeshError;
use panomesh_3d::pointcloud::PointCloudError;
use panomesh_3d::voxel_grid::VoxelGridError;
use panomesh_io::IoError;
use panomesh_recon::ReconstructionError;

/// Failures of external resources: files, decoders and the depth estimator.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// Reading an input file failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Writing the mesh failed.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// The depth estimator failed.
    #[error("Depth estimation failed: {0}")]
    Estimator(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Error types of a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The inputs are missing, empty or of mismatched size.
    #[error("Invalid input: {0}")]
    Input(String),

    /// No surface could be reconstructed.
    #[error("Reconstruction failed: {0}")]
    Reconstruction(#[source] ReconstructionError),

    /// An input could not be read or the output could not be written.
    #[error("Resource error: {0}")]
    Resource(#[source] ResourceError),

    /// A configuration parameter is out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<CameraError> for PipelineError {
    fn from(e: CameraError) -> Self {
        match e {
            CameraError::InvalidParameter(..) => PipelineError::Config(e.to_string()),
            _ => PipelineError::Input(e.to_string()),
        }
    }
}

impl From<ReconstructionError> for PipelineError {
    fn from(e: ReconstructionError) -> Self {
        match e {
            ReconstructionError::InvalidParameter(..) => PipelineError::Config(e.to_string()),
            _ => PipelineError::Reconstruction(e),
        }
    }
}

impl From<MeshError> for PipelineError {
    fn from(e: MeshError) -> Self {
        match e {
            MeshError::InvalidParameter(..) => PipelineError::Config(e.to_string()),
            _ => PipelineError::Reconstruction(ReconstructionError::Mesh(e)),
        }
    }
}

impl From<PointCloudError> for PipelineError {
    fn from(e: PointCloudError) -> Self {
        PipelineError::Input(e.to_string())
    }
}

impl From<VoxelGridError> for PipelineError {
    fn from(e: VoxelGridError) -> Self {
        PipelineError::Config(e.to_string())
    }
}

impl From<ColorTransferError> for PipelineError {
    fn from(e: ColorTransferError) -> Self {
        match e {
            ColorTransferError::EmptySource => {
                PipelineError::Reconstruction(ReconstructionError::EmptyPointCloud)
            }
            ColorTransferError::MissingColors => PipelineError::Input(e.to_string()),
        }
    }
}

impl From<IoError> for PipelineError {
    fn from(e: IoError) -> Self {
        match e {
            IoError::FileDoesNotExist(_) | IoError::ImageCreationError(_) => {
                PipelineError::Input(e.to_string())
            }
            _ => PipelineError::Resource(ResourceError::Io(e)),
        }
    }
}

impl From<ExportError> for PipelineError {
    fn from(e: ExportError) -> Self {
        PipelineError::Resource(ResourceError::Export(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panomesh_image::ImageSize;

    #[test]
    fn test_taxonomy() {
        let size = ImageSize {
            width: 2,
            height: 2,
        };
        let e: PipelineError = CameraError::DimensionMismatch(size, size).into();
        assert!(matches!(e, PipelineError::Input(_)));

        let e: PipelineError = CameraError::InvalidParameter("vertical_scale", 0.0).into();
        assert!(matches!(e, PipelineError::Config(_)));

        let e: PipelineError = ReconstructionError::EmptyPointCloud.into();
        assert!(matches!(
            e,
            PipelineError::Reconstruction(ReconstructionError::EmptyPointCloud)
        ));

        let e: PipelineError = IoError::FileDoesNotExist("missing.png".into()).into();
        assert!(matches!(e, PipelineError::Input(_)));

        let e: PipelineError = ExportError::Io(std::io::Error::other("disk full")).into();
        assert!(matches!(e, PipelineError::Resource(ResourceError::Export(_))));
    }
}
