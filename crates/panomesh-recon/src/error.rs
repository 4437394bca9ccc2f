use panomesh_3d::mesh::MeshError;

/// Error types for surface reconstruction.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReconstructionError {
    /// The input point cloud has no points.
    #[error("Cannot reconstruct a surface from an empty point cloud")]
    EmptyPointCloud,

    /// The strategy produced no triangle at all.
    #[error("The {0} strategy produced no triangles")]
    NoTriangles(&'static str),

    /// The strategy needs oriented normals but the point cloud has none.
    #[error("The point cloud has no normals")]
    MissingNormals,

    /// A region could not be triangulated, e.g. fewer than three points or collinear points.
    ///
    /// Strategies absorb this per region; it only surfaces from the triangulation helpers.
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// A strategy parameter is out of range.
    #[error("Invalid reconstruction parameter {0}: {1}")]
    InvalidParameter(&'static str, f64),

    /// The reconstructed mesh could not be post-processed.
    #[error(transparent)]
    Mesh(#[from] MeshError),
}
