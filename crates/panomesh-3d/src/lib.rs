#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Panorama camera models and depth unprojection.
pub mod camera;

/// Nearest neighbour color transfer from point clouds to meshes.
pub mod color;

/// I/O utilities for writing and reading triangle meshes.
pub mod io;

/// Triangle mesh type and topology helpers.
pub mod mesh;

/// Per-point normal estimation.
pub mod normals;

/// Mesh post-processing operations.
pub mod ops;

/// Point cloud type.
pub mod pointcloud;

/// KD-tree backed spatial queries.
pub mod spatial;

/// Voxel grid downsampling.
pub mod voxel_grid;
