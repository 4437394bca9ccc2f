use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::mesh::{Mesh, MeshError};

/// Wavefront OBJ writer.
pub mod obj;

/// PLY writer and reader.
pub mod ply;

/// Error types for mesh export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Failed to write the mesh file.
    #[error("Failed to write mesh file")]
    Io(#[from] std::io::Error),

    /// Failed to move the temporary file to its final location.
    #[error("Failed to persist mesh file")]
    Persist(#[from] tempfile::PersistError),

    /// The file extension does not name a supported format.
    #[error("Unsupported mesh format: {0}")]
    UnsupportedFormat(PathBuf),

    /// The mesh is not consistent.
    #[error(transparent)]
    InvalidMesh(#[from] MeshError),

    /// Failed to encode the PLY file.
    #[error(transparent)]
    Ply(#[from] ply::PlyError),
}

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    /// Binary little endian PLY.
    Ply,
    /// Wavefront OBJ with per-vertex colors.
    Obj,
}

impl MeshFormat {
    /// Detect the format from the file extension, case insensitive.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ply" => Some(MeshFormat::Ply),
            "obj" => Some(MeshFormat::Obj),
            _ => None,
        }
    }
}

/// Write a mesh to `path`, choosing the format from the extension.
///
/// The mesh is first written to a temporary file in the target directory which is then
/// atomically renamed, so a failed write never leaves a partial file at `path`.
///
/// # Arguments
///
/// * `path` - The output file path, ending in `.ply` or `.obj`.
/// * `mesh` - The mesh to write.
pub fn write_mesh(path: impl AsRef<Path>, mesh: &Mesh) -> Result<(), ExportError> {
    let path = path.as_ref();
    let format =
        MeshFormat::from_path(path).ok_or_else(|| ExportError::UnsupportedFormat(path.into()))?;
    mesh.validate()?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        match format {
            MeshFormat::Ply => ply::write_ply_binary(&mut writer, mesh)?,
            MeshFormat::Obj => obj::write_obj(&mut writer, mesh)?,
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;

    log::info!(
        "wrote mesh with {} vertices and {} triangles to {}",
        mesh.num_vertices(),
        mesh.num_triangles(),
        path.display()
    );
    Ok(())
}
