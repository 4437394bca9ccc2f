use std::collections::HashMap;

use glam::DVec3;

use crate::mesh::{Mesh, MeshError};

/// Simplify a mesh by merging all vertices that fall in the same cubic cell.
///
/// Cells have edge `voxel_size` and are anchored at the minimum bound of the vertices. Each cell
/// becomes one vertex at the mean position, with the mean color and the renormalized mean normal.
/// Triangles are remapped; degenerate and duplicated triangles are dropped.
///
/// # Arguments
///
/// * `mesh` - The mesh to simplify.
/// * `voxel_size` - The cell edge length, must be positive.
///
/// # Returns
///
/// The simplified mesh.
pub fn simplify_vertex_clustering(mesh: &Mesh, voxel_size: f64) -> Result<Mesh, MeshError> {
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        return Err(MeshError::InvalidParameter("voxel_size", voxel_size));
    }
    mesh.validate()?;

    let origin = mesh
        .vertices
        .iter()
        .map(|v| DVec3::from_array(*v))
        .reduce(DVec3::min)
        .unwrap_or(DVec3::ZERO);

    let mut cells: HashMap<(i64, i64, i64), usize> = HashMap::new();
    let mut cluster_of = Vec::with_capacity(mesh.vertices.len());
    let mut counts: Vec<usize> = Vec::new();
    let mut positions: Vec<DVec3> = Vec::new();

    for v in &mesh.vertices {
        let p = DVec3::from_array(*v);
        let cell = ((p - origin) / voxel_size).floor();
        let key = (cell.x as i64, cell.y as i64, cell.z as i64);
        let cluster = *cells.entry(key).or_insert_with(|| {
            counts.push(0);
            positions.push(DVec3::ZERO);
            counts.len() - 1
        });
        counts[cluster] += 1;
        positions[cluster] += p;
        cluster_of.push(cluster);
    }

    let vertices = positions
        .iter()
        .zip(&counts)
        .map(|(p, &c)| (*p / c as f64).to_array())
        .collect::<Vec<_>>();

    let vertex_colors = mesh.vertex_colors.as_ref().map(|colors| {
        let mut sums = vec![[0.0f64; 3]; counts.len()];
        for (color, &cluster) in colors.iter().zip(&cluster_of) {
            for k in 0..3 {
                sums[cluster][k] += color[k] as f64;
            }
        }
        sums.iter()
            .zip(&counts)
            .map(|(s, &c)| s.map(|v| (v / c as f64) as f32))
            .collect::<Vec<_>>()
    });

    let vertex_normals = mesh.vertex_normals.as_ref().map(|normals| {
        let mut sums = vec![DVec3::ZERO; counts.len()];
        for (normal, &cluster) in normals.iter().zip(&cluster_of) {
            sums[cluster] += DVec3::from_array(*normal);
        }
        sums.into_iter()
            .map(|n| n.normalize_or_zero().to_array())
            .collect::<Vec<_>>()
    });

    let triangles = mesh
        .triangles
        .iter()
        .map(|t| t.map(|i| cluster_of[i]))
        .collect();

    let mut simplified = Mesh {
        vertices,
        triangles,
        vertex_colors,
        vertex_normals,
    };
    let degenerate = simplified.remove_degenerate_triangles();
    let duplicated = simplified.remove_duplicated_triangles();

    log::debug!(
        "vertex clustering ({voxel_size}): {} -> {} vertices, {} -> {} triangles \
         ({degenerate} degenerate, {duplicated} duplicated)",
        mesh.num_vertices(),
        simplified.num_vertices(),
        mesh.num_triangles(),
        simplified.num_triangles(),
    );

    Ok(simplified)
}
