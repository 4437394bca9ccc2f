use panomesh_3d::mesh::Mesh;

use crate::delaunay;

/// One Delaunay triangulation of all points projected on the X-Z plane.
///
/// Every input point becomes a vertex. Returns `None` when no triangle could be formed.
pub(crate) fn reconstruct_global(points: &[[f64; 3]]) -> Option<Mesh> {
    let finite = points
        .iter()
        .copied()
        .filter(|p| p.iter().all(|c| c.is_finite()))
        .collect::<Vec<_>>();
    let projected = finite.iter().map(|p| [p[0], p[2]]).collect::<Vec<_>>();

    match delaunay::triangulate(&projected) {
        Ok(triangles) => Some(Mesh::new(finite, triangles)),
        Err(err) => {
            log::debug!("global triangulation failed: {err}");
            None
        }
    }
}
