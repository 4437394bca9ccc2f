use std::f64::consts::{FRAC_PI_2, PI};

use panomesh_3d::mesh::Mesh;

use crate::delaunay;

/// Azimuthal bin of a point for `num_slices` bins over `[-pi/2, pi/2]`.
///
/// Points outside the range fall into the first or last bin.
pub fn slice_index(point: &[f64; 3], num_slices: usize) -> usize {
    let azimuth = point[0].atan2(point[2]);
    let t = (azimuth + FRAC_PI_2) / PI;
    let bin = (t * num_slices as f64).floor();
    bin.clamp(0.0, (num_slices - 1) as f64) as usize
}

/// Triangulates each azimuthal slice in its (radius, height) plane and concatenates the slices.
///
/// Only vertices referenced by a triangle are kept, so slices without triangles contribute
/// nothing. Returns the mesh and the number of
/// slices without triangles.
pub(crate) fn reconstruct_radial(points: &[[f64; 3]], num_slices: usize) -> (Mesh, usize) {
    let mut slices = vec![Vec::new(); num_slices];
    for (i, p) in points.iter().enumerate() {
        if p.iter().all(|c| c.is_finite()) {
            slices[slice_index(p, num_slices)].push(i);
        }
    }

    let mut mesh = Mesh::default();
    let mut empty_slices = 0;
    for (s, members) in slices.iter().enumerate() {
        let projected = members
            .iter()
            .map(|&i| {
                let [x, y, z] = points[i];
                [x.hypot(z), y]
            })
            .collect::<Vec<_>>();

        let triangles = match delaunay::triangulate(&projected) {
            Ok(triangles) => triangles,
            Err(err) => {
                log::debug!("slice {s} with {} points skipped: {err}", members.len());
                empty_slices += 1;
                continue;
            }
        };

        // duplicates in the slice plane are never referenced and stay out of the mesh
        let mut global = vec![usize::MAX; members.len()];
        for &local in triangles.iter().flatten() {
            if global[local] == usize::MAX {
                global[local] = mesh.vertices.len();
                mesh.vertices.push(points[members[local]]);
            }
        }
        mesh.triangles
            .extend(triangles.into_iter().map(|t| t.map(|i| global[i])));
    }

    log::debug!(
        "radial slices: {} of {num_slices} slices triangulated, {} triangles",
        num_slices - empty_slices,
        mesh.num_triangles()
    );
    (mesh, empty_slices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_index_bounds() {
        assert_eq!(slice_index(&[0.0, 0.0, 1.0], 2), 1);
        assert_eq!(slice_index(&[-1.0, 0.0, 0.0], 4), 0);
        assert_eq!(slice_index(&[1.0, 0.0, 0.0], 4), 3);
        assert_eq!(slice_index(&[-0.1, 5.0, 1.0], 2), 0);
        // behind the camera
        assert_eq!(slice_index(&[1.0, 0.0, -1.0], 4), 3);
        assert_eq!(slice_index(&[0.3, 0.0, 1.0], 1), 0);
    }

    #[test]
    fn test_single_slice() {
        let points = [
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 2.0],
            [0.5, 0.0, 3.0],
            [-0.5, 1.0, 1.5],
        ];
        let (mesh, empty) = reconstruct_radial(&points, 1);
        assert_eq!(empty, 0);
        assert!(mesh.num_triangles() > 0);
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.validate(), Ok(()));
    }

    #[test]
    fn test_duplicates_in_slice_plane_are_dropped() {
        // mirrored azimuths project onto the same (radius, height) positions
        let mut points = Vec::new();
        for az in [-0.01f64, 0.01] {
            for (r, y) in [(5.0, 0.0), (6.0, 0.0), (5.0, 1.0), (6.0, 1.0)] {
                points.push([r * az.sin(), y, r * az.cos()]);
            }
        }
        let (mesh, empty) = reconstruct_radial(&points, 1);
        assert_eq!(empty, 0);
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_triangles(), 2);

        let mut referenced = vec![false; mesh.num_vertices()];
        for &i in mesh.triangles.iter().flatten() {
            referenced[i] = true;
        }
        assert!(referenced.iter().all(|&r| r));
    }
}
