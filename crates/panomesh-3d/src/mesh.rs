use std::collections::HashSet;

use glam::DVec3;

/// Error types for triangle meshes.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MeshError {
    /// A triangle references a vertex that does not exist.
    #[error("Triangle {0} references vertex {1} but the mesh has {2} vertices")]
    IndexOutOfRange(usize, usize, usize),

    /// A per-vertex attribute has the wrong length.
    #[error("Vertex {0} has length {1}, expected {2}")]
    AttributeLength(&'static str, usize, usize),

    /// A parameter is out of range.
    #[error("Invalid parameter {0}: {1}")]
    InvalidParameter(&'static str, f64),
}

/// A triangle mesh with optional per-vertex colors and normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// List of 3D vertices.
    pub vertices: Vec<[f64; 3]>,
    /// List of triangles, each triangle is three indices into `vertices`.
    pub triangles: Vec<[usize; 3]>,
    /// Per-vertex colors, linear RGB in `[0, 1]`.
    pub vertex_colors: Option<Vec<[f32; 3]>>,
    /// Per-vertex unit normals.
    pub vertex_normals: Option<Vec<[f64; 3]>>,
}

impl Mesh {
    /// Creates a new mesh without colors and normals.
    pub fn new(vertices: Vec<[f64; 3]>, triangles: Vec<[usize; 3]>) -> Self {
        Mesh {
            vertices,
            triangles,
            vertex_colors: None,
            vertex_normals: None,
        }
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Check that every triangle index is in range and attribute lengths match the vertices.
    pub fn validate(&self) -> Result<(), MeshError> {
        let n = self.vertices.len();
        for (t, tri) in self.triangles.iter().enumerate() {
            if let Some(&bad) = tri.iter().find(|&&i| i >= n) {
                return Err(MeshError::IndexOutOfRange(t, bad, n));
            }
        }
        if let Some(colors) = &self.vertex_colors {
            if colors.len() != n {
                return Err(MeshError::AttributeLength("colors", colors.len(), n));
            }
        }
        if let Some(normals) = &self.vertex_normals {
            if normals.len() != n {
                return Err(MeshError::AttributeLength("normals", normals.len(), n));
            }
        }
        Ok(())
    }

    /// Reverse the vertex order of every triangle.
    pub fn flip_winding(&mut self) {
        for tri in self.triangles.iter_mut() {
            tri.reverse();
        }
    }

    /// Area weighted (unnormalized) normal of a triangle.
    pub fn triangle_normal(&self, tri: &[usize; 3]) -> DVec3 {
        let [a, b, c] = tri.map(|i| DVec3::from_array(self.vertices[i]));
        (b - a).cross(c - a)
    }

    /// Recompute per-vertex normals from the triangles.
    ///
    /// Each vertex gets the normalized sum of its incident face normals weighted by face area.
    /// Vertices without incident faces get a zero normal.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![DVec3::ZERO; self.vertices.len()];
        for tri in &self.triangles {
            let n = self.triangle_normal(tri);
            for &i in tri {
                normals[i] += n;
            }
        }
        self.vertex_normals = Some(
            normals
                .into_iter()
                .map(|n| n.normalize_or_zero().to_array())
                .collect(),
        );
    }

    /// One-ring neighbours of every vertex, sorted and without duplicates.
    pub fn vertex_adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.vertices.len()];
        for tri in &self.triangles {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                adjacency[a].push(b);
                adjacency[b].push(a);
            }
        }
        for neighbours in adjacency.iter_mut() {
            neighbours.sort_unstable();
            neighbours.dedup();
        }
        adjacency
    }

    /// Remove triangles that reference the same vertex more than once.
    ///
    /// Returns the number of removed triangles.
    pub fn remove_degenerate_triangles(&mut self) -> usize {
        let before = self.triangles.len();
        self.triangles
            .retain(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2]);
        before - self.triangles.len()
    }

    /// Remove triangles that use the same vertex set as an earlier triangle, regardless of order.
    ///
    /// Returns the number of removed triangles.
    pub fn remove_duplicated_triangles(&mut self) -> usize {
        let before = self.triangles.len();
        let mut seen = HashSet::with_capacity(before);
        self.triangles.retain(|t| {
            let mut key = *t;
            key.sort_unstable();
            seen.insert(key)
        });
        before - self.triangles.len()
    }

    /// Remove the vertices flagged in `mask` together with every triangle that uses them.
    ///
    /// # Errors
    ///
    /// Returns an error if the mask length differs from the vertex count.
    pub fn remove_vertices_by_mask(&mut self, mask: &[bool]) -> Result<(), MeshError> {
        if mask.len() != self.vertices.len() {
            return Err(MeshError::AttributeLength(
                "mask",
                mask.len(),
                self.vertices.len(),
            ));
        }
        let keep = mask.iter().map(|m| !m).collect::<Vec<_>>();
        self.compact(&keep);
        Ok(())
    }

    /// Remove vertices that no triangle references.
    ///
    /// Returns the number of removed vertices.
    pub fn remove_unreferenced_vertices(&mut self) -> usize {
        let mut keep = vec![false; self.vertices.len()];
        for tri in &self.triangles {
            for &i in tri {
                if let Some(k) = keep.get_mut(i) {
                    *k = true;
                }
            }
        }
        let before = self.vertices.len();
        self.compact(&keep);
        before - self.vertices.len()
    }

    // drops every vertex with keep[i] == false, remaps triangles and drops those that lose a vertex
    fn compact(&mut self, keep: &[bool]) {
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut next = 0;
        for (i, &k) in keep.iter().enumerate() {
            if k {
                remap[i] = next;
                next += 1;
            }
        }

        self.triangles = self
            .triangles
            .iter()
            .filter_map(|t| {
                let mapped = t.map(|i| remap.get(i).copied().unwrap_or(usize::MAX));
                mapped.iter().all(|&i| i != usize::MAX).then_some(mapped)
            })
            .collect();

        retain_by_mask(&mut self.vertices, keep);
        if let Some(colors) = self.vertex_colors.as_mut() {
            retain_by_mask(colors, keep);
        }
        if let Some(normals) = self.vertex_normals.as_mut() {
            retain_by_mask(normals, keep);
        }
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut it = keep.iter();
    values.retain(|_| it.next().copied().unwrap_or(false));
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad() -> Mesh {
        Mesh::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_validate() {
        let mut mesh = quad();
        assert_eq!(mesh.validate(), Ok(()));

        mesh.triangles.push([0, 1, 4]);
        assert_eq!(mesh.validate(), Err(MeshError::IndexOutOfRange(2, 4, 4)));

        let mut mesh = quad();
        mesh.vertex_colors = Some(vec![[0.0; 3]; 3]);
        assert_eq!(
            mesh.validate(),
            Err(MeshError::AttributeLength("colors", 3, 4))
        );
    }

    #[test]
    fn test_double_flip_restores() {
        let mut mesh = quad();
        mesh.flip_winding();
        assert_eq!(mesh.triangles, vec![[2, 1, 0], [3, 2, 0]]);
        mesh.flip_winding();
        assert_eq!(mesh.triangles, quad().triangles);
    }

    #[test]
    fn test_compute_vertex_normals() {
        let mut mesh = quad();
        mesh.vertices.push([5.0, 5.0, 5.0]);
        mesh.compute_vertex_normals();

        let normals = mesh.vertex_normals.unwrap_or_default();
        assert_eq!(normals.len(), 5);
        for n in &normals[..4] {
            assert_relative_eq!(n[2], 1.0);
        }
        assert_eq!(normals[4], [0.0, 0.0, 0.0]);

        let mut flipped = quad();
        flipped.flip_winding();
        flipped.compute_vertex_normals();
        if let Some(normals) = flipped.vertex_normals {
            assert_relative_eq!(normals[0][2], -1.0);
        }
    }

    #[test]
    fn test_remove_vertices_by_mask() -> Result<(), MeshError> {
        let mut mesh = quad();
        mesh.vertex_colors = Some(vec![
            [0.0, 0.0, 0.0],
            [0.1, 0.1, 0.1],
            [0.2, 0.2, 0.2],
            [0.3, 0.3, 0.3],
        ]);
        mesh.remove_vertices_by_mask(&[false, true, false, false])?;

        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
        assert_eq!(
            mesh.vertex_colors,
            Some(vec![[0.0, 0.0, 0.0], [0.2, 0.2, 0.2], [0.3, 0.3, 0.3]])
        );
        mesh.validate()?;

        assert!(mesh.remove_vertices_by_mask(&[true]).is_err());
        Ok(())
    }

    #[test]
    fn test_cleanup() {
        let mut mesh = quad();
        mesh.vertices.push([9.0, 9.0, 9.0]);
        mesh.triangles.push([2, 0, 1]);
        mesh.triangles.push([1, 1, 3]);

        assert_eq!(mesh.remove_degenerate_triangles(), 1);
        assert_eq!(mesh.remove_duplicated_triangles(), 1);
        assert_eq!(mesh.remove_unreferenced_vertices(), 1);
        assert_eq!(mesh, quad());
    }

    #[test]
    fn test_vertex_adjacency() {
        let adjacency = quad().vertex_adjacency();
        assert_eq!(adjacency[0], vec![1, 2, 3]);
        assert_eq!(adjacency[1], vec![0, 2]);
    }
}
