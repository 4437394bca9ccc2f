//! Mesh decimation using edge collapse with quadric error metrics.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use glam::DVec3;

use crate::mesh::{Mesh, MeshError};

/// Cost multiplier applied to edges on the mesh boundary.
const BOUNDARY_PENALTY: f64 = 10.0;

/// Result of mesh decimation.
#[derive(Debug, Clone)]
pub struct DecimateResult {
    /// The decimated mesh.
    pub mesh: Mesh,
    /// Number of triangles in the input mesh.
    pub original_triangles: usize,
    /// Number of triangles in the decimated mesh.
    pub final_triangles: usize,
    /// Number of edge collapses performed.
    pub collapses_performed: usize,
    /// Number of edge collapses rejected because they would fold or pinch the surface.
    pub collapses_rejected: usize,
}

/// Quadric error matrix (4x4 symmetric matrix stored as 10 values).
#[derive(Debug, Clone, Copy, Default)]
struct Quadric {
    // [a b c d]
    // [  e f g]
    // [    h i]
    // [      j]
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    g: f64,
    h: f64,
    i: f64,
    j: f64,
}

impl Quadric {
    /// Quadric of the plane `n . x + d = 0` with unit `n`.
    fn from_plane(n: DVec3, d: f64) -> Self {
        Self {
            a: n.x * n.x,
            b: n.x * n.y,
            c: n.x * n.z,
            d: n.x * d,
            e: n.y * n.y,
            f: n.y * n.z,
            g: n.y * d,
            h: n.z * n.z,
            i: n.z * d,
            j: d * d,
        }
    }

    fn add(&self, other: &Quadric) -> Quadric {
        Quadric {
            a: self.a + other.a,
            b: self.b + other.b,
            c: self.c + other.c,
            d: self.d + other.d,
            e: self.e + other.e,
            f: self.f + other.f,
            g: self.g + other.g,
            h: self.h + other.h,
            i: self.i + other.i,
            j: self.j + other.j,
        }
    }

    /// `v^T Q v` with `v = [x, y, z, 1]`.
    fn evaluate(&self, p: DVec3) -> f64 {
        let (x, y, z) = (p.x, p.y, p.z);
        self.a * x * x
            + 2.0 * self.b * x * y
            + 2.0 * self.c * x * z
            + 2.0 * self.d * x
            + self.e * y * y
            + 2.0 * self.f * y * z
            + 2.0 * self.g * y
            + self.h * z * z
            + 2.0 * self.i * z
            + self.j
    }

    /// Minimizer of the quadric, `None` when the 3x3 block is singular.
    fn optimal_point(&self) -> Option<DVec3> {
        let det = self.a * (self.e * self.h - self.f * self.f)
            - self.b * (self.b * self.h - self.f * self.c)
            + self.c * (self.b * self.f - self.e * self.c);

        if det.abs() < 1e-10 {
            return None;
        }
        let inv_det = 1.0 / det;

        let m00 = (self.e * self.h - self.f * self.f) * inv_det;
        let m01 = (self.c * self.f - self.b * self.h) * inv_det;
        let m02 = (self.b * self.f - self.c * self.e) * inv_det;
        let m11 = (self.a * self.h - self.c * self.c) * inv_det;
        let m12 = (self.b * self.c - self.a * self.f) * inv_det;
        let m22 = (self.a * self.e - self.b * self.b) * inv_det;

        Some(DVec3::new(
            -(m00 * self.d + m01 * self.g + m02 * self.i),
            -(m01 * self.d + m11 * self.g + m12 * self.i),
            -(m02 * self.d + m12 * self.g + m22 * self.i),
        ))
    }
}

/// An edge collapse candidate; the heap pops the smallest cost first.
#[derive(Debug, Clone)]
struct EdgeCollapse {
    v1: usize,
    v2: usize,
    cost: f64,
    position: DVec3,
    // vertex versions at push time, stale entries are skipped
    stamp: (u32, u32),
}

impl PartialEq for EdgeCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for EdgeCollapse {}

impl PartialOrd for EdgeCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCollapse {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
    }
}

struct Decimator {
    positions: Vec<DVec3>,
    colors: Option<Vec<[f32; 3]>>,
    quadrics: Vec<Quadric>,
    faces: Vec<Option<[usize; 3]>>,
    vertex_faces: Vec<Vec<usize>>,
    alive: Vec<bool>,
    versions: Vec<u32>,
    boundary: HashMap<(usize, usize), bool>,
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Decimator {
    fn new(mesh: &Mesh) -> Self {
        let positions = mesh
            .vertices
            .iter()
            .map(|v| DVec3::from_array(*v))
            .collect::<Vec<_>>();
        let mut quadrics = vec![Quadric::default(); positions.len()];
        let mut vertex_faces = vec![Vec::new(); positions.len()];
        let mut edge_faces: HashMap<(usize, usize), usize> = HashMap::new();

        for (f, tri) in mesh.triangles.iter().enumerate() {
            for k in 0..3 {
                vertex_faces[tri[k]].push(f);
                *edge_faces.entry(edge_key(tri[k], tri[(k + 1) % 3])).or_default() += 1;
            }

            let [p0, p1, p2] = tri.map(|i| positions[i]);
            let normal = (p1 - p0).cross(p2 - p0);
            let len = normal.length();
            if len < 1e-12 {
                continue;
            }
            let n = normal / len;
            let q = Quadric::from_plane(n, -n.dot(p0));
            for &vi in tri {
                quadrics[vi] = quadrics[vi].add(&q);
            }
        }

        let boundary = edge_faces
            .into_iter()
            .map(|(edge, count)| (edge, count == 1))
            .collect();

        Self {
            alive: vec![true; positions.len()],
            versions: vec![0; positions.len()],
            colors: mesh.vertex_colors.clone(),
            faces: mesh.triangles.iter().copied().map(Some).collect(),
            positions,
            quadrics,
            vertex_faces,
            boundary,
        }
    }

    fn candidate(&self, v1: usize, v2: usize) -> EdgeCollapse {
        let combined = self.quadrics[v1].add(&self.quadrics[v2]);
        let midpoint = (self.positions[v1] + self.positions[v2]) * 0.5;
        let position = combined
            .optimal_point()
            .filter(|p| p.is_finite())
            .unwrap_or(midpoint);

        let mut cost = combined.evaluate(position).max(0.0);
        if self.boundary.get(&edge_key(v1, v2)).copied().unwrap_or(false) {
            cost = (cost + 1e-12) * BOUNDARY_PENALTY;
        }

        EdgeCollapse {
            v1,
            v2,
            cost,
            position,
            stamp: (self.versions[v1], self.versions[v2]),
        }
    }

    fn neighbours(&self, v: usize) -> Vec<usize> {
        let mut out = self.vertex_faces[v]
            .iter()
            .filter_map(|&f| self.faces[f])
            .flat_map(|tri| tri.into_iter())
            .filter(|&u| u != v)
            .collect::<Vec<_>>();
        out.sort_unstable();
        out.dedup();
        out
    }

    // the edge must be shared by at most two faces and no surrounding face may flip
    fn is_collapse_valid(&self, collapse: &EdgeCollapse) -> bool {
        let (v1, v2) = (collapse.v1, collapse.v2);
        let n1 = self.neighbours(v1);
        let n2 = self.neighbours(v2);
        let common = n1.iter().filter(|u| n2.binary_search(u).is_ok()).count();
        if common > 2 {
            return false;
        }

        for &v in &[v1, v2] {
            for &f in &self.vertex_faces[v] {
                let Some(tri) = self.faces[f] else {
                    continue;
                };
                if tri.contains(&v1) && tri.contains(&v2) {
                    continue;
                }
                let [p0, p1, p2] = tri.map(|i| self.positions[i]);
                let before = (p1 - p0).cross(p2 - p0);
                let [q0, q1, q2] = tri.map(|i| {
                    if i == v {
                        collapse.position
                    } else {
                        self.positions[i]
                    }
                });
                let after = (q1 - q0).cross(q2 - q0);
                if before.dot(after) <= 0.0 {
                    return false;
                }
            }
        }
        true
    }

    /// Merge `v2` into `v1`, returns the number of faces removed.
    fn collapse(&mut self, collapse: &EdgeCollapse) -> usize {
        let (v1, v2) = (collapse.v1, collapse.v2);
        self.positions[v1] = collapse.position;
        self.quadrics[v1] = self.quadrics[v1].add(&self.quadrics[v2]);
        if let Some(colors) = self.colors.as_mut() {
            let (c1, c2) = (colors[v1], colors[v2]);
            colors[v1] = [0, 1, 2].map(|k| 0.5 * (c1[k] + c2[k]));
        }
        self.alive[v2] = false;
        self.versions[v1] += 1;
        self.versions[v2] += 1;

        let mut removed = 0;
        let moved = std::mem::take(&mut self.vertex_faces[v2]);
        for f in moved {
            let Some(mut tri) = self.faces[f] else {
                continue;
            };
            for idx in tri.iter_mut() {
                if *idx == v2 {
                    *idx = v1;
                }
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                self.faces[f] = None;
                removed += 1;
            } else {
                self.faces[f] = Some(tri);
                self.vertex_faces[v1].push(f);
            }
        }

        let faces = &self.faces;
        self.vertex_faces[v1].retain(|&f| faces[f].is_some());
        self.vertex_faces[v1].sort_unstable();
        self.vertex_faces[v1].dedup();

        // keep boundary flags for the edges that now start at v1
        for u in self.neighbours(v1) {
            let was_boundary = self.boundary.get(&edge_key(v2, u)).copied().unwrap_or(false)
                || self.boundary.get(&edge_key(v1, u)).copied().unwrap_or(false);
            self.boundary.insert(edge_key(v1, u), was_boundary);
        }
        removed
    }
}

/// Decimate a mesh using edge collapse with quadric error metrics.
///
/// Edges are collapsed cheapest first until the triangle count is at most `target_triangles` or
/// no valid collapse is left. Boundary edges are penalized and collapses that would flip a face
/// are rejected. Merged vertices average their colors; normals are recomputed when present.
///
/// # Arguments
/// * `mesh` - The input mesh to decimate
/// * `target_triangles` - The triangle count to reach
///
/// # Returns
/// A `DecimateResult` containing the decimated mesh and statistics.
pub fn decimate_quadric(mesh: &Mesh, target_triangles: usize) -> Result<DecimateResult, MeshError> {
    mesh.validate()?;
    let original_triangles = mesh.num_triangles();

    if original_triangles <= target_triangles {
        return Ok(DecimateResult {
            mesh: mesh.clone(),
            original_triangles,
            final_triangles: original_triangles,
            collapses_performed: 0,
            collapses_rejected: 0,
        });
    }

    let mut decimator = Decimator::new(mesh);
    let mut heap = BinaryHeap::new();
    let mut seen = HashSet::new();
    for tri in &mesh.triangles {
        for k in 0..3 {
            let (a, b) = (tri[k], tri[(k + 1) % 3]);
            if seen.insert(edge_key(a, b)) {
                heap.push(decimator.candidate(a, b));
            }
        }
    }

    let mut active_faces = original_triangles;
    let mut collapses_performed = 0;
    let mut collapses_rejected = 0;

    while active_faces > target_triangles {
        let Some(collapse) = heap.pop() else {
            break;
        };
        let (v1, v2) = (collapse.v1, collapse.v2);
        if !decimator.alive[v1]
            || !decimator.alive[v2]
            || collapse.stamp != (decimator.versions[v1], decimator.versions[v2])
        {
            continue;
        }
        if !decimator.is_collapse_valid(&collapse) {
            collapses_rejected += 1;
            continue;
        }

        active_faces -= decimator.collapse(&collapse);
        collapses_performed += 1;

        for u in decimator.neighbours(v1) {
            heap.push(decimator.candidate(v1, u));
        }
    }

    let mut out = Mesh {
        vertices: decimator.positions.iter().map(|p| p.to_array()).collect(),
        triangles: decimator.faces.iter().flatten().copied().collect(),
        vertex_colors: decimator.colors,
        vertex_normals: None,
    };
    out.remove_unreferenced_vertices();
    if mesh.vertex_normals.is_some() {
        out.compute_vertex_normals();
    }

    log::debug!(
        "quadric decimation: {} -> {} triangles ({} collapses, {} rejected)",
        original_triangles,
        out.num_triangles(),
        collapses_performed,
        collapses_rejected
    );

    Ok(DecimateResult {
        final_triangles: out.num_triangles(),
        mesh: out,
        original_triangles,
        collapses_performed,
        collapses_rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(n: usize) -> Mesh {
        let mut vertices = Vec::new();
        for y in 0..n {
            for x in 0..n {
                vertices.push([x as f64, y as f64, 0.0]);
            }
        }
        let mut triangles = Vec::new();
        for y in 0..n - 1 {
            for x in 0..n - 1 {
                let i = y * n + x;
                triangles.push([i, i + 1, i + n]);
                triangles.push([i + 1, i + n + 1, i + n]);
            }
        }
        Mesh::new(vertices, triangles)
    }

    #[test]
    fn test_quadric_plane() {
        let q = Quadric::from_plane(DVec3::Z, -2.0);
        assert_relative_eq!(q.evaluate(DVec3::new(3.0, 4.0, 2.0)), 0.0);
        assert_relative_eq!(q.evaluate(DVec3::new(0.0, 0.0, 5.0)), 9.0);
        // a single plane does not pin down a point
        assert!(q.optimal_point().is_none());
    }

    #[test]
    fn test_decimate_flat_grid() -> Result<(), MeshError> {
        let mesh = grid(10);
        assert_eq!(mesh.num_triangles(), 162);

        let result = decimate_quadric(&mesh, 40)?;
        result.mesh.validate()?;
        assert_eq!(result.original_triangles, 162);
        assert!(result.final_triangles <= 40);
        assert!(result.final_triangles > 0);
        assert!(result.collapses_performed > 0);
        assert_eq!(result.final_triangles, result.mesh.num_triangles());

        // collapsing a plane keeps it a plane
        for v in &result.mesh.vertices {
            assert_relative_eq!(v[2], 0.0, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_decimate_noop() -> Result<(), MeshError> {
        let mesh = grid(3);
        let result = decimate_quadric(&mesh, 100)?;
        assert_eq!(result.mesh, mesh);
        assert_eq!(result.collapses_performed, 0);
        Ok(())
    }
}
