use std::collections::HashMap;

use glam::DVec3;

use super::grid::GridLayout;
use super::tables::{EDGE_TABLE, TRIANGLE_TABLE};

// corner offsets of a cube
const CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

// (lower corner, upper corner, axis) of each cube edge
const EDGES: [(usize, usize, usize); 12] = [
    (0, 1, 0),
    (1, 2, 1),
    (3, 2, 0),
    (0, 3, 1),
    (4, 5, 0),
    (5, 6, 1),
    (7, 6, 0),
    (4, 7, 1),
    (0, 4, 2),
    (1, 5, 2),
    (2, 6, 2),
    (3, 7, 2),
];

/// Extracts the `iso` level set of the node `values` as a triangle soup with shared vertices.
///
/// Vertices on a grid edge shared by several cubes are emitted once. Triangle winding follows
/// the lookup tables and is not oriented.
pub(crate) fn marching_cubes(
    grid: &GridLayout,
    values: &[f64],
    iso: f64,
) -> (Vec<[f64; 3]>, Vec<[usize; 3]>) {
    let [nx, ny, nz] = grid.dims;
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();
    if nx < 2 || ny < 2 || nz < 2 {
        return (vertices, triangles);
    }

    // (lower node, axis) -> vertex index
    let mut edge_vertices: HashMap<(usize, usize), usize> = HashMap::new();

    for z in 0..nz - 1 {
        for y in 0..ny - 1 {
            for x in 0..nx - 1 {
                let nodes = CORNERS.map(|[dx, dy, dz]| grid.index(x + dx, y + dy, z + dz));
                let corner_values = nodes.map(|i| values[i]);

                let mut cube_index = 0usize;
                for (i, &v) in corner_values.iter().enumerate() {
                    if v < iso {
                        cube_index |= 1 << i;
                    }
                }

                let edge_mask = EDGE_TABLE[cube_index];
                if edge_mask == 0 {
                    continue;
                }

                let mut cube_vertices = [usize::MAX; 12];
                for (e, &(a, b, axis)) in EDGES.iter().enumerate() {
                    if edge_mask & (1 << e) == 0 {
                        continue;
                    }
                    let key = (nodes[a], axis);
                    cube_vertices[e] = *edge_vertices.entry(key).or_insert_with(|| {
                        let [ax, ay, az] = CORNERS[a];
                        let [bx, by, bz] = CORNERS[b];
                        let pa = grid.node_position(x + ax, y + ay, z + az);
                        let pb = grid.node_position(x + bx, y + by, z + bz);
                        vertices.push(interpolate(pa, pb, corner_values[a], corner_values[b], iso));
                        vertices.len() - 1
                    });
                }

                for tri in TRIANGLE_TABLE[cube_index].chunks_exact(3) {
                    if tri[0] < 0 {
                        break;
                    }
                    let [a, b, c] = [tri[0], tri[1], tri[2]].map(|e| cube_vertices[e as usize]);
                    if a != b && b != c && a != c {
                        triangles.push([a, b, c]);
                    }
                }
            }
        }
    }

    (vertices, triangles)
}

fn interpolate(pa: DVec3, pb: DVec3, va: f64, vb: f64, iso: f64) -> [f64; 3] {
    let denom = vb - va;
    let t = if denom.abs() < f64::EPSILON {
        0.5
    } else {
        ((iso - va) / denom).clamp(0.0, 1.0)
    };
    pa.lerp(pb, t).to_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sphere_field(grid: &GridLayout, radius: f64) -> Vec<f64> {
        let [nx, ny, nz] = grid.dims;
        let mut values = vec![0.0; grid.num_nodes()];
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    values[grid.index(x, y, z)] = grid.node_position(x, y, z).length() - radius;
                }
            }
        }
        values
    }

    #[test]
    fn test_sphere_is_closed() {
        let grid = GridLayout {
            origin: DVec3::splat(-1.5),
            spacing: 0.1,
            dims: [31, 31, 31],
        };
        let values = sphere_field(&grid, 1.0);
        let (vertices, triangles) = marching_cubes(&grid, &values, 0.0);

        assert!(!triangles.is_empty());
        for v in &vertices {
            let r = DVec3::from_array(*v).length();
            assert!((r - 1.0).abs() < 0.05, "vertex off the sphere: {r}");
        }

        // every edge of a closed surface borders exactly two triangles
        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for tri in &triangles {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                *edge_count.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        assert!(edge_count.values().all(|&c| c == 2));
    }

    #[test]
    fn test_constant_field_is_empty() {
        let grid = GridLayout {
            origin: DVec3::ZERO,
            spacing: 1.0,
            dims: [4, 4, 4],
        };
        let (vertices, triangles) = marching_cubes(&grid, &[1.0; 64], 0.0);
        assert!(vertices.is_empty());
        assert!(triangles.is_empty());
    }
}
