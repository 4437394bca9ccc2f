use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::DVec3;
use rayon::prelude::*;

use crate::pointcloud::{PointCloud, PointCloudError};
use crate::spatial::SpatialIndex;

/// Normal assigned to points whose neighbourhood is too small for a plane fit.
pub const FALLBACK_NORMAL: [f64; 3] = [0.0, 0.0, -1.0];

/// How estimated normals are oriented after the plane fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalOrientation {
    /// Keep the sign returned by the eigen solver.
    Unoriented,
    /// Flip every normal so it points at the origin, where the camera sits.
    TowardsOrigin,
    /// Point at the origin, then propagate a consistent sign over the `k` nearest neighbour graph.
    Consistent {
        /// Number of neighbours per point in the propagation graph.
        k: usize,
    },
}

/// Estimates per-point normals with a local plane fit.
///
/// The neighbourhood of a point is the hybrid radius / max-k query of [`SpatialIndex::radius_knn`].
#[derive(Debug, Clone)]
pub struct NormalEstimator {
    /// Search radius for neighbours.
    pub radius: f64,
    /// Maximum number of neighbours, the query point included.
    pub max_nn: usize,
    /// Orientation applied after estimation.
    pub orientation: NormalOrientation,
}

impl Default for NormalEstimator {
    fn default() -> Self {
        Self {
            radius: 1.0,
            max_nn: 30,
            orientation: NormalOrientation::Consistent { k: 30 },
        }
    }
}

impl NormalEstimator {
    /// Estimate normals for every point and store them in the point cloud.
    ///
    /// Points with fewer than 3 neighbours get [`FALLBACK_NORMAL`].
    pub fn estimate(&self, point_cloud: &mut PointCloud) -> Result<(), PointCloudError> {
        let points = point_cloud.points();
        let index = SpatialIndex::new(points);

        let mut normals = points
            .par_iter()
            .map(|p| {
                let neighbours = index.radius_knn(p, self.radius, self.max_nn);
                if neighbours.len() < 3 {
                    return FALLBACK_NORMAL;
                }
                let positions = neighbours
                    .iter()
                    .map(|nn| points[nn.index])
                    .collect::<Vec<_>>();
                fit_plane_normal(&positions).unwrap_or(FALLBACK_NORMAL)
            })
            .collect::<Vec<_>>();

        let num_fallback = normals.iter().filter(|n| **n == FALLBACK_NORMAL).count();
        log::debug!(
            "estimated {} normals, {} with fallback orientation",
            normals.len(),
            num_fallback
        );

        match self.orientation {
            NormalOrientation::Unoriented => {}
            NormalOrientation::TowardsOrigin => orient_towards(points, &mut normals, [0.0; 3]),
            NormalOrientation::Consistent { k } => {
                orient_towards(points, &mut normals, [0.0; 3]);
                orient_consistent(points, &mut normals, &index, k);
            }
        }

        point_cloud.set_normals(normals)
    }
}

/// Fit a plane to `positions` and return its unit normal.
///
/// The normal is the eigenvector of the smallest eigenvalue of the covariance matrix.
/// Returns `None` if fewer than 3 positions are given or the result is not finite.
pub fn fit_plane_normal(positions: &[[f64; 3]]) -> Option<[f64; 3]> {
    if positions.len() < 3 {
        return None;
    }

    let n = positions.len() as f64;
    let centroid = positions
        .iter()
        .fold(DVec3::ZERO, |acc, p| acc + DVec3::from_array(*p))
        / n;

    let mut cov = [[0.0f64; 3]; 3];
    for p in positions {
        let d = (DVec3::from_array(*p) - centroid).to_array();
        for i in 0..3 {
            for j in 0..3 {
                cov[i][j] += d[i] * d[j];
            }
        }
    }

    let cov_mat = faer::Mat::<f64>::from_fn(3, 3, |i, j| cov[i][j] / n);
    let evd = cov_mat.selfadjoint_eigendecomposition(faer::Side::Lower);
    let eigenvalues = evd.s().column_vector();
    let eigenvectors = evd.u();

    // pick the smallest eigenvalue explicitly instead of relying on the solver order
    let mut min_idx = 0;
    for i in 1..3 {
        if eigenvalues.read(i) < eigenvalues.read(min_idx) {
            min_idx = i;
        }
    }

    let normal = DVec3::new(
        eigenvectors.read(0, min_idx),
        eigenvectors.read(1, min_idx),
        eigenvectors.read(2, min_idx),
    );
    let length = normal.length();
    if !length.is_finite() || length == 0.0 {
        return None;
    }
    Some((normal / length).to_array())
}

/// Flip normals so they point towards `viewpoint`.
pub fn orient_towards(points: &[[f64; 3]], normals: &mut [[f64; 3]], viewpoint: [f64; 3]) {
    let viewpoint = DVec3::from_array(viewpoint);
    for (p, n) in points.iter().zip(normals.iter_mut()) {
        let to_view = viewpoint - DVec3::from_array(*p);
        if DVec3::from_array(*n).dot(to_view) < 0.0 {
            *n = n.map(|c| -c);
        }
    }
}

/// A candidate edge in the propagation tree; ordered so the heap pops the lowest cost first.
struct PropagationEdge {
    cost: f64,
    from: usize,
    to: usize,
}

impl PartialEq for PropagationEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for PropagationEdge {}

impl PartialOrd for PropagationEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropagationEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
    }
}

/// Propagate a consistent normal sign over the k-NN graph.
///
/// Grows a minimum spanning tree with edge cost `1 - |n_i . n_j|` from the best-oriented point of
/// each connected component, flipping a normal whenever it disagrees with its tree parent.
pub fn orient_consistent(
    points: &[[f64; 3]],
    normals: &mut [[f64; 3]],
    index: &SpatialIndex,
    k: usize,
) {
    if points.is_empty() || k == 0 {
        return;
    }

    let neighbours = points
        .par_iter()
        .map(|p| {
            index
                .knn(p, k + 1)
                .into_iter()
                .map(|nn| nn.index)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    // seeds are visited in order of how directly they face the origin
    let mut seeds = (0..points.len()).collect::<Vec<_>>();
    let facing = |i: usize| {
        let p = DVec3::from_array(points[i]);
        let n = DVec3::from_array(normals[i]);
        if p.length() > 0.0 {
            -n.dot(p.normalize())
        } else {
            0.0
        }
    };
    let scores = seeds.iter().map(|&i| facing(i)).collect::<Vec<_>>();
    seeds.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut visited = vec![false; points.len()];
    let mut heap = BinaryHeap::new();
    let mut num_flipped = 0usize;

    for seed in seeds {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        push_edges(seed, &neighbours, normals, &visited, &mut heap);

        while let Some(edge) = heap.pop() {
            if visited[edge.to] {
                continue;
            }
            visited[edge.to] = true;
            let parent = DVec3::from_array(normals[edge.from]);
            if parent.dot(DVec3::from_array(normals[edge.to])) < 0.0 {
                normals[edge.to] = normals[edge.to].map(|c| -c);
                num_flipped += 1;
            }
            push_edges(edge.to, &neighbours, normals, &visited, &mut heap);
        }
    }

    log::debug!("consistent orientation flipped {num_flipped} normals");
}

fn push_edges(
    from: usize,
    neighbours: &[Vec<usize>],
    normals: &[[f64; 3]],
    visited: &[bool],
    heap: &mut BinaryHeap<PropagationEdge>,
) {
    let n_from = DVec3::from_array(normals[from]);
    for &to in &neighbours[from] {
        if visited[to] {
            continue;
        }
        let cost = 1.0 - n_from.dot(DVec3::from_array(normals[to])).abs();
        heap.push(PropagationEdge { cost, from, to });
    }
}
