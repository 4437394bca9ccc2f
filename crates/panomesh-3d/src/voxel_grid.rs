use glam::DVec3;
use rayon::prelude::*;

use crate::pointcloud::PointCloud;
use crate::spatial::SpatialIndex;

/// Error types for the voxel grid.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VoxelGridError {
    /// The leaf size is not a positive finite number.
    #[error("Leaf size must be positive and finite, got {0}")]
    InvalidLeafSize(f64),
}

/// Running sums of the points merged into one output point.
#[derive(Default)]
struct VoxelData {
    position: DVec3,
    color: [f64; 3],
    normal: DVec3,
    count: usize,
}

/// Disjoint sets over point indices; the root of a set is its smallest index.
struct Components {
    parent: Vec<usize>,
}

impl Components {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Downsamples point clouds by merging points closer than the leaf size.
///
/// Two points are merged when a chain of points connects them in which every step is at most
/// `leaf_size` long. A larger leaf only adds links, so the output never grows with the leaf size,
/// and a leaf below the smallest point spacing keeps every point.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    leaf_size: f64,
}

impl VoxelGrid {
    /// Creates a new `VoxelGrid` with the specified leaf size.
    ///
    /// # Arguments
    /// * `leaf_size` - The largest distance between two linked points.
    ///
    /// # Errors
    /// Returns an error if `leaf_size` is non-positive or not finite.
    pub fn new(leaf_size: f64) -> Result<Self, VoxelGridError> {
        if !(leaf_size.is_finite() && leaf_size > 0.0) {
            return Err(VoxelGridError::InvalidLeafSize(leaf_size));
        }
        Ok(VoxelGrid { leaf_size })
    }

    /// Index of the merged point for every input point, plus the number of merged points.
    ///
    /// Merged points are numbered by their first member in input order.
    fn assign(&self, points: &[[f64; 3]]) -> (Vec<usize>, usize) {
        let index = SpatialIndex::new(points);
        let links = points
            .par_iter()
            .enumerate()
            .map(|(i, p)| {
                index
                    .within(p, self.leaf_size)
                    .into_iter()
                    .map(|nn| nn.index)
                    .filter(|&j| j > i)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mut components = Components::new(points.len());
        for (i, neighbours) in links.iter().enumerate() {
            for &j in neighbours {
                components.union(i, j);
            }
        }

        let mut slot_of_root = vec![usize::MAX; points.len()];
        let mut num_slots = 0;
        let assignment = (0..points.len())
            .map(|i| {
                let root = components.find(i);
                if slot_of_root[root] == usize::MAX {
                    slot_of_root[root] = num_slots;
                    num_slots += 1;
                }
                slot_of_root[root]
            })
            .collect();
        (assignment, num_slots)
    }

    /// Downsamples the input point cloud, replacing every group of linked points by its centroid.
    ///
    /// Colors are averaged and normals are averaged then renormalized. Output points follow
    /// the order of the first member of their group.
    ///
    /// # Arguments
    /// * `point_cloud` - The input point cloud to downsample.
    ///
    /// # Returns
    /// A new `PointCloud` containing the downsampled points, and optionally colors and normals.
    pub fn downsample(&self, point_cloud: &PointCloud) -> PointCloud {
        let colors_in = point_cloud.colors();
        let normals_in = point_cloud.normals();

        let (assignment, num_voxels) = self.assign(point_cloud.points());
        let mut voxels = (0..num_voxels)
            .map(|_| VoxelData::default())
            .collect::<Vec<_>>();

        for (i, (point, &slot)) in point_cloud.points().iter().zip(&assignment).enumerate() {
            let voxel = &mut voxels[slot];
            voxel.position += DVec3::from_array(*point);
            voxel.count += 1;

            if let Some(color) = colors_in.and_then(|c| c.get(i)) {
                for (acc, &c) in voxel.color.iter_mut().zip(color.iter()) {
                    *acc += c as f64;
                }
            }
            if let Some(normal) = normals_in.and_then(|n| n.get(i)) {
                voxel.normal += DVec3::from_array(*normal);
            }
        }

        let mut points = Vec::with_capacity(voxels.len());
        let mut colors = colors_in.map(|_| Vec::with_capacity(voxels.len()));
        let mut normals = normals_in.map(|_| Vec::with_capacity(voxels.len()));

        for voxel in &voxels {
            let inv_count = 1.0 / voxel.count as f64;
            points.push((voxel.position * inv_count).to_array());

            if let Some(colors) = colors.as_mut() {
                colors.push(voxel.color.map(|c| (c * inv_count) as f32));
            }
            if let Some(normals) = normals.as_mut() {
                let normal = voxel.normal * inv_count;
                let normal = if normal.length() > 0.0 {
                    normal.normalize()
                } else {
                    normal
                };
                normals.push(normal.to_array());
            }
        }

        log::debug!(
            "voxel downsampling with leaf {}: {} -> {} points",
            self.leaf_size,
            point_cloud.len(),
            points.len()
        );

        // lengths are built in lockstep with `points`
        PointCloud::new(points, colors, normals).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    #[test]
    fn test_invalid_leaf_size() {
        assert_eq!(
            VoxelGrid::new(0.0).err(),
            Some(VoxelGridError::InvalidLeafSize(0.0))
        );
        assert!(VoxelGrid::new(f64::NAN).is_err());
        assert!(VoxelGrid::new(-1.0).is_err());
    }

    #[test]
    fn test_downsample_merges_cell() -> Result<(), Box<dyn std::error::Error>> {
        let cloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5], [2.0, 0.0, 0.0]],
            Some(vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            Some(vec![[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]),
        )?;

        let grid = VoxelGrid::new(1.0)?;
        let out = grid.downsample(&cloud);

        assert_eq!(out.len(), 2);
        assert_eq!(out.points()[0], [0.25, 0.25, 0.25]);
        assert_eq!(out.points()[1], [2.0, 0.0, 0.0]);

        let colors = out.colors().ok_or("missing colors")?;
        assert_eq!(colors[0], [0.5, 0.5, 0.0]);

        let normals = out.normals().ok_or("missing normals")?;
        let half = std::f64::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(normals[0][1], half, epsilon = 1e-12);
        assert_relative_eq!(normals[0][2], half, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_tiny_leaf_keeps_points() -> Result<(), Box<dyn std::error::Error>> {
        let points = (0..5)
            .flat_map(|i| (0..5).map(move |j| [i as f64, j as f64, 0.0]))
            .collect::<Vec<_>>();
        let cloud = PointCloud::new(points, None, None)?;
        let grid = VoxelGrid::new(0.1)?;
        assert_eq!(grid.downsample(&cloud).len(), cloud.len());
        Ok(())
    }

    #[test]
    fn test_monotonic_in_leaf_size() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = rand::rng();
        let points = (0..500)
            .map(|_| {
                [
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                ]
            })
            .collect::<Vec<_>>();
        let cloud = PointCloud::new(points, None, None)?;

        let mut prev = cloud.len();
        for leaf in [0.25, 0.3, 0.45, 0.7, 1.0, 1.01, 1.6, 2.5, 4.0] {
            let count = VoxelGrid::new(leaf)?.downsample(&cloud).len();
            assert!(count <= prev, "leaf {leaf}: {count} > {prev}");
            prev = count;
        }
        Ok(())
    }

    #[test]
    fn test_larger_leaf_never_adds_points() -> Result<(), Box<dyn std::error::Error>> {
        let cloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.05, 0.0, 0.0]],
            None,
            None,
        )?;
        assert_eq!(VoxelGrid::new(1.0)?.downsample(&cloud).len(), 2);
        assert_eq!(VoxelGrid::new(1.01)?.downsample(&cloud).len(), 2);
        assert_eq!(VoxelGrid::new(0.01)?.downsample(&cloud).len(), 3);
        assert_eq!(VoxelGrid::new(2.1)?.downsample(&cloud).len(), 1);
        Ok(())
    }

    #[test]
    fn test_distant_diagonal_pair_is_kept() -> Result<(), Box<dyn std::error::Error>> {
        // 1.559 apart, inside one unit cube
        let cloud = PointCloud::new(vec![[0.0, 0.0, 0.0], [0.9, 0.9, 0.9]], None, None)?;
        assert_eq!(VoxelGrid::new(1.0)?.downsample(&cloud).len(), 2);
        assert_eq!(VoxelGrid::new(1.6)?.downsample(&cloud).len(), 1);
        Ok(())
    }

    #[test]
    fn test_below_min_spacing_keeps_random_cloud() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = rand::rng();
        let points = (0..300)
            .map(|_| {
                [
                    rng.random_range(-3.0..3.0),
                    rng.random_range(-3.0..3.0),
                    rng.random_range(-3.0..3.0),
                ]
            })
            .collect::<Vec<_>>();
        let min_spacing = points
            .iter()
            .enumerate()
            .flat_map(|(i, a)| {
                points[i + 1..]
                    .iter()
                    .map(move |b| DVec3::from_array(*a).distance(DVec3::from_array(*b)))
            })
            .fold(f64::INFINITY, f64::min);
        let cloud = PointCloud::new(points, None, None)?;

        let out = VoxelGrid::new(min_spacing * 0.99)?.downsample(&cloud);
        assert_eq!(out.len(), cloud.len());
        assert_eq!(out.points(), cloud.points());
        Ok(())
    }
}
