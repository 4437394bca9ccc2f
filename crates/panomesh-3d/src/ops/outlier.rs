use rayon::prelude::*;

use crate::pointcloud::{PointCloud, PointCloudError};
use crate::spatial::SpatialIndex;

/// Remove points whose mean distance to their neighbours is unusually large.
///
/// For each point the mean distance to its `nb_neighbors` nearest neighbours is computed. Points
/// whose mean exceeds `mean + std_ratio * std` over the whole cloud are dropped.
///
/// # Arguments
///
/// * `point_cloud` - The input point cloud.
/// * `nb_neighbors` - Number of neighbours considered per point.
/// * `std_ratio` - Threshold in standard deviations.
///
/// # Returns
///
/// The filtered point cloud and the indices of the kept points.
pub fn remove_statistical_outliers(
    point_cloud: &PointCloud,
    nb_neighbors: usize,
    std_ratio: f64,
) -> Result<(PointCloud, Vec<usize>), PointCloudError> {
    if point_cloud.len() <= nb_neighbors || nb_neighbors == 0 {
        return Ok((point_cloud.clone(), (0..point_cloud.len()).collect()));
    }

    let points = point_cloud.points();
    let index = SpatialIndex::new(points);

    let mean_distances = points
        .par_iter()
        .map(|p| {
            // the first neighbour is the point itself
            let nns = index.knn(p, nb_neighbors + 1);
            let sum = nns.iter().skip(1).map(|nn| nn.distance_sq.sqrt()).sum::<f64>();
            sum / (nns.len().saturating_sub(1)).max(1) as f64
        })
        .collect::<Vec<_>>();

    let n = mean_distances.len() as f64;
    let mean = mean_distances.iter().sum::<f64>() / n;
    let var = mean_distances
        .iter()
        .map(|d| (d - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0).max(1.0);
    let threshold = mean + std_ratio * var.sqrt();

    let kept = mean_distances
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d <= threshold)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    let points = kept.iter().map(|&i| points[i]).collect();
    let colors = point_cloud
        .colors()
        .map(|c| kept.iter().map(|&i| c[i]).collect());
    let normals = point_cloud
        .normals()
        .map(|c| kept.iter().map(|&i| c[i]).collect());

    log::debug!(
        "statistical outlier removal: kept {} of {} points",
        kept.len(),
        point_cloud.len()
    );

    Ok((PointCloud::new(points, colors, normals)?, kept))
}
