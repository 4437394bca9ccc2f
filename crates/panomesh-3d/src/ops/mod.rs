mod cluster;
mod decimate;
mod outlier;
mod smooth;

pub use cluster::simplify_vertex_clustering;
pub use decimate::{decimate_quadric, DecimateResult};
pub use outlier::remove_statistical_outliers;
pub use smooth::smooth_laplacian;
