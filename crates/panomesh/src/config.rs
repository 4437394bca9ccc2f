use std::path::Path;

use panomesh_3d::camera::{CylindricalUnprojector, DepthRemap, RootScalingCurve};
use panomesh_3d::normals::{NormalEstimator, NormalOrientation};
use panomesh_recon::poisson::MAX_POISSON_DEPTH;
use panomesh_recon::{PoissonParams, ReconstructionStrategy};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Camera model and depth remap parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Height of one pixel row in world units.
    pub vertical_scale: f64,
    /// Global multiplier on the remapped radius.
    pub depth_scale_factor: f64,
    /// Added to the inverted depth before scaling.
    pub bias: f64,
    /// Multiplies the biased inverted depth.
    pub multiplier: f64,
    /// The root scaling curve.
    pub curve: CurveConfig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let remap = DepthRemap::default();
        Self {
            vertical_scale: 1.0,
            depth_scale_factor: 1.0,
            bias: remap.bias,
            multiplier: remap.multiplier,
            curve: CurveConfig::default(),
        }
    }
}

/// Parameters of the root scaling curve `r * ((r / max_r)^exponent + offset)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Whether the curve is applied.
    pub enabled: bool,
    /// Exponent of the normalized radius.
    pub exponent: f64,
    /// Constant added to the normalized term.
    pub offset: f64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        let curve = RootScalingCurve::default();
        Self {
            enabled: true,
            exponent: curve.exponent,
            offset: curve.offset,
        }
    }
}

/// Statistical outlier removal applied to the raw point cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Whether outliers are removed.
    pub enabled: bool,
    /// Neighbours considered per point.
    pub nb_neighbors: usize,
    /// Threshold in standard deviations of the mean neighbour distance.
    pub std_ratio: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            nb_neighbors: 20,
            std_ratio: 2.0,
        }
    }
}

/// Normal estimation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalConfig {
    /// Neighbour search radius.
    pub radius: f64,
    /// Maximum neighbours per point.
    pub max_nn: usize,
    /// Neighbours used to propagate a consistent orientation, `None` to only face the camera.
    pub orientation_k: Option<usize>,
}

impl Default for NormalConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            max_nn: 30,
            orientation_k: Some(30),
        }
    }
}

/// Laplacian smoothing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Number of passes, 0 disables smoothing.
    pub iterations: usize,
    /// Step towards the neighbour mean.
    pub lambda: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            iterations: 0,
            lambda: 1.0,
        }
    }
}

/// Poisson reconstruction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoissonConfig {
    /// The grid has `2^depth` cells along the longest axis.
    pub depth: u32,
    /// Vertices below this density quantile are pruned.
    pub density_quantile: f64,
    /// Iteration cap of the linear solver.
    pub max_iterations: usize,
}

impl Default for PoissonConfig {
    fn default() -> Self {
        let params = PoissonParams::default();
        Self {
            depth: params.depth,
            density_quantile: params.density_quantile,
            max_iterations: params.max_iterations,
        }
    }
}

/// Surface reconstruction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Delaunay triangulation per azimuthal slice.
    #[default]
    RadialSlice,
    /// One Delaunay triangulation of the X-Z projection.
    GlobalDelaunay,
    /// Poisson surface reconstruction with density pruning.
    Poisson,
}

impl std::str::FromStr for StrategyKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "radial-slice" => Ok(StrategyKind::RadialSlice),
            "global-delaunay" => Ok(StrategyKind::GlobalDelaunay),
            "poisson" => Ok(StrategyKind::Poisson),
            other => Err(PipelineError::Config(format!("unknown strategy: {other}"))),
        }
    }
}

/// Configuration of a panorama to mesh run.
///
/// Every field has a default, so a JSON file only needs the values it changes:
///
/// ```
/// use panomesh::PipelineConfig;
///
/// let config = PipelineConfig::from_json(r#"{ "strategy": "poisson", "num_slices": 8 }"#).unwrap();
/// assert_eq!(config.num_slices, 8);
/// assert_eq!(config.camera.vertical_scale, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Camera model and depth remap.
    pub camera: CameraConfig,
    /// Optional statistical outlier removal.
    pub outliers: OutlierConfig,
    /// Cell size of the voxel downsampling, `None` keeps every point.
    pub downsample_voxel_size: Option<f64>,
    /// Normal estimation, used by the Poisson strategy.
    pub normals: NormalConfig,
    /// Reconstruction algorithm.
    pub strategy: StrategyKind,
    /// Number of azimuthal slices of the radial strategy.
    pub num_slices: usize,
    /// Vertex clustering cell size of the global Delaunay strategy.
    pub cluster_voxel_size: Option<f64>,
    /// Poisson parameters.
    pub poisson: PoissonConfig,
    /// Quadric decimation down to this many triangles.
    pub decimation_target: Option<usize>,
    /// Laplacian smoothing.
    pub smoothing: SmoothingConfig,
    /// Reverse the triangle winding before exporting.
    pub flip_winding: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            outliers: OutlierConfig::default(),
            downsample_voxel_size: None,
            normals: NormalConfig::default(),
            strategy: StrategyKind::default(),
            num_slices: 20,
            cluster_voxel_size: None,
            poisson: PoissonConfig::default(),
            decimation_target: None,
            smoothing: SmoothingConfig::default(),
            flip_winding: true,
        }
    }
}

fn check(valid: bool, name: &str, value: impl std::fmt::Display) -> Result<(), PipelineError> {
    if valid {
        Ok(())
    } else {
        Err(PipelineError::Config(format!("invalid {name}: {value}")))
    }
}

fn positive(name: &str, value: f64) -> Result<(), PipelineError> {
    check(value.is_finite() && value > 0.0, name, value)
}

impl PipelineConfig {
    /// Parse a configuration from JSON, missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Check every parameter range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let camera = &self.camera;
        positive("vertical_scale", camera.vertical_scale)?;
        positive("depth_scale_factor", camera.depth_scale_factor)?;
        check(camera.bias.is_finite(), "bias", camera.bias)?;
        positive("multiplier", camera.multiplier)?;
        positive("curve exponent", camera.curve.exponent)?;
        check(camera.curve.offset.is_finite(), "curve offset", camera.curve.offset)?;

        if self.outliers.enabled {
            check(
                self.outliers.nb_neighbors > 0,
                "nb_neighbors",
                self.outliers.nb_neighbors,
            )?;
            positive("std_ratio", self.outliers.std_ratio)?;
        }
        if let Some(size) = self.downsample_voxel_size {
            positive("downsample_voxel_size", size)?;
        }
        if let Some(size) = self.cluster_voxel_size {
            positive("cluster_voxel_size", size)?;
        }

        positive("normal radius", self.normals.radius)?;
        check(self.normals.max_nn >= 3, "max_nn", self.normals.max_nn)?;
        if let Some(k) = self.normals.orientation_k {
            check(k > 0, "orientation_k", k)?;
        }

        check(self.num_slices >= 1, "num_slices", self.num_slices)?;
        check(
            (1..=MAX_POISSON_DEPTH).contains(&self.poisson.depth),
            "poisson depth",
            self.poisson.depth,
        )?;
        check(
            (0.0..=1.0).contains(&self.poisson.density_quantile),
            "density_quantile",
            self.poisson.density_quantile,
        )?;
        check(
            self.smoothing.lambda.is_finite(),
            "lambda",
            self.smoothing.lambda,
        )?;
        Ok(())
    }

    /// The camera described by this configuration.
    pub fn unprojector(&self) -> CylindricalUnprojector {
        let camera = &self.camera;
        CylindricalUnprojector {
            vertical_scale: camera.vertical_scale,
            depth_scale_factor: camera.depth_scale_factor,
            remap: DepthRemap {
                bias: camera.bias,
                multiplier: camera.multiplier,
                curve: camera.curve.enabled.then_some(RootScalingCurve {
                    exponent: camera.curve.exponent,
                    offset: camera.curve.offset,
                }),
            },
        }
    }

    /// The normal estimator described by this configuration.
    pub fn normal_estimator(&self) -> NormalEstimator {
        NormalEstimator {
            radius: self.normals.radius,
            max_nn: self.normals.max_nn,
            orientation: match self.normals.orientation_k {
                Some(k) => NormalOrientation::Consistent { k },
                None => NormalOrientation::TowardsOrigin,
            },
        }
    }

    /// The reconstruction strategy described by this configuration.
    pub fn reconstruction_strategy(&self) -> ReconstructionStrategy {
        match self.strategy {
            StrategyKind::RadialSlice => ReconstructionStrategy::RadialSliceDelaunay {
                num_slices: self.num_slices,
            },
            StrategyKind::GlobalDelaunay => ReconstructionStrategy::GlobalDelaunay {
                simplify_voxel_size: self.cluster_voxel_size,
            },
            StrategyKind::Poisson => ReconstructionStrategy::Poisson(PoissonParams {
                depth: self.poisson.depth,
                density_quantile: self.poisson.density_quantile,
                max_iterations: self.poisson.max_iterations,
                ..Default::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.validate().ok(), Some(()));
        assert_eq!(config.unprojector(), CylindricalUnprojector::default());
        assert_eq!(
            config.reconstruction_strategy(),
            ReconstructionStrategy::RadialSliceDelaunay { num_slices: 20 }
        );
        assert!(config.flip_winding);
    }

    #[test]
    fn test_partial_json() -> Result<(), PipelineError> {
        let config = PipelineConfig::from_json(
            r#"{
                "strategy": "global-delaunay",
                "cluster_voxel_size": 0.5,
                "camera": { "bias": 0.0, "curve": { "enabled": false } }
            }"#,
        )?;
        assert_eq!(config.strategy, StrategyKind::GlobalDelaunay);
        assert_eq!(config.camera.bias, 0.0);
        assert_eq!(config.camera.multiplier, 10.0);
        assert_eq!(config.unprojector().remap.curve, None);
        assert_eq!(
            config.reconstruction_strategy(),
            ReconstructionStrategy::GlobalDelaunay {
                simplify_voxel_size: Some(0.5)
            }
        );
        Ok(())
    }

    #[test]
    fn test_invalid_values() {
        for json in [
            r#"{ "num_slices": 0 }"#,
            r#"{ "camera": { "vertical_scale": -1.0 } }"#,
            r#"{ "camera": { "multiplier": -10.0 } }"#,
            r#"{ "camera": { "multiplier": 0.0 } }"#,
            r#"{ "camera": { "curve": { "exponent": 0.0 } } }"#,
            r#"{ "poisson": { "density_quantile": 1.5 } }"#,
            r#"{ "poisson": { "depth": 12 } }"#,
            r#"{ "downsample_voxel_size": 0.0 }"#,
            r#"{ "strategy": "marching" }"#,
            r#"not json"#,
        ] {
            assert!(
                matches!(PipelineConfig::from_json(json), Err(PipelineError::Config(_))),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("poisson".parse::<StrategyKind>().ok(), Some(StrategyKind::Poisson));
        assert!("cubes".parse::<StrategyKind>().is_err());
    }
}
