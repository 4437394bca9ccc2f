use std::f64::consts::FRAC_PI_2;

use panomesh_image::{ColorImage, DepthMap, ImageSize};
use rayon::prelude::*;

use crate::pointcloud::{PointCloud, PointCloudError};

/// Error types for the camera module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CameraError {
    /// The color image and the depth map do not have the same size.
    #[error("Color image size {0} does not match depth map size {1}")]
    DimensionMismatch(ImageSize, ImageSize),

    /// The input has a zero dimension.
    #[error("Input image is empty: {0}")]
    EmptyImage(ImageSize),

    /// A camera parameter is out of range.
    #[error("Invalid camera parameter {0}: {1}")]
    InvalidParameter(&'static str, f64),

    /// The unprojected points could not form a point cloud.
    #[error(transparent)]
    PointCloud(#[from] PointCloudError),
}

/// Mid-range emphasis curve applied to remapped radii.
///
/// `r' = r * ((r / max_r)^exponent + offset)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootScalingCurve {
    /// Exponent of the normalized radius.
    pub exponent: f64,
    /// Constant added to the normalized term.
    pub offset: f64,
}

impl Default for RootScalingCurve {
    fn default() -> Self {
        Self {
            exponent: 0.5,
            offset: 0.7,
        }
    }
}

impl RootScalingCurve {
    /// Apply the curve to a radius given the largest radius of the image.
    #[inline]
    pub fn apply(&self, r: f64, max_r: f64) -> f64 {
        r * ((r / max_r).powf(self.exponent) + self.offset)
    }
}

/// Maps raw depth (larger is farther) to a radius around the camera.
///
/// `r = (max(depth) - depth + bias) * multiplier`, then the optional curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRemap {
    /// Added to the inverted depth before scaling.
    pub bias: f64,
    /// Multiplies the biased inverted depth.
    pub multiplier: f64,
    /// Optional root scaling curve.
    pub curve: Option<RootScalingCurve>,
}

impl Default for DepthRemap {
    fn default() -> Self {
        Self {
            bias: 30.0,
            multiplier: 10.0,
            curve: Some(RootScalingCurve::default()),
        }
    }
}

/// Azimuth in radians of pixel column `x` for an image `width` pixels wide.
///
/// The image center maps to 0 and the image borders to `-pi/2` and `pi/2`.
#[inline]
pub fn pixel_azimuth(x: usize, width: usize) -> f64 {
    let half_w = width as f64 / 2.0;
    ((x as f64 - half_w) / half_w) * FRAC_PI_2
}

/// Unprojects a panorama with a cylindrical horizontal axis and a linear vertical axis.
///
/// The camera sits at the origin looking down `+Z`; `X` grows with the column and `Y` with the row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylindricalUnprojector {
    /// Height of one pixel row in world units.
    pub vertical_scale: f64,
    /// Global multiplier on the remapped radius.
    pub depth_scale_factor: f64,
    /// Depth to radius mapping.
    pub remap: DepthRemap,
}

impl Default for CylindricalUnprojector {
    fn default() -> Self {
        Self {
            vertical_scale: 1.0,
            depth_scale_factor: 1.0,
            remap: DepthRemap::default(),
        }
    }
}

impl CylindricalUnprojector {
    fn validate(&self) -> Result<(), CameraError> {
        if !(self.vertical_scale.is_finite() && self.vertical_scale > 0.0) {
            return Err(CameraError::InvalidParameter(
                "vertical_scale",
                self.vertical_scale,
            ));
        }
        if !(self.depth_scale_factor.is_finite() && self.depth_scale_factor > 0.0) {
            return Err(CameraError::InvalidParameter(
                "depth_scale_factor",
                self.depth_scale_factor,
            ));
        }
        let multiplier = self.remap.multiplier;
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(CameraError::InvalidParameter("multiplier", multiplier));
        }
        if let Some(curve) = &self.remap.curve {
            if !(curve.exponent.is_finite() && curve.exponent > 0.0) {
                return Err(CameraError::InvalidParameter("curve exponent", curve.exponent));
            }
        }
        Ok(())
    }

    #[inline]
    fn radius(&self, max_depth: f64, depth: f32) -> f64 {
        (max_depth - depth as f64 + self.remap.bias) * self.remap.multiplier * self.depth_scale_factor
    }

    /// Convert a color panorama and its depth map to a colored point cloud.
    ///
    /// One point is emitted per pixel whose final radius is positive and finite, in row-major
    /// order. Colors are the pixel values divided by 255.
    ///
    /// # Errors
    ///
    /// Fails if the images differ in size, have a zero dimension, or a parameter is out of range.
    pub fn unproject(
        &self,
        color: &ColorImage,
        depth: &DepthMap,
    ) -> Result<PointCloud, CameraError> {
        self.validate()?;

        if color.size() != depth.size() {
            return Err(CameraError::DimensionMismatch(color.size(), depth.size()));
        }
        if depth.size().is_empty() {
            return Err(CameraError::EmptyImage(depth.size()));
        }

        let Some((_, max_depth)) = depth.min_max() else {
            log::warn!("depth map has no finite values");
            return Ok(PointCloud::default());
        };
        let max_depth = max_depth as f64;

        let width = depth.width();
        let half_h = depth.height() as f64 / 2.0;

        let max_r = depth
            .as_slice()
            .par_iter()
            .map(|&d| self.radius(max_depth, d))
            .filter(|r| r.is_finite())
            .reduce(|| f64::NEG_INFINITY, f64::max);

        let curve = match self.remap.curve {
            Some(curve) if max_r > 0.0 => Some(curve),
            Some(_) => {
                log::debug!("skipping root scaling curve, max radius is {max_r}");
                None
            }
            None => None,
        };

        let azimuths = (0..width)
            .map(|x| {
                let theta = pixel_azimuth(x, width);
                (theta.sin(), theta.cos())
            })
            .collect::<Vec<_>>();

        let rows = depth
            .as_slice()
            .par_chunks_exact(width)
            .zip(color.as_slice().par_chunks_exact(width * 3))
            .enumerate()
            .map(|(y, (depth_row, color_row))| {
                let height = (y as f64 - half_h) * self.vertical_scale;
                let mut points = Vec::with_capacity(width);
                let mut colors = Vec::with_capacity(width);
                for (x, (&d, rgb)) in depth_row
                    .iter()
                    .zip(color_row.chunks_exact(3))
                    .enumerate()
                {
                    let r = self.radius(max_depth, d);
                    let r = match curve {
                        Some(curve) => curve.apply(r, max_r),
                        None => r,
                    };
                    if !(r.is_finite() && r > 0.0) {
                        continue;
                    }
                    let (sin, cos) = azimuths[x];
                    points.push([r * sin, height, r * cos]);
                    colors.push([
                        rgb[0] as f32 / 255.0,
                        rgb[1] as f32 / 255.0,
                        rgb[2] as f32 / 255.0,
                    ]);
                }
                (points, colors)
            })
            .collect::<Vec<_>>();

        let num_points = rows.iter().map(|(p, _)| p.len()).sum();
        let mut points = Vec::with_capacity(num_points);
        let mut colors = Vec::with_capacity(num_points);
        for (row_points, row_colors) in rows {
            points.extend(row_points);
            colors.extend(row_colors);
        }

        log::debug!(
            "unprojected {} of {} pixels",
            points.len(),
            depth.size().num_pixels()
        );

        Ok(PointCloud::new(points, Some(colors), None)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use panomesh_image::Image;

    fn solid_color(size: ImageSize, rgb: [u8; 3]) -> ColorImage {
        let data = (0..size.num_pixels()).flat_map(|_| rgb).collect();
        Image::new(size, data).unwrap_or_else(|_| Image::from_size_val(size, 0))
    }

    #[test]
    fn test_pixel_azimuth() {
        assert_relative_eq!(pixel_azimuth(0, 8), -FRAC_PI_2);
        assert_relative_eq!(pixel_azimuth(4, 8), 0.0);
        assert_relative_eq!(pixel_azimuth(8, 8), FRAC_PI_2);
    }

    #[test]
    fn test_constant_depth_solid_color() -> Result<(), Box<dyn std::error::Error>> {
        let size = ImageSize {
            width: 4,
            height: 4,
        };
        let color = solid_color(size, [255, 0, 0]);
        let depth = DepthMap::from_size_val(size, 2.0);

        let cloud = CylindricalUnprojector::default().unproject(&color, &depth)?;
        assert_eq!(cloud.len(), 16);

        let colors = cloud.colors().ok_or("missing colors")?;
        assert!(colors.iter().all(|c| *c == [1.0, 0.0, 0.0]));

        // r = 30 * 10 = 300, curve gives 300 * (1 + 0.7)
        let p = cloud.points()[2];
        assert_relative_eq!((p[0] * p[0] + p[2] * p[2]).sqrt(), 510.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_azimuth_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let size = ImageSize {
            width: 16,
            height: 3,
        };
        let color = solid_color(size, [10, 20, 30]);
        let depth = DepthMap::new(size, (0..48).map(|i| (i % 7) as f32).collect())?;

        let unprojector = CylindricalUnprojector {
            vertical_scale: 0.5,
            ..Default::default()
        };
        let cloud = unprojector.unproject(&color, &depth)?;
        assert_eq!(cloud.len(), 48);

        for (i, p) in cloud.points().iter().enumerate() {
            let (x, y) = (i % 16, i / 16);
            let theta = p[0].atan2(p[2]);
            assert!((-FRAC_PI_2..=FRAC_PI_2).contains(&theta));
            assert_relative_eq!(theta, pixel_azimuth(x, 16), epsilon = 1e-9);
            assert_relative_eq!(p[1], (y as f64 - 1.5) * 0.5);
        }
        Ok(())
    }

    #[test]
    fn test_zero_radius_dropped() -> Result<(), Box<dyn std::error::Error>> {
        let size = ImageSize {
            width: 3,
            height: 2,
        };
        let color = solid_color(size, [0, 0, 0]);
        let depth = DepthMap::new(size, vec![1.0, 5.0, 3.0, 5.0, 0.0, 2.0])?;

        let unprojector = CylindricalUnprojector {
            remap: DepthRemap {
                bias: 0.0,
                multiplier: 1.0,
                curve: None,
            },
            ..Default::default()
        };
        let cloud = unprojector.unproject(&color, &depth)?;
        // the two pixels at max depth have r = 0
        assert_eq!(cloud.len(), 4);

        let all_zero = DepthMap::from_size_val(size, 0.0);
        let cloud = unprojector.unproject(&color, &all_zero)?;
        assert!(cloud.is_empty());
        Ok(())
    }

    #[test]
    fn test_invalid_inputs() {
        let color = solid_color([4, 4].into(), [0, 0, 0]);
        let depth = DepthMap::from_size_val([4, 3].into(), 1.0);
        let unprojector = CylindricalUnprojector::default();
        assert!(matches!(
            unprojector.unproject(&color, &depth),
            Err(CameraError::DimensionMismatch(_, _))
        ));

        let empty_color = solid_color([0, 4].into(), [0, 0, 0]);
        let empty_depth = DepthMap::from_size_val([0, 4].into(), 1.0);
        assert!(matches!(
            unprojector.unproject(&empty_color, &empty_depth),
            Err(CameraError::EmptyImage(_))
        ));

        let bad = CylindricalUnprojector {
            vertical_scale: 0.0,
            ..Default::default()
        };
        let depth = DepthMap::from_size_val([4, 4].into(), 1.0);
        assert_eq!(
            bad.unproject(&color, &depth),
            Err(CameraError::InvalidParameter("vertical_scale", 0.0))
        );

        let negative = CylindricalUnprojector {
            remap: DepthRemap {
                multiplier: -10.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            negative.unproject(&color, &depth),
            Err(CameraError::InvalidParameter("multiplier", -10.0))
        );
    }
}
