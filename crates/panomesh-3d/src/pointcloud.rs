use glam::DVec3;

/// Error types for point cloud construction.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PointCloudError {
    /// The number of colors does not match the number of points.
    #[error("Number of colors ({0}) does not match the number of points ({1})")]
    ColorCountMismatch(usize, usize),

    /// The number of normals does not match the number of points.
    #[error("Number of normals ({0}) does not match the number of points ({1})")]
    NormalCountMismatch(usize, usize),
}

/// A point cloud with points, colors, and normals.
///
/// Colors are linear RGB in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[f32; 3]>>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points, colors (optional), and normals (optional).
    ///
    /// # Errors
    ///
    /// Returns an error if colors or normals are present with a length different from `points`.
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[f32; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Result<Self, PointCloudError> {
        if let Some(colors) = &colors {
            if colors.len() != points.len() {
                return Err(PointCloudError::ColorCountMismatch(
                    colors.len(),
                    points.len(),
                ));
            }
        }
        if let Some(normals) = &normals {
            if normals.len() != points.len() {
                return Err(PointCloudError::NormalCountMismatch(
                    normals.len(),
                    points.len(),
                ));
            }
        }
        Ok(Self {
            points,
            colors,
            normals,
        })
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[f32; 3]]> {
        self.colors.as_deref()
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&[[f64; 3]]> {
        self.normals.as_deref()
    }

    /// Replace the normals of the point cloud.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of normals differs from the number of points.
    pub fn set_normals(&mut self, normals: Vec<[f64; 3]>) -> Result<(), PointCloudError> {
        if normals.len() != self.points.len() {
            return Err(PointCloudError::NormalCountMismatch(
                normals.len(),
                self.points.len(),
            ));
        }
        self.normals = Some(normals);
        Ok(())
    }

    /// Get the minimum bound of the point cloud.
    pub fn get_min_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(DVec3::min)
            .unwrap_or(DVec3::ZERO)
    }

    /// Get the maximum bound of the point cloud.
    pub fn get_max_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(DVec3::max)
            .unwrap_or(DVec3::ZERO)
    }
}
