use rayon::prelude::*;

use crate::mesh::Mesh;
use crate::pointcloud::PointCloud;
use crate::spatial::SpatialIndex;

/// Error types for color transfer.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ColorTransferError {
    /// The source point cloud has no colors.
    #[error("Source point cloud has no colors")]
    MissingColors,

    /// The source point cloud is empty.
    #[error("Source point cloud is empty")]
    EmptySource,
}

/// Assigns mesh vertices the color of their nearest source point.
///
/// No blending is done: every vertex takes exactly one source color.
pub struct ColorTransfer<'a> {
    index: SpatialIndex,
    colors: &'a [[f32; 3]],
}

impl<'a> ColorTransfer<'a> {
    /// Index the colored source point cloud.
    pub fn new(source: &'a PointCloud) -> Result<Self, ColorTransferError> {
        let colors = source.colors().ok_or(ColorTransferError::MissingColors)?;
        if source.is_empty() {
            return Err(ColorTransferError::EmptySource);
        }
        Ok(Self {
            index: SpatialIndex::new(source.points()),
            colors,
        })
    }

    /// Color of the source point nearest to `position`.
    pub fn color_at(&self, position: &[f64; 3]) -> Option<[f32; 3]> {
        self.index
            .nearest(position)
            .and_then(|nn| self.colors.get(nn.index).copied())
    }

    /// Overwrite the vertex colors of `mesh`.
    pub fn apply(&self, mesh: &mut Mesh) {
        let colors = mesh
            .vertices
            .par_iter()
            .map(|v| self.color_at(v).unwrap_or_default())
            .collect::<Vec<_>>();
        log::debug!("transferred colors to {} vertices", colors.len());
        mesh.vertex_colors = Some(colors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcloud::PointCloudError;
    use rand::Rng;

    #[test]
    fn test_single_color_source() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = rand::rng();
        let points = (0..200)
            .map(|_| {
                [
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                ]
            })
            .collect::<Vec<_>>();
        let color = [0.2, 0.4, 0.6];
        let cloud = PointCloud::new(points, Some(vec![color; 200]), None)?;

        let mut mesh = Mesh::new(
            vec![[0.0, 0.0, 0.0], [5.0, 5.0, 5.0], [-3.0, 0.5, 0.0]],
            vec![[0, 1, 2]],
        );
        ColorTransfer::new(&cloud)?.apply(&mut mesh);

        let colors = mesh.vertex_colors.ok_or("missing colors")?;
        assert!(colors.iter().all(|c| *c == color));
        Ok(())
    }

    #[test]
    fn test_nearest_color() -> Result<(), PointCloudError> {
        let cloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]],
            Some(vec![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]),
            None,
        )?;
        let transfer = ColorTransfer::new(&cloud);
        assert!(transfer.is_ok());
        if let Ok(transfer) = transfer {
            assert_eq!(transfer.color_at(&[1.0, 1.0, 0.0]), Some([1.0, 0.0, 0.0]));
            assert_eq!(transfer.color_at(&[8.0, 0.0, 0.0]), Some([0.0, 0.0, 1.0]));
        }
        Ok(())
    }

    #[test]
    fn test_invalid_sources() -> Result<(), PointCloudError> {
        let uncolored = PointCloud::new(vec![[0.0; 3]], None, None)?;
        assert_eq!(
            ColorTransfer::new(&uncolored).err(),
            Some(ColorTransferError::MissingColors)
        );
        let empty = PointCloud::new(vec![], Some(vec![]), None)?;
        assert_eq!(
            ColorTransfer::new(&empty).err(),
            Some(ColorTransferError::EmptySource)
        );
        Ok(())
    }
}
