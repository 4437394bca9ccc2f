use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::error::ReconstructionError;

/// Delaunay triangulation of 2D points.
///
/// Returns counter-clockwise triangles indexing into `points`. Duplicated points are merged into
/// their first occurrence so later copies are never referenced.
///
/// # Errors
///
/// Returns [`ReconstructionError::DegenerateGeometry`] for fewer than three points, points spade
/// rejects (non-finite or out of range) and layouts without any triangle, e.g. collinear points.
pub fn triangulate(points: &[[f64; 2]]) -> Result<Vec<[usize; 3]>, ReconstructionError> {
    if points.len() < 3 {
        return Err(ReconstructionError::DegenerateGeometry(format!(
            "{} points cannot form a triangle",
            points.len()
        )));
    }

    let mut triangulation = DelaunayTriangulation::<Point2<f64>>::new();

    // handle index -> first input index with that position
    let mut handle_to_point = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let handle = triangulation
            .insert(Point2::new(p[0], p[1]))
            .map_err(|e| ReconstructionError::DegenerateGeometry(format!("{e:?}")))?;
        if handle.index() == handle_to_point.len() {
            handle_to_point.push(i);
        }
    }

    let triangles = triangulation
        .inner_faces()
        .map(|face| {
            face.vertices()
                .map(|v| handle_to_point[v.fix().index()])
        })
        .collect::<Vec<_>>();

    if triangles.is_empty() {
        return Err(ReconstructionError::DegenerateGeometry(
            "all points are collinear".to_string(),
        ));
    }
    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square() -> Result<(), ReconstructionError> {
        let points = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let triangles = triangulate(&points)?;
        assert_eq!(triangles.len(), 2);
        for tri in &triangles {
            let [a, b, c] = tri.map(|i| points[i]);
            let area = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
            assert!(area > 0.0);
        }
        Ok(())
    }

    #[test]
    fn test_duplicates_are_not_referenced() -> Result<(), ReconstructionError> {
        let points = [[0.0, 0.0], [1.0, 0.0], [0.0, 0.0], [0.0, 1.0]];
        let triangles = triangulate(&points)?;
        assert_eq!(triangles.len(), 1);
        assert!(triangles[0].iter().all(|&i| i != 2));
        Ok(())
    }

    #[test]
    fn test_degenerate_inputs() {
        let collinear = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        assert!(matches!(
            triangulate(&collinear),
            Err(ReconstructionError::DegenerateGeometry(_))
        ));
        assert!(triangulate(&[[0.0, 0.0], [1.0, 0.0]]).is_err());
        assert!(triangulate(&[[0.0, 0.0], [1.0, 0.0], [f64::NAN, 1.0]]).is_err());
    }
}
