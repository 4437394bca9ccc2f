use std::num::NonZeroUsize;

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

/// A neighbour returned by a spatial query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Index of the point in the indexed slice.
    pub index: usize,
    /// Squared euclidean distance to the query.
    pub distance_sq: f64,
}

/// Immutable KD-tree over a set of 3D positions.
///
/// The index is built once and queried many times; it does not own the positions.
pub struct SpatialIndex {
    tree: Option<ImmutableKdTree<f64, u32, 3, 32>>,
    len: usize,
}

impl SpatialIndex {
    /// Build the index over `points`.
    ///
    /// Item ids are the positions' indices in `points`.
    pub fn new(points: &[[f64; 3]]) -> Self {
        let tree = if points.is_empty() {
            None
        } else {
            Some(ImmutableKdTree::new_from_slice(points))
        };
        Self {
            tree,
            len: points.len(),
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Find the nearest indexed point to `query`, `None` if the index is empty.
    pub fn nearest(&self, query: &[f64; 3]) -> Option<Neighbour> {
        let tree = self.tree.as_ref()?;
        let nn = tree.nearest_one::<SquaredEuclidean>(query);
        Some(Neighbour {
            index: nn.item as usize,
            distance_sq: nn.distance,
        })
    }

    /// Find the `k` nearest indexed points to `query`, sorted by increasing distance.
    pub fn knn(&self, query: &[f64; 3], k: usize) -> Vec<Neighbour> {
        let (Some(tree), Some(k)) = (self.tree.as_ref(), NonZeroUsize::new(k.min(self.len)))
        else {
            return Vec::new();
        };
        let mut neighbours = tree
            .nearest_n::<SquaredEuclidean>(query, k)
            .into_iter()
            .map(|nn| Neighbour {
                index: nn.item as usize,
                distance_sq: nn.distance,
            })
            .collect::<Vec<_>>();
        neighbours.sort_by(|a, b| a.distance_sq.total_cmp(&b.distance_sq));
        neighbours
    }

    /// Every indexed point within `radius` of `query`, in no particular order.
    pub fn within(&self, query: &[f64; 3], radius: f64) -> Vec<Neighbour> {
        let Some(tree) = self.tree.as_ref() else {
            return Vec::new();
        };
        tree.within_unsorted::<SquaredEuclidean>(query, radius * radius)
            .into_iter()
            .map(|nn| Neighbour {
                index: nn.item as usize,
                distance_sq: nn.distance,
            })
            .collect()
    }

    /// Hybrid search: at most `max_nn` nearest points that are within `radius` of `query`.
    pub fn radius_knn(&self, query: &[f64; 3], radius: f64, max_nn: usize) -> Vec<Neighbour> {
        let radius_sq = radius * radius;
        let mut neighbours = self.knn(query, max_nn);
        neighbours.retain(|nn| nn.distance_sq <= radius_sq);
        neighbours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_points() -> Vec<[f64; 3]> {
        (0..4)
            .flat_map(|i| (0..4).map(move |j| [i as f64, j as f64, 0.0]))
            .collect()
    }

    #[test]
    fn test_nearest() {
        let points = grid_points();
        let index = SpatialIndex::new(&points);
        assert_eq!(index.len(), 16);

        let nn = index.nearest(&[2.1, 0.9, 0.2]);
        assert_eq!(nn.map(|n| n.index), Some(9));
        if let Some(nn) = nn {
            assert_relative_eq!(nn.distance_sq, 0.06, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_knn_sorted() {
        let points = grid_points();
        let index = SpatialIndex::new(&points);

        let nns = index.knn(&[0.0, 0.0, 0.0], 3);
        assert_eq!(nns.len(), 3);
        assert_eq!(nns[0].index, 0);
        assert!(nns.windows(2).all(|w| w[0].distance_sq <= w[1].distance_sq));

        // asking for more than available returns everything
        assert_eq!(index.knn(&[0.0, 0.0, 0.0], 100).len(), 16);
    }

    #[test]
    fn test_radius_knn() {
        let points = grid_points();
        let index = SpatialIndex::new(&points);

        // the corner has two neighbours at distance 1 plus itself
        let nns = index.radius_knn(&[0.0, 0.0, 0.0], 1.0, 30);
        assert_eq!(nns.len(), 3);

        let nns = index.radius_knn(&[0.0, 0.0, 0.0], 10.0, 5);
        assert_eq!(nns.len(), 5);
    }

    #[test]
    fn test_within_is_unbounded() {
        let points = grid_points();
        let index = SpatialIndex::new(&points);

        let mut nns = index.within(&[1.0, 1.0, 0.0], 1.01);
        nns.sort_by_key(|nn| nn.index);
        let ids = nns.iter().map(|nn| nn.index).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 4, 5, 6, 9]);

        assert_eq!(index.within(&[1.5, 1.5, 0.0], 100.0).len(), 16);
        assert!(SpatialIndex::new(&[]).within(&[0.0; 3], 1.0).is_empty());
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::new(&[]);
        assert!(index.is_empty());
        assert_eq!(index.nearest(&[0.0, 0.0, 0.0]), None);
        assert!(index.knn(&[0.0, 0.0, 0.0], 4).is_empty());
    }

    #[test]
    fn test_many_coplanar_points() {
        // a full image row shares the same height
        let points = (0..2000)
            .map(|i| [i as f64 * 0.01, 0.0, 1.0])
            .collect::<Vec<_>>();
        let index = SpatialIndex::new(&points);
        let nn = index.nearest(&[5.0, 0.0, 1.0]);
        assert_eq!(nn.map(|n| n.index), Some(500));
    }
}
