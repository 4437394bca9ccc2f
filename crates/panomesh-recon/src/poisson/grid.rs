use glam::DVec3;

/// Regular grid of sample nodes, stored x fastest then y then z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GridLayout {
    pub origin: DVec3,
    pub spacing: f64,
    pub dims: [usize; 3],
}

impl GridLayout {
    /// Grid covering the cube around `min..max`, `2^depth` cells along the longest axis.
    ///
    /// The box is centred on the points and its side is the longest extent times `scale`.
    pub fn fit(min: DVec3, max: DVec3, depth: u32, scale: f64) -> Self {
        let extent = max - min;
        let side = extent.max_element().max(f64::EPSILON) * scale;
        let cells = 1usize << depth;
        let spacing = side / cells as f64;

        let center = (min + max) * 0.5;
        let dims = extent.to_array().map(|e| {
            // padded extent of this axis, at least one cell
            let axis_cells = ((e * scale) / spacing).ceil() as usize;
            axis_cells.clamp(1, cells) + 1
        });
        let half = DVec3::new(
            (dims[0] - 1) as f64,
            (dims[1] - 1) as f64,
            (dims[2] - 1) as f64,
        ) * spacing
            * 0.5;

        Self {
            origin: center - half,
            spacing,
            dims,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    #[inline]
    pub fn node_position(&self, x: usize, y: usize, z: usize) -> DVec3 {
        self.origin + DVec3::new(x as f64, y as f64, z as f64) * self.spacing
    }

    /// The 8 nodes around `p` with their trilinear weights, clamped to the grid.
    pub fn trilinear(&self, p: DVec3) -> [(usize, f64); 8] {
        let g = (p - self.origin) / self.spacing;
        let mut base = [0usize; 3];
        let mut frac = [0.0f64; 3];
        for axis in 0..3 {
            let max_cell = self.dims[axis].saturating_sub(2);
            let cell = g[axis].floor().clamp(0.0, max_cell as f64);
            base[axis] = cell as usize;
            frac[axis] = (g[axis] - cell).clamp(0.0, 1.0);
        }

        let weight = |f: f64, upper: usize| if upper == 1 { f } else { 1.0 - f };

        let mut out = [(0usize, 0.0f64); 8];
        for (k, entry) in out.iter_mut().enumerate() {
            let (dx, dy, dz) = (k & 1, (k >> 1) & 1, (k >> 2) & 1);
            let w = weight(frac[0], dx) * weight(frac[1], dy) * weight(frac[2], dz);
            let x = (base[0] + dx).min(self.dims[0] - 1);
            let y = (base[1] + dy).min(self.dims[1] - 1);
            let z = (base[2] + dz).min(self.dims[2] - 1);
            *entry = (self.index(x, y, z), w);
        }
        out
    }

    /// Trilinear interpolation of node `values` at `p`.
    pub fn sample(&self, values: &[f64], p: DVec3) -> f64 {
        self.trilinear(p)
            .iter()
            .map(|&(i, w)| values[i] * w)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_covers_points() {
        let min = DVec3::new(-1.0, 0.0, 2.0);
        let max = DVec3::new(3.0, 1.0, 4.0);
        let grid = GridLayout::fit(min, max, 4, 1.1);

        assert_eq!(grid.dims[0], 17);
        assert!(grid.dims[1] < grid.dims[0]);
        let far = grid.node_position(grid.dims[0] - 1, grid.dims[1] - 1, grid.dims[2] - 1);
        assert!(grid.origin.cmple(min).all());
        assert!(far.cmpge(max).all());
    }

    #[test]
    fn test_trilinear_weights() {
        let grid = GridLayout {
            origin: DVec3::ZERO,
            spacing: 1.0,
            dims: [3, 3, 3],
        };
        let weights = grid.trilinear(DVec3::new(0.5, 1.0, 0.25));
        assert_relative_eq!(weights.iter().map(|(_, w)| w).sum::<f64>(), 1.0);

        let values = (0..grid.num_nodes())
            .map(|i| {
                let x = i % 3;
                x as f64 * 2.0
            })
            .collect::<Vec<_>>();
        assert_relative_eq!(grid.sample(&values, DVec3::new(1.5, 0.3, 1.7)), 3.0);
        assert_relative_eq!(grid.sample(&values, DVec3::new(2.0, 2.0, 2.0)), 4.0);
    }
}
