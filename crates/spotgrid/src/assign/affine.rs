//! Affine map from logical grid coordinates to image pixels.

use nalgebra::{DMatrix, Matrix2, Matrix2x3, Vector2};

/// Singular-value ratio below which the design matrix is treated as rank
/// deficient (collinear anchors).
const RANK_TOL: f64 = 1e-9;

/// `[row_px, col_px] = A * [grid_row, grid_col, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridAffine {
    m: Matrix2x3<f64>,
}

impl GridAffine {
    /// Axis-aligned grid of the given pitch centered on `center_px`.
    pub fn centered(
        center_px: [f64; 2],
        row_pitch_px: f64,
        col_pitch_px: f64,
        rows: usize,
        cols: usize,
    ) -> Self {
        let r0 = center_px[0] - 0.5 * (rows as f64 - 1.0) * row_pitch_px;
        let c0 = center_px[1] - 0.5 * (cols as f64 - 1.0) * col_pitch_px;
        Self {
            m: Matrix2x3::new(row_pitch_px, 0.0, r0, 0.0, col_pitch_px, c0),
        }
    }

    /// Least-squares fit from grid/image correspondences.
    ///
    /// Returns `None` with fewer than three correspondences or when the grid
    /// points are collinear.
    pub fn fit(grid: &[[f64; 2]], image: &[[f64; 2]]) -> Option<Self> {
        let n = grid.len();
        if n < 3 || image.len() != n {
            return None;
        }

        let design = DMatrix::from_fn(n, 3, |i, j| match j {
            0 => grid[i][0],
            1 => grid[i][1],
            _ => 1.0,
        });
        let target = DMatrix::from_fn(n, 2, |i, j| image[i][j]);

        let svd = design.svd(true, true);
        let sv = &svd.singular_values;
        let s_max = sv.max();
        if s_max <= 0.0 || sv.min() / s_max < RANK_TOL {
            return None;
        }
        let x = svd.solve(&target, 1e-12).ok()?;
        let m = Matrix2x3::from_fn(|i, j| x[(j, i)]);
        let out = Self { m };
        out.linear().try_inverse().map(|_| out)
    }

    fn linear(&self) -> Matrix2<f64> {
        self.m.fixed_view::<2, 2>(0, 0).into_owned()
    }

    fn translation(&self) -> Vector2<f64> {
        self.m.column(2).into_owned()
    }

    /// Grid coordinates to image `[row, col]`.
    pub fn apply(&self, grid: [f64; 2]) -> [f64; 2] {
        let p = self.linear() * Vector2::new(grid[0], grid[1]) + self.translation();
        [p[0], p[1]]
    }

    /// Image `[row, col]` back to continuous grid coordinates.
    pub fn invert(&self, image: [f64; 2]) -> Option<[f64; 2]> {
        let inv = self.linear().try_inverse()?;
        let g = inv * (Vector2::new(image[0], image[1]) - self.translation());
        Some([g[0], g[1]])
    }

    /// Pixel length of one grid step along rows and along columns.
    pub fn pitch_px(&self) -> [f64; 2] {
        let l = self.linear();
        [l.column(0).norm(), l.column(1).norm()]
    }

    /// Row-major `2x3` coefficients.
    pub fn to_array(&self) -> [[f64; 3]; 2] {
        [
            [self.m[(0, 0)], self.m[(0, 1)], self.m[(0, 2)]],
            [self.m[(1, 0)], self.m[(1, 1)], self.m[(1, 2)]],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rotated(theta: f64, pitch: f64, offset: [f64; 2]) -> impl Fn([f64; 2]) -> [f64; 2] {
        move |g| {
            let (s, c) = theta.sin_cos();
            [
                offset[0] + pitch * (c * g[0] - s * g[1]),
                offset[1] + pitch * (s * g[0] + c * g[1]),
            ]
        }
    }

    #[test]
    fn recovers_rotation_scale_translation() {
        let truth = rotated(0.08, 21.5, [40.0, 35.0]);
        let grid = [[0.0, 0.0], [0.0, 5.0], [7.0, 0.0], [7.0, 5.0], [3.0, 2.0]];
        let image: Vec<[f64; 2]> = grid.iter().map(|&g| truth(g)).collect();

        let a = GridAffine::fit(&grid, &image).expect("well posed");
        for g in [[1.0, 1.0], [6.0, 4.0], [2.5, 3.5]] {
            let p = a.apply(g);
            let q = truth(g);
            assert_relative_eq!(p[0], q[0], epsilon = 1e-9);
            assert_relative_eq!(p[1], q[1], epsilon = 1e-9);
            let back = a.invert(p).unwrap();
            assert_relative_eq!(back[0], g[0], epsilon = 1e-9);
            assert_relative_eq!(back[1], g[1], epsilon = 1e-9);
        }
        let pitch = a.pitch_px();
        assert_relative_eq!(pitch[0], 21.5, epsilon = 1e-9);
        assert_relative_eq!(pitch[1], 21.5, epsilon = 1e-9);
    }

    #[test]
    fn collinear_anchors_are_rejected() {
        let grid = [[0.0, 0.0], [0.0, 1.0], [0.0, 5.0]];
        let image = [[10.0, 10.0], [10.0, 30.0], [10.0, 110.0]];
        assert!(GridAffine::fit(&grid, &image).is_none());
        assert!(GridAffine::fit(&grid[..2], &image[..2]).is_none());
    }

    #[test]
    fn centered_grid_is_symmetric_about_center() {
        let a = GridAffine::centered([100.0, 80.0], 20.0, 24.0, 8, 6);
        assert_eq!(a.apply([0.0, 0.0]), [30.0, 20.0]);
        assert_eq!(a.apply([7.0, 5.0]), [170.0, 140.0]);
        assert_eq!(a.to_array()[0], [20.0, 0.0, 30.0]);
    }
}
