use rayon::prelude::*;

use super::grid::GridLayout;

/// Outcome of a conjugate gradient solve.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SolveStats {
    pub iterations: usize,
    pub relative_residual: f64,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.par_iter().zip(b.par_iter()).map(|(x, y)| x * y).sum()
}

/// Applies the negated 7-point Laplacian scaled by `h^2`, with zero values outside the grid.
///
/// `out[i] = 6 x[i] - sum(x[neighbours of i])`, symmetric positive definite.
pub(crate) fn apply_laplacian(grid: &GridLayout, x: &[f64], out: &mut [f64]) {
    let [nx, ny, nz] = grid.dims;
    let slice = nx * ny;

    out.par_chunks_mut(slice).enumerate().for_each(|(k, out_slice)| {
        for j in 0..ny {
            for i in 0..nx {
                let c = grid.index(i, j, k);
                let mut acc = 6.0 * x[c];
                if i > 0 {
                    acc -= x[c - 1];
                }
                if i + 1 < nx {
                    acc -= x[c + 1];
                }
                if j > 0 {
                    acc -= x[c - nx];
                }
                if j + 1 < ny {
                    acc -= x[c + nx];
                }
                if k > 0 {
                    acc -= x[c - slice];
                }
                if k + 1 < nz {
                    acc -= x[c + slice];
                }
                out_slice[i + nx * j] = acc;
            }
        }
    });
}

/// Solves `A x = b` for the operator of [`apply_laplacian`] with conjugate gradients.
///
/// Stops once `|r| <= tolerance * |b|` or after `max_iterations`.
pub(crate) fn conjugate_gradient(
    grid: &GridLayout,
    b: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> (Vec<f64>, SolveStats) {
    let n = b.len();
    let mut x = vec![0.0; n];
    let mut r = b.to_vec();
    let mut p = r.clone();
    let mut ap = vec![0.0; n];

    let b_norm = dot(b, b).sqrt();
    if b_norm == 0.0 {
        return (
            x,
            SolveStats {
                iterations: 0,
                relative_residual: 0.0,
            },
        );
    }

    let mut rs = dot(&r, &r);
    let mut iterations = 0;
    while iterations < max_iterations && rs.sqrt() > tolerance * b_norm {
        apply_laplacian(grid, &p, &mut ap);
        let p_ap = dot(&p, &ap);
        if p_ap <= 0.0 {
            break;
        }
        let alpha = rs / p_ap;

        x.par_iter_mut()
            .zip(p.par_iter())
            .for_each(|(xi, pi)| *xi += alpha * pi);
        r.par_iter_mut()
            .zip(ap.par_iter())
            .for_each(|(ri, api)| *ri -= alpha * api);

        let rs_next = dot(&r, &r);
        let beta = rs_next / rs;
        p.par_iter_mut()
            .zip(r.par_iter())
            .for_each(|(pi, ri)| *pi = ri + beta * *pi);
        rs = rs_next;
        iterations += 1;
    }

    (
        x,
        SolveStats {
            iterations,
            relative_residual: rs.sqrt() / b_norm,
        },
    )
}
