//! Rules for the reference triangle and tetrahedron.
//!
//! Beyond a few low-order rules, simplex rules are Stroud conical products: the simplex is
//! parametrized by the collapsed coordinates `x = u`, `y = v (1 - u)`, `z = w (1 - u) (1 - v)`
//! over the unit cube, and the Jacobian factors `(1 - u)^2 (1 - v)` are absorbed into
//! Gauss-Jacobi rules in `u` and `v`.
use crate::quadrature::univariate::{gauss_jacobi, gauss_unit_interval, num_gauss_points, Rule1d};

/// Gauss-Jacobi rule with weight `(1 - u)^alpha` on `[0, 1]`.
fn collapsed_direction(num_points: usize, alpha: u32) -> Rule1d {
    let (points, weights) = gauss_jacobi(num_points, alpha, 0);
    let scale = 0.5f64.powi(alpha as i32 + 1);
    (
        points.iter().map(|t| 0.5 * (t + 1.0)).collect(),
        weights.iter().map(|w| scale * w).collect(),
    )
}

/// Returns (weights, points) with points stored as consecutive coordinate pairs.
pub fn triangle(order: usize) -> (Vec<f64>, Vec<f64>) {
    match order {
        0 | 1 => (vec![0.5], vec![1.0 / 3.0, 1.0 / 3.0]),
        2 => (vec![1.0 / 6.0; 3], vec![0.5, 0.0, 0.5, 0.5, 0.0, 0.5]),
        _ => {
            let n = num_gauss_points(order);
            let (u_points, u_weights) = collapsed_direction(n, 1);
            let (v_points, v_weights) = gauss_unit_interval(n);

            let mut weights = Vec::with_capacity(n * n);
            let mut points = Vec::with_capacity(2 * n * n);
            for (u, wu) in u_points.iter().zip(&u_weights) {
                for (v, wv) in v_points.iter().zip(&v_weights) {
                    weights.push(wu * wv);
                    points.extend([*u, v * (1.0 - u)]);
                }
            }
            (weights, points)
        }
    }
}

/// Returns (weights, points) with points stored as consecutive coordinate triplets.
pub fn tetrahedron(order: usize) -> (Vec<f64>, Vec<f64>) {
    match order {
        0 | 1 => (vec![1.0 / 6.0], vec![0.25, 0.25, 0.25]),
        _ => {
            let n = num_gauss_points(order);
            let (u_points, u_weights) = collapsed_direction(n, 2);
            let (v_points, v_weights) = collapsed_direction(n, 1);
            let (w_points, w_weights) = gauss_unit_interval(n);

            let mut weights = Vec::with_capacity(n * n * n);
            let mut points = Vec::with_capacity(3 * n * n * n);
            for (u, wu) in u_points.iter().zip(&u_weights) {
                for (v, wv) in v_points.iter().zip(&v_weights) {
                    for (w, ww) in w_points.iter().zip(&w_weights) {
                        weights.push(wu * wv * ww);
                        points.extend([*u, v * (1.0 - u), w * (1.0 - u) * (1.0 - v)]);
                    }
                }
            }
            (weights, points)
        }
    }
}
