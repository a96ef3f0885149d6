//! Tensor product rules for the unit square and unit cube.
use crate::quadrature::univariate::Rule1d;

/// Outer product of a one-dimensional rule with itself, `dim` times.
///
/// Returns (weights, points) with points stored as consecutive `dim`-tuples. The first
/// coordinate varies fastest.
pub fn tensor_product(rule: &Rule1d, dim: usize) -> (Vec<f64>, Vec<f64>) {
    let (points_1d, weights_1d) = rule;
    let n = points_1d.len();
    let num_points = n.pow(dim as u32);

    let mut weights = Vec::with_capacity(num_points);
    let mut points = Vec::with_capacity(num_points * dim);
    for linear_index in 0..num_points {
        let mut remainder = linear_index;
        let mut weight = 1.0;
        for _ in 0..dim {
            let i = remainder % n;
            remainder /= n;
            weight *= weights_1d[i];
            points.push(points_1d[i]);
        }
        weights.push(weight);
    }
    (weights, points)
}
