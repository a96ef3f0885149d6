//! One-dimensional Gauss rules.
//!
//! Rules are computed on `[-1, 1]` with the Golub-Welsch algorithm: the nodes of an `n`-point
//! Gauss rule for the weight `(1 - x)^alpha (1 + x)^beta` are the eigenvalues of the symmetric
//! tridiagonal Jacobi matrix of the associated orthogonal polynomials, and the weights follow
//! from the first components of the normalized eigenvectors.
use nalgebra::{DMatrix, SymmetricEigen};

/// Points and weights of a one-dimensional rule.
pub type Rule1d = (Vec<f64>, Vec<f64>);

/// Gauss-Jacobi rule on `[-1, 1]` with weight function `(1 - x)^alpha (1 + x)^beta`.
///
/// The `n`-point rule integrates `p(x) (1 - x)^alpha (1 + x)^beta` exactly for polynomials `p`
/// of degree up to `2 n - 1`. Points are returned in ascending order.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss_jacobi(num_points: usize, alpha: u32, beta: u32) -> Rule1d {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");
    let a = alpha as f64;
    let b = beta as f64;

    let mut jacobi_matrix = DMatrix::zeros(n, n);
    for i in 0..n {
        jacobi_matrix[(i, i)] = recurrence_diagonal(i, a, b);
        if i + 1 < n {
            let off_diagonal = recurrence_off_diagonal_squared(i + 1, a, b).sqrt();
            jacobi_matrix[(i, i + 1)] = off_diagonal;
            jacobi_matrix[(i + 1, i)] = off_diagonal;
        }
    }

    let mu0 = 2f64.powi((alpha + beta + 1) as i32) * factorial(alpha) * factorial(beta) / factorial(alpha + beta + 1);
    let eigen = SymmetricEigen::new(jacobi_matrix);

    let mut pairs: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let v0 = eigen.eigenvectors[(0, i)];
            (eigen.eigenvalues[i], mu0 * v0 * v0)
        })
        .collect();
    pairs.sort_by(|(x1, _), (x2, _)| x1.total_cmp(x2));
    pairs.into_iter().unzip()
}

/// Gauss-Legendre rule on `[-1, 1]`.
pub fn gauss(num_points: usize) -> Rule1d {
    gauss_jacobi(num_points, 0, 0)
}

/// Gauss-Legendre rule mapped to the unit interval `[0, 1]`, with weights summing to one.
pub fn gauss_unit_interval(num_points: usize) -> Rule1d {
    let (points, weights) = gauss(num_points);
    (
        points.iter().map(|x| 0.5 * (x + 1.0)).collect(),
        weights.iter().map(|w| 0.5 * w).collect(),
    )
}

/// Number of Gauss points needed to integrate polynomials of the given degree exactly.
pub fn num_gauss_points(order: usize) -> usize {
    (order + 2) / 2
}

fn recurrence_diagonal(i: usize, a: f64, b: f64) -> f64 {
    if i == 0 {
        (b - a) / (a + b + 2.0)
    } else {
        let s = 2.0 * i as f64 + a + b;
        (b * b - a * a) / (s * (s + 2.0))
    }
}

fn recurrence_off_diagonal_squared(n: usize, a: f64, b: f64) -> f64 {
    let n = n as f64;
    let s = 2.0 * n + a + b;
    4.0 * n * (n + a) * (n + b) * (n + a + b) / (s * s * (s + 1.0) * (s - 1.0))
}

fn factorial(k: u32) -> f64 {
    (1..=k).map(|i| i as f64).product()
}
