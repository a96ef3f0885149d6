use crate::operator::FunctionOperator;
use crate::Real;

/// Physical value and derivatives of a function with `ncomponents` components at a point.
///
/// Derivatives that were not requested are empty.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Jet<'a, T> {
    pub value: &'a [T],
    pub gradient: &'a [T],
    pub hessian: &'a [T],
}

/// Applies an operator to a jet and writes the result to `out`.
///
/// `normal` is the unit normal of the face being evaluated, if any. Operator and field shapes
/// must have been validated with [`FunctionOperator::output_len`], and reconstruction
/// operators must be resolved to their base operators beforehand.
pub(crate) fn apply_operator<T: Real>(
    operator: FunctionOperator,
    dim: usize,
    ncomponents: usize,
    jet: Jet<'_, T>,
    normal: Option<&[T]>,
    out: &mut [T],
) {
    use FunctionOperator::*;
    let d = dim;
    let n = ncomponents;
    let g = |c: usize, i: usize| jet.gradient[c * d + i];
    let normal = || normal.expect("Normal is available for operators that require it");
    match operator {
        Identity | ReconstructionIdentity => out[..n].copy_from_slice(&jet.value[..n]),
        IdentityComponent(c) => out[0] = jet.value[c],
        Gradient => out[..n * d].copy_from_slice(&jet.gradient[..n * d]),
        TangentialGradient => {
            let nrm = normal();
            for c in 0..n {
                let normal_derivative = (0..d).fold(T::zero(), |acc, j| acc + nrm[j] * g(c, j));
                for i in 0..d {
                    out[c * d + i] = g(c, i) - nrm[i] * normal_derivative;
                }
            }
        }
        Divergence | ReconstructionDivergence => {
            for r in 0..n / d {
                out[r] = (0..d).fold(T::zero(), |acc, i| acc + g(r * d + i, i));
            }
        }
        NormalFlux => {
            let nrm = normal();
            for r in 0..n / d {
                out[r] = (0..d).fold(T::zero(), |acc, i| acc + jet.value[r * d + i] * nrm[i]);
            }
        }
        TangentFlux => {
            // Tangent obtained by rotating the normal counter-clockwise
            let nrm = normal();
            out[0] = -jet.value[0] * nrm[1] + jet.value[1] * nrm[0];
        }
        SymmetricGradient => {
            if d == 1 {
                out[0] = g(0, 0);
            } else if d == 2 {
                out[0] = g(0, 0);
                out[1] = g(1, 1);
                out[2] = g(0, 1) + g(1, 0);
            } else {
                out[0] = g(0, 0);
                out[1] = g(1, 1);
                out[2] = g(2, 2);
                out[3] = g(1, 2) + g(2, 1);
                out[4] = g(0, 2) + g(2, 0);
                out[5] = g(0, 1) + g(1, 0);
            }
        }
        Curl => match (d, n) {
            (2, 1) => {
                out[0] = g(0, 1);
                out[1] = -g(0, 0);
            }
            (2, _) => out[0] = g(1, 0) - g(0, 1),
            _ => {
                out[0] = g(2, 1) - g(1, 2);
                out[1] = g(0, 2) - g(2, 0);
                out[2] = g(1, 0) - g(0, 1);
            }
        },
        Trace => out[0] = (0..d).fold(T::zero(), |acc, i| acc + jet.value[i * d + i]),
        Deviator => {
            let trace = (0..d).fold(T::zero(), |acc, i| acc + jet.value[i * d + i]);
            let mean = trace / T::from_usize(d).unwrap_or_else(T::one);
            out[..n].copy_from_slice(&jet.value[..n]);
            for i in 0..d {
                out[i * d + i] -= mean;
            }
        }
        Laplacian => {
            for c in 0..n {
                out[c] = (0..d).fold(T::zero(), |acc, i| acc + jet.hessian[(c * d + i) * d + i]);
            }
        }
        Hessian => out[..n * d * d].copy_from_slice(&jet.hessian[..n * d * d]),
    }
}
