use crate::element::{barycentric, barycentric_derivative, BarycentricProduct, ReferenceBasis};
use crate::error::unsupported;
use crate::geometry::ElementGeometry;
use crate::Real;
use numeric_literals::replace_float_literals;

/// Nodal Lagrange basis on a reference geometry.
///
/// Degree 1 gives the linear basis on simplices and the (bi/tri)linear basis on quadrilaterals
/// and hexahedra, which also defines the reference maps of all geometries. Degree 2 is
/// available on simplices: node functions come first, followed by one function per edge
/// midpoint, ordered like the faces of a triangle, the edges of a tetrahedron, or the interior
/// of an edge.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LagrangeBasis {
    geometry: ElementGeometry,
    degree: usize,
}

// Midpoint functions 4 l_a l_b
const MIDPOINT_SCALE: f64 = 4.0;
const EDGE_MIDPOINTS: &[[usize; 2]] = &[[0, 1]];
const TRIANGLE_MIDPOINTS: &[[usize; 2]] = &[[0, 1], [1, 2], [2, 0]];

impl LagrangeBasis {
    pub fn new(geometry: ElementGeometry, degree: usize) -> eyre::Result<Self> {
        match degree {
            1 => Ok(Self::linear(geometry)),
            2 if geometry.is_simplex() => Ok(Self { geometry, degree }),
            _ => Err(unsupported(format!("Lagrange basis of degree {degree} on {geometry:?}")).into()),
        }
    }

    pub fn linear(geometry: ElementGeometry) -> Self {
        Self { geometry, degree: 1 }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    fn count(&self) -> usize {
        self.geometry.num_nodes() + self.midpoints().len()
    }

    /// Pairs of nodes whose midpoints carry the quadratic functions.
    pub(crate) fn midpoints(&self) -> &'static [[usize; 2]] {
        use ElementGeometry::*;
        match (self.degree, self.geometry) {
            (2, Edge1D) => EDGE_MIDPOINTS,
            (2, Triangle2D) => TRIANGLE_MIDPOINTS,
            (2, Tetrahedron3D) => self.geometry.edge_nodes(),
            _ => &[],
        }
    }

    /// Tensor product factors of a (bi/tri)linear node function: `x` if the node coordinate is
    /// one, `1 - x` otherwise.
    fn tensor_factor<T: Real>(node: &[f64; 3], i: usize, xi: &[T]) -> (T, T) {
        if node[i] > 0.5 {
            (xi[i], T::one())
        } else {
            (T::one() - xi[i], -T::one())
        }
    }
}

impl<T: Real> ReferenceBasis<T> for LagrangeBasis {
    fn geometry(&self) -> ElementGeometry {
        self.geometry
    }

    fn num_functions(&self) -> usize {
        self.count()
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn populate_basis(&self, basis_values: &mut [T], xi: &[T]) {
        let rdim = self.geometry.dim();
        if self.geometry.is_simplex() {
            let lambda = barycentric(xi);
            let num_nodes = self.geometry.num_nodes();
            for a in 0..num_nodes {
                basis_values[a] = match self.degree {
                    1 => lambda[a],
                    _ => lambda[a] * (2.0 * lambda[a] - 1.0),
                };
            }
            for (e, pair) in self.midpoints().iter().enumerate() {
                basis_values[num_nodes + e] = BarycentricProduct {
                    scale: MIDPOINT_SCALE,
                    factors: pair,
                }
                .value(&lambda);
            }
        } else {
            for (a, node) in self.geometry.reference_nodes().iter().enumerate() {
                basis_values[a] = (0..rdim).fold(1.0, |acc, i| acc * Self::tensor_factor(node, i, xi).0);
            }
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn populate_basis_gradients(&self, basis_gradients: &mut [T], xi: &[T]) {
        let rdim = self.geometry.dim();
        if self.geometry.is_simplex() {
            let lambda = barycentric(xi);
            let num_nodes = self.geometry.num_nodes();
            for a in 0..num_nodes {
                let factor = match self.degree {
                    1 => 1.0,
                    _ => 4.0 * lambda[a] - 1.0,
                };
                for i in 0..rdim {
                    basis_gradients[a * rdim + i] = factor * barycentric_derivative::<T>(a, i);
                }
            }
            for (e, pair) in self.midpoints().iter().enumerate() {
                let offset = (num_nodes + e) * rdim;
                BarycentricProduct {
                    scale: MIDPOINT_SCALE,
                    factors: pair,
                }
                .gradient(&lambda, rdim, &mut basis_gradients[offset..offset + rdim]);
            }
        } else {
            for (a, node) in self.geometry.reference_nodes().iter().enumerate() {
                for i in 0..rdim {
                    basis_gradients[a * rdim + i] = (0..rdim).fold(1.0, |acc, k| {
                        let (value, derivative) = Self::tensor_factor(node, k, xi);
                        acc * if k == i { derivative } else { value }
                    });
                }
            }
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn populate_basis_hessians(&self, basis_hessians: &mut [T], xi: &[T]) {
        let rdim = self.geometry.dim();
        let stride = rdim * rdim;
        basis_hessians[..self.count() * stride].fill(0.0);
        if self.geometry.is_simplex() {
            if self.degree == 1 {
                return;
            }
            let lambda = barycentric(xi);
            let num_nodes = self.geometry.num_nodes();
            for a in 0..num_nodes {
                for i in 0..rdim {
                    for j in 0..rdim {
                        basis_hessians[a * stride + i * rdim + j] =
                            4.0 * barycentric_derivative::<T>(a, i) * barycentric_derivative::<T>(a, j);
                    }
                }
            }
            for (e, pair) in self.midpoints().iter().enumerate() {
                let offset = (num_nodes + e) * stride;
                BarycentricProduct {
                    scale: MIDPOINT_SCALE,
                    factors: pair,
                }
                .hessian(&lambda, rdim, &mut basis_hessians[offset..offset + stride]);
            }
        } else {
            // Only mixed second derivatives of multilinear functions are nonzero
            for (a, node) in self.geometry.reference_nodes().iter().enumerate() {
                for i in 0..rdim {
                    for j in 0..rdim {
                        if i == j {
                            continue;
                        }
                        basis_hessians[a * stride + i * rdim + j] = (0..rdim).fold(1.0, |acc, k| {
                            let (value, derivative) = Self::tensor_factor(node, k, xi);
                            acc * if k == i || k == j { derivative } else { value }
                        });
                    }
                }
            }
        }
    }
}
