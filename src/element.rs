//! Finite element families and their reference bases.
//!
//! Reference bases are plain values with no mutable state: they evaluate basis functions and
//! their derivatives at a reference point into caller-provided buffers. Layouts are
//!
//! - values: `[function][value component]`,
//! - gradients: `[function][value component][reference direction]`,
//! - Hessians: `[function][value component][reference direction][reference direction]`.
use crate::error::{unsupported, AssemblyError};
use crate::geometry::ElementGeometry;
use crate::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

mod bernardi_raugel;
mod crouzeix_raviart;
mod lagrange;
mod raviart_thomas;

pub use bernardi_raugel::{FaceBubbleBasis, InteriorBubbleBasis};
pub use crouzeix_raviart::CrouzeixRaviartBasis;
pub use lagrange::LagrangeBasis;
pub use raviart_thomas::RaviartThomasBasis;

/// A basis on a reference element geometry.
pub trait ReferenceBasis<T: Real>: Debug + Send + Sync {
    fn geometry(&self) -> ElementGeometry;

    fn num_functions(&self) -> usize;

    /// Number of components of each basis function: 1 for scalar bases.
    fn value_len(&self) -> usize {
        1
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &[T]);

    fn populate_basis_gradients(&self, basis_gradients: &mut [T], xi: &[T]);

    fn populate_basis_hessians(&self, basis_hessians: &mut [T], xi: &[T]);
}

/// The single constant function on a geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ConstantBasis {
    geometry: ElementGeometry,
}

impl ConstantBasis {
    pub fn new(geometry: ElementGeometry) -> Self {
        Self { geometry }
    }
}

impl<T: Real> ReferenceBasis<T> for ConstantBasis {
    fn geometry(&self) -> ElementGeometry {
        self.geometry
    }

    fn num_functions(&self) -> usize {
        1
    }

    fn populate_basis(&self, basis_values: &mut [T], _xi: &[T]) {
        basis_values[0] = T::one();
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [T], _xi: &[T]) {
        basis_gradients.fill(T::zero());
    }

    fn populate_basis_hessians(&self, basis_hessians: &mut [T], _xi: &[T]) {
        basis_hessians.fill(T::zero());
    }
}

/// Barycentric coordinates of a point in a reference simplex, padded with zeros.
pub(crate) fn barycentric<T: Real>(xi: &[T]) -> [T; 4] {
    let mut lambda = [T::zero(); 4];
    lambda[0] = T::one();
    for (i, x) in xi.iter().enumerate() {
        lambda[0] -= *x;
        lambda[i + 1] = *x;
    }
    lambda
}

/// Partial derivative of barycentric coordinate `k` with respect to reference direction `i`.
pub(crate) fn barycentric_derivative<T: Real>(k: usize, i: usize) -> T {
    if k == 0 {
        -T::one()
    } else if k == i + 1 {
        T::one()
    } else {
        T::zero()
    }
}

/// A scaled product of distinct barycentric coordinates, `scale * prod_k lambda[factors[k]]`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BarycentricProduct<'a> {
    pub scale: f64,
    pub factors: &'a [usize],
}

impl<'a> BarycentricProduct<'a> {
    fn scale_factor<T: Real>(&self) -> T {
        nalgebra::convert(self.scale)
    }

    fn product_except<T: Real>(&self, lambda: &[T; 4], skip: &[usize]) -> T {
        self.factors
            .iter()
            .enumerate()
            .filter(|(k, _)| !skip.contains(k))
            .fold(T::one(), |acc, (_, &f)| acc * lambda[f])
    }

    pub fn value<T: Real>(&self, lambda: &[T; 4]) -> T {
        self.scale_factor::<T>() * self.product_except(lambda, &[])
    }

    pub fn gradient<T: Real>(&self, lambda: &[T; 4], rdim: usize, gradient: &mut [T]) {
        gradient[..rdim].fill(T::zero());
        for (k, &fk) in self.factors.iter().enumerate() {
            let others = self.scale_factor::<T>() * self.product_except(lambda, &[k]);
            for i in 0..rdim {
                gradient[i] += others * barycentric_derivative::<T>(fk, i);
            }
        }
    }

    pub fn hessian<T: Real>(&self, lambda: &[T; 4], rdim: usize, hessian: &mut [T]) {
        hessian[..rdim * rdim].fill(T::zero());
        for (k, &fk) in self.factors.iter().enumerate() {
            for (m, &fm) in self.factors.iter().enumerate() {
                if k == m {
                    continue;
                }
                let others = self.scale_factor::<T>() * self.product_except(lambda, &[k, m]);
                for i in 0..rdim {
                    for j in 0..rdim {
                        hessian[i * rdim + j] +=
                            others * barycentric_derivative::<T>(fk, i) * barycentric_derivative::<T>(fm, j);
                    }
                }
            }
        }
    }
}

/// The finite element families supported by the engine.
///
/// `H1BR` and `HdivRT0` are vector-valued with as many components as the spatial dimension.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FiniteElementType {
    /// Continuous piecewise linear functions on simplices.
    H1P1 { ncomponents: usize },
    /// Continuous piecewise quadratic functions on simplices.
    H1P2 { ncomponents: usize },
    /// Continuous piecewise (bi/tri)linear functions. Acts as `H1P1` on simplices.
    H1Q1 { ncomponents: usize },
    /// Discontinuous piecewise constants.
    L2P0 { ncomponents: usize },
    /// Nonconforming piecewise linear functions continuous at face midpoints.
    H1CR { ncomponents: usize },
    /// Vector-valued linear functions enriched with face bubbles scaled by face normals.
    H1BR,
    /// Lowest order Raviart-Thomas functions with unit flux through a single face.
    HdivRT0,
}

/// A group of local basis functions sharing a push-forward to physical space.
///
/// Local basis functions are ordered block by block.
#[derive(Debug)]
pub enum BasisBlock<T: Real> {
    /// Scalar functions replicated per component. Function `k` of component `c` has local
    /// index `c * num_functions + k` within the block.
    Componentwise {
        basis: Box<dyn ReferenceBasis<T>>,
        ncomponents: usize,
    },
    /// Vector functions mapped by the contravariant Piola transform and signed by the
    /// orientation of the face they are attached to.
    Piola { basis: Box<dyn ReferenceBasis<T>> },
    /// Scalar functions multiplied by the unit normal of the face they are attached to.
    NormalScaled { basis: Box<dyn ReferenceBasis<T>> },
    /// Normal flux density of a face-flux function on its own face.
    FluxDensity,
}

impl<T: Real> BasisBlock<T> {
    pub fn num_local(&self) -> usize {
        match self {
            Self::Componentwise { basis, ncomponents } => basis.num_functions() * ncomponents,
            Self::Piola { basis } | Self::NormalScaled { basis } => basis.num_functions(),
            Self::FluxDensity => 1,
        }
    }

    /// The reference basis, if the block has one.
    pub fn reference_basis(&self) -> Option<&dyn ReferenceBasis<T>> {
        match self {
            Self::Componentwise { basis, .. } | Self::Piola { basis } | Self::NormalScaled { basis } => {
                Some(basis.as_ref())
            }
            Self::FluxDensity => None,
        }
    }
}

fn unsupported_geometry(element: &FiniteElementType, geometry: ElementGeometry) -> eyre::Report {
    unsupported(format!("{element:?} is not available on {geometry:?}")).into()
}

impl FiniteElementType {
    /// Number of components of the functions in the space, in a mesh of the given dimension.
    pub fn ncomponents(&self, dim: usize) -> usize {
        use FiniteElementType::*;
        match *self {
            H1P1 { ncomponents } | H1P2 { ncomponents } | H1Q1 { ncomponents } | L2P0 { ncomponents } => ncomponents,
            H1CR { ncomponents } => ncomponents,
            H1BR | HdivRT0 => dim,
        }
    }

    /// Whether the element is defined on cells of the given geometry.
    pub fn supports(&self, geometry: ElementGeometry) -> bool {
        use ElementGeometry::*;
        use FiniteElementType::*;
        match self {
            H1Q1 { .. } | L2P0 { .. } => geometry != Vertex0D,
            H1P1 { .. } | H1P2 { .. } | H1CR { .. } => matches!(geometry, Edge1D | Triangle2D | Tetrahedron3D),
            H1BR | HdivRT0 => matches!(geometry, Triangle2D | Tetrahedron3D),
        }
    }

    /// The degree of freedom pattern on cells of the given geometry.
    ///
    /// Patterns are sequences of an entity letter followed by a count: `N` nodes, `E` edges,
    /// `F` faces and `I` the cell interior. Uppercase letters attach the given number of dofs
    /// per component, lowercase letters attach them once regardless of the component count.
    pub fn dof_pattern(&self, geometry: ElementGeometry) -> eyre::Result<&'static str> {
        use ElementGeometry::*;
        use FiniteElementType::*;
        if !self.supports(geometry) {
            return Err(unsupported_geometry(self, geometry));
        }
        Ok(match (self, geometry) {
            (H1P1 { .. } | H1Q1 { .. }, _) => "N1",
            (H1P2 { .. }, Edge1D) => "N1I1",
            (H1P2 { .. }, Triangle2D) => "N1F1",
            (H1P2 { .. }, _) => "N1E1",
            (L2P0 { .. }, _) => "I1",
            (H1CR { .. }, _) => "F1",
            (H1BR, _) => "N1f1",
            (HdivRT0, _) => "f1",
        })
    }

    /// Polynomial order of the element's functions in a mesh of dimension `dim`, on cells as
    /// well as on faces.
    ///
    /// For tensor product geometries this is the order in each coordinate direction.
    pub fn polynomial_order(&self, dim: usize) -> usize {
        use FiniteElementType::*;
        match self {
            H1P1 { .. } | H1Q1 { .. } | H1CR { .. } | HdivRT0 => 1,
            H1P2 { .. } => 2,
            L2P0 { .. } => 0,
            // Face bubbles are quadratic in 2D and cubic in 3D
            H1BR if dim == 3 => 3,
            H1BR => 2,
        }
    }

    /// Local basis blocks on cells of the given geometry.
    pub fn cell_blocks<T: Real>(&self, geometry: ElementGeometry, dim: usize) -> eyre::Result<Vec<BasisBlock<T>>> {
        use FiniteElementType::*;
        if !self.supports(geometry) {
            return Err(unsupported_geometry(self, geometry));
        }
        let ncomponents = self.ncomponents(dim);
        Ok(match self {
            H1P1 { .. } | H1Q1 { .. } => vec![BasisBlock::Componentwise {
                basis: Box::new(LagrangeBasis::linear(geometry)),
                ncomponents,
            }],
            H1P2 { .. } => vec![BasisBlock::Componentwise {
                basis: Box::new(LagrangeBasis::new(geometry, 2)?),
                ncomponents,
            }],
            L2P0 { .. } => vec![BasisBlock::Componentwise {
                basis: Box::new(ConstantBasis::new(geometry)),
                ncomponents,
            }],
            H1CR { .. } => vec![BasisBlock::Componentwise {
                basis: Box::new(CrouzeixRaviartBasis::new(geometry)?),
                ncomponents,
            }],
            H1BR => vec![
                BasisBlock::Componentwise {
                    basis: Box::new(LagrangeBasis::linear(geometry)),
                    ncomponents,
                },
                BasisBlock::NormalScaled {
                    basis: Box::new(FaceBubbleBasis::new(geometry)?),
                },
            ],
            HdivRT0 => vec![BasisBlock::Piola {
                basis: Box::new(RaviartThomasBasis::new(geometry)?),
            }],
        })
    }

    /// Local basis blocks for the trace of the element on its own face dofs.
    ///
    /// The trace of `H1CR` is represented by its face mean and `HdivRT0` only exposes its normal
    /// flux density. `L2P0` has no face dofs, so its trace is empty.
    pub fn trace_blocks<T: Real>(&self, face_geometry: ElementGeometry, dim: usize) -> eyre::Result<Vec<BasisBlock<T>>> {
        use FiniteElementType::*;
        if face_geometry.dim() + 1 != dim {
            return Err(AssemblyError::UnsupportedCombination(format!(
                "{face_geometry:?} is not a face geometry in dimension {dim}"
            ))
            .into());
        }
        let ncomponents = self.ncomponents(dim);
        Ok(match self {
            H1P1 { .. } | H1Q1 { .. } => vec![BasisBlock::Componentwise {
                basis: Box::new(LagrangeBasis::linear(face_geometry)),
                ncomponents,
            }],
            H1P2 { .. } => vec![BasisBlock::Componentwise {
                basis: Box::new(LagrangeBasis::new(face_geometry, 2)?),
                ncomponents,
            }],
            L2P0 { .. } => vec![],
            H1CR { .. } => vec![BasisBlock::Componentwise {
                basis: Box::new(ConstantBasis::new(face_geometry)),
                ncomponents,
            }],
            H1BR => vec![
                BasisBlock::Componentwise {
                    basis: Box::new(LagrangeBasis::linear(face_geometry)),
                    ncomponents,
                },
                BasisBlock::NormalScaled {
                    basis: Box::new(InteriorBubbleBasis::new(face_geometry)?),
                },
            ],
            HdivRT0 => vec![BasisBlock::FluxDensity],
        })
    }

    /// Whether the element supports reconstruction into `HdivRT0`.
    pub fn has_reconstruction(&self, dim: usize) -> bool {
        match self {
            Self::H1BR => true,
            Self::H1CR { ncomponents } => *ncomponents == dim && dim > 1,
            _ => false,
        }
    }
}

/// Mean value over its own face of the face bubble attached to a face of the given geometry.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub(crate) fn face_bubble_mean<T: Real>(face_geometry: ElementGeometry) -> T {
    match face_geometry {
        // 4 s (1 - s) averaged over the unit interval
        ElementGeometry::Edge1D => 2.0 / 3.0,
        // 27 l0 l1 l2 averaged over a triangle
        _ => 9.0 / 20.0,
    }
}
