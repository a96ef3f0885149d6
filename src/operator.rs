//! The catalog of function operators.
//!
//! Operators act on a field `u` with `n` components in `d` spatial dimensions. Matrix-valued
//! outputs are stored row by row: the gradient has entries `du_c / dx_i` at `c * d + i`, and
//! the Hessian has `d^2 u_c / dx_i dx_j` at `(c * d + i) * d + j`. A field with `d^2`
//! components is read as a `d x d` tensor stored row by row.
//!
//! Symmetric gradients use Voigt notation with engineering shear components, i.e.
//! `[e11, e22, 2 e12]` in 2D and `[e11, e22, e33, 2 e23, 2 e13, 2 e12]` in 3D.
use crate::error::AssemblyError;
use crate::geometry::ElementGeometry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionOperator {
    Identity,
    /// A single component of the field.
    IdentityComponent(usize),
    Gradient,
    /// Divergence of the field, or of each row of a tensor field.
    Divergence,
    /// Normal component of the field, or of each row of a tensor field, on a face.
    NormalFlux,
    /// Tangential component of a two-dimensional vector field on a face.
    TangentFlux,
    SymmetricGradient,
    /// Rotated gradient of a scalar field in 2D, scalar curl of a 2D vector field, or the curl
    /// of a 3D vector field.
    Curl,
    /// Trace of a tensor field.
    Trace,
    /// Deviatoric part of a tensor field.
    Deviator,
    /// Gradient projected onto the tangent plane of a face.
    TangentialGradient,
    /// Componentwise Laplacian.
    Laplacian,
    Hessian,
    /// Identity applied to the reconstruction of the field in the lowest order
    /// divergence-conforming space.
    ReconstructionIdentity,
    /// Divergence of the reconstruction of the field.
    ReconstructionDivergence,
}

impl FunctionOperator {
    /// Order of the reference basis derivatives the operator needs.
    pub fn derivative_order(&self) -> usize {
        use FunctionOperator::*;
        match self {
            Identity | IdentityComponent(_) | NormalFlux | TangentFlux | Trace | Deviator => 0,
            ReconstructionIdentity => 0,
            Gradient | Divergence | SymmetricGradient | Curl | TangentialGradient => 1,
            ReconstructionDivergence => 1,
            Laplacian | Hessian => 2,
        }
    }

    /// Change of the polynomial order of a field when the operator is applied.
    pub fn quadrature_shift(&self) -> i32 {
        -(self.derivative_order() as i32)
    }

    /// Quadrature order shift on items of the given geometry.
    ///
    /// Differentiation only lowers the polynomial order of functions on simplices. On
    /// quadrilaterals and hexahedra it does not lower the order in each coordinate direction.
    pub fn quadrature_shift_on(&self, geometry: ElementGeometry) -> i32 {
        if geometry.is_simplex() {
            self.quadrature_shift()
        } else {
            0
        }
    }

    pub fn is_reconstruction(&self) -> bool {
        matches!(self, Self::ReconstructionIdentity | Self::ReconstructionDivergence)
    }

    /// The operator applied after reconstruction, or the operator itself.
    pub fn base_operator(&self) -> FunctionOperator {
        match self {
            Self::ReconstructionIdentity => Self::Identity,
            Self::ReconstructionDivergence => Self::Divergence,
            other => *other,
        }
    }

    /// Whether the operator needs the normal of a face.
    pub fn needs_normal(&self) -> bool {
        matches!(self, Self::NormalFlux | Self::TangentFlux | Self::TangentialGradient)
    }

    /// Length of the operator output for a field with `ncomponents` components in `dim`
    /// spatial dimensions.
    ///
    /// Reconstruction operators act on the reconstructed field, which has `dim` components.
    pub fn output_len(&self, dim: usize, ncomponents: usize) -> eyre::Result<usize> {
        use FunctionOperator::*;
        let (d, n) = (dim, ncomponents);
        let invalid = || -> eyre::Report {
            AssemblyError::InvalidOperator {
                operator: *self,
                dim,
                ncomponents,
            }
            .into()
        };
        if d == 0 || d > 3 || n == 0 {
            return Err(invalid());
        }
        let len = match self {
            Identity => n,
            IdentityComponent(c) if *c < n => 1,
            Gradient | TangentialGradient => d * n,
            Divergence | NormalFlux if n % d == 0 => n / d,
            TangentFlux if d == 2 && n == 2 => 1,
            SymmetricGradient if n == d => d * (d + 1) / 2,
            Curl if d == 2 && n == 1 => 2,
            Curl if d == 2 && n == 2 => 1,
            Curl if d == 3 && n == 3 => 3,
            Trace if n == d * d => 1,
            Deviator if n == d * d => n,
            Laplacian => n,
            Hessian => d * d * n,
            ReconstructionIdentity => d,
            ReconstructionDivergence => 1,
            _ => return Err(invalid()),
        };
        Ok(len)
    }
}
