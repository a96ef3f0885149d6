use crate::element::{barycentric, barycentric_derivative, ReferenceBasis};
use crate::error::unsupported;
use crate::geometry::ElementGeometry;
use crate::Real;
use nalgebra::convert;

/// Crouzeix-Raviart basis on a reference simplex.
///
/// Function `j` is `1 - d lambda_opp(j)`, where `opp(j)` is the node opposite to local face
/// `j`. It has mean value one on face `j` and mean value zero on every other face.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CrouzeixRaviartBasis {
    geometry: ElementGeometry,
}

impl CrouzeixRaviartBasis {
    pub fn new(geometry: ElementGeometry) -> eyre::Result<Self> {
        match geometry {
            ElementGeometry::Edge1D | ElementGeometry::Triangle2D | ElementGeometry::Tetrahedron3D => {
                Ok(Self { geometry })
            }
            _ => Err(unsupported(format!("Crouzeix-Raviart basis on {geometry:?}")).into()),
        }
    }

    fn opposite(&self, face: usize) -> usize {
        self.geometry
            .opposite_node(face)
            .expect("Simplex faces always have an opposite node")
    }
}

impl<T: Real> ReferenceBasis<T> for CrouzeixRaviartBasis {
    fn geometry(&self) -> ElementGeometry {
        self.geometry
    }

    fn num_functions(&self) -> usize {
        self.geometry.num_faces()
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &[T]) {
        let d: T = convert(self.geometry.dim() as f64);
        let lambda = barycentric(xi);
        for j in 0..self.geometry.num_faces() {
            basis_values[j] = T::one() - d * lambda[self.opposite(j)];
        }
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [T], _xi: &[T]) {
        let rdim = self.geometry.dim();
        let d: T = convert(rdim as f64);
        for j in 0..self.geometry.num_faces() {
            let opposite = self.opposite(j);
            for i in 0..rdim {
                basis_gradients[j * rdim + i] = -d * barycentric_derivative::<T>(opposite, i);
            }
        }
    }

    fn populate_basis_hessians(&self, basis_hessians: &mut [T], _xi: &[T]) {
        let rdim = self.geometry.dim();
        basis_hessians[..self.geometry.num_faces() * rdim * rdim].fill(T::zero());
    }
}
