use crate::element::{barycentric, BarycentricProduct, ReferenceBasis};
use crate::error::unsupported;
use crate::geometry::ElementGeometry;
use crate::Real;

/// Scale of the product of `n` barycentric coordinates so that it equals one at the barycenter.
fn bubble_scale(num_factors: usize) -> f64 {
    match num_factors {
        2 => 4.0,
        _ => 27.0,
    }
}

/// Face bubbles on a reference triangle or tetrahedron.
///
/// Function `j` is the product of the barycentric coordinates of the nodes of local face `j`,
/// scaled to one at the face barycenter. It vanishes on every other face.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FaceBubbleBasis {
    geometry: ElementGeometry,
}

impl FaceBubbleBasis {
    pub fn new(geometry: ElementGeometry) -> eyre::Result<Self> {
        match geometry {
            ElementGeometry::Triangle2D | ElementGeometry::Tetrahedron3D => Ok(Self { geometry }),
            _ => Err(unsupported(format!("face bubbles on {geometry:?}")).into()),
        }
    }

    fn bubble(&self, face: usize) -> BarycentricProduct<'static> {
        let factors = self.geometry.face_nodes()[face];
        BarycentricProduct {
            scale: bubble_scale(factors.len()),
            factors,
        }
    }
}

impl<T: Real> ReferenceBasis<T> for FaceBubbleBasis {
    fn geometry(&self) -> ElementGeometry {
        self.geometry
    }

    fn num_functions(&self) -> usize {
        self.geometry.num_faces()
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &[T]) {
        let lambda = barycentric(xi);
        for j in 0..self.geometry.num_faces() {
            basis_values[j] = self.bubble(j).value(&lambda);
        }
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [T], xi: &[T]) {
        let rdim = self.geometry.dim();
        let lambda = barycentric(xi);
        for j in 0..self.geometry.num_faces() {
            self.bubble(j)
                .gradient(&lambda, rdim, &mut basis_gradients[j * rdim..(j + 1) * rdim]);
        }
    }

    fn populate_basis_hessians(&self, basis_hessians: &mut [T], xi: &[T]) {
        let rdim = self.geometry.dim();
        let stride = rdim * rdim;
        let lambda = barycentric(xi);
        for j in 0..self.geometry.num_faces() {
            self.bubble(j)
                .hessian(&lambda, rdim, &mut basis_hessians[j * stride..(j + 1) * stride]);
        }
    }
}

/// The interior bubble of an edge or triangle, which is the trace of a face bubble on its face.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InteriorBubbleBasis {
    geometry: ElementGeometry,
}

const EDGE_BUBBLE: &[usize] = &[0, 1];
const TRIANGLE_BUBBLE: &[usize] = &[0, 1, 2];

impl InteriorBubbleBasis {
    pub fn new(geometry: ElementGeometry) -> eyre::Result<Self> {
        match geometry {
            ElementGeometry::Edge1D | ElementGeometry::Triangle2D => Ok(Self { geometry }),
            _ => Err(unsupported(format!("interior bubble on {geometry:?}")).into()),
        }
    }

    fn bubble(&self) -> BarycentricProduct<'static> {
        let factors = match self.geometry {
            ElementGeometry::Edge1D => EDGE_BUBBLE,
            _ => TRIANGLE_BUBBLE,
        };
        BarycentricProduct {
            scale: bubble_scale(factors.len()),
            factors,
        }
    }
}

impl<T: Real> ReferenceBasis<T> for InteriorBubbleBasis {
    fn geometry(&self) -> ElementGeometry {
        self.geometry
    }

    fn num_functions(&self) -> usize {
        1
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &[T]) {
        basis_values[0] = self.bubble().value(&barycentric(xi));
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [T], xi: &[T]) {
        let rdim = self.geometry.dim();
        self.bubble().gradient(&barycentric(xi), rdim, basis_gradients);
    }

    fn populate_basis_hessians(&self, basis_hessians: &mut [T], xi: &[T]) {
        let rdim = self.geometry.dim();
        self.bubble().hessian(&barycentric(xi), rdim, basis_hessians);
    }
}
