use crate::element::ReferenceBasis;
use crate::error::unsupported;
use crate::geometry::ElementGeometry;
use crate::Real;
use numeric_literals::replace_float_literals;

/// Lowest order Raviart-Thomas basis on the reference triangle or tetrahedron.
///
/// Function `j` is `c (x - p_j)`, where `p_j` is the node opposite to local face `j` and `c`
/// is chosen so that the outward flux through face `j` is one. The flux through every other
/// face vanishes since `p_j` lies in their planes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RaviartThomasBasis {
    geometry: ElementGeometry,
}

impl RaviartThomasBasis {
    pub fn new(geometry: ElementGeometry) -> eyre::Result<Self> {
        match geometry {
            ElementGeometry::Triangle2D | ElementGeometry::Tetrahedron3D => Ok(Self { geometry }),
            _ => Err(unsupported(format!("Raviart-Thomas basis on {geometry:?}")).into()),
        }
    }

    /// The scaling `1 / (d |T|)` of the reference cell `T`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn scale<T: Real>(&self) -> T {
        match self.geometry {
            ElementGeometry::Triangle2D => 1.0,
            _ => 2.0,
        }
    }

    fn opposite_node(&self, face: usize) -> [f64; 3] {
        let node = self
            .geometry
            .opposite_node(face)
            .expect("Simplex faces always have an opposite node");
        self.geometry.reference_nodes()[node]
    }
}

impl<T: Real> ReferenceBasis<T> for RaviartThomasBasis {
    fn geometry(&self) -> ElementGeometry {
        self.geometry
    }

    fn num_functions(&self) -> usize {
        self.geometry.num_faces()
    }

    fn value_len(&self) -> usize {
        self.geometry.dim()
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &[T]) {
        let d = self.geometry.dim();
        let c = self.scale::<T>();
        for j in 0..self.geometry.num_faces() {
            let p = self.opposite_node(j);
            for a in 0..d {
                let p_a: T = nalgebra::convert(p[a]);
                basis_values[j * d + a] = c * (xi[a] - p_a);
            }
        }
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [T], _xi: &[T]) {
        let d = self.geometry.dim();
        let c = self.scale::<T>();
        for j in 0..self.geometry.num_faces() {
            for a in 0..d {
                for i in 0..d {
                    basis_gradients[(j * d + a) * d + i] = if a == i { c } else { T::zero() };
                }
            }
        }
    }

    fn populate_basis_hessians(&self, basis_hessians: &mut [T], _xi: &[T]) {
        let d = self.geometry.dim();
        basis_hessians[..self.geometry.num_faces() * d * d * d].fill(T::zero());
    }
}
