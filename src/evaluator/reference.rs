use crate::element::{BasisBlock, LagrangeBasis, ReferenceBasis};
use crate::geometry::ElementGeometry;
use crate::quadrature::QuadratureRule;
use crate::Real;
use nalgebra::convert;

/// Reference values of a sequence of basis blocks at the points of a quadrature rule.
///
/// Per block and point, values are stored as `[function][value component]`, gradients as
/// `[function][value component][direction]` and Hessians as
/// `[function][value component][direction][direction]`.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceTable<T> {
    /// Points in the reference coordinates of the dof-item, stored back to back.
    pub points: Vec<T>,
    /// Per block, per point.
    pub values: Vec<Vec<Vec<T>>>,
    pub gradients: Vec<Vec<Vec<T>>>,
    pub hessians: Vec<Vec<Vec<T>>>,
}

impl<T: Real> ReferenceTable<T> {
    /// Tabulates the blocks at the given points, which have `rdim` coordinates each.
    pub fn tabulate(
        blocks: &[BasisBlock<T>],
        rdim: usize,
        num_points: usize,
        points: Vec<T>,
        derivative_order: usize,
    ) -> Self {
        let tabulate_with = |populate: &dyn Fn(&dyn ReferenceBasis<T>, &mut [T], &[T]), stride: usize| {
            blocks
                .iter()
                .map(|block| match block.reference_basis() {
                    Some(basis) => (0..num_points)
                        .map(|q| {
                            let len = basis.num_functions() * basis.value_len() * stride;
                            let mut buffer = vec![T::zero(); len];
                            populate(basis, &mut buffer, &points[q * rdim..(q + 1) * rdim]);
                            buffer
                        })
                        .collect(),
                    None => vec![Vec::new(); num_points],
                })
                .collect::<Vec<_>>()
        };
        let values = tabulate_with(&|basis, buffer, xi| basis.populate_basis(buffer, xi), 1);
        let gradients = if derivative_order >= 1 {
            tabulate_with(&|basis, buffer, xi| basis.populate_basis_gradients(buffer, xi), rdim)
        } else {
            Vec::new()
        };
        let hessians = if derivative_order >= 2 {
            tabulate_with(&|basis, buffer, xi| basis.populate_basis_hessians(buffer, xi), rdim * rdim)
        } else {
            Vec::new()
        };
        Self {
            points,
            values,
            gradients,
            hessians,
        }
    }

    pub fn point(&self, rdim: usize, q: usize) -> &[T] {
        &self.points[q * rdim..(q + 1) * rdim]
    }
}

/// Maps the points of a face rule into the reference coordinates of a cell.
///
/// `position` is `local_face * num_orientations + orientation`. A face point with face shape
/// function values `phi_k` maps to `sum_k phi_k X_{F[p[k]]}`, where `F` lists the nodes of the
/// local face and `p` is the orientation's permutation.
pub(crate) fn face_points_in_cell<T: Real>(
    cell_geometry: ElementGeometry,
    position: usize,
    face_rule: &QuadratureRule<T>,
) -> Vec<T> {
    let face_geometry = cell_geometry.face_geometry(0);
    let orientations = face_geometry.face_orientations();
    let (local_face, orientation) = (position / orientations.len(), position % orientations.len());
    let face_nodes = cell_geometry.face_nodes()[local_face];
    let permutation = orientations[orientation];
    let reference_nodes = cell_geometry.reference_nodes();
    let rdim = cell_geometry.dim();

    let face_basis = LagrangeBasis::linear(face_geometry);
    let mut shape_values = vec![T::zero(); face_geometry.num_nodes()];
    let mut points = Vec::with_capacity(face_rule.num_points() * rdim);
    for xi in face_rule.points() {
        face_basis.populate_basis(&mut shape_values, xi);
        for i in 0..rdim {
            let coordinate = shape_values
                .iter()
                .zip(permutation)
                .fold(T::zero(), |acc, (phi, &p)| {
                    let node_coordinate: T = convert(reference_nodes[face_nodes[p]][i]);
                    acc + *phi * node_coordinate
                });
            points.push(coordinate);
        }
    }
    points
}
