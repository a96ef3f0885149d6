use crate::element::{face_bubble_mean, FiniteElementType};
use crate::mesh::Mesh;
use crate::{Adjacency, Real};
use log::trace;

/// Computes, for every cell, the fluxes of its local basis functions through its faces.
///
/// The coefficient of local function `i` for local face `j` is the integral of the normal
/// component of the function over the face, with respect to the face's mesh normal. The
/// reconstruction `sum_j C_ij psi_j` in terms of the `HdivRT0` functions `psi_j` then has the
/// same face fluxes as the function itself.
pub(crate) fn compute_reconstruction<T: Real>(mesh: &Mesh<T>, element: FiniteElementType) -> Adjacency<T> {
    let dim = mesh.dim();
    let mut result = Adjacency::new();
    for cell in 0..mesh.num_cells() {
        let geometry = mesh.cell_geometry(cell);
        let num_nodes = geometry.num_nodes();
        let num_faces = geometry.num_faces();
        let num_local = match element {
            FiniteElementType::H1BR => dim * num_nodes + num_faces,
            _ => dim * num_faces,
        };
        let mut coefficients = vec![T::zero(); num_local * num_faces];
        for (j, &face) in mesh.cell_faces(cell).iter().enumerate() {
            let normal = mesh.face_normal(face);
            let area = mesh.face_volume(face);
            match element {
                FiniteElementType::H1BR => {
                    let local_nodes = geometry.face_nodes()[j];
                    let node_share = area / T::from_usize(local_nodes.len()).unwrap_or_else(T::one);
                    for &a in local_nodes {
                        for c in 0..dim {
                            coefficients[(c * num_nodes + a) * num_faces + j] = normal[c] * node_share;
                        }
                    }
                    let face_geometry = mesh.face_geometry(face);
                    coefficients[(dim * num_nodes + j) * num_faces + j] = area * face_bubble_mean::<T>(face_geometry);
                }
                _ => {
                    for c in 0..dim {
                        coefficients[(c * num_faces + j) * num_faces + j] = normal[c] * area;
                    }
                }
            }
        }
        result.push(&coefficients);
    }
    trace!("Computed reconstruction coefficients for {} cells", mesh.num_cells());
    result
}
