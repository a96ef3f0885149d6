//! Finite element spaces on a mesh.
use crate::element::FiniteElementType;
use crate::error::unsupported;
use crate::mesh::{ItemKind, Mesh};
use crate::{Adjacency, Real};
use log::debug;
use std::sync::OnceLock;

pub mod dofmap;
mod interpolate;
mod reconstruction;

pub use dofmap::{resolve_dof_items, DofItem, DofItemMode};

/// A finite element space: an element family on a mesh together with its dof maps.
///
/// The dofs of vector-valued spaces are blocked by component, see
/// [`build_dof_maps`](dofmap::build_dof_maps).
#[derive(Debug)]
pub struct FiniteElementSpace<'a, T: Real> {
    mesh: &'a Mesh<T>,
    element: FiniteElementType,
    ncomponents: usize,
    num_dofs: usize,
    cell_dofs: Adjacency<usize>,
    face_dofs: Adjacency<usize>,
    boundary_face_dofs: Adjacency<usize>,
    reconstruction: OnceLock<Adjacency<T>>,
}

impl<'a, T: Real> FiniteElementSpace<'a, T> {
    pub fn new(mesh: &'a Mesh<T>, element: FiniteElementType) -> eyre::Result<Self> {
        let ncomponents = element.ncomponents(mesh.dim());
        if ncomponents == 0 {
            return Err(unsupported(format!("{element:?} with zero components")).into());
        }
        let maps = dofmap::build_dof_maps(mesh, &element)?;
        debug!(
            "Created {:?} space with {} dofs on {} cells",
            element,
            maps.num_dofs,
            mesh.num_cells()
        );
        Ok(Self {
            mesh,
            element,
            ncomponents,
            num_dofs: maps.num_dofs,
            cell_dofs: maps.cell_dofs,
            face_dofs: maps.face_dofs,
            boundary_face_dofs: maps.boundary_face_dofs,
            reconstruction: OnceLock::new(),
        })
    }

    pub fn mesh(&self) -> &'a Mesh<T> {
        self.mesh
    }

    pub fn element(&self) -> FiniteElementType {
        self.element
    }

    /// Number of components of the functions in the space.
    pub fn ncomponents(&self) -> usize {
        self.ncomponents
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn cell_dofs(&self, cell: usize) -> &[usize] {
        &self.cell_dofs[cell]
    }

    pub fn face_dofs(&self, face: usize) -> &[usize] {
        &self.face_dofs[face]
    }

    /// Dofs of the given boundary face, indexed by position in the mesh's boundary face list.
    pub fn boundary_face_dofs(&self, boundary_face: usize) -> &[usize] {
        &self.boundary_face_dofs[boundary_face]
    }

    /// Dofs of a cell or face.
    pub fn item_dofs(&self, kind: ItemKind, item: usize) -> &[usize] {
        match kind {
            ItemKind::Cell => self.cell_dofs(item),
            ItemKind::Face => self.face_dofs(item),
        }
    }

    /// The cell dof map.
    pub fn cell_dof_map(&self) -> &Adjacency<usize> {
        &self.cell_dofs
    }

    /// The face dof map.
    pub fn face_dof_map(&self) -> &Adjacency<usize> {
        &self.face_dofs
    }

    /// Coefficients of the local basis functions of a cell in terms of the local `HdivRT0`
    /// functions of the same cell, stored row-major with one row per local basis function and
    /// one column per local face.
    ///
    /// Coefficients are computed for all cells on first use.
    pub fn reconstruction_coefficients(&self, cell: usize) -> eyre::Result<&[T]> {
        if !self.element.has_reconstruction(self.mesh.dim()) {
            return Err(unsupported(format!(
                "reconstruction of {:?} in dimension {}",
                self.element,
                self.mesh.dim()
            ))
            .into());
        }
        let coefficients = self
            .reconstruction
            .get_or_init(|| reconstruction::compute_reconstruction(self.mesh, self.element));
        Ok(&coefficients[cell])
    }
}
