//! Read-only mesh view consumed by the assembly engine.
//!
//! The engine does not construct mesh topology. A [`Mesh`] is assembled from [`MeshParts`]
//! provided by a mesh generator, and validated once. Conventions:
//!
//! - local face `j` of a cell corresponds to `geometry.face_nodes()[j]`, and the global face at
//!   position `j` of the cell's face list is that face;
//! - the normal of a face points out of the first cell in its face-to-cell adjacency, and the
//!   cell-face signs are `+1` for that cell and `-1` for the second cell;
//! - in three dimensions, edge `k` of a face joins face nodes `k` and `k + 1`, and the edges of
//!   a cell are ordered like `geometry.edge_nodes()`.
use crate::error::AssemblyError;
use crate::geometry::ElementGeometry;
use crate::{Adjacency, Real};
use nalgebra::{DMatrix, DVectorView};
use serde::{Deserialize, Serialize};

/// The kind of mesh entity an assembly item refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Cell,
    Face,
}

/// Raw mesh data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshParts<T: Real> {
    /// Node coordinates, one column per node.
    pub coords: DMatrix<T>,
    pub cell_nodes: Adjacency<usize>,
    pub cell_geometries: Vec<ElementGeometry>,
    pub cell_regions: Vec<usize>,
    pub cell_volumes: Vec<T>,
    pub cell_faces: Adjacency<usize>,
    pub cell_face_signs: Adjacency<i8>,
    /// Edges of each cell. Empty unless the mesh is three-dimensional.
    pub cell_edges: Adjacency<usize>,
    pub face_nodes: Adjacency<usize>,
    pub face_geometries: Vec<ElementGeometry>,
    pub face_regions: Vec<usize>,
    pub face_volumes: Vec<T>,
    /// Unit face normals, one column per face.
    pub face_normals: DMatrix<T>,
    pub face_cells: Vec<(usize, Option<usize>)>,
    /// Edges of each face. Empty unless the mesh is three-dimensional.
    pub face_edges: Adjacency<usize>,
    /// Nodes of each edge. Empty unless the mesh is three-dimensional.
    pub edge_nodes: Adjacency<usize>,
    /// Indices of the faces on the boundary.
    pub boundary_faces: Vec<usize>,
    pub boundary_regions: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh<T: Real> {
    parts: MeshParts<T>,
}

fn invalid(description: String) -> eyre::Report {
    AssemblyError::InvalidMesh(description).into()
}

fn check_len(what: &str, expected: usize, actual: usize) -> eyre::Result<()> {
    if expected != actual {
        return Err(invalid(format!("expected {expected} entries in {what}, found {actual}")));
    }
    Ok(())
}

fn check_indices<'a>(what: &str, indices: impl IntoIterator<Item = &'a usize>, bound: usize) -> eyre::Result<()> {
    if let Some(index) = indices.into_iter().find(|&&index| index >= bound) {
        return Err(invalid(format!("{what} references index {index}, but only {bound} exist")));
    }
    Ok(())
}

impl<T: Real> Mesh<T> {
    /// Validates the given parts and constructs a mesh.
    pub fn from_parts(parts: MeshParts<T>) -> eyre::Result<Self> {
        let dim = parts.coords.nrows();
        if !(1..=3).contains(&dim) {
            return Err(invalid(format!("spatial dimension {dim} is not supported")));
        }
        let num_nodes = parts.coords.ncols();
        let num_cells = parts.cell_nodes.len();
        let num_faces = parts.face_nodes.len();

        check_len("cell geometries", num_cells, parts.cell_geometries.len())?;
        check_len("cell regions", num_cells, parts.cell_regions.len())?;
        check_len("cell volumes", num_cells, parts.cell_volumes.len())?;
        check_len("cell faces", num_cells, parts.cell_faces.len())?;
        check_len("cell face signs", num_cells, parts.cell_face_signs.len())?;
        check_len("face geometries", num_faces, parts.face_geometries.len())?;
        check_len("face regions", num_faces, parts.face_regions.len())?;
        check_len("face volumes", num_faces, parts.face_volumes.len())?;
        check_len("face normals", num_faces, parts.face_normals.ncols())?;
        check_len("face normal components", dim, parts.face_normals.nrows())?;
        check_len("face cells", num_faces, parts.face_cells.len())?;
        check_len("boundary regions", parts.boundary_faces.len(), parts.boundary_regions.len())?;

        check_indices("cell nodes", parts.cell_nodes.iter_entries(), num_nodes)?;
        check_indices("cell faces", parts.cell_faces.iter_entries(), num_faces)?;
        check_indices("face nodes", parts.face_nodes.iter_entries(), num_nodes)?;
        check_indices("boundary faces", &parts.boundary_faces, num_faces)?;
        check_indices(
            "face cells",
            parts
                .face_cells
                .iter()
                .flat_map(|(first, second)| std::iter::once(first).chain(second)),
            num_cells,
        )?;

        for (cell, geometry) in parts.cell_geometries.iter().enumerate() {
            if !ElementGeometry::cell_geometries(dim).contains(geometry) {
                return Err(invalid(format!("cell {cell} has geometry {geometry:?} in a {dim}D mesh")));
            }
            check_len("nodes of a cell", geometry.num_nodes(), parts.cell_nodes[cell].len())?;
            check_len("faces of a cell", geometry.num_faces(), parts.cell_faces[cell].len())?;
            check_len("face signs of a cell", geometry.num_faces(), parts.cell_face_signs[cell].len())?;
        }
        for (face, geometry) in parts.face_geometries.iter().enumerate() {
            if geometry.dim() + 1 != dim {
                return Err(invalid(format!("face {face} has geometry {geometry:?} in a {dim}D mesh")));
            }
            check_len("nodes of a face", geometry.num_nodes(), parts.face_nodes[face].len())?;
        }
        for (face, (first, second)) in parts.face_cells.iter().enumerate() {
            for &cell in std::iter::once(first).chain(second) {
                if !parts.cell_faces[cell].contains(&face) {
                    return Err(invalid(format!("face {face} is adjacent to cell {cell}, but not listed among its faces")));
                }
            }
        }
        for (cell, (faces, signs)) in parts.cell_faces.iter().zip(parts.cell_face_signs.iter()).enumerate() {
            for (&face, &sign) in faces.iter().zip(signs) {
                let expected = match parts.face_cells[face] {
                    (first, _) if first == cell => 1,
                    (_, Some(second)) if second == cell => -1,
                    _ => {
                        return Err(invalid(format!("cell {cell} lists face {face}, which is not adjacent to it")));
                    }
                };
                if sign != expected {
                    return Err(invalid(format!(
                        "face {face} has sign {sign} in cell {cell}, expected {expected}"
                    )));
                }
            }
        }
        for &face in &parts.boundary_faces {
            if parts.face_cells[face].1.is_some() {
                return Err(invalid(format!("boundary face {face} has two adjacent cells")));
            }
        }

        if dim == 3 {
            let num_edges = parts.edge_nodes.len();
            check_len("cell edges", num_cells, parts.cell_edges.len())?;
            check_len("face edges", num_faces, parts.face_edges.len())?;
            check_indices("cell edges", parts.cell_edges.iter_entries(), num_edges)?;
            check_indices("face edges", parts.face_edges.iter_entries(), num_edges)?;
            check_indices("edge nodes", parts.edge_nodes.iter_entries(), num_nodes)?;
            for (cell, geometry) in parts.cell_geometries.iter().enumerate() {
                check_len("edges of a cell", geometry.num_edges(), parts.cell_edges[cell].len())?;
            }
        }

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &MeshParts<T> {
        &self.parts
    }

    pub fn into_parts(self) -> MeshParts<T> {
        self.parts
    }

    /// Spatial dimension.
    pub fn dim(&self) -> usize {
        self.parts.coords.nrows()
    }

    pub fn num_nodes(&self) -> usize {
        self.parts.coords.ncols()
    }

    pub fn num_cells(&self) -> usize {
        self.parts.cell_nodes.len()
    }

    pub fn num_faces(&self) -> usize {
        self.parts.face_nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.parts.edge_nodes.len()
    }

    pub fn num_boundary_faces(&self) -> usize {
        self.parts.boundary_faces.len()
    }

    pub fn num_items(&self, kind: ItemKind) -> usize {
        match kind {
            ItemKind::Cell => self.num_cells(),
            ItemKind::Face => self.num_faces(),
        }
    }

    pub fn coords(&self) -> &DMatrix<T> {
        &self.parts.coords
    }

    pub fn node_coords(&self, node: usize) -> DVectorView<T> {
        self.parts.coords.column(node).into()
    }

    pub fn cell_nodes(&self, cell: usize) -> &[usize] {
        &self.parts.cell_nodes[cell]
    }

    pub fn cell_geometry(&self, cell: usize) -> ElementGeometry {
        self.parts.cell_geometries[cell]
    }

    pub fn cell_region(&self, cell: usize) -> usize {
        self.parts.cell_regions[cell]
    }

    pub fn cell_volume(&self, cell: usize) -> T {
        self.parts.cell_volumes[cell]
    }

    pub fn cell_faces(&self, cell: usize) -> &[usize] {
        &self.parts.cell_faces[cell]
    }

    pub fn cell_face_signs(&self, cell: usize) -> &[i8] {
        &self.parts.cell_face_signs[cell]
    }

    pub fn cell_edges(&self, cell: usize) -> &[usize] {
        self.parts.cell_edges.get(cell).unwrap_or(&[])
    }

    pub fn face_nodes(&self, face: usize) -> &[usize] {
        &self.parts.face_nodes[face]
    }

    pub fn face_geometry(&self, face: usize) -> ElementGeometry {
        self.parts.face_geometries[face]
    }

    pub fn face_region(&self, face: usize) -> usize {
        self.parts.face_regions[face]
    }

    pub fn face_volume(&self, face: usize) -> T {
        self.parts.face_volumes[face]
    }

    /// Unit normal of the face, pointing out of its first adjacent cell.
    pub fn face_normal(&self, face: usize) -> DVectorView<T> {
        self.parts.face_normals.column(face).into()
    }

    pub fn face_cells(&self, face: usize) -> (usize, Option<usize>) {
        self.parts.face_cells[face]
    }

    pub fn is_interior_face(&self, face: usize) -> bool {
        self.parts.face_cells[face].1.is_some()
    }

    pub fn face_edges(&self, face: usize) -> &[usize] {
        self.parts.face_edges.get(face).unwrap_or(&[])
    }

    pub fn edge_nodes(&self, edge: usize) -> &[usize] {
        &self.parts.edge_nodes[edge]
    }

    pub fn boundary_faces(&self) -> &[usize] {
        &self.parts.boundary_faces
    }

    pub fn boundary_region(&self, boundary_face: usize) -> usize {
        self.parts.boundary_regions[boundary_face]
    }

    /// The position of `face` in the face list of `cell`, if the cell is adjacent to it.
    pub fn local_face_index(&self, cell: usize, face: usize) -> Option<usize> {
        self.cell_faces(cell).iter().position(|&f| f == face)
    }

    /// Geometries of all cells, deduplicated and sorted.
    pub fn unique_cell_geometries(&self) -> Vec<ElementGeometry> {
        let mut geometries = self.parts.cell_geometries.clone();
        geometries.sort_unstable();
        geometries.dedup();
        geometries
    }
}
