//! Element geometries and their reference topology.
//!
//! Reference cells are the unit simplices and unit cubes with the node orderings below. Local
//! faces are listed so that the right-handed normal of the face node sequence points out of the
//! reference cell (for quadrilateral and hexahedral faces the normal of the first three nodes).
//!
//! | Geometry | Nodes |
//! |---|---|
//! | `Edge1D` | `0`, `1` |
//! | `Triangle2D` | `(0,0)`, `(1,0)`, `(0,1)` |
//! | `Quadrilateral2D` | `(0,0)`, `(1,0)`, `(1,1)`, `(0,1)` |
//! | `Tetrahedron3D` | `(0,0,0)`, `(1,0,0)`, `(0,1,0)`, `(0,0,1)` |
//! | `Hexahedron3D` | bottom face `(0,0,0)`, `(1,0,0)`, `(1,1,0)`, `(0,1,0)`, then the top face |
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementGeometry {
    Vertex0D,
    Edge1D,
    Triangle2D,
    Quadrilateral2D,
    Tetrahedron3D,
    Hexahedron3D,
}

const VERTEX_NODES: [[f64; 3]; 1] = [[0.0; 3]];
const EDGE_NODES: [[f64; 3]; 2] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
const TRIANGLE_NODES: [[f64; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const QUADRILATERAL_NODES: [[f64; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
const TETRAHEDRON_NODES: [[f64; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
const HEXAHEDRON_NODES: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

const EDGE_FACES: &[&[usize]] = &[&[0], &[1]];
const TRIANGLE_FACES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 0]];
const QUADRILATERAL_FACES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const TETRAHEDRON_FACES: &[&[usize]] = &[&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const HEXAHEDRON_FACES: &[&[usize]] = &[
    &[0, 3, 2, 1],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[0, 4, 7, 3],
    &[4, 5, 6, 7],
];

const TETRAHEDRON_EDGES: &[[usize; 2]] = &[[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];
const HEXAHEDRON_EDGES: &[[usize; 2]] = &[
    [0, 1],
    [1, 2],
    [2, 3],
    [3, 0],
    [4, 5],
    [5, 6],
    [6, 7],
    [7, 4],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

const VERTEX_ORIENTATIONS: &[&[usize]] = &[&[0]];
const EDGE_ORIENTATIONS: &[&[usize]] = &[&[0, 1], &[1, 0]];
const TRIANGLE_ORIENTATIONS: &[&[usize]] = &[&[0, 1, 2], &[1, 2, 0], &[2, 0, 1], &[0, 2, 1], &[2, 1, 0], &[1, 0, 2]];
const QUADRILATERAL_ORIENTATIONS: &[&[usize]] = &[
    &[0, 1, 2, 3],
    &[1, 2, 3, 0],
    &[2, 3, 0, 1],
    &[3, 0, 1, 2],
    &[0, 3, 2, 1],
    &[3, 2, 1, 0],
    &[2, 1, 0, 3],
    &[1, 0, 3, 2],
];

impl ElementGeometry {
    /// Dimension of the reference domain.
    pub fn dim(&self) -> usize {
        use ElementGeometry::*;
        match self {
            Vertex0D => 0,
            Edge1D => 1,
            Triangle2D | Quadrilateral2D => 2,
            Tetrahedron3D | Hexahedron3D => 3,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.reference_nodes().len()
    }

    pub fn num_faces(&self) -> usize {
        self.face_nodes().len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_nodes().len()
    }

    /// Whether the geometry is a simplex. Simplices have affine reference maps.
    pub fn is_simplex(&self) -> bool {
        use ElementGeometry::*;
        matches!(self, Vertex0D | Edge1D | Triangle2D | Tetrahedron3D)
    }

    /// Whether the map from the reference cell is affine for every admissible item.
    ///
    /// Quadrilaterals and hexahedra are treated as non-affine even when an item happens to be a
    /// parallelogram, so their Jacobians are recomputed at every point.
    pub fn is_affine(&self) -> bool {
        self.is_simplex()
    }

    /// Measure of the reference cell.
    pub fn reference_volume(&self) -> f64 {
        use ElementGeometry::*;
        match self {
            Vertex0D | Edge1D | Quadrilateral2D | Hexahedron3D => 1.0,
            Triangle2D => 0.5,
            Tetrahedron3D => 1.0 / 6.0,
        }
    }

    /// Reference node coordinates, padded with zeros to three components.
    pub fn reference_nodes(&self) -> &'static [[f64; 3]] {
        use ElementGeometry::*;
        match self {
            Vertex0D => &VERTEX_NODES,
            Edge1D => &EDGE_NODES,
            Triangle2D => &TRIANGLE_NODES,
            Quadrilateral2D => &QUADRILATERAL_NODES,
            Tetrahedron3D => &TETRAHEDRON_NODES,
            Hexahedron3D => &HEXAHEDRON_NODES,
        }
    }

    /// Local node indices of each local face.
    pub fn face_nodes(&self) -> &'static [&'static [usize]] {
        use ElementGeometry::*;
        match self {
            Vertex0D => &[],
            Edge1D => EDGE_FACES,
            Triangle2D => TRIANGLE_FACES,
            Quadrilateral2D => QUADRILATERAL_FACES,
            Tetrahedron3D => TETRAHEDRON_FACES,
            Hexahedron3D => HEXAHEDRON_FACES,
        }
    }

    /// Local node indices of each local edge. Only three-dimensional geometries have edges
    /// distinct from their faces.
    pub fn edge_nodes(&self) -> &'static [[usize; 2]] {
        use ElementGeometry::*;
        match self {
            Tetrahedron3D => TETRAHEDRON_EDGES,
            Hexahedron3D => HEXAHEDRON_EDGES,
            _ => &[],
        }
    }

    /// Geometry of the given local face.
    ///
    /// # Panics
    ///
    /// Panics if the geometry has no face with the given index.
    pub fn face_geometry(&self, local_face: usize) -> ElementGeometry {
        assert!(local_face < self.num_faces(), "local face index out of bounds");
        use ElementGeometry::*;
        match self {
            Edge1D => Vertex0D,
            Triangle2D | Quadrilateral2D => Edge1D,
            Tetrahedron3D => Triangle2D,
            Hexahedron3D => Quadrilateral2D,
            Vertex0D => unreachable!("vertices have no faces"),
        }
    }

    /// The local node that does not lie on the given face of a simplex.
    pub fn opposite_node(&self, local_face: usize) -> Option<usize> {
        if !self.is_simplex() || local_face >= self.num_faces() {
            return None;
        }
        let face = self.face_nodes()[local_face];
        (0..self.num_nodes()).find(|node| !face.contains(node))
    }

    /// Node permutations under which this geometry may appear as the face of a neighboring cell.
    ///
    /// Entry `o` lists, for every node `k` of the face in its own ordering, the position in the
    /// cell's local face node list that holds the same mesh node.
    pub fn face_orientations(&self) -> &'static [&'static [usize]] {
        use ElementGeometry::*;
        match self {
            Vertex0D => VERTEX_ORIENTATIONS,
            Edge1D => EDGE_ORIENTATIONS,
            Triangle2D => TRIANGLE_ORIENTATIONS,
            Quadrilateral2D => QUADRILATERAL_ORIENTATIONS,
            Tetrahedron3D | Hexahedron3D => &[],
        }
    }

    pub fn num_face_orientations(&self) -> usize {
        self.face_orientations().len()
    }

    /// Geometries that can serve as cells in a mesh of the given spatial dimension.
    pub fn cell_geometries(dim: usize) -> &'static [ElementGeometry] {
        use ElementGeometry::*;
        match dim {
            1 => &[Edge1D],
            2 => &[Triangle2D, Quadrilateral2D],
            3 => &[Tetrahedron3D, Hexahedron3D],
            _ => &[],
        }
    }
}
