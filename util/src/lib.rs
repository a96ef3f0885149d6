//! Test meshes and helpers shared by the tests and benchmarks of `feassemble`.
//!
//! Meshes are built from node coordinates and cell node lists by [`MeshBuilder`], which
//! enumerates faces (and edges in 3D), orients cells positively and computes volumes and
//! normals.
use feassemble::geometry::ElementGeometry;
use feassemble::mesh::{Mesh, MeshParts};
use feassemble::transform::measure;
use feassemble::Adjacency;
use nalgebra::{DMatrix, DVector, Vector3};
use std::collections::HashMap;

/// Region assigned to all cells and boundary faces unless specified otherwise.
pub const DEFAULT_REGION: usize = 1;

type RegionFn = Box<dyn Fn(&[f64]) -> usize>;

pub struct MeshBuilder {
    coords: DMatrix<f64>,
    cells: Vec<(ElementGeometry, Vec<usize>, usize)>,
    boundary_region: RegionFn,
}

impl MeshBuilder {
    /// A builder for a mesh with the given node coordinates, one column per node.
    pub fn new(coords: DMatrix<f64>) -> Self {
        Self {
            coords,
            cells: Vec::new(),
            boundary_region: Box::new(|_| DEFAULT_REGION),
        }
    }

    pub fn add_cell(&mut self, geometry: ElementGeometry, nodes: &[usize]) -> &mut Self {
        self.add_cell_in_region(geometry, nodes, DEFAULT_REGION)
    }

    pub fn add_cell_in_region(&mut self, geometry: ElementGeometry, nodes: &[usize], region: usize) -> &mut Self {
        self.cells.push((geometry, nodes.to_vec(), region));
        self
    }

    /// Assigns boundary faces to regions by the coordinates of their centroid.
    pub fn with_boundary_regions(mut self, region: impl Fn(&[f64]) -> usize + 'static) -> Self {
        self.boundary_region = Box::new(region);
        self
    }

    fn node(&self, node: usize) -> DVector<f64> {
        self.coords.column(node).into_owned()
    }

    fn item_coords(&self, nodes: &[usize]) -> DMatrix<f64> {
        DMatrix::from_fn(self.coords.nrows(), nodes.len(), |i, j| self.coords[(i, nodes[j])])
    }

    /// Reorders the nodes of a simplex or quadrilateral cell so that it is positively oriented.
    fn orient(&self, geometry: ElementGeometry, nodes: &mut [usize]) {
        let dim = self.coords.nrows();
        let difference = |a: usize, b: usize| self.node(nodes[b]) - self.node(nodes[a]);
        let signed_volume = match geometry {
            ElementGeometry::Edge1D if dim == 1 => difference(0, 1)[0],
            ElementGeometry::Triangle2D | ElementGeometry::Quadrilateral2D if dim == 2 => {
                let (a, b) = (difference(0, 1), difference(0, 2));
                a[0] * b[1] - a[1] * b[0]
            }
            ElementGeometry::Tetrahedron3D => {
                let (a, b, c) = (difference(0, 1), difference(0, 2), difference(0, 3));
                Vector3::new(a[0], a[1], a[2])
                    .cross(&Vector3::new(b[0], b[1], b[2]))
                    .dot(&Vector3::new(c[0], c[1], c[2]))
            }
            _ => 1.0,
        };
        if signed_volume < 0.0 {
            match geometry {
                ElementGeometry::Edge1D => nodes.swap(0, 1),
                ElementGeometry::Quadrilateral2D => nodes.swap(1, 3),
                _ => nodes.swap(1, 2),
            }
        }
    }

    /// Unit normal of a face whose nodes are listed in the order of its first cell.
    fn face_normal(&self, face_nodes: &[usize], local_face: usize) -> DVector<f64> {
        let dim = self.coords.nrows();
        let normal = match dim {
            1 => DVector::from_element(1, if local_face == 0 { -1.0 } else { 1.0 }),
            2 => {
                let t = self.node(face_nodes[1]) - self.node(face_nodes[0]);
                DVector::from_vec(vec![t[1], -t[0]])
            }
            _ => {
                let a = self.node(face_nodes[1]) - self.node(face_nodes[0]);
                let b = self.node(face_nodes[2]) - self.node(face_nodes[0]);
                let n = Vector3::new(a[0], a[1], a[2]).cross(&Vector3::new(b[0], b[1], b[2]));
                DVector::from_column_slice(n.as_slice())
            }
        };
        let norm = normal.norm();
        normal / norm
    }

    pub fn build(&self) -> eyre::Result<Mesh<f64>> {
        let dim = self.coords.nrows();
        let mut cell_nodes = Adjacency::new();
        let mut cell_faces = Adjacency::new();
        let mut cell_face_signs = Adjacency::new();
        let mut cell_edges = Adjacency::new();
        let mut cell_geometries = Vec::new();
        let mut cell_regions = Vec::new();
        let mut cell_volumes = Vec::new();

        let mut face_lookup: HashMap<Vec<usize>, usize> = HashMap::new();
        let mut face_nodes: Vec<Vec<usize>> = Vec::new();
        let mut face_geometries = Vec::new();
        let mut face_cells: Vec<(usize, Option<usize>)> = Vec::new();
        let mut face_normals: Vec<DVector<f64>> = Vec::new();

        let mut edge_lookup: HashMap<[usize; 2], usize> = HashMap::new();
        let mut edge_nodes: Vec<Vec<usize>> = Vec::new();
        let mut edge_index = |a: usize, b: usize| -> usize {
            let key = [a.min(b), a.max(b)];
            let next = edge_nodes.len();
            *edge_lookup.entry(key).or_insert_with(|| {
                edge_nodes.push(vec![a, b]);
                next
            })
        };

        for (cell, (geometry, nodes, region)) in self.cells.iter().enumerate() {
            let mut nodes = nodes.clone();
            self.orient(*geometry, &mut nodes);
            cell_volumes.push(measure(*geometry, &self.item_coords(&nodes))?);
            let mut faces = Vec::new();
            let mut signs = Vec::new();
            for (local_face, local_nodes) in geometry.face_nodes().iter().enumerate() {
                let global: Vec<usize> = local_nodes.iter().map(|&k| nodes[k]).collect();
                let mut key = global.clone();
                key.sort_unstable();
                match face_lookup.get(&key) {
                    Some(&face) => {
                        face_cells[face].1 = Some(cell);
                        faces.push(face);
                        signs.push(-1);
                    }
                    None => {
                        let face = face_nodes.len();
                        face_lookup.insert(key, face);
                        face_normals.push(self.face_normal(&global, local_face));
                        face_nodes.push(global);
                        face_geometries.push(geometry.face_geometry(local_face));
                        face_cells.push((cell, None));
                        faces.push(face);
                        signs.push(1);
                    }
                }
            }
            if dim == 3 {
                let edges: Vec<usize> = geometry
                    .edge_nodes()
                    .iter()
                    .map(|&[a, b]| edge_index(nodes[a], nodes[b]))
                    .collect();
                cell_edges.push(&edges);
            }
            cell_nodes.push(&nodes);
            cell_faces.push(&faces);
            cell_face_signs.push(&signs);
            cell_geometries.push(*geometry);
            cell_regions.push(*region);
        }

        let mut face_edges = Adjacency::new();
        if dim == 3 {
            for nodes in &face_nodes {
                let n = nodes.len();
                let edges: Vec<usize> = (0..n)
                    .map(|k| edge_index(nodes[k], nodes[(k + 1) % n]))
                    .collect();
                face_edges.push(&edges);
            }
        }

        let mut face_volumes = Vec::new();
        let mut face_regions = Vec::new();
        let mut boundary_faces = Vec::new();
        let mut boundary_regions = Vec::new();
        for (face, nodes) in face_nodes.iter().enumerate() {
            let geometry = face_geometries[face];
            let coords = self.item_coords(nodes);
            face_volumes.push(match geometry {
                ElementGeometry::Vertex0D => 1.0,
                _ => measure(geometry, &coords)?,
            });
            if face_cells[face].1.is_none() {
                let centroid = coords.column_mean();
                let region = (self.boundary_region)(centroid.as_slice());
                boundary_faces.push(face);
                boundary_regions.push(region);
                face_regions.push(region);
            } else {
                face_regions.push(0);
            }
        }

        let normals = if face_normals.is_empty() {
            DMatrix::zeros(dim, 0)
        } else {
            DMatrix::from_columns(&face_normals)
        };
        Mesh::from_parts(MeshParts {
            coords: self.coords.clone(),
            cell_nodes,
            cell_geometries,
            cell_regions,
            cell_volumes,
            cell_faces,
            cell_face_signs,
            cell_edges,
            face_nodes: Adjacency::from(face_nodes),
            face_geometries,
            face_regions,
            face_volumes,
            face_normals: normals,
            face_cells,
            face_edges,
            edge_nodes: Adjacency::from(edge_nodes),
            boundary_faces,
            boundary_regions,
        })
    }
}

fn grid_coords_2d(n: usize, distortion: f64) -> DMatrix<f64> {
    let h = 1.0 / n as f64;
    DMatrix::from_fn(2, (n + 1) * (n + 1), |d, node| {
        let (i, j) = (node % (n + 1), node / (n + 1));
        let interior = i > 0 && i < n && j > 0 && j < n;
        let shift = if interior {
            distortion * h * if (i + j) % 2 == 0 { 1.0 } else { -1.0 }
        } else {
            0.0
        };
        if d == 0 {
            i as f64 * h + shift
        } else {
            j as f64 * h + 0.5 * shift
        }
    })
}

fn grid_node_2d(n: usize, i: usize, j: usize) -> usize {
    j * (n + 1) + i
}

/// The unit square split into the triangles `(0,0), (1,0), (1,1)` and `(0,0), (1,1), (0,1)`.
pub fn unit_square_triangles() -> Mesh<f64> {
    triangle_grid(1)
}

/// The unit square divided into `n x n` squares, each split into two triangles.
pub fn triangle_grid(n: usize) -> Mesh<f64> {
    let mut builder = MeshBuilder::new(grid_coords_2d(n, 0.0));
    for j in 0..n {
        for i in 0..n {
            let v = |a, b| grid_node_2d(n, i + a, j + b);
            builder.add_cell(ElementGeometry::Triangle2D, &[v(0, 0), v(1, 0), v(1, 1)]);
            builder.add_cell(ElementGeometry::Triangle2D, &[v(0, 0), v(1, 1), v(0, 1)]);
        }
    }
    builder.build().expect("triangle grid is valid")
}

/// The unit square divided into `n x n` quadrilaterals.
pub fn quad_grid(n: usize) -> Mesh<f64> {
    distorted_quad_grid(n, 0.0)
}

/// A quadrilateral grid of the unit square whose interior nodes are shifted by
/// `distortion` times the grid spacing, so that cells are general quadrilaterals.
pub fn distorted_quad_grid(n: usize, distortion: f64) -> Mesh<f64> {
    let mut builder = MeshBuilder::new(grid_coords_2d(n, distortion));
    for j in 0..n {
        for i in 0..n {
            let v = |a, b| grid_node_2d(n, i + a, j + b);
            builder.add_cell(ElementGeometry::Quadrilateral2D, &[v(0, 0), v(1, 0), v(1, 1), v(0, 1)]);
        }
    }
    builder.build().expect("quadrilateral grid is valid")
}

/// The unit square with a quadrilateral in region 1 on the left half and two triangles in
/// region 2 on the right half.
///
/// Boundary faces on the line `x = 0` are in region 2, all others in region 1.
pub fn mixed_tri_quad() -> Mesh<f64> {
    #[rustfmt::skip]
    let coords = DMatrix::from_column_slice(2, 6, &[
        0.0, 0.0,
        0.5, 0.0,
        1.0, 0.0,
        0.0, 1.0,
        0.5, 1.0,
        1.0, 1.0,
    ]);
    let mut builder = MeshBuilder::new(coords).with_boundary_regions(|x| if x[0] < 1e-12 { 2 } else { 1 });
    builder
        .add_cell_in_region(ElementGeometry::Quadrilateral2D, &[0, 1, 4, 3], 1)
        .add_cell_in_region(ElementGeometry::Triangle2D, &[1, 2, 5], 2)
        .add_cell_in_region(ElementGeometry::Triangle2D, &[1, 5, 4], 2);
    builder.build().expect("mixed mesh is valid")
}

/// The reference triangle as a single cell mesh.
pub fn reference_triangle() -> Mesh<f64> {
    let coords = DMatrix::from_column_slice(2, 3, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    let mut builder = MeshBuilder::new(coords);
    builder.add_cell(ElementGeometry::Triangle2D, &[0, 1, 2]);
    builder.build().expect("reference triangle is valid")
}

/// A single triangle with the given corners, which may be given in any order.
pub fn single_triangle(corners: [[f64; 2]; 3]) -> eyre::Result<Mesh<f64>> {
    let coords = DMatrix::from_fn(2, 3, |d, node| corners[node][d]);
    let mut builder = MeshBuilder::new(coords);
    builder.add_cell(ElementGeometry::Triangle2D, &[0, 1, 2]);
    builder.build()
}

/// The reference tetrahedron as a single cell mesh.
pub fn single_tetrahedron() -> Mesh<f64> {
    #[rustfmt::skip]
    let coords = DMatrix::from_column_slice(3, 4, &[
        0.0, 0.0, 0.0,
        1.0, 0.0, 0.0,
        0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,
    ]);
    let mut builder = MeshBuilder::new(coords);
    builder.add_cell(ElementGeometry::Tetrahedron3D, &[0, 1, 2, 3]);
    builder.build().expect("reference tetrahedron is valid")
}

fn grid_coords_3d(n: usize) -> DMatrix<f64> {
    let h = 1.0 / n as f64;
    DMatrix::from_fn(3, (n + 1).pow(3), |d, node| {
        let index = [node % (n + 1), (node / (n + 1)) % (n + 1), node / (n + 1).pow(2)];
        index[d] as f64 * h
    })
}

fn grid_node_3d(n: usize, [i, j, k]: [usize; 3]) -> usize {
    (k * (n + 1) + j) * (n + 1) + i
}

/// The unit cube divided into `n^3` cubes, each split into six tetrahedra sharing the
/// diagonal from the cube's lowest to its highest corner.
pub fn tet_cube(n: usize) -> Mesh<f64> {
    const AXIS_ORDERS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    let mut builder = MeshBuilder::new(grid_coords_3d(n));
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                for axes in AXIS_ORDERS {
                    let mut corner = [i, j, k];
                    let mut nodes = vec![grid_node_3d(n, corner)];
                    for axis in axes {
                        corner[axis] += 1;
                        nodes.push(grid_node_3d(n, corner));
                    }
                    builder.add_cell(ElementGeometry::Tetrahedron3D, &nodes);
                }
            }
        }
    }
    builder.build().expect("tetrahedral cube is valid")
}

/// The unit cube divided into `n^3` hexahedra.
pub fn hex_grid(n: usize) -> Mesh<f64> {
    let mut builder = MeshBuilder::new(grid_coords_3d(n));
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let v = |a, b, c| grid_node_3d(n, [i + a, j + b, k + c]);
                builder.add_cell(
                    ElementGeometry::Hexahedron3D,
                    &[v(0, 0, 0), v(1, 0, 0), v(1, 1, 0), v(0, 1, 0), v(0, 0, 1), v(1, 0, 1), v(1, 1, 1), v(0, 1, 1)],
                );
            }
        }
    }
    builder.build().expect("hexahedral grid is valid")
}

/// The unit interval divided into `n` segments.
pub fn interval(n: usize) -> Mesh<f64> {
    let coords = DMatrix::from_fn(1, n + 1, |_, i| i as f64 / n as f64);
    let mut builder = MeshBuilder::new(coords);
    for i in 0..n {
        builder.add_cell(ElementGeometry::Edge1D, &[i, i + 1]);
    }
    builder.build().expect("interval mesh is valid")
}
