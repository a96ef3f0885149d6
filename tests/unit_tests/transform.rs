use feassemble::geometry::ElementGeometry;
use feassemble::mesh::ItemKind;
use feassemble::proptest::{reference_point, triangle_corners};
use feassemble::quadrature::QuadratureRule;
use feassemble::transform::{measure, L2GTransformer};
use matrixcompare::assert_scalar_eq;
use nalgebra::DMatrix;
use proptest::prelude::*;
use util::{distorted_quad_grid, hex_grid, single_triangle, tet_cube, triangle_grid};

#[test]
fn piola_factors_integrate_to_cell_volumes() {
    let meshes = [distorted_quad_grid(3, 0.2), triangle_grid(2), tet_cube(1), hex_grid(2)];
    for mesh in &meshes {
        let mut transformer = L2GTransformer::new(mesh, ItemKind::Cell);
        let mut total = 0.0;
        for cell in 0..mesh.num_cells() {
            transformer.update(cell).unwrap();
            let rule = QuadratureRule::<f64>::new(transformer.geometry(), 3);
            let mut volume = 0.0;
            for (w, xi) in rule.weights().iter().zip(rule.points()) {
                transformer.evaluate_at(xi).unwrap();
                volume += w * transformer.piola_factor();
            }
            assert_scalar_eq!(volume, mesh.cell_volume(cell), comp = abs, tol = 1e-13);
            total += volume;
        }
        assert_scalar_eq!(total, 1.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn face_metric_factors_integrate_to_face_volumes() {
    let mesh = tet_cube(1);
    let mut transformer = L2GTransformer::new(&mesh, ItemKind::Face);
    let boundary_area: f64 = mesh
        .boundary_faces()
        .iter()
        .map(|&face| {
            transformer.update(face).unwrap();
            transformer.evaluate_at(&[0.25, 0.25]).unwrap();
            let area = 0.5 * transformer.piola_factor();
            assert_scalar_eq!(area, mesh.face_volume(face), comp = abs, tol = 1e-14);
            area
        })
        .sum();
    assert_scalar_eq!(boundary_area, 6.0, comp = abs, tol = 1e-12);
}

#[test]
fn reference_nodes_map_to_cell_nodes() {
    let mesh = distorted_quad_grid(2, 0.2);
    let mut transformer = L2GTransformer::new(&mesh, ItemKind::Cell);
    let mut x = [0.0; 2];
    for cell in 0..mesh.num_cells() {
        transformer.update(cell).unwrap();
        let geometry = mesh.cell_geometry(cell);
        for (node, xi) in mesh.cell_nodes(cell).iter().zip(geometry.reference_nodes()) {
            transformer.map_to_physical(&xi[..2], &mut x);
            assert_scalar_eq!(x[0], mesh.coords()[(0, *node)], comp = abs, tol = 1e-14);
            assert_scalar_eq!(x[1], mesh.coords()[(1, *node)], comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn jacobian_inverse_transpose_inverts_jacobian() {
    let mesh = distorted_quad_grid(2, 0.25);
    let mut transformer = L2GTransformer::new(&mesh, ItemKind::Cell);
    transformer.update(0).unwrap();
    transformer.evaluate_at(&[0.3, 0.8]).unwrap();
    let product = transformer.jacobian().transpose() * transformer.jacobian_inverse_transpose();
    assert_matrix_eq_identity(&product);
}

fn assert_matrix_eq_identity(matrix: &DMatrix<f64>) {
    let identity = DMatrix::<f64>::identity(matrix.nrows(), matrix.ncols());
    matrixcompare::assert_matrix_eq!(matrix, identity, comp = abs, tol = 1e-13);
}

#[test]
fn measure_of_faces_uses_metric() {
    let nodes = DMatrix::from_column_slice(3, 3, &[0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 3.0]);
    let area = measure(ElementGeometry::Triangle2D, &nodes).unwrap();
    assert_scalar_eq!(area, 3.0, comp = abs, tol = 1e-14);
}

proptest! {
    #[test]
    fn triangle_volumes_match_area_for_any_node_order(corners in triangle_corners(1e-2)) {
        let mesh = single_triangle(corners).unwrap();
        let [a, b, c] = corners;
        let area = 0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])).abs();
        prop_assert!((mesh.cell_volume(0) - area).abs() <= 1e-10 * area.max(1.0));
    }

    #[test]
    fn affine_maps_are_evaluated_once(xi in reference_point(ElementGeometry::Triangle2D)) {
        let mesh = triangle_grid(1);
        let mut transformer = L2GTransformer::new(&mesh, ItemKind::Cell);
        transformer.update(1).unwrap();
        let jacobian = transformer.jacobian().clone();
        transformer.evaluate_at(&xi).unwrap();
        prop_assert_eq!(transformer.jacobian(), &jacobian);
        prop_assert!((transformer.piola_factor() - 1.0).abs() < 1e-14);
    }
}
