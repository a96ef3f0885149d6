use feassemble::assembly::{Action, FormArgument, ItemIntegrator};
use feassemble::element::FiniteElementType::{self, *};
use feassemble::mesh::Mesh;
use feassemble::operator::FunctionOperator;
use feassemble::proptest::triangle_corners;
use feassemble::space::FiniteElementSpace;
use nalgebra::DVector;
use proptest::prelude::*;
use util::{hex_grid, interval, mixed_tri_quad, quad_grid, single_triangle, tet_cube, triangle_grid, unit_square_triangles};

type Field = fn(&[f64], &mut [f64]);

/// The L2 norm of `u_h - f` for `u_h` in the given space.
fn l2_error(space: &FiniteElementSpace<f64>, u: &DVector<f64>, f: Field) -> f64 {
    let n = space.ncomponents();
    let action = Action::<f64>::with_coordinates(1, n, move |result, u_h, context| {
        let x = context.x.expect("coordinates are requested");
        let mut exact = vec![0.0; n];
        f(x, &mut exact);
        result[0] = u_h.iter().zip(&exact).map(|(a, b)| (a - b).powi(2)).sum();
    })
    .with_bonus_quadorder(2);
    let integrator = ItemIntegrator::new(vec![FormArgument::new(space, FunctionOperator::Identity)], action);
    integrator.evaluate(&[u]).unwrap()[0].sqrt()
}

fn assert_reproduces(mesh: &Mesh<f64>, element: FiniteElementType, f: Field) {
    let space = FiniteElementSpace::new(mesh, element).unwrap();
    let u = space.interpolate(f).unwrap();
    assert_eq!(u.len(), space.num_dofs());
    let error = l2_error(&space, &u, f);
    assert!(error < 1e-12, "{element:?} does not reproduce its own functions, error {error:e}");
}

fn linear(x: &[f64], values: &mut [f64]) {
    values[0] = 1.0 + 2.0 * x[0] - x.get(1).copied().unwrap_or(0.0) + 0.5 * x.get(2).copied().unwrap_or(0.0);
}

fn quadratic(x: &[f64], values: &mut [f64]) {
    values[0] = x[0] * x[0] - 3.0 * x[0] * x[1] + 0.5 * x[1] * x[1] + x[1] - 2.0;
}

fn quadratic_3d(x: &[f64], values: &mut [f64]) {
    values[0] = x[0] * x[2] - 2.0 * x[1] * x[1] + x[0] * x[1] + 3.0 * x[2] - 1.0;
}

fn quadratic_1d(x: &[f64], values: &mut [f64]) {
    values[0] = 3.0 * x[0] * x[0] - x[0] + 0.5;
}

fn bilinear(x: &[f64], values: &mut [f64]) {
    values[0] = 1.0 + x[0] - 2.0 * x[1] + 3.0 * x[0] * x[1];
}

fn trilinear(x: &[f64], values: &mut [f64]) {
    values[0] = x[0] * x[1] * x[2] - x[0] + 2.0 * x[1] * x[2];
}

fn constant(_: &[f64], values: &mut [f64]) {
    values[0] = 2.5;
}

fn constant_vector(_: &[f64], values: &mut [f64]) {
    values[0] = 1.5;
    values[1] = -0.5;
}

fn constant_vector_3d(_: &[f64], values: &mut [f64]) {
    values[0] = 0.5;
    values[1] = -1.0;
    values[2] = 2.0;
}

fn linear_vector_3d(x: &[f64], values: &mut [f64]) {
    values[0] = x[0] - x[2] + 1.0;
    values[1] = 2.0 * x[1] + x[0];
    values[2] = -x[1] + 0.5 * x[2];
}

fn linear_vector(x: &[f64], values: &mut [f64]) {
    values[0] = x[0] - 2.0 * x[1];
    values[1] = 0.5 + x[0] + x[1];
}

#[test]
fn lagrange_spaces_reproduce_their_polynomials() {
    assert_reproduces(&triangle_grid(3), H1P1 { ncomponents: 1 }, linear);
    assert_reproduces(&triangle_grid(2), H1P2 { ncomponents: 1 }, quadratic);
    assert_reproduces(&quad_grid(3), H1Q1 { ncomponents: 1 }, bilinear);
    assert_reproduces(&tet_cube(1), H1P1 { ncomponents: 1 }, linear);
    assert_reproduces(&hex_grid(2), H1Q1 { ncomponents: 1 }, trilinear);
    assert_reproduces(&interval(4), H1P1 { ncomponents: 1 }, linear);
    assert_reproduces(&tet_cube(2), H1P2 { ncomponents: 1 }, quadratic_3d);
    assert_reproduces(&interval(3), H1P2 { ncomponents: 1 }, quadratic_1d);
}

#[test]
fn q1_on_mixed_meshes_reproduces_linear_functions() {
    assert_reproduces(&mixed_tri_quad(), H1Q1 { ncomponents: 1 }, linear);
}

#[test]
fn vector_lagrange_space_reproduces_linear_fields() {
    assert_reproduces(&triangle_grid(2), H1P1 { ncomponents: 2 }, linear_vector);
}

#[test]
fn piecewise_constants_reproduce_constants() {
    assert_reproduces(&triangle_grid(2), L2P0 { ncomponents: 1 }, constant);
    assert_reproduces(&quad_grid(2), L2P0 { ncomponents: 1 }, constant);
    assert_reproduces(&tet_cube(1), L2P0 { ncomponents: 1 }, constant);
    assert_reproduces(&hex_grid(2), L2P0 { ncomponents: 1 }, constant);
}

#[test]
fn crouzeix_raviart_reproduces_linear_functions() {
    assert_reproduces(&triangle_grid(2), H1CR { ncomponents: 1 }, linear);
    assert_reproduces(&tet_cube(1), H1CR { ncomponents: 1 }, linear);
    assert_reproduces(&interval(3), H1CR { ncomponents: 1 }, linear);
}

#[test]
fn raviart_thomas_reproduces_constant_fields() {
    assert_reproduces(&triangle_grid(2), HdivRT0, constant_vector);
    assert_reproduces(&tet_cube(1), HdivRT0, constant_vector_3d);
}

#[test]
fn bernardi_raugel_reproduces_linear_fields() {
    assert_reproduces(&triangle_grid(2), H1BR, linear_vector);
    assert_reproduces(&tet_cube(1), H1BR, linear_vector_3d);
}

#[test]
fn dof_counts_on_unit_square() {
    let mesh = unit_square_triangles();
    let count = |element| FiniteElementSpace::new(&mesh, element).unwrap().num_dofs();
    assert_eq!(count(H1P1 { ncomponents: 1 }), 4);
    assert_eq!(count(H1P1 { ncomponents: 2 }), 8);
    assert_eq!(count(H1P2 { ncomponents: 1 }), 9);
    assert_eq!(count(L2P0 { ncomponents: 1 }), 2);
    assert_eq!(count(H1CR { ncomponents: 1 }), 5);
    assert_eq!(count(HdivRT0), 5);
    assert_eq!(count(H1BR), 13);
}

#[test]
fn cell_dofs_are_blocked_by_component() {
    let mesh = unit_square_triangles();
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 2 }).unwrap();
    for cell in 0..mesh.num_cells() {
        let dofs = space.cell_dofs(cell);
        assert_eq!(dofs.len(), 6);
        let (first, second) = dofs.split_at(3);
        assert!(first.iter().all(|&dof| dof < 4));
        assert!(second.iter().all(|&dof| dof >= 4));
    }
}

#[test]
fn shared_faces_share_dofs() {
    let mesh = triangle_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1CR { ncomponents: 1 }).unwrap();
    for face in 0..mesh.num_faces() {
        let face_dofs = space.face_dofs(face);
        assert_eq!(face_dofs.len(), 1);
        let (first, second) = mesh.face_cells(face);
        for cell in std::iter::once(first).chain(second) {
            assert!(space.cell_dofs(cell).contains(&face_dofs[0]));
        }
    }
}

#[test]
fn unsupported_elements_are_rejected() {
    let mesh = quad_grid(1);
    assert!(FiniteElementSpace::new(&mesh, H1P2 { ncomponents: 1 }).is_err());
    assert!(FiniteElementSpace::new(&mesh, HdivRT0).is_err());
    assert!(FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 0 }).is_err());
}

proptest! {
    #[test]
    fn linear_interpolation_is_exact_on_any_triangle(corners in triangle_corners(1e-1)) {
        let mesh = single_triangle(corners).unwrap();
        let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
        let u = space.interpolate(linear).unwrap();
        let error = l2_error(&space, &u, linear);
        prop_assert!(error < 1e-9, "error {:e}", error);
    }
}

#[test]
fn reconstruction_is_only_available_for_divergence_free_spaces() {
    let mesh = unit_square_triangles();
    let p1 = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 2 }).unwrap();
    assert!(p1.reconstruction_coefficients(0).is_err());
    let cr = FiniteElementSpace::new(&mesh, H1CR { ncomponents: 2 }).unwrap();
    assert_eq!(cr.reconstruction_coefficients(0).unwrap().len(), 6 * 3);
    let br = FiniteElementSpace::new(&mesh, H1BR).unwrap();
    let coefficients = br.reconstruction_coefficients(1).unwrap();
    assert_eq!(coefficients.len(), 9 * 3);
    assert!(coefficients.iter().any(|c| c.abs() > 0.0));
}
