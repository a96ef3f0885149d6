use feassemble::element::FiniteElementType::*;
use feassemble::evaluator::{create_basis_evaluator, EvaluationTarget};
use feassemble::geometry::ElementGeometry;
use feassemble::operator::FunctionOperator;
use feassemble::quadrature::QuadratureRule;
use feassemble::space::{resolve_dof_items, DofItem, DofItemMode, FiniteElementSpace};
use feassemble::AssemblyError;
use matrixcompare::assert_scalar_eq;
use util::{quad_grid, reference_triangle, single_tetrahedron, triangle_grid, unit_square_triangles};

fn cell_item(cell: usize) -> DofItem<f64> {
    DofItem {
        item: cell,
        position: 0,
        coefficient: 1.0,
        face: None,
    }
}

#[test]
fn p1_gradients_on_triangle() {
    let mesh = unit_square_triangles();
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let rule = QuadratureRule::new(ElementGeometry::Triangle2D, 1);
    let mut evaluator = create_basis_evaluator(
        &space,
        ElementGeometry::Triangle2D,
        FunctionOperator::Gradient,
        EvaluationTarget::Cell,
        &rule,
    )
    .unwrap();
    evaluator.update(&cell_item(0)).unwrap();
    assert_eq!(evaluator.num_basis(), 3);
    assert_eq!(evaluator.output_len(), 2);
    assert_eq!(evaluator.dofs(), space.cell_dofs(0));

    // Cell (0,0), (1,0), (1,1) with basis 1 - x, x - y, y
    let expected = [[-1.0, 0.0], [1.0, -1.0], [0.0, 1.0]];
    for q in 0..evaluator.num_points() {
        for (i, gradient) in expected.iter().enumerate() {
            let value = evaluator.value(i, q);
            assert_scalar_eq!(value[0], gradient[0], comp = abs, tol = 1e-14);
            assert_scalar_eq!(value[1], gradient[1], comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn basis_values_are_partitions_of_unity() {
    let mesh = quad_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1Q1 { ncomponents: 1 }).unwrap();
    let rule = QuadratureRule::new(ElementGeometry::Quadrilateral2D, 3);
    let mut evaluator = create_basis_evaluator(
        &space,
        ElementGeometry::Quadrilateral2D,
        FunctionOperator::Identity,
        EvaluationTarget::Cell,
        &rule,
    )
    .unwrap();
    for cell in 0..mesh.num_cells() {
        evaluator.update(&cell_item(cell)).unwrap();
        for q in 0..evaluator.num_points() {
            let sum: f64 = (0..evaluator.num_basis()).map(|i| evaluator.value(i, q)[0]).sum();
            assert_scalar_eq!(sum, 1.0, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn curl_of_scalar_is_orthogonal_to_gradient() {
    let mesh = triangle_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1P2 { ncomponents: 1 }).unwrap();
    let rule = QuadratureRule::new(ElementGeometry::Triangle2D, 2);
    let create = |operator| {
        create_basis_evaluator(&space, ElementGeometry::Triangle2D, operator, EvaluationTarget::Cell, &rule).unwrap()
    };
    let (mut curl, mut gradient) = (create(FunctionOperator::Curl), create(FunctionOperator::Gradient));
    curl.update(&cell_item(3)).unwrap();
    gradient.update(&cell_item(3)).unwrap();
    for q in 0..curl.num_points() {
        for i in 0..curl.num_basis() {
            let (c, g) = (curl.value(i, q), gradient.value(i, q));
            assert_scalar_eq!(c[0] * g[0] + c[1] * g[1], 0.0, comp = abs, tol = 1e-12);
            assert_scalar_eq!(c[0] * c[0] + c[1] * c[1], g[0] * g[0] + g[1] * g[1], comp = abs, tol = 1e-11);
        }
    }
}

#[test]
fn laplacians_of_quadratic_basis_sum_to_zero() {
    let mesh = triangle_grid(1);
    let space = FiniteElementSpace::new(&mesh, H1P2 { ncomponents: 1 }).unwrap();
    let rule = QuadratureRule::new(ElementGeometry::Triangle2D, 0);
    let mut evaluator = create_basis_evaluator(
        &space,
        ElementGeometry::Triangle2D,
        FunctionOperator::Laplacian,
        EvaluationTarget::Cell,
        &rule,
    )
    .unwrap();
    evaluator.update(&cell_item(1)).unwrap();
    let sum: f64 = (0..evaluator.num_basis()).map(|i| evaluator.value(i, 0)[0]).sum();
    assert_scalar_eq!(sum, 0.0, comp = abs, tol = 1e-12);
}

#[test]
fn raviart_thomas_divergence_is_flux_over_volume() {
    for mesh in [reference_triangle(), single_tetrahedron()] {
        let geometry = mesh.cell_geometry(0);
        let space = FiniteElementSpace::new(&mesh, HdivRT0).unwrap();
        let rule = QuadratureRule::new(geometry, 1);
        let mut evaluator =
            create_basis_evaluator(&space, geometry, FunctionOperator::Divergence, EvaluationTarget::Cell, &rule)
                .unwrap();
        evaluator.update(&cell_item(0)).unwrap();
        let expected = 1.0 / mesh.cell_volume(0);
        for q in 0..evaluator.num_points() {
            for i in 0..evaluator.num_basis() {
                assert_scalar_eq!(evaluator.value(i, q)[0], expected, comp = abs, tol = 1e-12);
            }
        }
    }
}

#[test]
fn cell_functions_on_faces_vanish_at_opposite_node() {
    let mesh = triangle_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let rule = QuadratureRule::new(ElementGeometry::Edge1D, 2);
    let mut evaluator = create_basis_evaluator(
        &space,
        ElementGeometry::Triangle2D,
        FunctionOperator::Identity,
        EvaluationTarget::CellOnFace,
        &rule,
    )
    .unwrap();
    for face in 0..mesh.num_faces() {
        let [first, _] = resolve_dof_items(&mesh, face, DofItemMode::Side(0)).unwrap();
        let first = first.expect("every face has a first cell");
        evaluator.update(&first).unwrap();
        let face_nodes = mesh.face_nodes(face);
        let cell_nodes = mesh.cell_nodes(first.item);
        let opposite = cell_nodes.iter().position(|node| !face_nodes.contains(node)).unwrap();
        for q in 0..evaluator.num_points() {
            assert_scalar_eq!(evaluator.value(opposite, q)[0], 0.0, comp = abs, tol = 1e-14);
            let sum: f64 = (0..3).map(|i| evaluator.value(i, q)[0]).sum();
            assert_scalar_eq!(sum, 1.0, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn unsupported_combinations_are_rejected_at_creation() {
    let quads = quad_grid(1);
    let q1 = FiniteElementSpace::new(&quads, H1Q1 { ncomponents: 1 }).unwrap();
    let quad_rule = QuadratureRule::new(ElementGeometry::Quadrilateral2D, 2);
    let err = create_basis_evaluator(
        &q1,
        ElementGeometry::Quadrilateral2D,
        FunctionOperator::Hessian,
        EvaluationTarget::Cell,
        &quad_rule,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AssemblyError>(),
        Some(AssemblyError::UnsupportedCombination(_))
    ));

    let triangles = unit_square_triangles();
    let p1 = FiniteElementSpace::new(&triangles, H1P1 { ncomponents: 1 }).unwrap();
    let triangle_rule = QuadratureRule::new(ElementGeometry::Triangle2D, 2);
    let create = |operator, target, rule: &QuadratureRule<f64>| {
        create_basis_evaluator(&p1, ElementGeometry::Triangle2D, operator, target, rule)
    };
    assert!(create(FunctionOperator::NormalFlux, EvaluationTarget::Cell, &triangle_rule).is_err());
    assert!(create(FunctionOperator::Identity, EvaluationTarget::CellOnFace, &triangle_rule).is_err());
    assert!(create(FunctionOperator::ReconstructionIdentity, EvaluationTarget::Cell, &triangle_rule).is_err());
    let err = create(FunctionOperator::Divergence, EvaluationTarget::Cell, &triangle_rule).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AssemblyError>(),
        Some(AssemblyError::InvalidOperator { .. })
    ));
}
