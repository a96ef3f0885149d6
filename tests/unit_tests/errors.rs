use feassemble::assembly::{Action, AssemblyTarget, BilinearForm, FormArgument, ItemIntegrator, LinearForm};
use feassemble::element::FiniteElementType::*;
use feassemble::mesh::Mesh;
use feassemble::operator::FunctionOperator::*;
use feassemble::space::FiniteElementSpace;
use feassemble::AssemblyError;
use nalgebra::{DMatrix, DVector};
use util::{mixed_tri_quad, quad_grid, triangle_grid, unit_square_triangles};

fn assembly_error(report: &eyre::Report) -> &AssemblyError {
    report
        .downcast_ref::<AssemblyError>()
        .unwrap_or_else(|| panic!("expected an assembly error, got {report:?}"))
}

#[test]
fn degenerate_cells_are_reported() {
    let mut parts = unit_square_triangles().into_parts();
    let first = parts.coords.column(0).clone_owned();
    parts.coords.set_column(1, &first);
    let mesh = Mesh::from_parts(parts).unwrap();
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let mut b = DVector::zeros(space.num_dofs());
    let err = LinearForm::new(FormArgument::new(&space, Identity), Action::identity(1))
        .assemble_into(&mut b, 1.0)
        .unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::DegenerateItem { .. }));
}

#[test]
fn inconsistent_face_signs_are_rejected() {
    let mesh = unit_square_triangles();
    let shared = (0..mesh.num_faces())
        .find(|&face| mesh.is_interior_face(face))
        .unwrap();
    let (first, second) = mesh.face_cells(shared);
    let second = second.unwrap();
    let position = |cell: usize| mesh.cell_faces(cell).iter().position(|&f| f == shared).unwrap();

    for (cell, sign) in [(first, -1), (second, 1), (first, 0)] {
        let mut parts = mesh.clone().into_parts();
        parts.cell_face_signs.get_mut(cell).unwrap()[position(cell)] = sign;
        let err = Mesh::from_parts(parts).unwrap_err();
        assert!(matches!(assembly_error(&err), AssemblyError::InvalidMesh(_)));
    }

    assert!(Mesh::from_parts(mesh.into_parts()).is_ok());
}

#[test]
fn mismatched_lengths_are_reported() {
    let mesh = triangle_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let u = FormArgument::new(&space, Identity);
    let n = space.num_dofs();

    let mut short = DVector::zeros(n - 1);
    let err = LinearForm::new(u, Action::identity(1))
        .assemble_into(&mut short, 1.0)
        .unwrap_err();
    assert!(matches!(
        assembly_error(&err),
        AssemblyError::DimensionMismatch { expected, actual, .. } if *expected == n && *actual == n - 1
    ));

    let err = BilinearForm::new(u, u, Action::identity(1))
        .assemble_into(DMatrix::zeros(n, n + 1))
        .unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::DimensionMismatch { .. }));

    let err = BilinearForm::new(u, u, Action::identity(2))
        .assemble_into(DMatrix::zeros(n, n))
        .unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::DimensionMismatch { .. }));

    let integrator = ItemIntegrator::new(vec![u], Action::identity(1));
    let wrong = DVector::zeros(n + 2);
    let err = integrator.evaluate(&[&wrong]).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::DimensionMismatch { .. }));
    let err = integrator.evaluate(&[]).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::DimensionMismatch { .. }));
}

#[test]
fn unknown_regions_are_reported() {
    let mesh = mixed_tri_quad();
    let space = FiniteElementSpace::new(&mesh, H1Q1 { ncomponents: 1 }).unwrap();
    let u = DVector::zeros(space.num_dofs());
    let err = ItemIntegrator::new(vec![FormArgument::new(&space, Identity)], Action::identity(1))
        .with_regions(vec![1, 7])
        .evaluate(&[&u])
        .unwrap_err();
    assert_eq!(assembly_error(&err), &AssemblyError::UnknownRegion { region: 7 });

    // Region 2 has cells, but no interior faces
    let err = ItemIntegrator::new(vec![FormArgument::new(&space, Identity).jump()], Action::identity(1))
        .with_target(AssemblyTarget::InteriorFaces)
        .with_regions(vec![2])
        .evaluate(&[&u])
        .unwrap_err();
    assert_eq!(assembly_error(&err), &AssemblyError::UnknownRegion { region: 2 });
}

#[test]
fn unsupported_combinations_are_reported() {
    let mesh = quad_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1Q1 { ncomponents: 1 }).unwrap();
    let hessian = FormArgument::new(&space, Hessian);
    let n = space.num_dofs();
    let err = BilinearForm::new(hessian, hessian, Action::identity(4))
        .assemble_into(DMatrix::zeros(n, n))
        .unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::UnsupportedCombination(_)));

    let value = FormArgument::new(&space, Identity);
    let component = FormArgument::new(&space, IdentityComponent(0));
    let err = BilinearForm::new(value, component, Action::identity(1))
        .symmetric()
        .assemble_into(DMatrix::zeros(n, n))
        .unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::UnsupportedCombination(_)));

    let u = DVector::zeros(n);
    let err = ItemIntegrator::new(vec![value.jump()], Action::identity(1))
        .evaluate(&[&u])
        .unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::UnsupportedCombination(_)));
}

#[test]
fn arguments_must_share_a_mesh() {
    let (first, second) = (triangle_grid(1), triangle_grid(1));
    let p1 = FiniteElementSpace::new(&first, H1P1 { ncomponents: 1 }).unwrap();
    let other = FiniteElementSpace::new(&second, H1P1 { ncomponents: 1 }).unwrap();
    let err = BilinearForm::new(FormArgument::new(&p1, Identity), FormArgument::new(&other, Identity), Action::identity(1))
        .assemble_into(DMatrix::zeros(4, 4))
        .unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::UnsupportedCombination(_)));
}

#[test]
fn invalid_operators_are_reported() {
    let mesh = triangle_grid(1);
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let u = DVector::zeros(space.num_dofs());
    let err = ItemIntegrator::new(vec![FormArgument::new(&space, SymmetricGradient)], Action::identity(3))
        .evaluate(&[&u])
        .unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::InvalidOperator { .. }));
}
