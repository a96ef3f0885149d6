use feassemble::assembly::{
    Action, AssemblyTarget, BilinearForm, FormArgument, ItemIntegrator, LinearForm, MatrixBlock, TrilinearForm,
};
use feassemble::element::FiniteElementType::*;
use feassemble::operator::FunctionOperator::*;
use feassemble::proptest::triangle_corners;
use feassemble::space::FiniteElementSpace;
use feassemble::AssemblyError;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use proptest::prelude::*;
use util::{distorted_quad_grid, hex_grid, mixed_tri_quad, single_triangle, tet_cube, triangle_grid};

fn linear(x: &[f64], values: &mut [f64]) {
    values[0] = 1.0 + 2.0 * x[0] - x[1];
}

fn linear_vector(x: &[f64], values: &mut [f64]) {
    values[0] = x[0] - 2.0 * x[1];
    values[1] = 0.5 + x[0] + x[1];
}

fn sum(vector: &DVector<f64>) -> f64 {
    vector.iter().sum()
}

#[test]
fn symmetric_mass_matrix_is_spd_and_integrates_one() {
    let mesh = triangle_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let u = FormArgument::new(&space, Identity);
    let n = space.num_dofs();

    let mut symmetric = DMatrix::zeros(n, n);
    BilinearForm::new(u, u, Action::identity(1))
        .symmetric()
        .assemble_into(&mut symmetric)
        .unwrap();
    assert_eq!(symmetric, symmetric.transpose());
    assert_scalar_eq!(symmetric.sum(), 1.0, comp = abs, tol = 1e-14);
    let eigenvalues = symmetric.clone().symmetric_eigenvalues();
    assert!(eigenvalues.min() > 0.0);

    let mut general = DMatrix::zeros(n, n);
    BilinearForm::new(u, u, Action::identity(1))
        .assemble_into(&mut general)
        .unwrap();
    assert_matrix_eq!(general, symmetric, comp = abs, tol = 1e-15);
}

#[test]
fn stiffness_matrix_integrates_gradients() {
    let mesh = tet_cube(1);
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let grad = FormArgument::new(&space, Gradient);
    let n = space.num_dofs();
    let mut stiffness = DMatrix::zeros(n, n);
    BilinearForm::new(grad, grad, Action::identity(3))
        .symmetric()
        .assemble_into(&mut stiffness)
        .unwrap();

    let ones = DVector::repeat(n, 1.0);
    assert_matrix_eq!(&stiffness * &ones, DVector::zeros(n), comp = abs, tol = 1e-13);

    // |grad (x - 2y + 3z)|^2 = 14 over the unit cube
    let u = space
        .interpolate(|x, values| values[0] = x[0] - 2.0 * x[1] + 3.0 * x[2])
        .unwrap();
    assert_scalar_eq!(u.dot(&(&stiffness * &u)), 14.0, comp = abs, tol = 1e-12);
}

#[test]
fn sparse_destinations_agree_with_dense() {
    let mesh = triangle_grid(3);
    let space = FiniteElementSpace::new(&mesh, H1P2 { ncomponents: 1 }).unwrap();
    let grad = FormArgument::new(&space, Gradient);
    let form = BilinearForm::new(grad, grad, Action::scaled(2, 0.5));
    let n = space.num_dofs();

    let mut dense = DMatrix::zeros(n, n);
    form.assemble_into(&mut dense).unwrap();

    let mut coo = CooMatrix::new(n, n);
    form.assemble_into(&mut coo).unwrap();
    let mut csr = CsrMatrix::from(&coo);
    assert_matrix_eq!(DMatrix::from(&csr), dense, comp = abs, tol = 1e-14);

    csr.values_mut().fill(0.0);
    form.assemble_into(&mut csr).unwrap();
    assert_matrix_eq!(DMatrix::from(&csr), dense, comp = abs, tol = 1e-14);

    let mut diagonal = CsrMatrix::identity(n);
    let err = form.assemble_into(&mut diagonal).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AssemblyError>(),
        Some(AssemblyError::MissingMatrixEntry { .. })
    ));
}

#[test]
fn matrix_blocks_are_offset() {
    let mesh = triangle_grid(1);
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let u = FormArgument::new(&space, Identity);
    let form = BilinearForm::new(u, u, Action::identity(1));
    let mut mass = DMatrix::zeros(4, 4);
    form.assemble_into(&mut mass).unwrap();

    let mut system = DMatrix::zeros(6, 7);
    form.assemble_into(MatrixBlock::new(&mut system, 2, 3, 4, 4)).unwrap();
    assert_matrix_eq!(system.view((2, 3), (4, 4)), mass, comp = exact);
    assert_scalar_eq!(system.abs().sum(), mass.abs().sum(), comp = abs, tol = 1e-15);
}

#[test]
fn constant_source_sums_to_area() {
    let meshes = [triangle_grid(3), mixed_tri_quad(), distorted_quad_grid(3, 0.2)];
    for mesh in &meshes {
        let space = FiniteElementSpace::new(mesh, H1Q1 { ncomponents: 1 }).unwrap();
        let mut b = DVector::zeros(space.num_dofs());
        LinearForm::new(FormArgument::new(&space, Identity), Action::identity(1))
            .assemble_into(&mut b, 1.0)
            .unwrap();
        assert_scalar_eq!(sum(&b), 1.0, comp = abs, tol = 1e-13);
    }
}

#[test]
fn mass_matrix_on_mixed_cells_matches_region_sums() {
    let mesh = mixed_tri_quad();
    let space = FiniteElementSpace::new(&mesh, H1Q1 { ncomponents: 1 }).unwrap();
    let v = FormArgument::new(&space, Identity);
    let n = space.num_dofs();
    let assemble = |regions: Vec<usize>| {
        let mut mass = DMatrix::zeros(n, n);
        BilinearForm::new(v, v, Action::identity(1))
            .symmetric()
            .with_regions(regions)
            .assemble_into(&mut mass)
            .unwrap();
        mass
    };
    let mass = assemble(vec![1, 2]);
    assert_matrix_eq!(mass, assemble(vec![1]) + assemble(vec![2]), comp = abs, tol = 1e-15);
    assert_scalar_eq!(mass.sum(), 1.0, comp = abs, tol = 1e-14);
    let u = space.interpolate(linear).unwrap();
    assert_scalar_eq!((&mass * &u).sum(), 1.5, comp = abs, tol = 1e-14);
}

#[test]
fn region_filters_restrict_items() {
    let mesh = mixed_tri_quad();
    let space = FiniteElementSpace::new(&mesh, H1Q1 { ncomponents: 1 }).unwrap();
    let v = FormArgument::new(&space, Identity);
    let assemble = |target, regions: Vec<usize>| {
        let mut b = DVector::zeros(space.num_dofs());
        LinearForm::new(v, Action::identity(1))
            .with_target(target)
            .with_regions(regions)
            .assemble_into(&mut b, 2.0)
            .unwrap();
        sum(&b)
    };
    assert_scalar_eq!(assemble(AssemblyTarget::Cells, vec![2]), 1.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(assemble(AssemblyTarget::Cells, vec![1, 2]), 2.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(assemble(AssemblyTarget::BoundaryFaces, vec![2]), 2.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(assemble(AssemblyTarget::BoundaryFaces, vec![1]), 6.0, comp = abs, tol = 1e-14);
}

#[test]
fn coordinate_dependent_sources() {
    let mesh = triangle_grid(2);
    let space = FiniteElementSpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    let action = Action::<f64>::with_coordinates(1, 1, |result, v, context| {
        let x = context.x.expect("coordinates are requested");
        result[0] = x[0] * x[1] * v[0];
    })
    .with_bonus_quadorder(2);
    let mut b = DVector::zeros(space.num_dofs());
    LinearForm::new(FormArgument::new(&space, Identity), action)
        .assemble_into(&mut b, 1.0)
        .unwrap();
    assert_scalar_eq!(sum(&b), 0.25, comp = abs, tol = 1e-14);
}

/// The integrals of the divergences of all `HdivRT0` functions over the cells, and of their
/// normal fluxes over the boundary faces.
fn divergence_and_boundary_flux(space: &FiniteElementSpace<f64>) -> (DVector<f64>, DVector<f64>) {
    let mut divergence = DVector::zeros(space.num_dofs());
    LinearForm::new(FormArgument::new(space, Divergence), Action::identity(1))
        .assemble_into(&mut divergence, 1.0)
        .unwrap();
    let mut flux = DVector::zeros(space.num_dofs());
    LinearForm::new(FormArgument::new(space, NormalFlux), Action::identity(1))
        .with_target(AssemblyTarget::BoundaryFaces)
        .assemble_into(&mut flux, 1.0)
        .unwrap();
    (divergence, flux)
}

#[test]
fn raviart_thomas_satisfies_divergence_theorem() {
    for mesh in [triangle_grid(2), tet_cube(1)] {
        let space = FiniteElementSpace::new(&mesh, HdivRT0).unwrap();
        let (divergence, flux) = divergence_and_boundary_flux(&space);
        assert_matrix_eq!(divergence, flux, comp = abs, tol = 1e-12);
        let mut boundary = DVector::zeros(space.num_dofs());
        for &face in mesh.boundary_faces() {
            boundary[space.face_dofs(face)[0]] = 1.0;
        }
        assert_matrix_eq!(divergence, boundary, comp = abs, tol = 1e-12);
    }
}

#[test]
fn continuous_functions_have_no_jumps() {
    let mesh = triangle_grid(3);
    let squared = || Action::<f64>::new(1, 1, |result, v, _| result[0] = v[0] * v[0]);

    let p1 = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let u = p1.interpolate(linear).unwrap();
    let jumps = ItemIntegrator::new(vec![FormArgument::new(&p1, Identity).jump()], squared())
        .with_target(AssemblyTarget::InteriorFaces)
        .evaluate(&[&u])
        .unwrap();
    assert_scalar_eq!(jumps[0], 0.0, comp = abs, tol = 1e-24);

    let p0 = FiniteElementSpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    let u = p0.interpolate(|x, values| values[0] = x[0] + 3.0 * x[1]).unwrap();
    let per_face = ItemIntegrator::new(vec![FormArgument::new(&p0, Identity).jump()], squared())
        .with_target(AssemblyTarget::InteriorFaces)
        .evaluate_per_item(&[&u])
        .unwrap();
    let interior_faces = (0..mesh.num_faces()).filter(|&f| mesh.is_interior_face(f)).count();
    assert_eq!(per_face.ncols(), interior_faces);
    assert!(per_face.iter().all(|&jump| jump > 0.0));
}

/// The squared jumps of `u` integrated over every interior face.
fn interior_jumps(space: &FiniteElementSpace<f64>, u: &DVector<f64>) -> DMatrix<f64> {
    ItemIntegrator::new(
        vec![FormArgument::new(space, Identity).jump()],
        Action::<f64>::new(1, 1, |result, v, _| result[0] = v[0] * v[0]),
    )
    .with_target(AssemblyTarget::InteriorFaces)
    .evaluate_per_item(&[u])
    .unwrap()
}

#[test]
fn continuous_functions_have_no_jumps_in_3d() {
    let tets = tet_cube(2);
    let p2 = FiniteElementSpace::new(&tets, H1P2 { ncomponents: 1 }).unwrap();
    let u = p2
        .interpolate(|x, values| values[0] = x[0] * x[2] - 2.0 * x[1] * x[1] + x[0] * x[1] + 3.0 * x[2])
        .unwrap();
    let jumps = interior_jumps(&p2, &u);
    assert!(jumps.ncols() > 0);
    assert_scalar_eq!(jumps.sum(), 0.0, comp = abs, tol = 1e-20);

    let p0 = FiniteElementSpace::new(&tets, L2P0 { ncomponents: 1 }).unwrap();
    let u = p0
        .interpolate(|x, values| values[0] = x[0] + 2.0 * x[1] + 4.0 * x[2])
        .unwrap();
    assert!(interior_jumps(&p0, &u).sum() > 1e-3);

    let hexes = hex_grid(2);
    let q1 = FiniteElementSpace::new(&hexes, H1Q1 { ncomponents: 1 }).unwrap();
    let u = q1
        .interpolate(|x, values| values[0] = x[0] * x[1] * x[2] - x[0] + 2.0 * x[1] * x[2])
        .unwrap();
    let jumps = interior_jumps(&q1, &u);
    assert!(jumps.ncols() > 0);
    assert_scalar_eq!(jumps.sum(), 0.0, comp = abs, tol = 1e-20);
}

#[test]
fn averages_and_sides_of_continuous_functions_agree() {
    let mesh = triangle_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let u = space.interpolate(linear).unwrap();
    let v = FormArgument::new(&space, Identity);
    for (a, b) in [(v.average(), v.side(0)), (v.side(1), v)] {
        let mismatch = ItemIntegrator::new(
            vec![a, b],
            Action::<f64>::new(1, 2, |result, values, _| result[0] = (values[0] - values[1]).powi(2)),
        )
        .with_target(AssemblyTarget::InteriorFaces)
        .evaluate(&[&u, &u])
        .unwrap();
        assert_scalar_eq!(mismatch[0], 0.0, comp = abs, tol = 1e-24);
    }
}

#[test]
fn transposed_forms_write_transposes() {
    let mesh = triangle_grid(2);
    let velocity = FiniteElementSpace::new(&mesh, HdivRT0).unwrap();
    let pressure = FiniteElementSpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    let q = FormArgument::new(&pressure, Identity);
    let div = FormArgument::new(&velocity, Divergence);
    let (np, nv) = (pressure.num_dofs(), velocity.num_dofs());

    let mut b = DMatrix::zeros(np, nv);
    BilinearForm::new(q, div, Action::identity(1))
        .assemble_into(&mut b)
        .unwrap();

    let mut bt = DMatrix::zeros(nv, np);
    let transposed = BilinearForm::new(q, div, Action::identity(1)).transposed();
    assert!(transposed.is_transposed());
    transposed.assemble_into(&mut bt).unwrap();
    assert_matrix_eq!(bt, b.transpose(), comp = abs, tol = 1e-15);

    let (mut primary, mut copy) = (DMatrix::zeros(np, nv), DMatrix::zeros(nv, np));
    BilinearForm::new(q, div, Action::identity(1))
        .assemble_into_with_transpose(&mut primary, &mut copy)
        .unwrap();
    assert_matrix_eq!(primary, b, comp = abs, tol = 1e-15);
    assert_matrix_eq!(copy, -b.transpose(), comp = abs, tol = 1e-15);

    let mut scaled_copy = DMatrix::zeros(nv, np);
    BilinearForm::new(q, div, Action::identity(1))
        .with_transposed_copy_factor(2.0)
        .assemble_into_with_transpose(DMatrix::zeros(np, nv), &mut scaled_copy)
        .unwrap();
    assert_matrix_eq!(scaled_copy, 2.0 * b.transpose(), comp = abs, tol = 1e-15);
}

#[test]
fn fixing_an_argument_gives_matrix_vector_products() {
    let mesh = distorted_quad_grid(3, 0.15);
    let test_space = FiniteElementSpace::new(&mesh, H1Q1 { ncomponents: 1 }).unwrap();
    let ansatz_space = FiniteElementSpace::new(&mesh, H1Q1 { ncomponents: 2 }).unwrap();
    let form = BilinearForm::new(
        FormArgument::new(&test_space, Gradient),
        FormArgument::new(&ansatz_space, Identity),
        Action::<f64>::new(2, 2, |result, u, _| {
            result[0] = u[0] + 0.5 * u[1];
            result[1] = -u[1];
        }),
    );
    let mut a = DMatrix::zeros(test_space.num_dofs(), ansatz_space.num_dofs());
    form.assemble_into(&mut a).unwrap();

    let u = ansatz_space.interpolate(linear_vector).unwrap();
    let mut au = DVector::zeros(test_space.num_dofs());
    form.assemble_vector_into(&mut au, 1, &u).unwrap();
    assert_matrix_eq!(au, &a * &u, comp = abs, tol = 1e-13);

    let v = test_space.interpolate(linear).unwrap();
    let mut atv = DVector::zeros(ansatz_space.num_dofs());
    form.assemble_vector_into(&mut atv, 0, &v).unwrap();
    assert_matrix_eq!(atv, a.transpose() * &v, comp = abs, tol = 1e-13);
}

/// `((a . grad) b) . v` for two-dimensional vector fields.
fn convection() -> Action<f64> {
    Action::<f64>::new(2, 6, |result, input, _| {
        let (a, grad_b) = input.split_at(2);
        for c in 0..2 {
            result[c] = a[0] * grad_b[2 * c] + a[1] * grad_b[2 * c + 1];
        }
    })
}

#[test]
fn trilinear_linearization_is_consistent() {
    let mesh = triangle_grid(2);
    let space = FiniteElementSpace::new(&mesh, H1P2 { ncomponents: 2 }).unwrap();
    let form = TrilinearForm::new(
        FormArgument::new(&space, Identity),
        FormArgument::new(&space, Gradient),
        FormArgument::new(&space, Identity),
        convection(),
    );
    let n = space.num_dofs();
    let u = space.interpolate(linear_vector).unwrap();
    let w = space
        .interpolate(|x, values| {
            values[0] = x[1] * x[1];
            values[1] = x[0] - x[0] * x[1];
        })
        .unwrap();

    let mut c_uu = DVector::zeros(n);
    form.assemble_vector_into(&mut c_uu, &u, &u).unwrap();
    let mut c_uw = DVector::zeros(n);
    form.assemble_vector_into(&mut c_uw, &u, &w).unwrap();
    let mut c_wu = DVector::zeros(n);
    form.assemble_vector_into(&mut c_wu, &w, &u).unwrap();

    let mut fixed_a = DMatrix::zeros(n, n);
    form.assemble_matrix_into(&mut fixed_a, 0, &u).unwrap();
    assert_matrix_eq!(&fixed_a * &w, c_uw, comp = abs, tol = 1e-12);

    let mut fixed_b = DMatrix::zeros(n, n);
    form.assemble_matrix_into(&mut fixed_b, 1, &u).unwrap();
    assert_matrix_eq!(&fixed_b * &w, c_wu, comp = abs, tol = 1e-12);

    let mut linearization = DMatrix::zeros(n, n);
    form.assemble_linearization_into(&mut linearization, &u).unwrap();
    assert_matrix_eq!(linearization, &fixed_a + &fixed_b, comp = abs, tol = 1e-13);
    assert_matrix_eq!(&linearization * &u, 2.0 * c_uu, comp = abs, tol = 1e-12);
}

#[test]
fn reconstruction_preserves_cell_divergence() {
    let mesh = triangle_grid(2);
    for element in [H1CR { ncomponents: 2 }, H1BR] {
        let space = FiniteElementSpace::new(&mesh, element).unwrap();
        let u = space.interpolate(linear_vector).unwrap();
        let divergence = |operator| {
            ItemIntegrator::new(vec![FormArgument::new(&space, operator)], Action::identity(1))
                .evaluate_per_item(&[&u])
                .unwrap()
        };
        let reconstructed = divergence(ReconstructionDivergence);
        let original = divergence(Divergence);
        assert_eq!(reconstructed.ncols(), mesh.num_cells());
        assert_matrix_eq!(reconstructed, original, comp = abs, tol = 1e-12);
        // div u = 2 everywhere
        assert_scalar_eq!(reconstructed.sum(), 2.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn parallel_integration_matches_sequential() {
    let mesh = tet_cube(2);
    let space = FiniteElementSpace::new(&mesh, H1P2 { ncomponents: 1 }).unwrap();
    let u = space
        .interpolate(|x, values| values[0] = x[0] * x[1] - x[2] * x[2])
        .unwrap();
    let integrator = ItemIntegrator::new(
        vec![FormArgument::new(&space, Identity), FormArgument::new(&space, Gradient)],
        Action::<f64>::new(2, 4, |result, input, _| {
            result[0] = input[0] * input[0];
            result[1] = input[1..].iter().map(|g| g * g).sum();
        }),
    );
    let sequential = integrator.evaluate_per_item(&[&u, &u]).unwrap();
    let parallel = integrator.par_evaluate_per_item(&[&u, &u]).unwrap();
    assert_eq!(sequential.shape(), (2, mesh.num_cells()));
    assert_matrix_eq!(parallel, sequential, comp = abs, tol = 1e-15);
}

proptest! {
    #[test]
    fn raviart_thomas_functions_have_unit_flux(corners in triangle_corners(1e-2)) {
        let mesh = single_triangle(corners).unwrap();
        let space = FiniteElementSpace::new(&mesh, HdivRT0).unwrap();
        let (divergence, flux) = divergence_and_boundary_flux(&space);
        for (d, f) in divergence.iter().zip(&flux) {
            prop_assert!((d - 1.0).abs() < 1e-10);
            prop_assert!((f - 1.0).abs() < 1e-10);
        }
    }
}
