use crate::assembly::prepare::{FormPlan, FormWorkspace, LocalArgument};
use crate::assembly::{Action, ActionContext, AssemblyTarget, FormArgument, MatrixDestination};
use crate::error::{dimension_mismatch, unsupported};
use crate::Real;
use log::debug;
use nalgebra::{DMatrix, DVector, DVectorViewMut};

/// Assembles `A[i, j] += ∫ action(op_ansatz φ_j) · op_test ψ_i` over the items of a target.
///
/// Rows belong to the test argument and columns to the ansatz argument, unless the form is
/// [transposed](Self::transposed).
#[derive(Debug)]
pub struct BilinearForm<'a, T: Real> {
    test: FormArgument<'a, T>,
    ansatz: FormArgument<'a, T>,
    action: Action<T>,
    target: AssemblyTarget,
    regions: Option<Vec<usize>>,
    symmetric: bool,
    transposed: bool,
    transposed_copy_factor: T,
}

/// Evaluates the action for every local ansatz function at a quadrature point.
pub(crate) fn apply_to_locals<T: Real>(
    action: &Action<T>,
    argument: &LocalArgument<T>,
    fixed: &[T],
    free_offset: usize,
    context: &ActionContext<T>,
    input: &mut Vec<T>,
    output: &mut Vec<T>,
) {
    let result_len = action.result_len();
    input.clear();
    input.extend_from_slice(fixed);
    input.resize(action.argument_len(), T::zero());
    output.resize(argument.num_local() * result_len, T::zero());
    for (j, out) in output.chunks_exact_mut(result_len.max(1)).enumerate().take(argument.num_local()) {
        input[free_offset..free_offset + argument.len()].copy_from_slice(argument.value(j, context.qp));
        action.apply(out, input, context);
    }
}

fn dot<T: Real>(a: &[T], b: &[T]) -> T {
    a.iter().zip(b).fold(T::zero(), |acc, (x, y)| acc + *x * *y)
}

impl<'a, T: Real> BilinearForm<'a, T> {
    pub fn new(test: FormArgument<'a, T>, ansatz: FormArgument<'a, T>, action: Action<T>) -> Self {
        Self {
            test,
            ansatz,
            action,
            target: AssemblyTarget::Cells,
            regions: None,
            symmetric: false,
            transposed: false,
            transposed_copy_factor: -T::one(),
        }
    }

    pub fn with_target(self, target: AssemblyTarget) -> Self {
        Self { target, ..self }
    }

    pub fn with_regions(self, regions: Vec<usize>) -> Self {
        Self {
            regions: Some(regions),
            ..self
        }
    }

    /// Computes only the upper triangle of each local matrix and mirrors it.
    ///
    /// Requires identical test and ansatz arguments and a symmetric action.
    pub fn symmetric(self) -> Self {
        Self {
            symmetric: true,
            ..self
        }
    }

    /// Writes `A[j, i]` instead of `A[i, j]`, e.g. for the velocity-pressure block of a
    /// saddle point system assembled from the divergence form.
    pub fn transposed(self) -> Self {
        Self {
            transposed: true,
            ..self
        }
    }

    /// Scaling of the contributions written to the second destination of
    /// [`assemble_into_with_transpose`](Self::assemble_into_with_transpose). Defaults to `-1`.
    pub fn with_transposed_copy_factor(self, transposed_copy_factor: T) -> Self {
        Self {
            transposed_copy_factor,
            ..self
        }
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    pub fn is_transposed(&self) -> bool {
        self.transposed
    }

    fn check_action(&self) -> eyre::Result<()> {
        let (test_len, ansatz_len) = (self.test.output_len()?, self.ansatz.output_len()?);
        if self.action.argument_len() != ansatz_len {
            return Err(dimension_mismatch("action input", ansatz_len, self.action.argument_len()).into());
        }
        if self.action.result_len() != test_len {
            return Err(dimension_mismatch("action result", test_len, self.action.result_len()).into());
        }
        Ok(())
    }

    fn plan(&self) -> eyre::Result<FormPlan<'a, T>> {
        FormPlan::new(
            vec![self.test, self.ansatz],
            self.target,
            self.regions.as_deref(),
            self.action.bonus_quadorder(),
            self.action.needs_coordinates(),
        )
    }

    fn destination_shape(&self) -> (usize, usize) {
        let shape = (self.test.space().num_dofs(), self.ansatz.space().num_dofs());
        if self.transposed {
            (shape.1, shape.0)
        } else {
            shape
        }
    }

    fn check_destination(&self, destination: &impl MatrixDestination<T>, transpose: bool) -> eyre::Result<()> {
        let (nrows, ncols) = self.destination_shape();
        let (nrows, ncols) = if transpose { (ncols, nrows) } else { (nrows, ncols) };
        if destination.nrows() != nrows {
            return Err(dimension_mismatch("destination rows", nrows, destination.nrows()).into());
        }
        if destination.ncols() != ncols {
            return Err(dimension_mismatch("destination columns", ncols, destination.ncols()).into());
        }
        Ok(())
    }

    /// Computes the local matrix of the current item, rows for test and columns for ansatz
    /// functions.
    fn local_matrix(
        &self,
        plan: &FormPlan<'a, T>,
        workspace: &FormWorkspace<'a, T>,
        item: usize,
        local: &mut DMatrix<T>,
        buffers: &mut (Vec<T>, Vec<T>),
    ) {
        let item = &plan.items()[item];
        let (test, ansatz) = (workspace.argument(0), workspace.argument(1));
        let dim = plan.mesh().dim();
        local.resize_mut(test.num_local(), ansatz.num_local(), T::zero());
        local.fill(T::zero());
        let result_len = self.action.result_len();
        let (input, actioned) = buffers;
        for q in 0..workspace.num_points() {
            let context = ActionContext {
                item: item.index,
                region: item.region,
                qp: q,
                x: workspace.point(q, dim),
            };
            apply_to_locals(&self.action, ansatz, &[], 0, &context, input, actioned);
            let weight = workspace.factor(q);
            for i in 0..test.num_local() {
                let test_value = test.value(i, q);
                let first = if self.symmetric { i } else { 0 };
                for j in first..ansatz.num_local() {
                    let value = dot(&actioned[j * result_len..(j + 1) * result_len], test_value);
                    local[(i, j)] += weight * value;
                }
            }
        }
        if self.symmetric {
            for i in 0..local.nrows() {
                for j in 0..i {
                    local[(i, j)] = local[(j, i)];
                }
            }
        }
    }

    fn assemble_impl<D, E>(&self, destination: &mut D, mut transposed_destination: Option<&mut E>) -> eyre::Result<()>
    where
        D: MatrixDestination<T> + ?Sized,
        E: MatrixDestination<T> + ?Sized,
    {
        if self.symmetric && !self.test.is_same_as(&self.ansatz) {
            return Err(unsupported("symmetric assembly requires identical test and ansatz arguments").into());
        }
        self.check_action()?;
        let plan = self.plan()?;
        let mut workspace = plan.workspace()?;
        let mut local = DMatrix::zeros(0, 0);
        let mut buffers = (Vec::new(), Vec::new());
        for (index, item) in plan.items().iter().enumerate() {
            workspace.load(&plan, item)?;
            self.local_matrix(&plan, &workspace, index, &mut local, &mut buffers);
            let (test, ansatz) = (workspace.argument(0), workspace.argument(1));
            for (i, &row) in test.dofs().iter().enumerate() {
                for (j, &col) in ansatz.dofs().iter().enumerate() {
                    let value = local[(i, j)];
                    let (row, col) = if self.transposed { (col, row) } else { (row, col) };
                    destination.add_entry(row, col, value)?;
                    if let Some(copy) = transposed_destination.as_deref_mut() {
                        copy.add_entry(col, row, self.transposed_copy_factor * value)?;
                    }
                }
            }
        }
        debug!(
            "Assembled bilinear form over {} items{}",
            plan.items().len(),
            if self.symmetric { " (symmetric)" } else { "" }
        );
        Ok(())
    }

    /// Adds the form into a matrix.
    pub fn assemble_into(&self, mut destination: impl MatrixDestination<T>) -> eyre::Result<()> {
        self.check_destination(&destination, false)?;
        self.assemble_impl::<_, DMatrix<T>>(&mut destination, None)
    }

    /// Adds the form into `destination` and its transpose, scaled by the transposed copy
    /// factor, into `transposed_destination`.
    ///
    /// Used for Lagrange multiplier blocks that appear in a system together with their
    /// negated transpose.
    pub fn assemble_into_with_transpose(
        &self,
        mut destination: impl MatrixDestination<T>,
        mut transposed_destination: impl MatrixDestination<T>,
    ) -> eyre::Result<()> {
        self.check_destination(&destination, false)?;
        self.check_destination(&transposed_destination, true)?;
        self.assemble_impl(&mut destination, Some(&mut transposed_destination))
    }

    /// Adds the vector obtained by fixing one argument to the function with the given
    /// coefficients.
    ///
    /// With `fixed = 1` the ansatz argument is fixed and `b` is indexed by the test dofs, with
    /// `fixed = 0` the test argument is fixed and `b` is indexed by the ansatz dofs.
    pub fn assemble_vector_into<'b>(
        &self,
        b: impl Into<DVectorViewMut<'b, T>>,
        fixed: usize,
        coefficients: &DVector<T>,
    ) -> eyre::Result<()> {
        let mut b = b.into();
        if fixed > 1 {
            return Err(unsupported(format!("a bilinear form has no argument {fixed}")).into());
        }
        self.check_action()?;
        let free = 1 - fixed;
        let plan = self.plan()?;
        plan.check_coefficients(fixed, coefficients)?;
        let free_dofs = plan.arguments()[free].space().num_dofs();
        if b.len() != free_dofs {
            return Err(dimension_mismatch("bilinear form vector destination", free_dofs, b.len()).into());
        }

        let mut workspace = plan.workspace()?;
        let dim = plan.mesh().dim();
        let (test_len, ansatz_len) = (self.action.result_len(), self.action.argument_len());
        let mut fixed_value = vec![T::zero(); if fixed == 0 { test_len } else { ansatz_len }];
        let mut actioned = vec![T::zero(); test_len];
        let mut local = Vec::new();
        for item in plan.items() {
            workspace.load(&plan, item)?;
            let (test, ansatz) = (workspace.argument(0), workspace.argument(1));
            let free_argument = if free == 0 { test } else { ansatz };
            local.clear();
            local.resize(free_argument.num_local(), T::zero());
            for q in 0..workspace.num_points() {
                let context = ActionContext {
                    item: item.index,
                    region: item.region,
                    qp: q,
                    x: workspace.point(q, dim),
                };
                let weight = workspace.factor(q);
                if fixed == 1 {
                    ansatz.evaluate(coefficients, q, &mut fixed_value);
                    self.action.apply(&mut actioned, &fixed_value, &context);
                    for (i, l) in local.iter_mut().enumerate() {
                        *l += weight * dot(&actioned, test.value(i, q));
                    }
                } else {
                    test.evaluate(coefficients, q, &mut fixed_value);
                    for (j, l) in local.iter_mut().enumerate() {
                        self.action.apply(&mut actioned, ansatz.value(j, q), &context);
                        *l += weight * dot(&actioned, &fixed_value);
                    }
                }
            }
            for (&dof, l) in free_argument.dofs().iter().zip(&local) {
                b[dof] += *l;
            }
        }
        debug!(
            "Assembled bilinear form vector over {} items with argument {} fixed",
            plan.items().len(),
            fixed
        );
        Ok(())
    }
}
