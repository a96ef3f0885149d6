use crate::assembly::bilinear_form::apply_to_locals;
use crate::assembly::prepare::FormPlan;
use crate::assembly::{Action, ActionContext, AssemblyTarget, FormArgument, MatrixDestination};
use crate::error::{dimension_mismatch, unsupported};
use crate::Real;
use log::debug;
use nalgebra::{DVector, DVectorViewMut};

/// A form `c(a, b, v) = ∫ action(op_a a, op_b b) · op_v v` with three arguments.
///
/// The action receives the concatenated operator outputs of `a` and `b` and returns a value
/// of the test operator's output length. Fixing one of `a` and `b` to a known function gives
/// a matrix, fixing both gives a vector. Convection terms `(u · ∇) u` and their Newton
/// linearizations are the typical use.
#[derive(Debug)]
pub struct TrilinearForm<'a, T: Real> {
    arguments: [FormArgument<'a, T>; 3],
    action: Action<T>,
    target: AssemblyTarget,
    regions: Option<Vec<usize>>,
}

impl<'a, T: Real> TrilinearForm<'a, T> {
    pub fn new(a: FormArgument<'a, T>, b: FormArgument<'a, T>, test: FormArgument<'a, T>, action: Action<T>) -> Self {
        Self {
            arguments: [a, b, test],
            action,
            target: AssemblyTarget::Cells,
            regions: None,
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

    fn prepare(&self) -> eyre::Result<(FormPlan<'a, T>, [usize; 3])> {
        let lens = [
            self.arguments[0].output_len()?,
            self.arguments[1].output_len()?,
            self.arguments[2].output_len()?,
        ];
        if self.action.argument_len() != lens[0] + lens[1] {
            return Err(dimension_mismatch("action input", lens[0] + lens[1], self.action.argument_len()).into());
        }
        if self.action.result_len() != lens[2] {
            return Err(dimension_mismatch("action result", lens[2], self.action.result_len()).into());
        }
        let plan = FormPlan::new(
            self.arguments.to_vec(),
            self.target,
            self.regions.as_deref(),
            self.action.bonus_quadorder(),
            self.action.needs_coordinates(),
        )?;
        Ok((plan, lens))
    }

    /// Adds the matrix obtained by fixing argument `fixed` (`0` for `a`, `1` for `b`) to the
    /// function with the given coefficients.
    ///
    /// Rows belong to the test argument and columns to the remaining free argument.
    pub fn assemble_matrix_into(
        &self,
        mut destination: impl MatrixDestination<T>,
        fixed: usize,
        coefficients: &DVector<T>,
    ) -> eyre::Result<()> {
        if fixed > 1 {
            return Err(unsupported(format!("argument {fixed} of a trilinear form cannot be fixed")).into());
        }
        let free = 1 - fixed;
        let (plan, lens) = self.prepare()?;
        plan.check_coefficients(fixed, coefficients)?;
        let (nrows, ncols) = (
            self.arguments[2].space().num_dofs(),
            self.arguments[free].space().num_dofs(),
        );
        if destination.nrows() != nrows {
            return Err(dimension_mismatch("destination rows", nrows, destination.nrows()).into());
        }
        if destination.ncols() != ncols {
            return Err(dimension_mismatch("destination columns", ncols, destination.ncols()).into());
        }

        let mut workspace = plan.workspace()?;
        let dim = plan.mesh().dim();
        let result_len = lens[2];
        let free_offset = if free == 0 { 0 } else { lens[0] };
        let fixed_offset = if fixed == 0 { 0 } else { lens[0] };
        let mut fixed_input = vec![T::zero(); lens[0] + lens[1]];
        let (mut input, mut actioned) = (Vec::new(), Vec::new());
        let mut local = Vec::new();
        for item in plan.items() {
            workspace.load(&plan, item)?;
            let (free_argument, test) = (workspace.argument(free), workspace.argument(2));
            let (n_test, n_free) = (test.num_local(), free_argument.num_local());
            local.clear();
            local.resize(n_test * n_free, T::zero());
            for q in 0..workspace.num_points() {
                let context = ActionContext {
                    item: item.index,
                    region: item.region,
                    qp: q,
                    x: workspace.point(q, dim),
                };
                workspace.argument(fixed).evaluate(
                    coefficients,
                    q,
                    &mut fixed_input[fixed_offset..fixed_offset + lens[fixed]],
                );
                apply_to_locals(
                    &self.action,
                    free_argument,
                    &fixed_input,
                    free_offset,
                    &context,
                    &mut input,
                    &mut actioned,
                );
                let weight = workspace.factor(q);
                for i in 0..n_test {
                    let test_value = test.value(i, q);
                    for j in 0..n_free {
                        let value = actioned[j * result_len..(j + 1) * result_len]
                            .iter()
                            .zip(test_value)
                            .fold(T::zero(), |acc, (x, y)| acc + *x * *y);
                        local[i * n_free + j] += weight * value;
                    }
                }
            }
            for (i, &row) in test.dofs().iter().enumerate() {
                for (j, &col) in free_argument.dofs().iter().enumerate() {
                    destination.add_entry(row, col, local[i * n_free + j])?;
                }
            }
        }
        debug!(
            "Assembled trilinear form matrix over {} items with argument {} fixed",
            plan.items().len(),
            fixed
        );
        Ok(())
    }

    /// Adds the vector obtained by fixing both `a` and `b`.
    pub fn assemble_vector_into<'b>(
        &self,
        b: impl Into<DVectorViewMut<'b, T>>,
        a_coefficients: &DVector<T>,
        b_coefficients: &DVector<T>,
    ) -> eyre::Result<()> {
        let mut b = b.into();
        let (plan, lens) = self.prepare()?;
        plan.check_coefficients(0, a_coefficients)?;
        plan.check_coefficients(1, b_coefficients)?;
        let num_dofs = self.arguments[2].space().num_dofs();
        if b.len() != num_dofs {
            return Err(dimension_mismatch("trilinear form vector destination", num_dofs, b.len()).into());
        }

        let mut workspace = plan.workspace()?;
        let dim = plan.mesh().dim();
        let mut input = vec![T::zero(); lens[0] + lens[1]];
        let mut actioned = vec![T::zero(); lens[2]];
        let mut local = Vec::new();
        for item in plan.items() {
            workspace.load(&plan, item)?;
            let test = workspace.argument(2);
            local.clear();
            local.resize(test.num_local(), T::zero());
            for q in 0..workspace.num_points() {
                let context = ActionContext {
                    item: item.index,
                    region: item.region,
                    qp: q,
                    x: workspace.point(q, dim),
                };
                let (input_a, input_b) = input.split_at_mut(lens[0]);
                workspace.argument(0).evaluate(a_coefficients, q, input_a);
                workspace.argument(1).evaluate(b_coefficients, q, input_b);
                self.action.apply(&mut actioned, &input, &context);
                let weight = workspace.factor(q);
                for (i, l) in local.iter_mut().enumerate() {
                    *l += weight
                        * actioned
                            .iter()
                            .zip(test.value(i, q))
                            .fold(T::zero(), |acc, (x, y)| acc + *x * *y);
                }
            }
            for (&dof, l) in test.dofs().iter().zip(&local) {
                b[dof] += *l;
            }
        }
        debug!("Assembled trilinear form vector over {} items", plan.items().len());
        Ok(())
    }

    /// Adds the Newton linearization `c(u, du, v) + c(du, u, v)` at the state `u`.
    ///
    /// Requires `a` and `b` to be functions of the same space.
    pub fn assemble_linearization_into(
        &self,
        mut destination: impl MatrixDestination<T>,
        state: &DVector<T>,
    ) -> eyre::Result<()> {
        if !std::ptr::eq(self.arguments[0].space(), self.arguments[1].space()) {
            return Err(unsupported("linearization requires both nonlinear arguments in the same space").into());
        }
        self.assemble_matrix_into(&mut destination, 0, state)?;
        self.assemble_matrix_into(&mut destination, 1, state)
    }
}
