use crate::assembly::prepare::{FormPlan, FormWorkspace};
use crate::assembly::{Action, ActionContext, AssemblyTarget, FormArgument};
use crate::error::dimension_mismatch;
use crate::Real;
use log::debug;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// Integrates an action applied to the evaluations of given functions over mesh items.
///
/// The action receives the concatenated operator outputs of all arguments at each quadrature
/// point, evaluated with coefficient vectors supplied at evaluation time. Typical uses are
/// norms, errors against exact solutions and item-wise error indicators.
#[derive(Debug)]
pub struct ItemIntegrator<'a, T: Real> {
    arguments: Vec<FormArgument<'a, T>>,
    action: Action<T>,
    target: AssemblyTarget,
    regions: Option<Vec<usize>>,
}

impl<'a, T: Real> ItemIntegrator<'a, T> {
    pub fn new(arguments: Vec<FormArgument<'a, T>>, action: Action<T>) -> Self {
        Self {
            arguments,
            action,
            target: AssemblyTarget::Cells,
            regions: None,
        }
    }

    pub fn with_target(self, target: AssemblyTarget) -> Self {
        Self { target, ..self }
    }

    /// Restricts integration to items in the given regions.
    pub fn with_regions(self, regions: Vec<usize>) -> Self {
        Self {
            regions: Some(regions),
            ..self
        }
    }

    pub fn result_len(&self) -> usize {
        self.action.result_len()
    }

    fn prepare(&self, coefficients: &[&DVector<T>]) -> eyre::Result<FormPlan<'a, T>> {
        if coefficients.len() != self.arguments.len() {
            return Err(dimension_mismatch("coefficient vectors", self.arguments.len(), coefficients.len()).into());
        }
        let plan = FormPlan::new(
            self.arguments.clone(),
            self.target,
            self.regions.as_deref(),
            self.action.bonus_quadorder(),
            self.action.needs_coordinates(),
        )?;
        let argument_len = self
            .arguments
            .iter()
            .map(FormArgument::output_len)
            .sum::<eyre::Result<usize>>()?;
        if argument_len != self.action.argument_len() {
            return Err(dimension_mismatch("action input", argument_len, self.action.argument_len()).into());
        }
        for (a, c) in coefficients.iter().enumerate() {
            plan.check_coefficients(a, c)?;
        }
        Ok(plan)
    }

    fn integrate_item(
        &self,
        plan: &FormPlan<'a, T>,
        workspace: &mut FormWorkspace<'a, T>,
        buffers: &mut (Vec<T>, Vec<T>),
        coefficients: &[&DVector<T>],
        i: usize,
        result: &mut [T],
    ) -> eyre::Result<()> {
        let item = &plan.items()[i];
        workspace.load(plan, item)?;
        let (input, local_result) = buffers;
        input.resize(self.action.argument_len(), T::zero());
        local_result.resize(self.action.result_len(), T::zero());
        let dim = plan.mesh().dim();
        result.fill(T::zero());
        for q in 0..workspace.num_points() {
            let mut offset = 0;
            for (a, c) in coefficients.iter().enumerate() {
                let argument = workspace.argument(a);
                argument.evaluate(c, q, &mut input[offset..offset + argument.len()]);
                offset += argument.len();
            }
            let context = ActionContext {
                item: item.index,
                region: item.region,
                qp: q,
                x: workspace.point(q, dim),
            };
            self.action.apply(local_result, input, &context);
            let factor = workspace.factor(q);
            for (r, v) in result.iter_mut().zip(local_result.iter()) {
                *r += factor * *v;
            }
        }
        Ok(())
    }

    /// Integrates the action over all items, one column of results per item.
    ///
    /// The columns follow the order of the items visited, i.e. cell or face indices in
    /// ascending order, restricted to the region filter.
    pub fn evaluate_per_item(&self, coefficients: &[&DVector<T>]) -> eyre::Result<DMatrix<T>> {
        let plan = self.prepare(coefficients)?;
        let mut workspace = plan.workspace()?;
        let mut buffers = (Vec::new(), Vec::new());
        let mut results = DMatrix::zeros(self.result_len(), plan.items().len());
        let mut column = vec![T::zero(); self.result_len()];
        for i in 0..plan.items().len() {
            self.integrate_item(&plan, &mut workspace, &mut buffers, coefficients, i, &mut column)?;
            results.column_mut(i).copy_from_slice(&column);
        }
        debug!("Integrated {} items with {:?}", plan.items().len(), self.target);
        Ok(results)
    }

    /// Parallel version of [`evaluate_per_item`](Self::evaluate_per_item).
    pub fn par_evaluate_per_item(&self, coefficients: &[&DVector<T>]) -> eyre::Result<DMatrix<T>> {
        let plan = self.prepare(coefficients)?;
        // Surface construction errors before spawning workers
        plan.workspace()?;
        let result_len = self.result_len();
        let columns = (0..plan.items().len())
            .into_par_iter()
            .map_init(
                || (plan.workspace(), (Vec::new(), Vec::new())),
                |(workspace, buffers), i| -> eyre::Result<Vec<T>> {
                    let workspace = workspace
                        .as_mut()
                        .map_err(|err| eyre::eyre!("failed to create assembly workspace: {err}"))?;
                    let mut column = vec![T::zero(); result_len];
                    self.integrate_item(&plan, workspace, buffers, coefficients, i, &mut column)?;
                    Ok(column)
                },
            )
            .collect::<eyre::Result<Vec<_>>>()?;
        debug!(
            "Integrated {} items with {:?} in parallel",
            plan.items().len(),
            self.target
        );
        Ok(DMatrix::from_fn(result_len, columns.len(), |r, c| columns[c][r]))
    }

    /// Integrates the action over all items and sums the results.
    pub fn evaluate(&self, coefficients: &[&DVector<T>]) -> eyre::Result<DVector<T>> {
        let per_item = self.evaluate_per_item(coefficients)?;
        Ok(per_item.column_sum())
    }
}
