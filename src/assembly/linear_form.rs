use crate::assembly::prepare::FormPlan;
use crate::assembly::{Action, ActionContext, AssemblyTarget, FormArgument};
use crate::error::dimension_mismatch;
use crate::Real;
use log::debug;
use nalgebra::DVectorViewMut;

/// Assembles `b_i += factor * ∫ action(op φ_i)` over the items of a target.
///
/// The action maps the operator output of a single test function to a scalar, so a source
/// term `∫ f v` is an action with argument length 1 returning `f(x) v`.
#[derive(Debug)]
pub struct LinearForm<'a, T: Real> {
    test: FormArgument<'a, T>,
    action: Action<T>,
    target: AssemblyTarget,
    regions: Option<Vec<usize>>,
}

impl<'a, T: Real> LinearForm<'a, T> {
    pub fn new(test: FormArgument<'a, T>, action: Action<T>) -> Self {
        Self {
            test,
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

    pub fn test(&self) -> &FormArgument<'a, T> {
        &self.test
    }

    pub fn assemble_into<'b>(&self, b: impl Into<DVectorViewMut<'b, T>>, factor: T) -> eyre::Result<()> {
        let mut b = b.into();
        let space = self.test.space();
        if b.len() != space.num_dofs() {
            return Err(dimension_mismatch("linear form destination", space.num_dofs(), b.len()).into());
        }
        let test_len = self.test.output_len()?;
        if self.action.argument_len() != test_len {
            return Err(dimension_mismatch("action input", test_len, self.action.argument_len()).into());
        }
        if self.action.result_len() != 1 {
            return Err(dimension_mismatch("linear form action result", 1, self.action.result_len()).into());
        }

        let plan = FormPlan::new(
            vec![self.test],
            self.target,
            self.regions.as_deref(),
            self.action.bonus_quadorder(),
            self.action.needs_coordinates(),
        )?;
        let mut workspace = plan.workspace()?;
        let dim = plan.mesh().dim();
        let mut result = [T::zero()];
        let mut local = Vec::new();
        for item in plan.items() {
            workspace.load(&plan, item)?;
            let test = workspace.argument(0);
            local.clear();
            local.resize(test.num_local(), T::zero());
            for q in 0..workspace.num_points() {
                let context = ActionContext {
                    item: item.index,
                    region: item.region,
                    qp: q,
                    x: workspace.point(q, dim),
                };
                let weight = workspace.factor(q);
                for (i, l) in local.iter_mut().enumerate() {
                    self.action.apply(&mut result, test.value(i, q), &context);
                    *l += weight * result[0];
                }
            }
            for (&dof, l) in test.dofs().iter().zip(&local) {
                b[dof] += factor * *l;
            }
        }
        debug!("Assembled linear form over {} items", plan.items().len());
        Ok(())
    }
}
