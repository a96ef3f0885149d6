//! Evaluation of operators applied to local basis functions at quadrature points.
//!
//! A [`BasisEvaluator`] is an owned cursor over dof-items: after
//! [`update`](BasisEvaluator::update) with a dof-item it holds the values of an operator applied
//! to each local basis function at each point of a quadrature rule. Evaluators are selected and
//! validated by [`create_basis_evaluator`], so that unsupported combinations of element,
//! operator and geometry are reported before any item is processed.
use crate::element::{BasisBlock, FiniteElementType};
use crate::error::{dimension_mismatch, unsupported};
use crate::geometry::ElementGeometry;
use crate::operator::FunctionOperator;
use crate::quadrature::QuadratureRule;
use crate::space::{DofItem, FiniteElementSpace};
use crate::Real;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

mod kernel;
mod push_forward;
mod reference;

use kernel::apply_operator;
use push_forward::BasisJets;

/// Where the basis functions of a dof-item are evaluated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationTarget {
    /// Functions of a cell, evaluated in the cell.
    Cell,
    /// Functions attached to a face, evaluated on the face.
    FaceTrace,
    /// Functions of a cell, evaluated on one of its faces.
    CellOnFace,
}

pub trait BasisEvaluator<T: Real>: Debug {
    /// Evaluates the basis functions of the given dof-item.
    ///
    /// Repeated updates with the same item, position and face are no-ops.
    fn update(&mut self, dof_item: &DofItem<T>) -> eyre::Result<()>;

    /// The dof-item of the last update.
    fn current_item(&self) -> Option<usize>;

    fn operator(&self) -> FunctionOperator;

    fn num_basis(&self) -> usize;

    /// Number of entries of the operator output for a single basis function.
    fn output_len(&self) -> usize;

    fn num_points(&self) -> usize;

    /// Operator output for the given local basis function at the given quadrature point.
    fn value(&self, basis: usize, qp: usize) -> &[T];

    /// Global dofs of the local basis functions of the current dof-item.
    fn dofs(&self) -> &[usize];
}

type UpdateKey = (usize, usize, Option<usize>);

fn update_key<T>(dof_item: &DofItem<T>) -> UpdateKey {
    (dof_item.item, dof_item.position, dof_item.face)
}

/// Applies an operator to the local basis functions of the element itself.
#[derive(Debug)]
struct ElementEvaluator<'a, T: Real> {
    space: &'a FiniteElementSpace<'a, T>,
    operator: FunctionOperator,
    target: EvaluationTarget,
    jets: BasisJets<'a, T>,
    output_len: usize,
    values: Vec<T>,
    dofs: Vec<usize>,
    current: Option<UpdateKey>,
}

impl<'a, T: Real> BasisEvaluator<T> for ElementEvaluator<'a, T> {
    fn update(&mut self, dof_item: &DofItem<T>) -> eyre::Result<()> {
        let key = update_key(dof_item);
        if self.current == Some(key) {
            return Ok(());
        }
        self.current = None;
        self.jets.update(dof_item)?;
        let dofs = match self.target {
            EvaluationTarget::FaceTrace => self.space.face_dofs(dof_item.item),
            _ => self.space.cell_dofs(dof_item.item),
        };
        if dofs.len() != self.jets.num_local() {
            return Err(dimension_mismatch("local dofs of a dof-item", self.jets.num_local(), dofs.len()).into());
        }
        self.dofs.clear();
        self.dofs.extend_from_slice(dofs);

        let (num_basis, num_points) = (self.jets.num_local(), self.jets.num_points());
        let dim = self.space.mesh().dim();
        let ncomponents = self.jets.value_len();
        self.values.resize(num_basis * num_points * self.output_len, T::zero());
        for i in 0..num_basis {
            for q in 0..num_points {
                let offset = (i * num_points + q) * self.output_len;
                apply_operator(
                    self.operator,
                    dim,
                    ncomponents,
                    self.jets.jet(i, q),
                    self.jets.normal(),
                    &mut self.values[offset..offset + self.output_len],
                );
            }
        }
        self.current = Some(key);
        Ok(())
    }

    fn current_item(&self) -> Option<usize> {
        self.current.map(|(item, _, _)| item)
    }

    fn operator(&self) -> FunctionOperator {
        self.operator
    }

    fn num_basis(&self) -> usize {
        self.jets.num_local()
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn num_points(&self) -> usize {
        self.jets.num_points()
    }

    fn value(&self, basis: usize, qp: usize) -> &[T] {
        let offset = (basis * self.num_points() + qp) * self.output_len;
        &self.values[offset..offset + self.output_len]
    }

    fn dofs(&self) -> &[usize] {
        &self.dofs
    }
}

/// Applies an operator to the reconstruction of the local basis functions in `HdivRT0`.
#[derive(Debug)]
struct ReconstructionEvaluator<'a, T: Real> {
    space: &'a FiniteElementSpace<'a, T>,
    operator: FunctionOperator,
    jets: BasisJets<'a, T>,
    num_basis: usize,
    output_len: usize,
    flux_values: Vec<T>,
    values: Vec<T>,
    dofs: Vec<usize>,
    current: Option<UpdateKey>,
}

impl<'a, T: Real> BasisEvaluator<T> for ReconstructionEvaluator<'a, T> {
    fn update(&mut self, dof_item: &DofItem<T>) -> eyre::Result<()> {
        let key = update_key(dof_item);
        if self.current == Some(key) {
            return Ok(());
        }
        self.current = None;
        self.jets.update(dof_item)?;
        let cell = dof_item.item;
        let dofs = self.space.cell_dofs(cell);
        if dofs.len() != self.num_basis {
            return Err(dimension_mismatch("local dofs of a dof-item", self.num_basis, dofs.len()).into());
        }
        self.dofs.clear();
        self.dofs.extend_from_slice(dofs);

        let coefficients = self.space.reconstruction_coefficients(cell)?;
        let (num_faces, num_points, len) = (self.jets.num_local(), self.jets.num_points(), self.output_len);
        let dim = self.space.mesh().dim();
        let base_operator = self.operator.base_operator();
        self.flux_values.resize(num_faces * num_points * len, T::zero());
        for j in 0..num_faces {
            for q in 0..num_points {
                let offset = (j * num_points + q) * len;
                apply_operator(
                    base_operator,
                    dim,
                    dim,
                    self.jets.jet(j, q),
                    self.jets.normal(),
                    &mut self.flux_values[offset..offset + len],
                );
            }
        }

        self.values.clear();
        self.values.resize(self.num_basis * num_points * len, T::zero());
        for i in 0..self.num_basis {
            for j in 0..num_faces {
                let c = coefficients[i * num_faces + j];
                if c == T::zero() {
                    continue;
                }
                for q in 0..num_points {
                    let target = (i * num_points + q) * len;
                    let source = (j * num_points + q) * len;
                    for k in 0..len {
                        self.values[target + k] += c * self.flux_values[source + k];
                    }
                }
            }
        }
        self.current = Some(key);
        Ok(())
    }

    fn current_item(&self) -> Option<usize> {
        self.current.map(|(item, _, _)| item)
    }

    fn operator(&self) -> FunctionOperator {
        self.operator
    }

    fn num_basis(&self) -> usize {
        self.num_basis
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn num_points(&self) -> usize {
        self.jets.num_points()
    }

    fn value(&self, basis: usize, qp: usize) -> &[T] {
        let offset = (basis * self.num_points() + qp) * self.output_len;
        &self.values[offset..offset + self.output_len]
    }

    fn dofs(&self) -> &[usize] {
        &self.dofs
    }
}

fn unsupported_combination(
    element: FiniteElementType,
    operator: FunctionOperator,
    geometry: ElementGeometry,
    target: EvaluationTarget,
    reason: &str,
) -> eyre::Report {
    unsupported(format!(
        "{operator:?} of {element:?} on {geometry:?} ({target:?}): {reason}"
    ))
    .into()
}

/// Creates an evaluator for `operator` applied to the basis functions of `space` on dof-items
/// of the given geometry, at the points of `rule`.
///
/// For [`EvaluationTarget::Cell`] and [`EvaluationTarget::FaceTrace`] the rule lives on
/// `geometry` itself, for [`EvaluationTarget::CellOnFace`] on the faces of `geometry`.
pub fn create_basis_evaluator<'a, T: Real>(
    space: &'a FiniteElementSpace<'a, T>,
    geometry: ElementGeometry,
    operator: FunctionOperator,
    target: EvaluationTarget,
    rule: &QuadratureRule<T>,
) -> eyre::Result<Box<dyn BasisEvaluator<T> + 'a>> {
    let mesh = space.mesh();
    let dim = mesh.dim();
    let element = space.element();
    let output_len = operator.output_len(dim, space.ncomponents())?;
    let fail = |reason: &str| unsupported_combination(element, operator, geometry, target, reason);

    let rule_geometry = match target {
        EvaluationTarget::CellOnFace if geometry.num_faces() > 0 => geometry.face_geometry(0),
        EvaluationTarget::CellOnFace => return Err(fail("the geometry has no faces")),
        _ => geometry,
    };
    if rule.geometry() != rule_geometry {
        return Err(fail(&format!("quadrature rule is defined on {:?}", rule.geometry())));
    }
    if operator.needs_normal() && target == EvaluationTarget::Cell {
        return Err(fail("the operator requires a face normal"));
    }
    if operator.derivative_order() >= 2 {
        if !geometry.is_affine() {
            return Err(fail("second derivatives require an affine geometry"));
        }
        if target == EvaluationTarget::FaceTrace {
            return Err(fail("second derivatives of traces are not available"));
        }
        if element == FiniteElementType::H1BR {
            return Err(fail("second derivatives of normal-scaled bubbles are not available"));
        }
    }

    let derivative_order = operator.derivative_order();
    if operator.is_reconstruction() {
        if !element.has_reconstruction(dim) {
            return Err(fail("the element has no reconstruction"));
        }
        if target == EvaluationTarget::FaceTrace {
            return Err(fail("reconstructions are defined on cells"));
        }
        let num_basis = element
            .cell_blocks::<T>(geometry, dim)?
            .iter()
            .map(BasisBlock::num_local)
            .sum();
        let flux_blocks = FiniteElementType::HdivRT0.cell_blocks(geometry, dim)?;
        let jets = BasisJets::new(mesh, target, geometry, flux_blocks, dim, derivative_order, rule.clone());
        return Ok(Box::new(ReconstructionEvaluator {
            space,
            operator,
            jets,
            num_basis,
            output_len,
            flux_values: Vec::new(),
            values: Vec::new(),
            dofs: Vec::new(),
            current: None,
        }));
    }

    let blocks = match target {
        EvaluationTarget::FaceTrace => element.trace_blocks(geometry, dim)?,
        _ => element.cell_blocks(geometry, dim)?,
    };
    if derivative_order > 0 && blocks.iter().any(|block| matches!(block, BasisBlock::FluxDensity)) {
        return Err(fail("traces of flux functions only provide normal flux densities"));
    }
    let jets = BasisJets::new(
        mesh,
        target,
        geometry,
        blocks,
        space.ncomponents(),
        derivative_order,
        rule.clone(),
    );
    Ok(Box::new(ElementEvaluator {
        space,
        operator,
        target,
        jets,
        output_len,
        values: Vec::new(),
        dofs: Vec::new(),
        current: None,
    }))
}
