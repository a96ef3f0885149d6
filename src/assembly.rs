//! Assembly patterns: item integrators, linear, bilinear and trilinear forms.
//!
//! A pattern is an immutable description of an integral over mesh items. Each assembly call
//! prepares quadrature rules and basis evaluators for the geometries that occur among the
//! items, then loops over the items and adds their contributions to a destination.
use crate::mesh::ItemKind;
use crate::operator::FunctionOperator;
use crate::space::{DofItemMode, FiniteElementSpace};
use crate::Real;
use serde::{Deserialize, Serialize};

mod action;
mod bilinear_form;
mod destination;
mod item_integrator;
mod linear_form;
mod prepare;
mod trilinear_form;

pub use action::{Action, ActionContext};
pub use bilinear_form::BilinearForm;
pub use destination::{MatrixBlock, MatrixDestination};
pub use item_integrator::ItemIntegrator;
pub use linear_form::LinearForm;
pub use trilinear_form::TrilinearForm;

/// The items an assembly pattern integrates over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssemblyTarget {
    Cells,
    Faces,
    InteriorFaces,
    BoundaryFaces,
}

impl AssemblyTarget {
    pub fn item_kind(&self) -> ItemKind {
        match self {
            Self::Cells => ItemKind::Cell,
            _ => ItemKind::Face,
        }
    }
}

/// A finite element space and the operator applied to its functions.
#[derive(Debug)]
pub struct FormArgument<'a, T: Real> {
    space: &'a FiniteElementSpace<'a, T>,
    operator: FunctionOperator,
    mode: DofItemMode,
}

impl<'a, T: Real> Clone for FormArgument<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T: Real> Copy for FormArgument<'a, T> {}

impl<'a, T: Real> FormArgument<'a, T> {
    pub fn new(space: &'a FiniteElementSpace<'a, T>, operator: FunctionOperator) -> Self {
        Self {
            space,
            operator,
            mode: DofItemMode::Item,
        }
    }

    /// Evaluates the jump of the argument across faces.
    pub fn jump(self) -> Self {
        self.with_mode(DofItemMode::Jump)
    }

    /// Evaluates the average of the argument across faces.
    pub fn average(self) -> Self {
        self.with_mode(DofItemMode::Average)
    }

    /// Evaluates the argument on the given side (`0` or `1`) of faces.
    pub fn side(self, side: usize) -> Self {
        self.with_mode(DofItemMode::Side(side))
    }

    pub fn with_mode(self, mode: DofItemMode) -> Self {
        Self { mode, ..self }
    }

    pub fn space(&self) -> &'a FiniteElementSpace<'a, T> {
        self.space
    }

    pub fn operator(&self) -> FunctionOperator {
        self.operator
    }

    pub fn mode(&self) -> DofItemMode {
        self.mode
    }

    /// Length of the operator output for a single function.
    pub fn output_len(&self) -> eyre::Result<usize> {
        self.operator
            .output_len(self.space.mesh().dim(), self.space.ncomponents())
    }

    /// Whether both arguments refer to the same space, operator and mode.
    pub fn is_same_as(&self, other: &Self) -> bool {
        std::ptr::eq(self.space, other.space) && self.operator == other.operator && self.mode == other.mode
    }
}
