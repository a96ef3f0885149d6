//! Error types.
//!
//! Fallible operations return [`eyre::Result`]. Failures detected by the engine itself are
//! reported as an [`AssemblyError`] wrapped in the report, so that callers may recover the
//! variant with `report.downcast_ref::<AssemblyError>()`.
use crate::geometry::ElementGeometry;
use crate::operator::FunctionOperator;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AssemblyError {
    /// No reference basis or push-forward is registered for the requested combination.
    UnsupportedCombination(String),
    /// The operator cannot act on fields with the given spatial dimension and component count.
    InvalidOperator {
        operator: FunctionOperator,
        dim: usize,
        ncomponents: usize,
    },
    /// A region filter references a region that does not occur among the assembled items.
    UnknownRegion { region: usize },
    /// Lengths of user-provided data do not match what the assembly expects.
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    /// An item has a zero or negative Jacobian determinant.
    DegenerateItem {
        geometry: ElementGeometry,
        item: usize,
        determinant: f64,
    },
    /// A sparse destination does not store an entry that the assembly writes to.
    MissingMatrixEntry { row: usize, col: usize },
    /// The mesh violates a structural invariant.
    InvalidMesh(String),
    /// A degree of freedom pattern string could not be parsed or is inconsistent.
    InvalidPattern(String),
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedCombination(description) => {
                write!(f, "unsupported combination: {description}")
            }
            Self::InvalidOperator {
                operator,
                dim,
                ncomponents,
            } => write!(
                f,
                "operator {operator:?} is not defined for {ncomponents} component(s) in dimension {dim}"
            ),
            Self::UnknownRegion { region } => write!(f, "region {region} does not occur among the assembly items"),
            Self::DimensionMismatch { what, expected, actual } => {
                write!(f, "dimension mismatch for {what}: expected {expected}, got {actual}")
            }
            Self::DegenerateItem {
                geometry,
                item,
                determinant,
            } => write!(
                f,
                "degenerate {geometry:?} item {item}: Jacobian determinant {determinant:e} is not positive"
            ),
            Self::MissingMatrixEntry { row, col } => write!(
                f,
                "entry ({row}, {col}) is not part of the sparsity pattern of the destination"
            ),
            Self::InvalidMesh(description) => write!(f, "invalid mesh: {description}"),
            Self::InvalidPattern(description) => write!(f, "invalid dof pattern: {description}"),
        }
    }
}

impl std::error::Error for AssemblyError {}

pub(crate) fn dimension_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> AssemblyError {
    AssemblyError::DimensionMismatch {
        what: what.into(),
        expected,
        actual,
    }
}

pub(crate) fn unsupported(description: impl Into<String>) -> AssemblyError {
    AssemblyError::UnsupportedCombination(description.into())
}
