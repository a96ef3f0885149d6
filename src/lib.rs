//! A generic finite element assembly engine.
//!
//! Given a [`Mesh`](mesh::Mesh), finite element spaces defined on it and algebraic forms built
//! from [function operators](operator::FunctionOperator) and numerical [actions](assembly::Action),
//! the engine computes the values that populate global vectors and matrices. Meshes may mix
//! element geometries, and face terms may couple the two cells adjacent to a face.
use nalgebra::RealField;

pub mod assembly;
pub mod element;
pub mod error;
pub mod evaluator;
pub mod geometry;
pub mod mesh;
pub mod operator;
pub mod quadrature;
pub mod space;
pub mod transform;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate feassemble_adjacency as adjacency;
pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use adjacency::Adjacency;
pub use error::AssemblyError;

/// Scalar type used throughout the engine.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
