//! Quadrature rules for reference element geometries.
//!
//! A [`QuadratureRule`] for `(geometry, order)` integrates every polynomial of total degree up
//! to `order` exactly on simplices, and every polynomial of degree up to `order` in each
//! coordinate direction on quadrilaterals and hexahedra. Weights sum to the measure of the
//! reference cell.
use crate::geometry::ElementGeometry;
use crate::Real;
use log::trace;
use nalgebra::convert;
use rustc_hash::FxHashMap;

pub mod simplex;
pub mod tensor;
pub mod univariate;

#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule<T> {
    geometry: ElementGeometry,
    order: usize,
    weights: Vec<T>,
    // Points stored back to back, each with `geometry.dim()` coordinates
    points: Vec<T>,
}

impl<T: Real> QuadratureRule<T> {
    /// Constructs a rule that integrates polynomials up to the given order exactly.
    ///
    /// Negative orders are clamped to zero. They arise when the quadrature order shifts of
    /// differential operators outweigh the polynomial order of the integrand.
    pub fn new(geometry: ElementGeometry, order: i32) -> Self {
        if order < 0 {
            trace!("Clamping quadrature order {} to 0 for {:?}", order, geometry);
        }
        let order = order.max(0) as usize;
        let (weights, points) = generate_rule(geometry, order);
        Self {
            geometry,
            order,
            weights: weights.into_iter().map(convert).collect(),
            points: points.into_iter().map(convert).collect(),
        }
    }

    pub fn geometry(&self) -> ElementGeometry {
        self.geometry
    }

    /// The polynomial order for which the rule is exact.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    /// Reference coordinates of the point with the given index.
    pub fn point(&self, index: usize) -> &[T] {
        let dim = self.geometry.dim();
        &self.points[dim * index..dim * (index + 1)]
    }

    pub fn points(&self) -> impl '_ + Iterator<Item = &[T]> {
        (0..self.num_points()).map(move |i| self.point(i))
    }

    /// Approximates the integral of the given function over the reference cell.
    pub fn integrate(&self, f: impl Fn(&[T]) -> T) -> T {
        self.weights
            .iter()
            .zip(self.points())
            .fold(T::zero(), |integral, (w, x)| integral + *w * f(x))
    }
}

fn generate_rule(geometry: ElementGeometry, order: usize) -> (Vec<f64>, Vec<f64>) {
    use ElementGeometry::*;
    match geometry {
        Vertex0D => (vec![1.0], vec![]),
        Edge1D => {
            let (points, weights) = interval(order);
            (weights, points)
        }
        Triangle2D => simplex::triangle(order),
        Tetrahedron3D => simplex::tetrahedron(order),
        Quadrilateral2D | Hexahedron3D => {
            let rule = univariate::gauss_unit_interval(univariate::num_gauss_points(order));
            tensor::tensor_product(&rule, geometry.dim())
        }
    }
}

/// Rule on the unit interval as (points, weights).
fn interval(order: usize) -> univariate::Rule1d {
    match order {
        0 | 1 => (vec![0.5], vec![1.0]),
        2 | 3 => (vec![0.0, 0.5, 1.0], vec![1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0]),
        _ => univariate::gauss_unit_interval(univariate::num_gauss_points(order)),
    }
}

/// Rules constructed on demand and reused for the remainder of an assembly call.
#[derive(Debug, Clone)]
pub struct QuadratureCache<T> {
    rules: FxHashMap<(ElementGeometry, usize), QuadratureRule<T>>,
}

impl<T> Default for QuadratureCache<T> {
    fn default() -> Self {
        Self {
            rules: FxHashMap::default(),
        }
    }
}

impl<T: Real> QuadratureCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(&mut self, geometry: ElementGeometry, order: i32) -> &QuadratureRule<T> {
        let clamped = order.max(0) as usize;
        self.rules
            .entry((geometry, clamped))
            .or_insert_with(|| QuadratureRule::new(geometry, order))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
