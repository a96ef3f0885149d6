//! Maps from reference geometries to mesh items.
//!
//! The map of an item is defined by the linear (simplices) or multilinear (quadrilaterals and
//! hexahedra) Lagrange basis on its geometry, with the item's node coordinates as coefficients.
use crate::element::{LagrangeBasis, ReferenceBasis};
use crate::error::AssemblyError;
use crate::geometry::ElementGeometry;
use crate::mesh::{ItemKind, Mesh};
use crate::quadrature::QuadratureRule;
use crate::Real;
use eyre::eyre;
use nalgebra::{try_convert, DMatrix};

/// Populates the Jacobian `J = dx / dxi` (size `dim x rdim`) of the map with the given node
/// coordinates (size `dim x num_nodes`) at the reference point `xi`.
pub fn populate_jacobian<T: Real>(
    geometry: ElementGeometry,
    nodes: &DMatrix<T>,
    xi: &[T],
    shape_gradients: &mut Vec<T>,
    jacobian: &mut DMatrix<T>,
) {
    let rdim = geometry.dim();
    let basis = LagrangeBasis::linear(geometry);
    let num_nodes = ReferenceBasis::<T>::num_functions(&basis);
    shape_gradients.resize(num_nodes * rdim, T::zero());
    basis.populate_basis_gradients(shape_gradients, xi);

    jacobian.fill(T::zero());
    for n in 0..num_nodes {
        for a in 0..nodes.nrows() {
            for i in 0..rdim {
                jacobian[(a, i)] += nodes[(a, n)] * shape_gradients[n * rdim + i];
            }
        }
    }
}

fn degenerate<T: Real>(geometry: ElementGeometry, item: usize, determinant: T) -> eyre::Report {
    AssemblyError::DegenerateItem {
        geometry,
        item,
        determinant: try_convert(determinant).unwrap_or(f64::NAN),
    }
    .into()
}

/// Inverse transpose (or pseudo-inverse transpose) and scaling factor of a Jacobian.
///
/// For a square Jacobian, the factor is its determinant, which must be positive. For a face
/// Jacobian of size `dim x (dim - 1)` the pseudo-inverse transpose `J (J^T J)^-1` is used and
/// the factor is the metric `sqrt(det(J^T J))`.
fn invert_jacobian<T: Real>(
    geometry: ElementGeometry,
    item: usize,
    jacobian: &DMatrix<T>,
    inverse_transpose: &mut DMatrix<T>,
) -> eyre::Result<T> {
    let (dim, rdim) = jacobian.shape();
    if rdim == 0 {
        return Ok(T::one());
    }
    if rdim == dim {
        let det = jacobian.determinant();
        if det <= T::zero() {
            return Err(degenerate(geometry, item, det));
        }
        let inverse = jacobian
            .clone()
            .try_inverse()
            .ok_or_else(|| degenerate(geometry, item, det))?;
        inverse_transpose.copy_from(&inverse.transpose());
        Ok(det)
    } else {
        let metric_tensor = jacobian.transpose() * jacobian;
        let det = metric_tensor.determinant();
        if det <= T::zero() {
            return Err(degenerate(geometry, item, det));
        }
        let inverse = metric_tensor
            .try_inverse()
            .ok_or_else(|| degenerate(geometry, item, det))?;
        inverse_transpose.copy_from(&(jacobian * inverse));
        Ok(det.sqrt())
    }
}

/// Measure of an item with the given geometry and node coordinates.
pub fn measure<T: Real>(geometry: ElementGeometry, nodes: &DMatrix<T>) -> eyre::Result<T> {
    let dim = nodes.nrows();
    let rdim = geometry.dim();
    if rdim > dim {
        return Err(eyre!("{geometry:?} cannot be embedded in {dim} dimensions"));
    }
    let rule = QuadratureRule::<T>::new(geometry, 2);
    let mut shape_gradients = Vec::new();
    let mut jacobian = DMatrix::zeros(dim, rdim);
    let mut inverse_transpose = DMatrix::zeros(dim, rdim);
    let mut result = T::zero();
    for (w, xi) in rule.weights().iter().zip(rule.points()) {
        populate_jacobian(geometry, nodes, xi, &mut shape_gradients, &mut jacobian);
        let factor = invert_jacobian(geometry, 0, &jacobian, &mut inverse_transpose)?;
        result += *w * factor;
    }
    Ok(result)
}

/// The map from the reference geometry to a mesh cell or face.
///
/// After [`update`](Self::update) with an item, [`evaluate_at`](Self::evaluate_at) computes the
/// Jacobian data at a reference point. For affine geometries the Jacobian is constant, so it is
/// computed once per item and later evaluations are no-ops.
#[derive(Debug, Clone)]
pub struct L2GTransformer<'a, T: Real> {
    mesh: &'a Mesh<T>,
    kind: ItemKind,
    item: Option<usize>,
    geometry: ElementGeometry,
    nodes: DMatrix<T>,
    shape_values: Vec<T>,
    shape_gradients: Vec<T>,
    jacobian: DMatrix<T>,
    jacobian_inverse_transpose: DMatrix<T>,
    piola_factor: T,
    evaluated: bool,
}

impl<'a, T: Real> L2GTransformer<'a, T> {
    pub fn new(mesh: &'a Mesh<T>, kind: ItemKind) -> Self {
        Self {
            mesh,
            kind,
            item: None,
            geometry: ElementGeometry::Vertex0D,
            nodes: DMatrix::zeros(mesh.dim(), 0),
            shape_values: Vec::new(),
            shape_gradients: Vec::new(),
            jacobian: DMatrix::zeros(mesh.dim(), 0),
            jacobian_inverse_transpose: DMatrix::zeros(mesh.dim(), 0),
            piola_factor: T::one(),
            evaluated: false,
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn current_item(&self) -> Option<usize> {
        self.item
    }

    pub fn geometry(&self) -> ElementGeometry {
        self.geometry
    }

    pub fn is_affine(&self) -> bool {
        self.geometry.is_affine()
    }

    /// Loads the node coordinates of the given item.
    ///
    /// For affine geometries the Jacobian is computed immediately, so that degenerate items
    /// are reported here.
    pub fn update(&mut self, item: usize) -> eyre::Result<()> {
        if self.item == Some(item) {
            return Ok(());
        }
        let (geometry, node_indices) = match self.kind {
            ItemKind::Cell => (self.mesh.cell_geometry(item), self.mesh.cell_nodes(item)),
            ItemKind::Face => (self.mesh.face_geometry(item), self.mesh.face_nodes(item)),
        };
        let dim = self.mesh.dim();
        let rdim = geometry.dim();
        if self.nodes.ncols() != node_indices.len() {
            self.nodes = DMatrix::zeros(dim, node_indices.len());
        }
        if self.jacobian.ncols() != rdim {
            self.jacobian = DMatrix::zeros(dim, rdim);
            self.jacobian_inverse_transpose = DMatrix::zeros(dim, rdim);
        }
        for (k, &node) in node_indices.iter().enumerate() {
            self.nodes.column_mut(k).copy_from(&self.mesh.coords().column(node));
        }
        self.geometry = geometry;
        self.item = Some(item);
        self.evaluated = false;

        if geometry.is_affine() {
            let origin = vec![T::zero(); rdim];
            self.compute(&origin)?;
        }
        Ok(())
    }

    fn compute(&mut self, xi: &[T]) -> eyre::Result<()> {
        let item = self
            .item
            .ok_or_else(|| eyre!("transformer must be updated with an item before evaluation"))?;
        populate_jacobian(self.geometry, &self.nodes, xi, &mut self.shape_gradients, &mut self.jacobian);
        self.piola_factor = invert_jacobian(self.geometry, item, &self.jacobian, &mut self.jacobian_inverse_transpose)?;
        self.evaluated = true;
        Ok(())
    }

    /// Computes the Jacobian data at the given reference point.
    pub fn evaluate_at(&mut self, xi: &[T]) -> eyre::Result<()> {
        if self.evaluated && self.is_affine() {
            return Ok(());
        }
        self.compute(xi)
    }

    pub fn jacobian(&self) -> &DMatrix<T> {
        &self.jacobian
    }

    /// The inverse transpose of the Jacobian, or `J (J^T J)^-1` for faces.
    pub fn jacobian_inverse_transpose(&self) -> &DMatrix<T> {
        &self.jacobian_inverse_transpose
    }

    /// The Jacobian determinant for cells, and the metric factor `sqrt(det(J^T J))` for faces.
    pub fn piola_factor(&self) -> T {
        self.piola_factor
    }

    /// Maps a reference point to physical coordinates.
    pub fn map_to_physical(&mut self, xi: &[T], x: &mut [T]) {
        let basis = LagrangeBasis::linear(self.geometry);
        let num_nodes = ReferenceBasis::<T>::num_functions(&basis);
        self.shape_values.resize(num_nodes, T::zero());
        basis.populate_basis(&mut self.shape_values, xi);
        for (a, x_a) in x.iter_mut().enumerate() {
            *x_a = (0..num_nodes).fold(T::zero(), |acc, n| acc + self.nodes[(a, n)] * self.shape_values[n]);
        }
    }
}
