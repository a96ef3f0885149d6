use crate::element::{face_bubble_mean, FiniteElementType, LagrangeBasis};
use crate::mesh::ItemKind;
use crate::quadrature::QuadratureRule;
use crate::space::FiniteElementSpace;
use crate::transform::L2GTransformer;
use crate::Real;
use nalgebra::DVector;

// Exact for the integrals of quadratic functions against cubic bubbles
const INTERPOLATION_ORDER: i32 = 5;

/// Integrates `integrand` over an item and returns the integral together with the item measure.
fn integrate_over_item<T: Real>(
    transformer: &mut L2GTransformer<'_, T>,
    item: usize,
    len: usize,
    mut integrand: impl FnMut(&[T], &mut [T]),
) -> eyre::Result<(Vec<T>, T)> {
    transformer.update(item)?;
    let rule = QuadratureRule::<T>::new(transformer.geometry(), INTERPOLATION_ORDER);
    let mut x = vec![T::zero(); transformer.jacobian().nrows()];
    let mut values = vec![T::zero(); len];
    let mut integral = vec![T::zero(); len];
    let mut measure = T::zero();
    for (&w, xi) in rule.weights().iter().zip(rule.points()) {
        transformer.evaluate_at(xi)?;
        transformer.map_to_physical(xi, &mut x);
        integrand(&x, &mut values);
        let factor = w * transformer.piola_factor();
        measure += factor;
        for (total, value) in integral.iter_mut().zip(&values) {
            *total += factor * *value;
        }
    }
    Ok((integral, measure))
}

impl<'a, T: Real> FiniteElementSpace<'a, T> {
    /// Interpolates a function into the space.
    ///
    /// `f(x, values)` writes the `ncomponents` values of the function at the physical point `x`.
    /// Lagrange spaces take point values at nodes and midpoints, `L2P0` takes cell means,
    /// `H1CR` takes face means and `HdivRT0` takes face fluxes. `H1BR` takes node values, with
    /// face bubbles chosen so that face fluxes match those of `f`.
    pub fn interpolate(&self, f: impl Fn(&[T], &mut [T])) -> eyre::Result<DVector<T>> {
        use FiniteElementType::*;
        let mut u = DVector::zeros(self.num_dofs());
        match self.element() {
            H1P1 { .. } | H1Q1 { .. } => self.interpolate_nodal(1, &f, &mut u)?,
            H1P2 { .. } => self.interpolate_nodal(2, &f, &mut u)?,
            L2P0 { .. } => self.interpolate_cell_means(&f, &mut u)?,
            H1CR { .. } => self.interpolate_face_means(&f, &mut u)?,
            HdivRT0 => self.interpolate_face_fluxes(&f, &mut u)?,
            H1BR => {
                self.interpolate_nodal(1, &f, &mut u)?;
                self.interpolate_bubbles(&f, &mut u)?;
            }
        }
        Ok(u)
    }

    fn interpolate_nodal(&self, degree: usize, f: &impl Fn(&[T], &mut [T]), u: &mut DVector<T>) -> eyre::Result<()> {
        let mesh = self.mesh();
        let ncomponents = self.ncomponents();
        let mut x = vec![T::zero(); mesh.dim()];
        let mut values = vec![T::zero(); ncomponents];
        let half = T::one() / (T::one() + T::one());
        for cell in 0..mesh.num_cells() {
            let nodes = mesh.cell_nodes(cell);
            let basis = LagrangeBasis::new(mesh.cell_geometry(cell), degree)?;
            let midpoints = basis.midpoints();
            let num_scalar = nodes.len() + midpoints.len();
            let dofs = self.cell_dofs(cell);
            for k in 0..num_scalar {
                if k < nodes.len() {
                    for (x_i, node_i) in x.iter_mut().zip(mesh.node_coords(nodes[k]).iter()) {
                        *x_i = *node_i;
                    }
                } else {
                    let [a, b] = midpoints[k - nodes.len()];
                    let (x_a, x_b) = (mesh.node_coords(nodes[a]), mesh.node_coords(nodes[b]));
                    for i in 0..x.len() {
                        x[i] = (x_a[i] + x_b[i]) * half;
                    }
                }
                f(&x, &mut values);
                for c in 0..ncomponents {
                    u[dofs[c * num_scalar + k]] = values[c];
                }
            }
        }
        Ok(())
    }

    fn interpolate_cell_means(&self, f: &impl Fn(&[T], &mut [T]), u: &mut DVector<T>) -> eyre::Result<()> {
        let mesh = self.mesh();
        let ncomponents = self.ncomponents();
        let mut transformer = L2GTransformer::new(mesh, ItemKind::Cell);
        for cell in 0..mesh.num_cells() {
            let (integral, measure) = integrate_over_item(&mut transformer, cell, ncomponents, f)?;
            for (&dof, value) in self.cell_dofs(cell).iter().zip(integral) {
                u[dof] = value / measure;
            }
        }
        Ok(())
    }

    fn interpolate_face_means(&self, f: &impl Fn(&[T], &mut [T]), u: &mut DVector<T>) -> eyre::Result<()> {
        let mesh = self.mesh();
        let ncomponents = self.ncomponents();
        let mut transformer = L2GTransformer::new(mesh, ItemKind::Face);
        for face in 0..mesh.num_faces() {
            let (integral, measure) = integrate_over_item(&mut transformer, face, ncomponents, f)?;
            for (&dof, value) in self.face_dofs(face).iter().zip(integral) {
                u[dof] = value / measure;
            }
        }
        Ok(())
    }

    /// Integrates the normal flux of `f` over a face.
    fn face_flux(
        &self,
        transformer: &mut L2GTransformer<'_, T>,
        face: usize,
        f: &impl Fn(&[T], &mut [T]),
    ) -> eyre::Result<(T, T)> {
        let normal = self.mesh().face_normal(face);
        let mut values = vec![T::zero(); self.ncomponents()];
        let (flux, measure) = integrate_over_item(transformer, face, 1, |x, out| {
            f(x, &mut values);
            out[0] = values.iter().zip(normal.iter()).fold(T::zero(), |acc, (v, n)| acc + *v * *n);
        })?;
        Ok((flux[0], measure))
    }

    fn interpolate_face_fluxes(&self, f: &impl Fn(&[T], &mut [T]), u: &mut DVector<T>) -> eyre::Result<()> {
        let mut transformer = L2GTransformer::new(self.mesh(), ItemKind::Face);
        for face in 0..self.mesh().num_faces() {
            let (flux, _) = self.face_flux(&mut transformer, face, f)?;
            u[self.face_dofs(face)[0]] = flux;
        }
        Ok(())
    }

    /// Sets the bubble coefficients of `H1BR`, assuming node values are already in place.
    fn interpolate_bubbles(&self, f: &impl Fn(&[T], &mut [T]), u: &mut DVector<T>) -> eyre::Result<()> {
        let mesh = self.mesh();
        let dim = mesh.dim();
        let mut transformer = L2GTransformer::new(mesh, ItemKind::Face);
        for face in 0..mesh.num_faces() {
            let (flux, measure) = self.face_flux(&mut transformer, face, f)?;
            let dofs = self.face_dofs(face);
            let num_face_nodes = mesh.face_nodes(face).len();
            let normal = mesh.face_normal(face);
            let node_weight = measure / T::from_usize(num_face_nodes).unwrap_or_else(T::one);
            let mut linear_flux = T::zero();
            for c in 0..dim {
                for k in 0..num_face_nodes {
                    linear_flux += node_weight * normal[c] * u[dofs[c * num_face_nodes + k]];
                }
            }
            let bubble_flux = measure * face_bubble_mean::<T>(mesh.face_geometry(face));
            u[dofs[dim * num_face_nodes]] = (flux - linear_flux) / bubble_flux;
        }
        Ok(())
    }
}
