use crate::element::BasisBlock;
use crate::evaluator::reference::{face_points_in_cell, ReferenceTable};
use crate::evaluator::EvaluationTarget;
use crate::geometry::ElementGeometry;
use crate::mesh::{ItemKind, Mesh};
use crate::quadrature::QuadratureRule;
use crate::space::DofItem;
use crate::transform::L2GTransformer;
use crate::Real;
use eyre::eyre;
use nalgebra::{convert, DMatrix};

use super::kernel::Jet;

/// Physical values and derivatives of the local basis functions of a dof-item at the points
/// of a quadrature rule.
///
/// The jets of all functions are recomputed on each [`update`](Self::update). Reference tables
/// are tabulated once per position of the dof-item relative to the assembly item.
#[derive(Debug)]
pub(crate) struct BasisJets<'a, T: Real> {
    mesh: &'a Mesh<T>,
    target: EvaluationTarget,
    geometry: ElementGeometry,
    blocks: Vec<BasisBlock<T>>,
    value_len: usize,
    derivative_order: usize,
    rule: QuadratureRule<T>,
    tables: Vec<Option<ReferenceTable<T>>>,
    transformer: L2GTransformer<'a, T>,
    num_local: usize,
    jet_len: usize,
    jets: Vec<T>,
    normal: Vec<T>,
}

impl<'a, T: Real> BasisJets<'a, T> {
    /// Creates jets for functions with `value_len` components given by `blocks` on dof-items of
    /// the given geometry, at the points of `rule`.
    pub fn new(
        mesh: &'a Mesh<T>,
        target: EvaluationTarget,
        geometry: ElementGeometry,
        blocks: Vec<BasisBlock<T>>,
        value_len: usize,
        derivative_order: usize,
        rule: QuadratureRule<T>,
    ) -> Self {
        let dim = mesh.dim();
        let num_positions = match target {
            EvaluationTarget::CellOnFace => geometry.num_faces() * geometry.face_geometry(0).num_face_orientations(),
            _ => 1,
        };
        let kind = match target {
            EvaluationTarget::FaceTrace => ItemKind::Face,
            _ => ItemKind::Cell,
        };
        let num_local = blocks.iter().map(BasisBlock::num_local).sum();
        let mut jet_len = value_len;
        if derivative_order >= 1 {
            jet_len += value_len * dim;
        }
        if derivative_order >= 2 {
            jet_len += value_len * dim * dim;
        }
        Self {
            mesh,
            target,
            geometry,
            blocks,
            value_len,
            derivative_order,
            rule,
            tables: vec![None; num_positions],
            transformer: L2GTransformer::new(mesh, kind),
            num_local,
            jet_len,
            jets: Vec::new(),
            normal: vec![T::zero(); dim],
        }
    }

    pub fn num_local(&self) -> usize {
        self.num_local
    }

    pub fn num_points(&self) -> usize {
        self.rule.num_points()
    }

    pub fn value_len(&self) -> usize {
        self.value_len
    }

    /// The unit normal of the face of the last update, if evaluating on a face.
    pub fn normal(&self) -> Option<&[T]> {
        match self.target {
            EvaluationTarget::Cell => None,
            _ => Some(&self.normal),
        }
    }

    pub fn jet(&self, local: usize, q: usize) -> Jet<'_, T> {
        let base = (local * self.num_points() + q) * self.jet_len;
        let jet = &self.jets[base..base + self.jet_len];
        let n = self.value_len;
        let d = self.mesh.dim();
        let (value, derivatives) = jet.split_at(n);
        let gradient_len = if self.derivative_order >= 1 { n * d } else { 0 };
        let (gradient, hessian) = derivatives.split_at(gradient_len);
        Jet {
            value,
            gradient,
            hessian,
        }
    }

    fn ensure_table(&mut self, position: usize) -> eyre::Result<()> {
        if position >= self.tables.len() {
            return Err(eyre!(
                "position {} is out of range for {:?} with {} positions",
                position,
                self.geometry,
                self.tables.len()
            ));
        }
        if self.tables[position].is_none() {
            let points = match self.target {
                EvaluationTarget::CellOnFace => face_points_in_cell(self.geometry, position, &self.rule),
                _ => self.rule.points().flatten().copied().collect(),
            };
            let table = ReferenceTable::tabulate(
                &self.blocks,
                self.geometry.dim(),
                self.rule.num_points(),
                points,
                self.derivative_order,
            );
            self.tables[position] = Some(table);
        }
        Ok(())
    }

    /// Recomputes the jets for the given dof-item.
    pub fn update(&mut self, dof_item: &DofItem<T>) -> eyre::Result<()> {
        let position = match self.target {
            EvaluationTarget::CellOnFace => dof_item.position,
            _ => 0,
        };
        self.ensure_table(position)?;
        self.transformer.update(dof_item.item)?;
        if self.transformer.geometry() != self.geometry {
            return Err(eyre!(
                "evaluator for {:?} cannot evaluate item {} of geometry {:?}",
                self.geometry,
                dof_item.item,
                self.transformer.geometry()
            ));
        }
        match (self.target, dof_item.face) {
            (EvaluationTarget::Cell, _) => {}
            (_, Some(face)) => {
                for (n, value) in self.normal.iter_mut().zip(self.mesh.face_normal(face).iter()) {
                    *n = *value;
                }
            }
            (_, None) => return Err(eyre!("evaluation on a face requires the face of the dof-item")),
        }

        let num_points = self.num_points();
        self.jets.clear();
        self.jets.resize(self.num_local * num_points * self.jet_len, T::zero());
        let rdim = self.geometry.dim();
        let context = PushForwardContext {
            mesh: self.mesh,
            target: self.target,
            cell: dof_item.item,
            value_len: self.value_len,
            derivative_order: self.derivative_order,
            jet_len: self.jet_len,
            num_points,
            normal: &self.normal,
        };
        let table = self.tables[position]
            .as_ref()
            .ok_or_else(|| eyre!("reference table must be tabulated before use"))?;
        for q in 0..num_points {
            self.transformer.evaluate_at(table.point(rdim, q))?;
            let mut offset = 0;
            for (b, block) in self.blocks.iter().enumerate() {
                let reference = ReferenceJet {
                    values: &table.values[b][q],
                    gradients: table.gradients.get(b).map(|g| g[q].as_slice()).unwrap_or(&[]),
                    hessians: table.hessians.get(b).map(|h| h[q].as_slice()).unwrap_or(&[]),
                };
                context.push_forward(block, &reference, &self.transformer, q, offset, &mut self.jets);
                offset += block.num_local();
            }
        }
        Ok(())
    }
}

struct ReferenceJet<'t, T> {
    values: &'t [T],
    gradients: &'t [T],
    hessians: &'t [T],
}

struct PushForwardContext<'c, T: Real> {
    mesh: &'c Mesh<T>,
    target: EvaluationTarget,
    cell: usize,
    value_len: usize,
    derivative_order: usize,
    jet_len: usize,
    num_points: usize,
    normal: &'c [T],
}

/// `sum_r a[(i, r)] v[r]`
fn contract<T: Real>(a: &DMatrix<T>, i: usize, v: &[T]) -> T {
    v.iter()
        .enumerate()
        .fold(T::zero(), |acc, (r, v_r)| acc + a[(i, r)] * *v_r)
}

impl<'c, T: Real> PushForwardContext<'c, T> {
    fn jet_mut<'j>(&self, jets: &'j mut [T], local: usize, q: usize) -> &'j mut [T] {
        let base = (local * self.num_points + q) * self.jet_len;
        &mut jets[base..base + self.jet_len]
    }

    /// Writes the physical jets of the functions of a block, starting at local index `offset`.
    fn push_forward(
        &self,
        block: &BasisBlock<T>,
        reference: &ReferenceJet<T>,
        transformer: &L2GTransformer<T>,
        q: usize,
        offset: usize,
        jets: &mut [T],
    ) {
        let d = self.mesh.dim();
        let n = self.value_len;
        let rdim = transformer.geometry().dim();
        let inverse_transpose = transformer.jacobian_inverse_transpose();
        let (gradient_offset, hessian_offset) = (n, n + n * d);
        match block {
            BasisBlock::Componentwise { basis, ncomponents } => {
                let num_functions = basis.num_functions();
                for c in 0..*ncomponents {
                    for k in 0..num_functions {
                        let jet = self.jet_mut(jets, offset + c * num_functions + k, q);
                        jet[c] = reference.values[k];
                        if self.derivative_order >= 1 {
                            let gradient = &reference.gradients[k * rdim..(k + 1) * rdim];
                            for i in 0..d {
                                jet[gradient_offset + c * d + i] = contract(inverse_transpose, i, gradient);
                            }
                        }
                        if self.derivative_order >= 2 {
                            let stride = rdim * rdim;
                            let hessian = &reference.hessians[k * stride..(k + 1) * stride];
                            let mut half_mapped = vec![T::zero(); d * rdim];
                            for i in 0..d {
                                for s in 0..rdim {
                                    let column: Vec<T> = (0..rdim).map(|r| hessian[r * rdim + s]).collect();
                                    half_mapped[i * rdim + s] = contract(inverse_transpose, i, &column);
                                }
                            }
                            for i in 0..d {
                                for j in 0..d {
                                    jet[hessian_offset + (c * d + i) * d + j] =
                                        contract(inverse_transpose, j, &half_mapped[i * rdim..(i + 1) * rdim]);
                                }
                            }
                        }
                    }
                }
            }
            BasisBlock::Piola { basis } => {
                let jacobian = transformer.jacobian();
                let signs = self.mesh.cell_face_signs(self.cell);
                for j in 0..basis.num_functions() {
                    let sign: T = convert(f64::from(signs[j]));
                    let scale = sign / transformer.piola_factor();
                    let jet = self.jet_mut(jets, offset + j, q);
                    let value = &reference.values[j * rdim..(j + 1) * rdim];
                    for a in 0..d {
                        jet[a] = scale * contract(jacobian, a, value);
                    }
                    if self.derivative_order >= 1 {
                        let gradient = &reference.gradients[j * rdim * rdim..(j + 1) * rdim * rdim];
                        for i in 0..d {
                            // Derivatives of each reference component in direction i
                            let mapped: Vec<T> = (0..rdim)
                                .map(|b| contract(inverse_transpose, i, &gradient[b * rdim..(b + 1) * rdim]))
                                .collect();
                            for a in 0..d {
                                jet[gradient_offset + a * d + i] = scale * contract(jacobian, a, &mapped);
                            }
                        }
                    }
                }
            }
            BasisBlock::NormalScaled { basis } => {
                for j in 0..basis.num_functions() {
                    let normal = match self.target {
                        EvaluationTarget::FaceTrace => self.normal.to_vec(),
                        _ => {
                            let face = self.mesh.cell_faces(self.cell)[j];
                            self.mesh.face_normal(face).iter().copied().collect()
                        }
                    };
                    let jet = self.jet_mut(jets, offset + j, q);
                    for a in 0..d {
                        jet[a] = normal[a] * reference.values[j];
                    }
                    if self.derivative_order >= 1 {
                        let gradient = &reference.gradients[j * rdim..(j + 1) * rdim];
                        for i in 0..d {
                            let derivative = contract(inverse_transpose, i, gradient);
                            for a in 0..d {
                                jet[gradient_offset + a * d + i] = normal[a] * derivative;
                            }
                        }
                    }
                }
            }
            BasisBlock::FluxDensity => {
                let geometry = transformer.geometry();
                let reference_volume: T = convert(geometry.reference_volume());
                let density = T::one() / (reference_volume * transformer.piola_factor());
                let jet = self.jet_mut(jets, offset, q);
                for a in 0..d {
                    jet[a] = density * self.normal[a];
                }
            }
        }
    }
}
