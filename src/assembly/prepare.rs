//! The prepare phase shared by all assembly patterns.
use crate::assembly::{AssemblyTarget, FormArgument};
use crate::element::FiniteElementType;
use crate::error::{dimension_mismatch, unsupported, AssemblyError};
use crate::evaluator::{create_basis_evaluator, BasisEvaluator, EvaluationTarget};
use crate::geometry::ElementGeometry;
use crate::mesh::{ItemKind, Mesh};
use crate::quadrature::{QuadratureCache, QuadratureRule};
use crate::space::{resolve_dof_items, DofItem, DofItemMode, FiniteElementSpace};
use crate::transform::L2GTransformer;
use crate::Real;
use eyre::eyre;
use itertools::Itertools;
use log::{debug, warn};
use nalgebra::{convert, DVector};
use rustc_hash::FxHashMap;

/// An item visited by an assembly pattern.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct AssemblyItem {
    /// Cell or face index.
    pub index: usize,
    pub region: usize,
    pub geometry: ElementGeometry,
}

/// Validated items, arguments and quadrature orders of an assembly call.
///
/// Plans hold no mutable state and can be shared between threads, each of which creates its
/// own [`FormWorkspace`].
#[derive(Debug)]
pub(crate) struct FormPlan<'a, T: Real> {
    mesh: &'a Mesh<T>,
    kind: ItemKind,
    arguments: Vec<FormArgument<'a, T>>,
    items: Vec<AssemblyItem>,
    orders: Vec<(ElementGeometry, i32)>,
    /// Evaluators needed as `(argument, assembly geometry, target, dof-item geometry)`.
    evaluators: Vec<(usize, ElementGeometry, EvaluationTarget, ElementGeometry)>,
    needs_coordinates: bool,
}

/// The evaluation target and the cells or face whose dofs an argument uses on an item.
fn dof_item_geometries<T: Real>(
    mesh: &Mesh<T>,
    kind: ItemKind,
    mode: DofItemMode,
    item: usize,
) -> eyre::Result<Vec<(EvaluationTarget, ElementGeometry)>> {
    Ok(match (kind, mode) {
        (ItemKind::Cell, DofItemMode::Item) => vec![(EvaluationTarget::Cell, mesh.cell_geometry(item))],
        (ItemKind::Cell, mode) => {
            return Err(unsupported(format!("{mode:?} arguments can only be assembled on faces")).into())
        }
        (ItemKind::Face, DofItemMode::Item) => vec![(EvaluationTarget::FaceTrace, mesh.face_geometry(item))],
        (ItemKind::Face, mode) => {
            let (first, second) = mesh.face_cells(item);
            let sides = match mode {
                DofItemMode::Side(0) => vec![first],
                DofItemMode::Side(1) => second.into_iter().collect(),
                DofItemMode::Side(side) => return Err(unsupported(format!("a face has no side {side}")).into()),
                _ => std::iter::once(first).chain(second).collect(),
            };
            sides
                .into_iter()
                .map(|cell| (EvaluationTarget::CellOnFace, mesh.cell_geometry(cell)))
                .collect()
        }
    })
}

/// Polynomial order of the functions an argument evaluates.
fn argument_order<T: Real>(argument: &FormArgument<T>, dim: usize) -> usize {
    if argument.operator().is_reconstruction() {
        FiniteElementType::HdivRT0.polynomial_order(dim)
    } else {
        argument.space().element().polynomial_order(dim)
    }
}

impl<'a, T: Real> FormPlan<'a, T> {
    /// Validates the arguments and collects the items of the target.
    ///
    /// The quadrature order on each assembly geometry is `bonus_order` plus, for each
    /// argument, the largest sum of element order and operator shift over the geometries of
    /// its dof-items.
    pub fn new(
        arguments: Vec<FormArgument<'a, T>>,
        target: AssemblyTarget,
        regions: Option<&[usize]>,
        bonus_order: i32,
        needs_coordinates: bool,
    ) -> eyre::Result<Self> {
        let mesh = arguments
            .first()
            .map(|argument| argument.space().mesh())
            .ok_or_else(|| unsupported("assembly patterns need at least one argument"))?;
        if arguments
            .iter()
            .any(|argument| !std::ptr::eq(argument.space().mesh(), mesh))
        {
            return Err(unsupported("all arguments must be defined on the same mesh").into());
        }
        for argument in &arguments {
            argument.output_len()?;
        }

        let kind = target.item_kind();
        let candidates: Vec<(usize, usize)> = match target {
            AssemblyTarget::Cells => (0..mesh.num_cells())
                .map(|cell| (cell, mesh.cell_region(cell)))
                .collect(),
            AssemblyTarget::Faces => (0..mesh.num_faces())
                .map(|face| (face, mesh.face_region(face)))
                .collect(),
            AssemblyTarget::InteriorFaces => (0..mesh.num_faces())
                .filter(|&face| mesh.is_interior_face(face))
                .map(|face| (face, mesh.face_region(face)))
                .collect(),
            AssemblyTarget::BoundaryFaces => mesh
                .boundary_faces()
                .iter()
                .enumerate()
                .map(|(b, &face)| (face, mesh.boundary_region(b)))
                .collect(),
        };
        if let Some(regions) = regions {
            if let Some(&region) = regions
                .iter()
                .find(|region| !candidates.iter().any(|(_, r)| r == *region))
            {
                return Err(AssemblyError::UnknownRegion { region }.into());
            }
        }
        let items: Vec<AssemblyItem> = candidates
            .into_iter()
            .filter(|(_, region)| regions.map_or(true, |regions| regions.contains(region)))
            .map(|(index, region)| AssemblyItem {
                index,
                region,
                geometry: match kind {
                    ItemKind::Cell => mesh.cell_geometry(index),
                    ItemKind::Face => mesh.face_geometry(index),
                },
            })
            .collect();
        if items.is_empty() {
            warn!("No {:?} items to assemble with region filter {:?}", target, regions);
        }

        let dim = mesh.dim();
        let mut evaluators = Vec::new();
        for item in &items {
            for (a, argument) in arguments.iter().enumerate() {
                for (evaluation_target, geometry) in dof_item_geometries(mesh, kind, argument.mode(), item.index)? {
                    evaluators.push((a, item.geometry, evaluation_target, geometry));
                }
            }
        }
        let evaluators: Vec<_> = evaluators.into_iter().unique().collect();

        let orders = items
            .iter()
            .map(|item| item.geometry)
            .unique()
            .map(|assembly_geometry| {
                let order = arguments
                    .iter()
                    .enumerate()
                    .map(|(a, argument)| {
                        evaluators
                            .iter()
                            .filter(|(b, g, _, _)| *b == a && *g == assembly_geometry)
                            .map(|(_, _, _, geometry)| {
                                argument_order(argument, dim) as i32 + argument.operator().quadrature_shift_on(*geometry)
                            })
                            .max()
                            .unwrap_or(0)
                    })
                    .sum::<i32>();
                (assembly_geometry, bonus_order + order)
            })
            .collect_vec();

        debug!(
            "Prepared {} {:?} items with quadrature orders {:?} and {} evaluator configurations",
            items.len(),
            target,
            orders,
            evaluators.len()
        );
        Ok(Self {
            mesh,
            kind,
            arguments,
            items,
            orders,
            evaluators,
            needs_coordinates,
        })
    }

    pub fn mesh(&self) -> &'a Mesh<T> {
        self.mesh
    }

    pub fn items(&self) -> &[AssemblyItem] {
        &self.items
    }

    pub fn arguments(&self) -> &[FormArgument<'a, T>] {
        &self.arguments
    }

    /// Checks that a coefficient vector matches the dof count of an argument's space.
    pub fn check_coefficients(&self, argument: usize, coefficients: &DVector<T>) -> eyre::Result<()> {
        let num_dofs = self.arguments[argument].space().num_dofs();
        if coefficients.len() != num_dofs {
            return Err(dimension_mismatch(
                format!("coefficient vector of argument {argument}"),
                num_dofs,
                coefficients.len(),
            )
            .into());
        }
        Ok(())
    }

    /// Creates quadrature rules, evaluators and buffers for a single thread of assembly.
    pub fn workspace(&self) -> eyre::Result<FormWorkspace<'a, T>> {
        let mut cache = QuadratureCache::new();
        let rules: FxHashMap<_, _> = self
            .orders
            .iter()
            .map(|&(geometry, order)| (geometry, cache.rule(geometry, order).clone()))
            .collect();

        let mut evaluators: Vec<Box<dyn BasisEvaluator<T> + 'a>> = Vec::new();
        let mut shared = FxHashMap::default();
        let mut lookup = FxHashMap::default();
        for &(a, assembly_geometry, target, geometry) in &self.evaluators {
            let argument = &self.arguments[a];
            let key = (
                argument.space() as *const FiniteElementSpace<'a, T> as usize,
                argument.operator(),
                target,
                assembly_geometry,
                geometry,
            );
            let index = match shared.get(&key) {
                Some(&index) => index,
                None => {
                    let rule = rules
                        .get(&assembly_geometry)
                        .ok_or_else(|| eyre!("no quadrature rule for {:?}", assembly_geometry))?;
                    evaluators.push(create_basis_evaluator(
                        argument.space(),
                        geometry,
                        argument.operator(),
                        target,
                        rule,
                    )?);
                    shared.insert(key, evaluators.len() - 1);
                    evaluators.len() - 1
                }
            };
            lookup.insert((a, assembly_geometry, geometry), index);
        }

        // Identical arguments share their local evaluations
        let slots = (0..self.arguments.len())
            .map(|a| {
                (0..a)
                    .find(|&b| self.arguments[b].is_same_as(&self.arguments[a]))
                    .unwrap_or(a)
            })
            .collect_vec();
        let locals = self
            .arguments
            .iter()
            .map(|argument| LocalArgument::new(argument.output_len().unwrap_or(0)))
            .collect();

        Ok(FormWorkspace {
            rules,
            evaluators,
            lookup,
            slots,
            transformer: L2GTransformer::new(self.mesh, self.kind),
            factors: Vec::new(),
            coordinates: Vec::new(),
            locals,
            num_points: 0,
        })
    }
}

/// Operator evaluations of the local basis functions of one argument on the current item.
///
/// On faces with two dof-items the functions of both sides are listed, with the coefficients
/// of the dof-items folded into the values.
#[derive(Debug, Clone)]
pub(crate) struct LocalArgument<T> {
    len: usize,
    num_points: usize,
    dofs: Vec<usize>,
    // [local function][quadrature point][output]
    values: Vec<T>,
}

impl<T: Real> LocalArgument<T> {
    fn new(len: usize) -> Self {
        Self {
            len,
            num_points: 0,
            dofs: Vec::new(),
            values: Vec::new(),
        }
    }

    fn clear(&mut self, num_points: usize) {
        self.num_points = num_points;
        self.dofs.clear();
        self.values.clear();
    }

    fn append(&mut self, evaluator: &dyn BasisEvaluator<T>, coefficient: T) {
        self.dofs.extend_from_slice(evaluator.dofs());
        for i in 0..evaluator.num_basis() {
            for q in 0..self.num_points {
                self.values
                    .extend(evaluator.value(i, q).iter().map(|v| coefficient * *v));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn num_local(&self) -> usize {
        self.dofs.len()
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn value(&self, local: usize, q: usize) -> &[T] {
        let offset = (local * self.num_points + q) * self.len;
        &self.values[offset..offset + self.len]
    }

    /// Evaluates the function with the given global coefficients at a quadrature point.
    pub fn evaluate(&self, coefficients: &DVector<T>, q: usize, out: &mut [T]) {
        out.fill(T::zero());
        for (i, &dof) in self.dofs.iter().enumerate() {
            let c = coefficients[dof];
            if c != T::zero() {
                for (o, v) in out.iter_mut().zip(self.value(i, q)) {
                    *o += c * *v;
                }
            }
        }
    }
}

/// Per-thread state of an assembly call: quadrature rules, evaluators and item buffers.
#[derive(Debug)]
pub(crate) struct FormWorkspace<'a, T: Real> {
    rules: FxHashMap<ElementGeometry, QuadratureRule<T>>,
    evaluators: Vec<Box<dyn BasisEvaluator<T> + 'a>>,
    lookup: FxHashMap<(usize, ElementGeometry, ElementGeometry), usize>,
    slots: Vec<usize>,
    transformer: L2GTransformer<'a, T>,
    factors: Vec<T>,
    coordinates: Vec<T>,
    locals: Vec<LocalArgument<T>>,
    num_points: usize,
}

impl<'a, T: Real> FormWorkspace<'a, T> {
    /// Evaluates integration factors, coordinates and all arguments on an item.
    pub fn load(&mut self, plan: &FormPlan<'a, T>, item: &AssemblyItem) -> eyre::Result<()> {
        let mesh = plan.mesh;
        let rule = self
            .rules
            .get(&item.geometry)
            .ok_or_else(|| eyre!("no quadrature rule for {:?}", item.geometry))?;
        let num_points = rule.num_points();
        self.num_points = num_points;

        self.transformer.update(item.index)?;
        self.factors.clear();
        if item.geometry.is_affine() {
            let volume = match plan.kind {
                ItemKind::Cell => mesh.cell_volume(item.index),
                ItemKind::Face => mesh.face_volume(item.index),
            };
            let reference_volume: T = convert(item.geometry.reference_volume());
            let scale = volume / reference_volume;
            self.factors.extend(rule.weights().iter().map(|w| *w * scale));
        } else {
            for (w, xi) in rule.weights().iter().zip(rule.points()) {
                self.transformer.evaluate_at(xi)?;
                self.factors.push(*w * self.transformer.piola_factor());
            }
        }
        if plan.needs_coordinates {
            let dim = mesh.dim();
            self.coordinates.resize(num_points * dim, T::zero());
            for (q, xi) in rule.points().enumerate() {
                self.transformer
                    .map_to_physical(xi, &mut self.coordinates[q * dim..(q + 1) * dim]);
            }
        }

        for (a, argument) in plan.arguments.iter().enumerate() {
            if self.slots[a] != a {
                continue;
            }
            let dof_items: [Option<DofItem<T>>; 2] = match plan.kind {
                ItemKind::Cell => [
                    Some(DofItem {
                        item: item.index,
                        position: 0,
                        coefficient: T::one(),
                        face: None,
                    }),
                    None,
                ],
                ItemKind::Face => resolve_dof_items(mesh, item.index, argument.mode())?,
            };
            let local = &mut self.locals[a];
            local.clear(num_points);
            for dof_item in dof_items.iter().flatten() {
                let geometry = match (plan.kind, argument.mode()) {
                    (ItemKind::Face, DofItemMode::Item) => mesh.face_geometry(dof_item.item),
                    _ => mesh.cell_geometry(dof_item.item),
                };
                let index = *self
                    .lookup
                    .get(&(a, item.geometry, geometry))
                    .ok_or_else(|| eyre!("no evaluator for argument {} on {:?}", a, geometry))?;
                let evaluator = &mut self.evaluators[index];
                evaluator.update(dof_item)?;
                local.append(evaluator.as_ref(), dof_item.coefficient);
            }
        }
        Ok(())
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Integration factor (weight times measure scaling) at a quadrature point.
    pub fn factor(&self, q: usize) -> T {
        self.factors[q]
    }

    /// Physical coordinates of a quadrature point, if the plan requested them.
    pub fn point(&self, q: usize, dim: usize) -> Option<&[T]> {
        self.coordinates.get(q * dim..(q + 1) * dim)
    }

    pub fn argument(&self, a: usize) -> &LocalArgument<T> {
        &self.locals[self.slots[a]]
    }
}
