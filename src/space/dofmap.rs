//! Degree of freedom maps built from per-geometry pattern strings.
use crate::element::FiniteElementType;
use crate::error::AssemblyError;
use crate::mesh::Mesh;
use crate::{Adjacency, Real};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DofEntity {
    Node,
    Edge,
    Face,
    Interior,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PatternBlock {
    pub entity: DofEntity,
    /// Number of dofs attached to each entity.
    pub count: usize,
    /// Whether the dofs are repeated for each component of the field.
    pub per_component: bool,
}

/// A parsed pattern string such as `"N1F1"` or `"N1f1"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofPattern {
    blocks: Vec<PatternBlock>,
}

fn invalid_pattern(description: String) -> eyre::Report {
    AssemblyError::InvalidPattern(description).into()
}

impl DofPattern {
    pub fn parse(pattern: &str) -> eyre::Result<Self> {
        let mut blocks = Vec::new();
        let mut chars = pattern.chars().peekable();
        while let Some(letter) = chars.next() {
            let entity = match letter.to_ascii_uppercase() {
                'N' => DofEntity::Node,
                'E' => DofEntity::Edge,
                'F' => DofEntity::Face,
                'I' => DofEntity::Interior,
                _ => return Err(invalid_pattern(format!("unknown entity '{letter}' in \"{pattern}\""))),
            };
            let mut digits = String::new();
            while let Some(digit) = chars.next_if(|c| c.is_ascii_digit()) {
                digits.push(digit);
            }
            let count = digits
                .parse()
                .map_err(|_| invalid_pattern(format!("missing dof count after '{letter}' in \"{pattern}\"")))?;
            blocks.push(PatternBlock {
                entity,
                count,
                per_component: letter.is_ascii_uppercase(),
            });
        }
        Ok(Self { blocks })
    }

    pub fn blocks(&self) -> &[PatternBlock] {
        &self.blocks
    }

    fn blocks_in_layout_order(&self) -> impl Iterator<Item = (usize, &PatternBlock)> {
        let per_component = self.blocks.iter().enumerate().filter(|(_, b)| b.per_component);
        let shared = self.blocks.iter().enumerate().filter(|(_, b)| !b.per_component);
        per_component.chain(shared)
    }
}

/// Global numbering of the dofs of a pattern on a mesh.
///
/// Per-component dofs come first, blocked by component: the dof of component `c` with scalar
/// index `s` is `c * num_scalar + s`. Dofs attached independently of components follow.
#[derive(Debug, Clone)]
struct DofLayout {
    pattern: DofPattern,
    ncomponents: usize,
    num_scalar: usize,
    block_offsets: Vec<usize>,
    num_dofs: usize,
}

fn num_entities<T: Real>(mesh: &Mesh<T>, entity: DofEntity) -> usize {
    match entity {
        DofEntity::Node => mesh.num_nodes(),
        DofEntity::Edge => mesh.num_edges(),
        DofEntity::Face => mesh.num_faces(),
        DofEntity::Interior => mesh.num_cells(),
    }
}

impl DofLayout {
    fn new<T: Real>(mesh: &Mesh<T>, pattern: DofPattern, ncomponents: usize) -> Self {
        let mut block_offsets = vec![0; pattern.blocks.len()];
        let mut num_scalar = 0;
        for (b, block) in pattern.blocks.iter().enumerate().filter(|(_, b)| b.per_component) {
            block_offsets[b] = num_scalar;
            num_scalar += block.count * num_entities(mesh, block.entity);
        }
        let mut num_dofs = ncomponents * num_scalar;
        for (b, block) in pattern.blocks.iter().enumerate().filter(|(_, b)| !b.per_component) {
            block_offsets[b] = num_dofs;
            num_dofs += block.count * num_entities(mesh, block.entity);
        }
        Self {
            pattern,
            ncomponents,
            num_scalar,
            block_offsets,
            num_dofs,
        }
    }

    /// Appends the global dofs of an item, given the entities of each pattern block.
    fn push_item_dofs<'e>(
        &self,
        dofs: &mut Adjacency<usize>,
        entities: impl Fn(DofEntity) -> &'e [usize],
    ) {
        let mut list = dofs.begin_list();
        for c in 0..self.ncomponents {
            for (b, block) in self.pattern.blocks_in_layout_order().filter(|(_, b)| b.per_component) {
                for &e in entities(block.entity) {
                    for i in 0..block.count {
                        list.push_single(c * self.num_scalar + self.block_offsets[b] + e * block.count + i);
                    }
                }
            }
        }
        for (b, block) in self.pattern.blocks_in_layout_order().filter(|(_, b)| !b.per_component) {
            for &e in entities(block.entity) {
                for i in 0..block.count {
                    list.push_single(self.block_offsets[b] + e * block.count + i);
                }
            }
        }
    }
}

/// The dof maps of a finite element space.
#[derive(Debug, Clone)]
pub struct DofMaps {
    pub num_dofs: usize,
    pub cell_dofs: Adjacency<usize>,
    pub face_dofs: Adjacency<usize>,
    pub boundary_face_dofs: Adjacency<usize>,
}

/// Builds the cell, face and boundary face dof maps of an element on a mesh.
///
/// All cell geometries of the mesh must share the same pattern. The dofs of a face are derived
/// from the pattern of its cells: node dofs map to the face nodes, edge dofs to the face edges,
/// face dofs to the face itself, and interior dofs are dropped.
pub fn build_dof_maps<T: Real>(mesh: &Mesh<T>, element: &FiniteElementType) -> eyre::Result<DofMaps> {
    let geometries = mesh.unique_cell_geometries();
    let mut pattern_string = None;
    for geometry in &geometries {
        let pattern = element.dof_pattern(*geometry)?;
        match pattern_string {
            None => pattern_string = Some(pattern),
            Some(existing) if existing != pattern => {
                return Err(invalid_pattern(format!(
                    "{element:?} has differing patterns \"{existing}\" and \"{pattern}\" on the same mesh"
                )))
            }
            Some(_) => {}
        }
    }
    let pattern = DofPattern::parse(pattern_string.unwrap_or(""))?;
    if mesh.dim() != 3 && pattern.blocks.iter().any(|b| b.entity == DofEntity::Edge) {
        return Err(invalid_pattern(format!(
            "edge dofs require a three-dimensional mesh, but the mesh has dimension {}",
            mesh.dim()
        )));
    }
    let layout = DofLayout::new(mesh, pattern, element.ncomponents(mesh.dim()));

    let mut cell_dofs = Adjacency::new();
    for cell in 0..mesh.num_cells() {
        let interior = [cell];
        layout.push_item_dofs(&mut cell_dofs, |entity| match entity {
            DofEntity::Node => mesh.cell_nodes(cell),
            DofEntity::Edge => mesh.cell_edges(cell),
            DofEntity::Face => mesh.cell_faces(cell),
            DofEntity::Interior => &interior,
        });
    }

    let mut face_dofs = Adjacency::new();
    for face in 0..mesh.num_faces() {
        let own = [face];
        layout.push_item_dofs(&mut face_dofs, |entity| match entity {
            DofEntity::Node => mesh.face_nodes(face),
            DofEntity::Edge => mesh.face_edges(face),
            DofEntity::Face => &own,
            DofEntity::Interior => &[],
        });
    }

    let mut boundary_face_dofs = Adjacency::new();
    for &face in mesh.boundary_faces() {
        boundary_face_dofs.push(&face_dofs[face]);
    }

    Ok(DofMaps {
        num_dofs: layout.num_dofs,
        cell_dofs,
        face_dofs,
        boundary_face_dofs,
    })
}

/// How an assembly item resolves to the items whose dofs are used.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DofItemMode {
    /// The dofs of the assembly item itself.
    Item,
    /// Difference of the two cells adjacent to a face, first minus second. On boundary faces,
    /// the adjacent cell only.
    Jump,
    /// Average of the two cells adjacent to a face. On boundary faces, the adjacent cell only.
    Average,
    /// The given adjacent cell of a face, `0` or `1`.
    Side(usize),
}

/// An item whose dofs contribute to an assembly item.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DofItem<T> {
    /// Cell or face index.
    pub item: usize,
    /// For cells evaluated on a face: `local_face * num_orientations + orientation`.
    pub position: usize,
    /// Weight of this dof-item's contribution.
    pub coefficient: T,
    /// The face being assembled, if any.
    pub face: Option<usize>,
}

/// Position of a face within a cell: its local face index times the number of face
/// orientations, plus the orientation in which the face appears in the cell.
pub fn face_position<T: Real>(mesh: &Mesh<T>, cell: usize, face: usize) -> eyre::Result<usize> {
    let invalid_mesh = |description: String| -> eyre::Report { AssemblyError::InvalidMesh(description).into() };
    let local_face = mesh
        .local_face_index(cell, face)
        .ok_or_else(|| invalid_mesh(format!("face {face} is not a face of cell {cell}")))?;
    let cell_nodes = mesh.cell_nodes(cell);
    let local_nodes = mesh.cell_geometry(cell).face_nodes()[local_face];
    let face_nodes = mesh.face_nodes(face);
    let orientations = mesh.face_geometry(face).face_orientations();
    let orientation = orientations
        .iter()
        .position(|permutation| {
            face_nodes
                .iter()
                .zip(permutation.iter())
                .all(|(&node, &p)| cell_nodes[local_nodes[p]] == node)
        })
        .ok_or_else(|| {
            invalid_mesh(format!(
                "nodes of face {face} do not match local face {local_face} of cell {cell}"
            ))
        })?;
    Ok(local_face * orientations.len() + orientation)
}

/// Resolves a face to the dof-items contributing to it under the given mode.
///
/// Absent dof-items, such as the second side of a boundary face, are `None`.
pub fn resolve_dof_items<T: Real>(
    mesh: &Mesh<T>,
    face: usize,
    mode: DofItemMode,
) -> eyre::Result<[Option<DofItem<T>>; 2]> {
    let (first, second) = mesh.face_cells(face);
    let cell_item = |cell: usize, coefficient: T| -> eyre::Result<DofItem<T>> {
        Ok(DofItem {
            item: cell,
            position: face_position(mesh, cell, face)?,
            coefficient,
            face: Some(face),
        })
    };
    let half = T::one() / (T::one() + T::one());
    Ok(match (mode, second) {
        (DofItemMode::Item, _) => [
            Some(DofItem {
                item: face,
                position: 0,
                coefficient: T::one(),
                face: Some(face),
            }),
            None,
        ],
        (DofItemMode::Jump, Some(second)) => [Some(cell_item(first, T::one())?), Some(cell_item(second, -T::one())?)],
        (DofItemMode::Average, Some(second)) => [Some(cell_item(first, half)?), Some(cell_item(second, half)?)],
        (DofItemMode::Jump | DofItemMode::Average, None) => [Some(cell_item(first, T::one())?), None],
        (DofItemMode::Side(0), _) => [Some(cell_item(first, T::one())?), None],
        (DofItemMode::Side(1), Some(second)) => [None, Some(cell_item(second, T::one())?)],
        (DofItemMode::Side(1), None) => [None, None],
        (DofItemMode::Side(side), _) => {
            return Err(AssemblyError::UnsupportedCombination(format!("a face has no side {side}")).into())
        }
    })
}
