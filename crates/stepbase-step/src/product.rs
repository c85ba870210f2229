//! Product structure: turns PRODUCT_DEFINITION / NEXT_ASSEMBLY_USAGE_OCCURRENCE
//! graphs into a [`ShapeNode`] tree with part geometry in root coordinates.

use std::collections::{HashMap, HashSet, VecDeque};

use stepbase_kernel::{Primitives, Rgb, ShapeNode};
use stepbase_math::Transform;
use tracing::{debug, warn};

use crate::brep::measure_solids;
use crate::entities::{parse_axis2_placement, EntityArgs};
use crate::error::StepError;
use crate::parser::StepFile;
use crate::style::item_colors;

const SOLID_TYPES: [&str; 2] = ["MANIFOLD_SOLID_BREP", "BREP_WITH_VOIDS"];

/// Build the shape tree of a parsed file.
///
/// Returns `Ok(None)` when the file holds neither products nor solids.
pub fn build_tree(file: &StepFile, fallback_name: &str) -> Result<Option<ShapeNode>, StepError> {
    let definitions = file.entities_of_type("PRODUCT_DEFINITION");
    if definitions.is_empty() {
        return Ok(loose_solids(file, fallback_name));
    }

    let graph = ProductGraph::new(file)?;
    let roots: Vec<u64> = definitions
        .iter()
        .map(|pd| pd.id)
        .filter(|id| !graph.used_as_child.contains(id))
        .collect();
    debug!(definitions = definitions.len(), roots = roots.len(), "product structure");

    let mut builder = TreeBuilder {
        graph: &graph,
        geometry: HashMap::new(),
        visiting: HashSet::new(),
    };
    match roots.as_slice() {
        [] => Err(StepError::InvalidStructure(
            "every product definition is used inside another one".into(),
        )),
        [root] => builder.node(*root, &Transform::identity()).map(Some),
        many => {
            let children = many
                .iter()
                .map(|&id| builder.node(id, &Transform::identity()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(ShapeNode::assembly(fallback_name, children)))
        }
    }
}

/// A file with solids but no product structure is one part.
fn loose_solids(file: &StepFile, fallback_name: &str) -> Option<ShapeNode> {
    let solids: Vec<u64> = SOLID_TYPES
        .iter()
        .flat_map(|t| file.entities_of_type(t))
        .map(|e| e.id)
        .collect();
    if solids.is_empty() {
        return None;
    }
    let primitives = match measure_solids(file, &solids) {
        Ok(p) => Some(p),
        Err(err) => {
            warn!(%err, "cannot measure solids");
            None
        }
    };
    let colors = item_colors(file);
    let color = solids.iter().find_map(|s| colors.get(s).copied());
    Some(ShapeNode::part(fallback_name, primitives).with_color(color))
}

/// Indexes over the product and representation entities.
struct ProductGraph<'a> {
    file: &'a StepFile,
    /// Parent definition → (occurrence, child definition), ordered by occurrence id.
    children: HashMap<u64, Vec<(u64, u64)>>,
    used_as_child: HashSet<u64>,
    /// Definition or occurrence → representations describing its shape.
    representations: HashMap<u64, Vec<u64>>,
    /// Representation ↔ representation links without a placement.
    rep_links: HashMap<u64, Vec<u64>>,
    /// Occurrence → child-to-parent placement.
    placements: HashMap<u64, Transform>,
    /// Styled item → colour.
    colors: HashMap<u64, Rgb>,
}

impl<'a> ProductGraph<'a> {
    fn new(file: &'a StepFile) -> Result<Self, StepError> {
        let mut children: HashMap<u64, Vec<(u64, u64)>> = HashMap::new();
        let mut used_as_child = HashSet::new();
        for nauo in file.entities_of_type("NEXT_ASSEMBLY_USAGE_OCCURRENCE") {
            let parent = nauo.entity_ref(3)?;
            let child = nauo.entity_ref(4)?;
            children.entry(parent).or_default().push((nauo.id, child));
            used_as_child.insert(child);
        }

        // PRODUCT_DEFINITION_SHAPE id → the definition or occurrence it describes
        let mut shape_of = HashMap::new();
        for pds in file.entities_of_type("PRODUCT_DEFINITION_SHAPE") {
            shape_of.insert(pds.id, pds.entity_ref(2)?);
        }

        let mut representations: HashMap<u64, Vec<u64>> = HashMap::new();
        for sdr in file.entities_of_type("SHAPE_DEFINITION_REPRESENTATION") {
            if let Some(&target) = shape_of.get(&sdr.entity_ref(0)?) {
                representations.entry(target).or_default().push(sdr.entity_ref(1)?);
            }
        }

        let mut rep_links: HashMap<u64, Vec<u64>> = HashMap::new();
        for rel in file.entities_of_type("REPRESENTATION_RELATIONSHIP") {
            if rel.is_a("REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION") {
                continue;
            }
            let Some(view) = rel.record("REPRESENTATION_RELATIONSHIP") else {
                continue;
            };
            let (a, b) = (view.entity_ref(2)?, view.entity_ref(3)?);
            rep_links.entry(a).or_default().push(b);
            rep_links.entry(b).or_default().push(a);
        }
        for rel in file.entities_of_type("SHAPE_REPRESENTATION_RELATIONSHIP") {
            if rel.complex.is_empty() {
                let (a, b) = (rel.entity_ref(2)?, rel.entity_ref(3)?);
                rep_links.entry(a).or_default().push(b);
                rep_links.entry(b).or_default().push(a);
            }
        }

        let mut placements = HashMap::new();
        for cdsr in file.entities_of_type("CONTEXT_DEPENDENT_SHAPE_REPRESENTATION") {
            let Some(&occurrence) = shape_of.get(&cdsr.entity_ref(1)?) else {
                continue;
            };
            let relation = file.require(cdsr.entity_ref(0)?)?;
            let Some(with_transform) = relation.record("REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION") else {
                continue;
            };
            let transformation = file.require(with_transform.entity_ref(0)?)?;
            if transformation.type_name != "ITEM_DEFINED_TRANSFORMATION" {
                warn!(entity = transformation.id, kind = %transformation.type_name, "unsupported placement");
                continue;
            }
            let from = parse_axis2_placement(file, transformation.entity_ref(2)?)?.to_transform();
            let to = parse_axis2_placement(file, transformation.entity_ref(3)?)?.to_transform();
            let Some(from_inv) = from.inverse() else {
                warn!(entity = transformation.id, "singular placement");
                continue;
            };
            placements.insert(occurrence, to.then(&from_inv));
        }

        Ok(Self {
            file,
            children,
            used_as_child,
            representations,
            rep_links,
            placements,
            colors: item_colors(file),
        })
    }

    fn name(&self, definition: u64) -> String {
        let product = self
            .file
            .get(definition)
            .and_then(|pd| pd.entity_ref(2).ok())
            .and_then(|formation| self.file.get(formation))
            .and_then(|f| f.entity_ref(2).ok())
            .and_then(|p| self.file.get(p));
        match product {
            Some(p) if !p.string_or_empty(1).trim().is_empty() => p.string_or_empty(1).to_string(),
            Some(p) if !p.string_or_empty(0).trim().is_empty() => p.string_or_empty(0).to_string(),
            _ => format!("#{definition}"),
        }
    }

    /// Solid items reachable from the representations of a definition.
    fn solids(&self, definition: u64) -> Result<Vec<u64>, StepError> {
        let mut queue: VecDeque<u64> = self
            .representations
            .get(&definition)
            .cloned()
            .unwrap_or_default()
            .into();
        let mut seen: HashSet<u64> = queue.iter().copied().collect();
        let mut solids = Vec::new();
        while let Some(rep_id) = queue.pop_front() {
            let rep = self.file.require(rep_id)?;
            if let Ok(items) = rep.entity_ref_list(1) {
                for item in items {
                    if self
                        .file
                        .get(item)
                        .is_some_and(|e| SOLID_TYPES.contains(&e.type_name.as_str()))
                    {
                        solids.push(item);
                    }
                }
            }
            for &next in self.rep_links.get(&rep_id).into_iter().flatten() {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        solids.sort_unstable();
        solids.dedup();
        Ok(solids)
    }
}

struct TreeBuilder<'g, 'a> {
    graph: &'g ProductGraph<'a>,
    /// Part geometry in its own coordinates and colour, measured once per definition.
    geometry: HashMap<u64, (Option<Primitives>, Option<Rgb>)>,
    visiting: HashSet<u64>,
}

impl TreeBuilder<'_, '_> {
    fn node(&mut self, definition: u64, world: &Transform) -> Result<ShapeNode, StepError> {
        if !self.visiting.insert(definition) {
            return Err(StepError::InvalidStructure(format!(
                "product definition #{definition} contains itself"
            )));
        }
        let name = self.graph.name(definition);

        let node = match self.graph.children.get(&definition) {
            Some(occurrences) if !occurrences.is_empty() => {
                let mut occurrences = occurrences.clone();
                occurrences.sort_unstable();
                let mut children = Vec::with_capacity(occurrences.len());
                for (occurrence, child) in occurrences {
                    let child_world = match self.graph.placements.get(&occurrence) {
                        Some(local) => world.then(local),
                        None => world.clone(),
                    };
                    children.push(self.node(child, &child_world)?);
                }
                ShapeNode::assembly(name, children)
            }
            _ => {
                let (local, color) = self.part_geometry(definition, &name)?;
                let placed = local.map(|p| {
                    if world.is_identity(1e-12) {
                        p
                    } else {
                        p.transformed(world)
                    }
                });
                ShapeNode::part(name, placed).with_color(color)
            }
        };

        self.visiting.remove(&definition);
        Ok(node)
    }

    fn part_geometry(&mut self, definition: u64, name: &str) -> Result<(Option<Primitives>, Option<Rgb>), StepError> {
        if let Some(cached) = self.geometry.get(&definition) {
            return Ok(cached.clone());
        }
        let solids = self.graph.solids(definition)?;
        let measured = if solids.is_empty() {
            warn!(part = name, "part has no solid geometry");
            None
        } else {
            match measure_solids(self.graph.file, &solids) {
                Ok(p) => Some(p),
                Err(err) => {
                    warn!(part = name, %err, "cannot measure part geometry");
                    None
                }
            }
        };
        let color = solids.iter().find_map(|s| self.graph.colors.get(s).copied());
        self.geometry.insert(definition, (measured.clone(), color));
        Ok((measured, color))
    }
}
