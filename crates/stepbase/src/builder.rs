//! Baseline construction from a kernel assembly tree.
//!
//! Three passes over an index arena:
//!
//! 1. preorder flattening, with parent and child indices;
//! 2. a reverse-preorder fold that groups identical siblings and
//!    aggregates assembly summaries over every child instance, grouped or
//!    not (descendants always have larger indices than their ancestors, so
//!    children are final when a parent is folded);
//! 3. preorder emission of the surviving nodes with path-based ids.

use std::collections::BTreeMap;

use chrono::Utc;
use stepbase_kernel::{AssemblyTree, ShapeKind, ShapeNode};
use tracing::{debug, warn};

use crate::baseline::{new_baseline_id, Baseline, Component, ComponentId, SourceInfo};
use crate::config::BuilderConfig;
use crate::error::{EngineError, Result};
use crate::geometry::GeometrySummary;

struct ArenaNode<'t> {
    shape: &'t ShapeNode,
    children: Vec<usize>,
    summary: GeometrySummary,
    quantity: u32,
    collapsed: bool,
}

/// Turns assembly trees into baselines.
#[derive(Debug, Clone, Default)]
pub struct BaselineBuilder {
    config: BuilderConfig,
}

impl BaselineBuilder {
    /// Builder with explicit settings.
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Build a baseline without source information.
    pub fn build(&self, tree: &AssemblyTree) -> Result<Baseline> {
        self.build_with_source(tree, None)
    }

    /// Build a baseline, recording where the model came from.
    ///
    /// Fails with [`EngineError::Parse`] when the tree has no root or the
    /// root is a part whose geometry could not be read.
    pub fn build_with_source(&self, tree: &AssemblyTree, source: Option<SourceInfo>) -> Result<Baseline> {
        let root = tree
            .root
            .as_ref()
            .ok_or_else(|| EngineError::parse("model contains no shapes"))?;

        let mut arena = flatten(root)?;
        self.fold(&mut arena);
        let (components, geometry) = emit(&mut arena);
        debug!(
            nodes = arena.len(),
            components = components.len(),
            "baseline built"
        );

        let now = Utc::now();
        let seed = source
            .as_ref()
            .map(|s| s.checksum.clone())
            .unwrap_or_else(|| root.name.clone());
        Ok(Baseline {
            baseline_id: new_baseline_id(now, seed.as_bytes()),
            created_at: now,
            unit: tree.unit,
            source,
            metadata: tree.metadata.clone(),
            components,
            geometry,
            interfaces: None,
        })
    }

    fn fold(&self, arena: &mut [ArenaNode<'_>]) {
        let rel = self.config.signature_tolerance;
        for idx in (0..arena.len()).rev() {
            if arena[idx].shape.kind() != ShapeKind::Assembly {
                continue;
            }
            // (representative, group size)
            let mut groups: Vec<(usize, u32)> = Vec::new();
            for &child in &arena[idx].children {
                let found = groups.iter().position(|&(rep, _)| {
                    let (a, b) = (&arena[rep], &arena[child]);
                    a.shape.name == b.shape.name
                        && a.shape.kind() == b.shape.kind()
                        && a.summary.same_signature(&b.summary, rel)
                });
                match found {
                    Some(g) => groups[g].1 += 1,
                    None => groups.push((child, 1)),
                }
            }

            let mut collapsed = Vec::new();
            for &child in &arena[idx].children {
                if !groups.iter().any(|&(rep, _)| rep == child) {
                    collapsed.push(child);
                }
            }
            for child in collapsed {
                arena[child].collapsed = true;
            }
            for &(rep, count) in &groups {
                arena[rep].quantity = count;
            }
            let summary = GeometrySummary::aggregate(arena[idx].children.iter().map(|&c| &arena[c].summary));
            arena[idx].summary = summary;
        }
    }
}

/// Preorder arena of the tree.
fn flatten(root: &ShapeNode) -> Result<Vec<ArenaNode<'_>>> {
    let mut arena: Vec<ArenaNode<'_>> = Vec::with_capacity(root.node_count());
    let mut stack: Vec<(&ShapeNode, Option<usize>)> = vec![(root, None)];

    while let Some((shape, parent)) = stack.pop() {
        let idx = arena.len();
        let summary = match shape.kind() {
            ShapeKind::Assembly => GeometrySummary::empty(),
            ShapeKind::Part => match shape.primitives() {
                Some(p) => GeometrySummary::from_primitives(p),
                None if parent.is_none() => {
                    return Err(EngineError::parse(format!(
                        "geometry of root part '{}' is unreadable",
                        shape.name
                    )));
                }
                None => {
                    warn!(part = %shape.name, "unreadable part geometry, using an empty summary");
                    GeometrySummary::empty()
                }
            },
        };
        arena.push(ArenaNode {
            shape,
            children: Vec::new(),
            summary,
            quantity: 1,
            collapsed: false,
        });
        if let Some(p) = parent {
            arena[p].children.push(idx);
        }
        for child in shape.children().iter().rev() {
            stack.push((child, Some(idx)));
        }
    }
    Ok(arena)
}

/// Components in preorder and their summaries, skipping collapsed subtrees.
fn emit(arena: &mut [ArenaNode<'_>]) -> (Vec<Component>, BTreeMap<ComponentId, GeometrySummary>) {
    let mut components = Vec::new();
    let mut geometry = BTreeMap::new();
    let mut stack: Vec<(usize, ComponentId, Option<ComponentId>, usize)> =
        vec![(0, ComponentId::root(), None, 0)];

    while let Some((idx, id, parent_id, level)) = stack.pop() {
        let survivors: Vec<usize> = arena[idx]
            .children
            .iter()
            .copied()
            .filter(|&c| !arena[c].collapsed)
            .collect();
        for (k, &child) in survivors.iter().enumerate().rev() {
            stack.push((child, id.child(k), Some(id.clone()), level + 1));
        }

        let node = &mut arena[idx];
        components.push(Component {
            component_id: id.clone(),
            name: node.shape.name.clone(),
            component_type: node.shape.kind(),
            level,
            parent_id,
            quantity: node.quantity,
            color: node.shape.color,
        });
        geometry.insert(id, std::mem::take(&mut node.summary));
    }
    (components, geometry)
}
