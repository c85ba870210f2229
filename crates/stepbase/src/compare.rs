//! Baseline comparison and impact classification.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use stepbase_kernel::{FileMetadata, HoleFeature, TopologyKind};
use stepbase_math::{axis_angle, relative_delta, relative_eq, Vec3};
use tracing::debug;

use crate::baseline::{Baseline, Component, ComponentId, ComponentType};
use crate::config::CompareConfig;
use crate::error::{EngineError, Result};
use crate::interface::Interface;

/// Overall engineering impact of a change, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    /// Nothing changed.
    None,
    /// Quantities, structure or header metadata only.
    Minor,
    /// Geometry, features or interfaces changed.
    Moderate,
    /// Components added or removed, a major geometry change or an
    /// envelope change.
    Critical,
    /// A critical joint appeared or disappeared.
    CriticalInterface,
}

impl ImpactLevel {
    /// Human-readable summary of the level.
    pub fn message(&self) -> &'static str {
        match self {
            ImpactLevel::None => "No significant change",
            ImpactLevel::Minor => "Minor change: quantities, structure or metadata only",
            ImpactLevel::Moderate => "Moderate change to geometry, features or interfaces",
            ImpactLevel::Critical => "Critical change: components added, removed, reshaped or outgrowing their envelope",
            ImpactLevel::CriticalInterface => "Critical joints changed in the assembly interfaces",
        }
    }
}

/// A bill-of-materials change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BomChange {
    /// Only in the second baseline.
    Added {
        /// Id in the second baseline.
        component_id: ComponentId,
        /// Component name.
        name: String,
        /// PART or ASSEMBLY.
        #[serde(rename = "type")]
        component_type: ComponentType,
        /// Instance count.
        quantity: u32,
    },
    /// Only in the first baseline.
    Removed {
        /// Id in the first baseline.
        component_id: ComponentId,
        /// Component name.
        name: String,
        /// PART or ASSEMBLY.
        #[serde(rename = "type")]
        component_type: ComponentType,
        /// Instance count.
        quantity: u32,
    },
    /// Same component, different instance count.
    QuantityChanged {
        /// Id in the second baseline.
        component_id: ComponentId,
        /// Component name.
        name: String,
        /// Count in the first baseline.
        before: u32,
        /// Count in the second baseline.
        after: u32,
    },
    /// Same component under a different parent.
    Reparented {
        /// Id in the second baseline.
        component_id: ComponentId,
        /// Component name.
        name: String,
        /// Previous parent, as an id of the second baseline when it has one.
        old_parent: Option<ComponentId>,
        /// New parent.
        new_parent: Option<ComponentId>,
    },
}

impl BomChange {
    /// Whether the component set itself changed.
    pub fn is_membership(&self) -> bool {
        matches!(self, BomChange::Added { .. } | BomChange::Removed { .. })
    }
}

/// Volume and surface delta of a matched component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryChange {
    /// Id in the second baseline.
    pub component_id: ComponentId,
    /// Component name.
    pub name: String,
    /// Volume in the first baseline.
    pub volume_before: f64,
    /// Volume in the second baseline.
    pub volume_after: f64,
    /// `volume_after - volume_before`.
    pub volume_change: f64,
    /// Volume change relative to `|volume_before|`.
    pub volume_change_relative: f64,
    /// Surface in the first baseline.
    pub surface_before: f64,
    /// Surface in the second baseline.
    pub surface_after: f64,
    /// `surface_after - surface_before`.
    pub surface_change: f64,
    /// Surface change relative to `|surface_before|`.
    pub surface_change_relative: f64,
    /// Either relative change exceeds the major threshold.
    pub major: bool,
}

/// A nonzero topology count delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyChange {
    /// Id in the second baseline.
    pub component_id: ComponentId,
    /// Component name.
    pub name: String,
    /// Element kind.
    pub kind: TopologyKind,
    /// Count in the first baseline.
    pub before: u64,
    /// Count in the second baseline.
    pub after: u64,
    /// `after - before`.
    pub delta: i64,
}

/// What happened to a hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureChangeKind {
    /// New hole.
    Added,
    /// Hole gone.
    Removed,
    /// Same position, new diameter.
    Resized,
    /// Same diameter, new position.
    Moved,
}

/// A hole-level change of a matched part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureChange {
    /// Id in the second baseline.
    pub component_id: ComponentId,
    /// Component name.
    pub name: String,
    /// Change kind.
    pub change: FeatureChangeKind,
    /// The hole in the first baseline.
    pub before: Option<HoleFeature>,
    /// The hole in the second baseline.
    pub after: Option<HoleFeature>,
}

/// Bounding-box extents change of a matched component, a clash risk for
/// its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxChange {
    /// Id in the second baseline.
    pub component_id: ComponentId,
    /// Component name.
    pub name: String,
    /// Box extents in the first baseline.
    pub extents_before: Vec3,
    /// Box extents in the second baseline.
    pub extents_after: Vec3,
    /// Per-axis `extents_after - extents_before`.
    pub extent_delta: Vec3,
}

/// A header metadata change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataChange {
    /// FILE_SCHEMA differs.
    SchemaChanged {
        /// Schema of the first baseline.
        before: Option<String>,
        /// Schema of the second baseline.
        after: Option<String>,
    },
    /// A product name only declared in the second baseline.
    ProductAdded {
        /// Product name.
        name: String,
    },
    /// A product name only declared in the first baseline.
    ProductRemoved {
        /// Product name.
        name: String,
    },
}

/// What happened to an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfaceChangeKind {
    /// Only in the second baseline.
    Added,
    /// Only in the first baseline.
    Removed,
    /// Kind, fastener count or criticality differs.
    Changed,
}

/// Transition of a critical joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriticalJointChange {
    /// Critical only in the second baseline.
    Appeared,
    /// Critical only in the first baseline.
    Disappeared,
}

/// An interface-level change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceChange {
    /// First component of the pair, in second-baseline ids when matched.
    pub component_a: ComponentId,
    /// Second component of the pair.
    pub component_b: ComponentId,
    /// Change kind.
    pub change: InterfaceChangeKind,
    /// The interface in the first baseline.
    pub before: Option<Interface>,
    /// The interface in the second baseline.
    pub after: Option<Interface>,
    /// Set when a critical joint appears or disappears.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_joint: Option<CriticalJointChange>,
}

/// Change counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStatistics {
    /// BOM changes.
    pub bom_changes: usize,
    /// Geometry changes.
    pub geometry_changes: usize,
    /// Major geometry changes.
    pub major_geometry_changes: usize,
    /// Topology changes.
    pub topology_changes: usize,
    /// Feature changes.
    pub feature_changes: usize,
    /// Bounding-box changes.
    pub bounding_box_changes: usize,
    /// Interface changes.
    pub interface_changes: usize,
    /// Metadata changes.
    pub metadata_changes: usize,
    /// Sum of all change lists.
    pub total_changes: usize,
}

/// Result of comparing two baselines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    /// First baseline id.
    pub baseline1: String,
    /// Second baseline id.
    pub baseline2: String,
    /// Overall impact.
    pub impact_level: ImpactLevel,
    /// Sentence describing the impact.
    pub impact_message: String,
    /// Membership, quantity and parent changes.
    pub bom_changes: Vec<BomChange>,
    /// Significant volume or surface changes.
    pub geometry_changes: Vec<GeometryChange>,
    /// Topology count deltas.
    pub topology_changes: Vec<TopologyChange>,
    /// Hole changes.
    pub feature_changes: Vec<FeatureChange>,
    /// Envelope changes beyond the envelope tolerance.
    pub bounding_box_changes: Vec<BoundingBoxChange>,
    /// Interface changes.
    pub interface_changes: Vec<InterfaceChange>,
    /// Header schema and product changes.
    pub metadata_changes: Vec<MetadataChange>,
    /// Whether both baselines carried interfaces.
    pub interfaces_compared: bool,
    /// Change counts.
    pub statistics: DiffStatistics,
}

impl DiffReport {
    /// True when nothing changed.
    pub fn is_unchanged(&self) -> bool {
        self.impact_level == ImpactLevel::None
    }
}

/// Component pairing between two baselines.
struct Matching<'a> {
    /// Matched components in first-baseline preorder.
    pairs: Vec<(&'a Component, &'a Component)>,
    /// Second-baseline id of every matched first-baseline id.
    translate: HashMap<&'a ComponentId, &'a ComponentId>,
    /// Pairs found through the name fallback.
    by_name: Vec<bool>,
    removed: Vec<&'a Component>,
    added: Vec<&'a Component>,
}

impl<'a> Matching<'a> {
    fn new(b1: &'a Baseline, b2: &'a Baseline) -> Self {
        let index2: HashMap<&ComponentId, usize> = b2
            .components
            .iter()
            .enumerate()
            .map(|(i, c)| (&c.component_id, i))
            .collect();
        let mut taken = vec![false; b2.components.len()];
        let mut slot: Vec<Option<(usize, bool)>> = vec![None; b1.components.len()];

        for (i, c1) in b1.components.iter().enumerate() {
            if let Some(&j) = index2.get(&c1.component_id) {
                let c2 = &b2.components[j];
                if same_kind(c1, c2) {
                    taken[j] = true;
                    slot[i] = Some((j, false));
                }
            }
        }
        for (i, c1) in b1.components.iter().enumerate() {
            if slot[i].is_some() {
                continue;
            }
            let found = b2
                .components
                .iter()
                .enumerate()
                .find(|(j, c2)| !taken[*j] && same_kind(c1, c2))
                .map(|(j, _)| j);
            if let Some(j) = found {
                taken[j] = true;
                slot[i] = Some((j, true));
            }
        }

        let mut matching = Matching {
            pairs: Vec::new(),
            translate: HashMap::new(),
            by_name: Vec::new(),
            removed: Vec::new(),
            added: Vec::new(),
        };
        for (c1, s) in b1.components.iter().zip(slot) {
            match s {
                Some((j, by_name)) => {
                    let c2 = &b2.components[j];
                    matching.pairs.push((c1, c2));
                    matching.by_name.push(by_name);
                    matching.translate.insert(&c1.component_id, &c2.component_id);
                }
                None => matching.removed.push(c1),
            }
        }
        matching.added = b2
            .components
            .iter()
            .zip(&taken)
            .filter(|(_, taken)| !**taken)
            .map(|(c, _)| c)
            .collect();
        matching
    }

    fn translate(&self, id: &ComponentId) -> Option<&'a ComponentId> {
        self.translate.get(id).copied()
    }
}

fn same_kind(a: &Component, b: &Component) -> bool {
    a.name == b.name && a.component_type == b.component_type
}

/// Compares two baselines.
#[derive(Debug, Clone, Default)]
pub struct BaselineComparator {
    config: CompareConfig,
}

impl BaselineComparator {
    /// Comparator with explicit thresholds.
    pub fn new(config: CompareConfig) -> Self {
        Self { config }
    }

    /// Diff `b1` (before) against `b2` (after).
    pub fn compare(&self, b1: &Baseline, b2: &Baseline) -> Result<DiffReport> {
        if b1.components.is_empty() && b2.components.is_empty() {
            return Err(EngineError::IncompatibleBaseline(
                "both baselines have no components".into(),
            ));
        }
        if b1.unit != b2.unit {
            return Err(EngineError::UnitMismatch {
                left: b1.unit,
                right: b2.unit,
            });
        }

        let matching = Matching::new(b1, b2);
        let bom_changes = bom_changes(&matching);
        let restructured = restructured(&matching, &bom_changes);
        let mut geometry_changes = Vec::new();
        let mut topology_changes = Vec::new();
        let mut feature_changes = Vec::new();
        let mut bounding_box_changes = Vec::new();
        for &(c1, c2) in &matching.pairs {
            // Aggregates over a changed BOM differ because of that change.
            if !c2.is_part() && restructured.contains(&c2.component_id) {
                continue;
            }
            let (Some(g1), Some(g2)) = (b1.summary(&c1.component_id), b2.summary(&c2.component_id))
            else {
                continue;
            };
            geometry_changes.extend(self.geometry_change(
                c2,
                (g1.volume, g2.volume),
                (g1.surface_area, g2.surface_area),
            ));
            for kind in TopologyKind::ALL {
                let (before, after) = (g1.topology_counts.get(kind), g2.topology_counts.get(kind));
                if before != after {
                    topology_changes.push(TopologyChange {
                        component_id: c2.component_id.clone(),
                        name: c2.name.clone(),
                        kind,
                        before,
                        after,
                        delta: after as i64 - before as i64,
                    });
                }
            }
            if c1.is_part() {
                feature_changes.extend(self.hole_changes(c2, &g1.holes, &g2.holes));
            }
            let (extents_before, extents_after) = (g1.bounding_box.extents(), g2.bounding_box.extents());
            let extent_delta = extents_after - extents_before;
            if extent_delta.amax() > self.config.envelope_tolerance {
                bounding_box_changes.push(BoundingBoxChange {
                    component_id: c2.component_id.clone(),
                    name: c2.name.clone(),
                    extents_before,
                    extents_after,
                    extent_delta,
                });
            }
        }

        let interfaces_compared = b1.interfaces.is_some() && b2.interfaces.is_some();
        let interface_changes = match (&b1.interfaces, &b2.interfaces) {
            (Some(i1), Some(i2)) => interface_changes(&matching, i1, i2),
            _ => Vec::new(),
        };
        let metadata_changes = metadata_changes(&b1.metadata, &b2.metadata);

        let impact_level = classify(&Changes {
            bom: &bom_changes,
            geometry: &geometry_changes,
            topology: &topology_changes,
            features: &feature_changes,
            bounding_boxes: &bounding_box_changes,
            interfaces: &interface_changes,
            metadata: &metadata_changes,
        });
        let statistics = DiffStatistics {
            bom_changes: bom_changes.len(),
            geometry_changes: geometry_changes.len(),
            major_geometry_changes: geometry_changes.iter().filter(|g| g.major).count(),
            topology_changes: topology_changes.len(),
            feature_changes: feature_changes.len(),
            bounding_box_changes: bounding_box_changes.len(),
            interface_changes: interface_changes.len(),
            metadata_changes: metadata_changes.len(),
            total_changes: bom_changes.len()
                + geometry_changes.len()
                + topology_changes.len()
                + feature_changes.len()
                + bounding_box_changes.len()
                + interface_changes.len()
                + metadata_changes.len(),
        };
        debug!(
            baseline1 = %b1.baseline_id,
            baseline2 = %b2.baseline_id,
            impact = ?impact_level,
            total = statistics.total_changes,
            "baselines compared"
        );

        Ok(DiffReport {
            baseline1: b1.baseline_id.clone(),
            baseline2: b2.baseline_id.clone(),
            impact_level,
            impact_message: impact_level.message().to_string(),
            bom_changes,
            geometry_changes,
            topology_changes,
            feature_changes,
            bounding_box_changes,
            interface_changes,
            metadata_changes,
            interfaces_compared,
            statistics,
        })
    }

    fn geometry_change(
        &self,
        component: &Component,
        (volume_before, volume_after): (f64, f64),
        (surface_before, surface_after): (f64, f64),
    ) -> Option<GeometryChange> {
        let volume_change_relative = relative_delta(volume_before, volume_after);
        let surface_change_relative = relative_delta(surface_before, surface_after);
        let largest = volume_change_relative.abs().max(surface_change_relative.abs());
        if largest <= self.config.significance_threshold {
            return None;
        }
        Some(GeometryChange {
            component_id: component.component_id.clone(),
            name: component.name.clone(),
            volume_before,
            volume_after,
            volume_change: volume_after - volume_before,
            volume_change_relative,
            surface_before,
            surface_after,
            surface_change: surface_after - surface_before,
            surface_change_relative,
            major: largest > self.config.major_threshold,
        })
    }

    fn hole_changes(&self, component: &Component, before: &[HoleFeature], after: &[HoleFeature]) -> Vec<FeatureChange> {
        let tol = self.config.hole_position_tolerance;
        let same_place = |a: &HoleFeature, b: &HoleFeature| {
            (a.axis_point - b.axis_point).norm() <= tol
                && axis_angle(&a.axis_direction, &b.axis_direction) <= 1e-3
        };
        let same_size =
            |a: &HoleFeature, b: &HoleFeature| relative_eq(a.diameter(), b.diameter(), self.config.hole_diameter_tolerance);

        let mut removed: Vec<&HoleFeature> = before.iter().collect();
        let mut added: Vec<&HoleFeature> = Vec::new();
        for hole in after {
            match removed.iter().position(|old| same_place(old, hole) && same_size(old, hole)) {
                Some(k) => {
                    removed.remove(k);
                }
                None => added.push(hole),
            }
        }

        let mut changes = Vec::new();
        let change = |kind, before: Option<&HoleFeature>, after: Option<&HoleFeature>| FeatureChange {
            component_id: component.component_id.clone(),
            name: component.name.clone(),
            change: kind,
            before: before.cloned(),
            after: after.cloned(),
        };
        let passes: [(FeatureChangeKind, &dyn Fn(&HoleFeature, &HoleFeature) -> bool); 2] = [
            (FeatureChangeKind::Resized, &same_place),
            (FeatureChangeKind::Moved, &same_size),
        ];
        for (kind, matches) in passes {
            let mut k = 0;
            while k < removed.len() {
                match added.iter().position(|new| matches(removed[k], new)) {
                    Some(j) => {
                        let new = added.remove(j);
                        changes.push(change(kind, Some(removed.remove(k)), Some(new)));
                    }
                    None => k += 1,
                }
            }
        }
        changes.extend(removed.into_iter().map(|h| change(FeatureChangeKind::Removed, Some(h), None)));
        changes.extend(added.into_iter().map(|h| change(FeatureChangeKind::Added, None, Some(h))));
        changes
    }
}

fn bom_changes(matching: &Matching<'_>) -> Vec<BomChange> {
    let mut changes = Vec::new();
    for (&(c1, c2), &by_name) in matching.pairs.iter().zip(&matching.by_name) {
        if c1.quantity != c2.quantity {
            changes.push(BomChange::QuantityChanged {
                component_id: c2.component_id.clone(),
                name: c2.name.clone(),
                before: c1.quantity,
                after: c2.quantity,
            });
        }
        if by_name {
            let old_parent = c1
                .parent_id
                .as_ref()
                .map(|p| matching.translate(p).unwrap_or(p).clone());
            if old_parent != c2.parent_id {
                changes.push(BomChange::Reparented {
                    component_id: c2.component_id.clone(),
                    name: c2.name.clone(),
                    old_parent,
                    new_parent: c2.parent_id.clone(),
                });
            }
        }
    }
    for c in &matching.removed {
        changes.push(BomChange::Removed {
            component_id: c.component_id.clone(),
            name: c.name.clone(),
            component_type: c.component_type,
            quantity: c.quantity,
        });
    }
    for c in &matching.added {
        changes.push(BomChange::Added {
            component_id: c.component_id.clone(),
            name: c.name.clone(),
            component_type: c.component_type,
            quantity: c.quantity,
        });
    }
    changes
}

/// Second-baseline assemblies with a BOM change somewhere beneath them.
fn restructured(matching: &Matching<'_>, bom: &[BomChange]) -> HashSet<ComponentId> {
    fn mark(set: &mut HashSet<ComponentId>, mut next: Option<ComponentId>) {
        while let Some(id) = next {
            next = id.parent();
            set.insert(id);
        }
    }

    let mut set = HashSet::new();
    for change in bom {
        match change {
            BomChange::Added { component_id, .. } | BomChange::QuantityChanged { component_id, .. } => {
                mark(&mut set, component_id.parent());
            }
            BomChange::Reparented {
                old_parent, new_parent, ..
            } => {
                mark(&mut set, old_parent.clone());
                mark(&mut set, new_parent.clone());
            }
            BomChange::Removed { component_id, .. } => {
                // Nearest first-baseline ancestor that still exists.
                let mut ancestor = component_id.parent();
                while let Some(id) = ancestor {
                    if let Some(kept) = matching.translate(&id) {
                        mark(&mut set, Some(kept.clone()));
                        break;
                    }
                    ancestor = id.parent();
                }
            }
        }
    }
    set
}

fn metadata_changes(before: &FileMetadata, after: &FileMetadata) -> Vec<MetadataChange> {
    let mut changes = Vec::new();
    if before.schema != after.schema {
        changes.push(MetadataChange::SchemaChanged {
            before: before.schema.clone(),
            after: after.schema.clone(),
        });
    }
    let (old, new) = (product_names(before), product_names(after));
    changes.extend(
        new.difference(&old)
            .map(|name| MetadataChange::ProductAdded { name: (*name).to_string() }),
    );
    changes.extend(
        old.difference(&new)
            .map(|name| MetadataChange::ProductRemoved { name: (*name).to_string() }),
    );
    changes
}

fn product_names(metadata: &FileMetadata) -> BTreeSet<&str> {
    metadata.products.iter().map(|p| p.name.as_str()).collect()
}

fn interface_changes(matching: &Matching<'_>, before: &[Interface], after: &[Interface]) -> Vec<InterfaceChange> {
    type Pair = (ComponentId, ComponentId);
    let canonical = |a: &ComponentId, b: &ComponentId| -> Pair {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    };

    let mut changes = Vec::new();
    let mut old: BTreeMap<Pair, &Interface> = BTreeMap::new();
    for i in before {
        match (matching.translate(&i.component_a), matching.translate(&i.component_b)) {
            (Some(a), Some(b)) => {
                old.insert(canonical(a, b), i);
            }
            // An end without a counterpart cannot reappear.
            _ => changes.push(removed_interface((i.component_a.clone(), i.component_b.clone()), i)),
        }
    }
    let new: BTreeMap<Pair, &Interface> = after
        .iter()
        .map(|i| (canonical(&i.component_a, &i.component_b), i))
        .collect();

    for (pair, &i1) in &old {
        match new.get(pair) {
            None => changes.push(removed_interface(pair.clone(), i1)),
            Some(&i2) => {
                let differs = i1.kind != i2.kind
                    || i1.evidence.fastener_count() != i2.evidence.fastener_count()
                    || i1.critical != i2.critical;
                if differs {
                    changes.push(InterfaceChange {
                        component_a: pair.0.clone(),
                        component_b: pair.1.clone(),
                        change: InterfaceChangeKind::Changed,
                        before: Some(i1.clone()),
                        after: Some(i2.clone()),
                        critical_joint: match (i1.critical, i2.critical) {
                            (true, false) => Some(CriticalJointChange::Disappeared),
                            (false, true) => Some(CriticalJointChange::Appeared),
                            _ => None,
                        },
                    });
                }
            }
        }
    }
    for (pair, &i2) in &new {
        if !old.contains_key(pair) {
            changes.push(InterfaceChange {
                component_a: pair.0.clone(),
                component_b: pair.1.clone(),
                change: InterfaceChangeKind::Added,
                before: None,
                after: Some(i2.clone()),
                critical_joint: i2.critical.then_some(CriticalJointChange::Appeared),
            });
        }
    }
    changes
}

fn removed_interface(pair: (ComponentId, ComponentId), i: &Interface) -> InterfaceChange {
    InterfaceChange {
        component_a: pair.0,
        component_b: pair.1,
        change: InterfaceChangeKind::Removed,
        before: Some(i.clone()),
        after: None,
        critical_joint: i.critical.then_some(CriticalJointChange::Disappeared),
    }
}

struct Changes<'r> {
    bom: &'r [BomChange],
    geometry: &'r [GeometryChange],
    topology: &'r [TopologyChange],
    features: &'r [FeatureChange],
    bounding_boxes: &'r [BoundingBoxChange],
    interfaces: &'r [InterfaceChange],
    metadata: &'r [MetadataChange],
}

fn classify(c: &Changes<'_>) -> ImpactLevel {
    if c.interfaces.iter().any(|i| i.critical_joint.is_some()) {
        ImpactLevel::CriticalInterface
    } else if c.bom.iter().any(BomChange::is_membership)
        || c.geometry.iter().any(|g| g.major)
        || !c.bounding_boxes.is_empty()
    {
        ImpactLevel::Critical
    } else if !c.geometry.is_empty() || !c.topology.is_empty() || !c.features.is_empty() || !c.interfaces.is_empty() {
        ImpactLevel::Moderate
    } else if !c.bom.is_empty() || !c.metadata.is_empty() {
        ImpactLevel::Minor
    } else {
        ImpactLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BaselineBuilder;
    use crate::config::AnalysisConfig;
    use crate::interface::InterfaceDetector;
    use crate::testing::{self, block, drilled, part, FOUR_HOLES};
    use approx::assert_relative_eq;
    use stepbase_kernel::{AssemblyTree, LinearUnit, Primitives, ShapeNode};
    use stepbase_math::{Point3, Vec3};

    fn build(tree: &AssemblyTree) -> Baseline {
        BaselineBuilder::default().build(tree).unwrap()
    }

    fn with_interfaces(tree: &AssemblyTree) -> Baseline {
        let baseline = build(tree);
        let (interfaces, _) = InterfaceDetector::default().detect(&baseline);
        baseline.with_interfaces(interfaces)
    }

    fn compare(b1: &Baseline, b2: &Baseline) -> DiffReport {
        BaselineComparator::default().compare(b1, b2).unwrap()
    }

    fn housing(volume: f64) -> AssemblyTree {
        let mut p = block([0.0, 0.0, 0.0], [10.0, 10.0, 10.0]);
        p.volume = volume;
        AssemblyTree::new(ShapeNode::assembly("gearbox", vec![part("housing", p)]))
    }

    #[test]
    fn test_identical_baselines() {
        let b = with_interfaces(&testing::bracket_tree());
        let report = compare(&b, &b);
        assert_eq!(report.impact_level, ImpactLevel::None);
        assert_eq!(report.impact_message, "No significant change");
        assert!(report.bom_changes.is_empty());
        assert!(report.geometry_changes.is_empty());
        assert!(report.topology_changes.is_empty());
        assert!(report.feature_changes.is_empty());
        assert!(report.bounding_box_changes.is_empty());
        assert!(report.interface_changes.is_empty());
        assert!(report.metadata_changes.is_empty());
        assert!(report.interfaces_compared);
        assert_eq!(report.statistics.total_changes, 0);
    }

    #[test]
    fn test_volume_change_is_moderate() {
        let (b1, b2) = (build(&housing(186490.64)), build(&housing(190313.86)));
        let report = compare(&b1, &b2);
        assert_eq!(report.impact_level, ImpactLevel::Moderate);
        // Part and root both change.
        assert_eq!(report.geometry_changes.len(), 2);
        let change = &report.geometry_changes[1];
        assert_eq!(change.name, "housing");
        assert_relative_eq!(change.volume_change, 3823.22, epsilon = 1e-6);
        assert_relative_eq!(change.volume_change_relative, 3823.22 / 186490.64, epsilon = 1e-12);
        assert!(!change.major);
        assert!(!report.interfaces_compared);

        let strict = AnalysisConfig::from_toml_str("[compare]\nmajor_threshold = 0.01\n").unwrap();
        let report = BaselineComparator::new(strict.compare).compare(&b1, &b2).unwrap();
        assert_eq!(report.impact_level, ImpactLevel::Critical);
        assert_eq!(report.statistics.major_geometry_changes, 2);
    }

    #[test]
    fn test_insignificant_change_ignored() {
        let report = compare(&build(&housing(1000.0)), &build(&housing(1000.5)));
        assert!(report.geometry_changes.is_empty());
        assert_eq!(report.impact_level, ImpactLevel::None);
    }

    #[test]
    fn test_quantity_change_is_minor() {
        let b1 = build(&testing::bracket_tree());
        let mut tree = testing::bracket_tree();
        if let Some(ShapeNode {
            content: stepbase_kernel::ShapeContent::Assembly(children),
            ..
        }) = tree.root.as_mut()
        {
            children.insert(4, part("foot", block([40.0, 40.0, -5.0], [20.0, 20.0, 5.0])));
        }
        let b2 = build(&tree);

        let report = compare(&b1, &b2);
        assert_eq!(
            report.bom_changes,
            [BomChange::QuantityChanged {
                component_id: "0.2".into(),
                name: "foot".into(),
                before: 2,
                after: 3,
            }]
        );
        assert_eq!(report.impact_level, ImpactLevel::Minor);
        assert_eq!(report.statistics.total_changes, 1);
    }

    #[test]
    fn test_added_and_removed_are_symmetric() {
        let b1 = build(&testing::bracket_tree());
        let mut tree = testing::bracket_tree();
        if let Some(ShapeNode {
            content: stepbase_kernel::ShapeContent::Assembly(children),
            ..
        }) = tree.root.as_mut()
        {
            children.push(part("bracket", block([0.0, 70.0, 0.0], [10.0, 10.0, 10.0])));
        }
        let b2 = build(&tree);

        let forward = compare(&b1, &b2);
        let backward = compare(&b2, &b1);
        assert_eq!(forward.impact_level, ImpactLevel::Critical);
        assert!(matches!(
            forward.bom_changes.as_slice(),
            [BomChange::Added { name, .. }] if name == "bracket"
        ));
        assert!(matches!(
            backward.bom_changes.as_slice(),
            [BomChange::Removed { name, .. }] if name == "bracket"
        ));
        // The root aggregate moves with the membership change only.
        assert!(forward.geometry_changes.is_empty());
        assert!(forward.bounding_box_changes.is_empty());
        assert_eq!(forward.statistics.total_changes, 1);
        assert_eq!(backward.statistics.total_changes, 1);
    }

    #[test]
    fn test_renamed_part_at_same_id() {
        let b1 = build(&testing::bracket_tree());
        let mut tree = testing::bracket_tree();
        if let Some(ShapeNode {
            content: stepbase_kernel::ShapeContent::Assembly(children),
            ..
        }) = tree.root.as_mut()
        {
            children[4].name = "gauge".into();
        }
        let b2 = build(&tree);

        let report = compare(&b1, &b2);
        let changes: Vec<(&str, &str)> = report
            .bom_changes
            .iter()
            .map(|c| match c {
                BomChange::Removed { component_id, .. } => ("REMOVED", component_id.as_str()),
                BomChange::Added { component_id, .. } => ("ADDED", component_id.as_str()),
                _ => ("OTHER", ""),
            })
            .collect();
        assert_eq!(changes, [("REMOVED", "0.4"), ("ADDED", "0.4")]);
        assert!(matches!(&report.bom_changes[0], BomChange::Removed { name, .. } if name == "sensor"));
        assert!(matches!(&report.bom_changes[1], BomChange::Added { name, .. } if name == "gauge"));
        assert!(report.geometry_changes.is_empty());
        assert_eq!(report.impact_level, ImpactLevel::Critical);
    }

    #[test]
    fn test_envelope_change_is_critical() {
        let plate = |grow: f64| {
            let mut p = block([0.0, 0.0, 0.0], [40.0, 20.0, 5.0]);
            p.bounding_box.max.x += grow;
            AssemblyTree::new(ShapeNode::assembly("fixture", vec![part("plate", p)]))
        };
        let report = compare(&build(&plate(0.0)), &build(&plate(0.3)));
        assert!(report.geometry_changes.is_empty());
        let ids: Vec<&str> = report
            .bounding_box_changes
            .iter()
            .map(|c| c.component_id.as_str())
            .collect();
        assert_eq!(ids, ["0", "0.0"]);
        let change = &report.bounding_box_changes[1];
        assert_relative_eq!(change.extent_delta.x, 0.3, epsilon = 1e-9);
        assert_relative_eq!(change.extents_after.x, 40.3, epsilon = 1e-9);
        assert_eq!(change.extent_delta.y, 0.0);
        assert_eq!(report.impact_level, ImpactLevel::Critical);
        assert_eq!(report.statistics.bounding_box_changes, 2);

        let jitter = compare(&build(&plate(0.0)), &build(&plate(0.05)));
        assert!(jitter.bounding_box_changes.is_empty());
        assert_eq!(jitter.impact_level, ImpactLevel::None);
    }

    #[test]
    fn test_metadata_changes_are_minor() {
        let product = |name: &str| stepbase_kernel::ProductInfo {
            id: name.to_uppercase(),
            name: name.into(),
            description: String::new(),
        };
        let tree = |schema: &str, products: &[&str]| {
            testing::bracket_tree().with_metadata(stepbase_kernel::FileMetadata {
                schema: Some(schema.into()),
                products: products.iter().map(|p| product(p)).collect(),
                ..Default::default()
            })
        };
        let b1 = build(&tree("CONFIG_CONTROL_DESIGN", &["bracket", "foot", "sensor"]));
        let b2 = build(&tree("AP242_MANAGED_MODEL_BASED_3D_ENGINEERING", &["bracket", "foot", "shim"]));

        let report = compare(&b1, &b2);
        assert_eq!(
            report.metadata_changes,
            [
                MetadataChange::SchemaChanged {
                    before: Some("CONFIG_CONTROL_DESIGN".into()),
                    after: Some("AP242_MANAGED_MODEL_BASED_3D_ENGINEERING".into()),
                },
                MetadataChange::ProductAdded { name: "shim".into() },
                MetadataChange::ProductRemoved { name: "sensor".into() },
            ]
        );
        assert_eq!(report.impact_level, ImpactLevel::Minor);
        assert_eq!(report.statistics.total_changes, 3);

        let json = serde_json::to_value(&report.metadata_changes[1]).unwrap();
        assert_eq!(json["change"], "PRODUCT_ADDED");
    }

    #[test]
    fn test_reparented_by_name() {
        let screw = || part("screw", block([0.0, 0.0, 0.0], [1.0, 1.0, 4.0]));
        let frame = || part("frame", block([0.0, 0.0, 0.0], [40.0, 40.0, 2.0]));
        let b1 = build(&AssemblyTree::new(ShapeNode::assembly(
            "asm",
            vec![frame(), ShapeNode::assembly("module", vec![screw()])],
        )));
        let b2 = build(&AssemblyTree::new(ShapeNode::assembly(
            "asm",
            vec![frame(), screw(), ShapeNode::assembly("module", vec![screw()])],
        )));

        let report = compare(&b1, &b2);
        assert!(report.bom_changes.contains(&BomChange::Reparented {
            component_id: "0.1".into(),
            name: "screw".into(),
            old_parent: Some("0.2".into()),
            new_parent: Some("0".into()),
        }));
        assert!(matches!(
            report.bom_changes.last(),
            Some(BomChange::Added { component_id, .. }) if component_id.as_str() == "0.2.0"
        ));
    }

    #[test]
    fn test_losing_critical_joint() {
        let b1 = with_interfaces(&testing::bracket_tree());
        let b2 = with_interfaces(&testing::bracket_with_cover(drilled(
            block([0.0, 0.0, 10.0], [100.0, 60.0, 5.0]),
            &FOUR_HOLES[..2],
        )));

        let report = compare(&b1, &b2);
        assert_eq!(report.impact_level, ImpactLevel::CriticalInterface);
        assert_eq!(report.interface_changes.len(), 1);
        let change = &report.interface_changes[0];
        assert_eq!(change.change, InterfaceChangeKind::Changed);
        assert_eq!(change.critical_joint, Some(CriticalJointChange::Disappeared));
        assert_eq!((change.component_a.as_str(), change.component_b.as_str()), ("0.0", "0.1"));

        let removed: Vec<FeatureChangeKind> = report.feature_changes.iter().map(|f| f.change).collect();
        assert_eq!(removed, [FeatureChangeKind::Removed, FeatureChangeKind::Removed]);
        assert!(report.feature_changes.iter().all(|f| f.name == "cover_plate"));

        let back = compare(&b2, &b1);
        assert_eq!(back.interface_changes[0].critical_joint, Some(CriticalJointChange::Appeared));
    }

    #[test]
    fn test_hole_resized_and_moved() {
        let plate = |holes: &[(f64, f64, f64)]| {
            AssemblyTree::new(part("plate", drilled(block([0.0, 0.0, 0.0], [80.0, 40.0, 8.0]), holes)))
        };
        let b1 = build(&plate(&[(10.0, 10.0, 3.0), (40.0, 20.0, 4.0), (70.0, 30.0, 2.0)]));
        let b2 = build(&plate(&[(10.0, 10.0, 3.0), (40.0, 20.0, 5.0), (60.0, 30.0, 2.0)]));
        let report = compare(&b1, &b2);

        let kinds: Vec<FeatureChangeKind> = report.feature_changes.iter().map(|f| f.change).collect();
        assert_eq!(kinds, [FeatureChangeKind::Resized, FeatureChangeKind::Moved]);
        let resized = &report.feature_changes[0];
        assert_relative_eq!(resized.before.as_ref().unwrap().radius, 4.0);
        assert_relative_eq!(resized.after.as_ref().unwrap().radius, 5.0);
        assert_eq!(report.impact_level, ImpactLevel::Moderate);
    }

    #[test]
    fn test_topology_delta() {
        let mut p = block([0.0, 0.0, 0.0], [5.0, 5.0, 5.0]);
        let b1 = build(&AssemblyTree::new(part("cube", p.clone())));
        p.topology.face += 2;
        p.topology.edge += 4;
        let b2 = build(&AssemblyTree::new(part("cube", p)));

        let report = compare(&b1, &b2);
        let deltas: Vec<(TopologyKind, i64)> = report.topology_changes.iter().map(|t| (t.kind, t.delta)).collect();
        assert_eq!(deltas, [(TopologyKind::Face, 2), (TopologyKind::Edge, 4)]);
        assert_eq!(report.impact_level, ImpactLevel::Moderate);
    }

    #[test]
    fn test_errors() {
        let b = build(&testing::bracket_tree());
        let inch = build(&testing::bracket_tree().with_unit(LinearUnit::Inch));
        assert!(matches!(
            BaselineComparator::default().compare(&b, &inch),
            Err(EngineError::UnitMismatch { .. })
        ));

        let mut empty = b.clone();
        empty.components.clear();
        empty.geometry.clear();
        assert!(matches!(
            BaselineComparator::default().compare(&empty, &empty),
            Err(EngineError::IncompatibleBaseline(_))
        ));

        let report = compare(&empty, &b);
        assert_eq!(report.impact_level, ImpactLevel::Critical);
        assert_eq!(report.bom_changes.len(), b.components.len());
    }

    #[test]
    fn test_report_json_shape() {
        let mut p = Primitives::empty();
        p.volume = 1.0;
        p.surface_area = 6.0;
        p.bounding_box = stepbase_math::Aabb3::new(Point3::origin(), Point3::from(Vec3::repeat(1.0)));
        let b1 = build(&AssemblyTree::new(ShapeNode::assembly("a", vec![part("x", p.clone())])));
        let b2 = build(&AssemblyTree::new(ShapeNode::assembly("a", vec![part("y", p)])));

        let json = serde_json::to_value(compare(&b1, &b2)).unwrap();
        assert_eq!(json["impact_level"], "CRITICAL");
        assert_eq!(json["bom_changes"][0]["change"], "REMOVED");
        assert_eq!(json["bom_changes"][0]["type"], "PART");
        assert_eq!(json["bom_changes"][1]["change"], "ADDED");
        assert_eq!(json["statistics"]["total_changes"], 2);
    }
}
