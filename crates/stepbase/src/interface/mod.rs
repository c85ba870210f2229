//! Interface detection between leaf components.
//!
//! Candidate pairs come from a sort-and-sweep over expanded bounding
//! boxes; each candidate is then classified by an ordered rule list
//! (fastening, contact, proximity). The first rule that accepts a pair
//! decides its kind, so a pair never carries two interfaces.

mod graph;
mod rules;
mod sweep;

pub use graph::{AssemblyGraph, CriticalJoint, InterfaceSummary};
pub use rules::{ContactRule, FasteningRule, InterfaceRule, ProximityRule};

use std::fmt;

use serde::{Deserialize, Serialize};
use stepbase_math::{Point3, Vec3};
use tracing::debug;

use crate::baseline::{Baseline, ComponentId};
use crate::config::InterfaceConfig;
use crate::geometry::GeometrySummary;

use rules::HoleGroup;

/// Interface classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfaceKind {
    /// Aligned holes through both components.
    Fastening,
    /// Touching antiparallel planar faces.
    Contact,
    /// Bounding boxes within a small gap.
    Proximity,
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InterfaceKind::Fastening => "FASTENING",
            InterfaceKind::Contact => "CONTACT",
            InterfaceKind::Proximity => "PROXIMITY",
        })
    }
}

/// Interface severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Advisory.
    Low,
    /// Worth a look on change.
    Medium,
    /// Structural.
    High,
}

/// A pair of holes matched across two components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedAxis {
    /// Axis point on the first component.
    pub axis_point: Point3,
    /// Axis direction on the first component.
    pub axis_direction: Vec3,
    /// Larger of the two hole diameters.
    pub diameter: f64,
}

/// Kind-specific detection evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Evidence {
    /// Aligned hole groups.
    Fastening {
        /// Number of aligned hole groups.
        fastener_count: usize,
        /// Largest matched diameter.
        fastener_diameter: f64,
        /// The matched axes.
        aligned_axes: Vec<AlignedAxis>,
    },
    /// Best touching face pair.
    Contact {
        /// Overlap area of the best face pair.
        contact_area: f64,
        /// Distance between the two planes.
        plane_offset: f64,
        /// Face normal on the first component.
        normal_a: Vec3,
        /// Face normal on the second component.
        normal_b: Vec3,
        /// Number of face pairs in contact.
        touching_faces: usize,
    },
    /// Bounding-box gap.
    Proximity {
        /// Minimum box gap (zero when overlapping).
        gap: f64,
        /// Threshold the gap was tested against.
        threshold: f64,
    },
}

impl Evidence {
    /// The kind this evidence supports.
    pub fn kind(&self) -> InterfaceKind {
        match self {
            Evidence::Fastening { .. } => InterfaceKind::Fastening,
            Evidence::Contact { .. } => InterfaceKind::Contact,
            Evidence::Proximity { .. } => InterfaceKind::Proximity,
        }
    }

    /// Fastener count, zero for other kinds.
    pub fn fastener_count(&self) -> usize {
        match self {
            Evidence::Fastening { fastener_count, .. } => *fastener_count,
            _ => 0,
        }
    }

    /// Fastener diameter, if this is a fastening.
    pub fn fastener_diameter(&self) -> Option<f64> {
        match self {
            Evidence::Fastening {
                fastener_diameter, ..
            } => Some(*fastener_diameter),
            _ => None,
        }
    }
}

/// A detected relationship between two components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    /// Smaller id of the pair.
    pub component_a: ComponentId,
    /// Larger id of the pair.
    pub component_b: ComponentId,
    /// Classification.
    pub kind: InterfaceKind,
    /// Severity after overrides.
    pub severity: Severity,
    /// Critical fastening joint.
    pub critical: bool,
    /// Supporting measurements.
    pub evidence: Evidence,
}

impl Interface {
    /// Classify evidence for a pair, canonicalizing the pair order.
    pub fn new(a: ComponentId, b: ComponentId, evidence: Evidence, config: &InterfaceConfig) -> Self {
        let (component_a, component_b) = if a <= b { (a, b) } else { (b, a) };
        let severity = match &evidence {
            Evidence::Fastening { .. } => Severity::High,
            Evidence::Contact { contact_area, .. } if *contact_area >= config.contact_high_area => {
                Severity::High
            }
            Evidence::Contact { .. } => Severity::Medium,
            Evidence::Proximity { gap, .. } if *gap <= config.contact_plane_tolerance => Severity::Medium,
            Evidence::Proximity { .. } => Severity::Low,
        };
        let critical = evidence.fastener_count() >= config.critical_fastener_count;
        Self {
            component_a,
            component_b,
            kind: evidence.kind(),
            severity,
            critical,
            evidence,
        }
    }

    /// The canonical pair.
    pub fn pair(&self) -> (&ComponentId, &ComponentId) {
        (&self.component_a, &self.component_b)
    }

    /// Whether `id` is one end of this interface.
    pub fn involves(&self, id: &ComponentId) -> bool {
        &self.component_a == id || &self.component_b == id
    }
}

/// A leaf component prepared for the rules.
pub struct Candidate<'a> {
    /// Component id.
    pub id: &'a ComponentId,
    /// Its geometry.
    pub summary: &'a GeometrySummary,
    hole_groups: Vec<HoleGroup>,
}

/// Runs the rule list over the candidate pairs of a baseline.
pub struct InterfaceDetector {
    config: InterfaceConfig,
    rules: Vec<Box<dyn InterfaceRule>>,
}

impl Default for InterfaceDetector {
    fn default() -> Self {
        Self::new(InterfaceConfig::default())
    }
}

impl InterfaceDetector {
    /// Detector with the standard rules in priority order.
    pub fn new(config: InterfaceConfig) -> Self {
        Self {
            config,
            rules: vec![
                Box::new(FasteningRule),
                Box::new(ContactRule),
                Box::new(ProximityRule),
            ],
        }
    }

    /// The active settings.
    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    /// Kinds produced by the rule list, in evaluation order.
    pub fn rule_kinds(&self) -> Vec<InterfaceKind> {
        self.rules.iter().map(|r| r.kind()).collect()
    }

    /// Detect interfaces and build the assembly graph.
    ///
    /// Interfaces are sorted by canonical pair.
    pub fn detect(&self, baseline: &Baseline) -> (Vec<Interface>, AssemblyGraph) {
        let candidates: Vec<Candidate<'_>> = baseline
            .parts()
            .filter_map(|c| {
                let summary = baseline.summary(&c.component_id)?;
                summary.has_geometry().then(|| Candidate {
                    id: &c.component_id,
                    summary,
                    hole_groups: rules::group_holes(&summary.holes, &self.config),
                })
            })
            .collect();

        let margins: Vec<f64> = candidates
            .iter()
            .map(|c| {
                (c.summary.diagonal() * self.config.proximity_fraction / 2.0)
                    .max(self.config.contact_plane_tolerance)
            })
            .collect();
        let boxes: Vec<_> = candidates
            .iter()
            .zip(&margins)
            .map(|(c, &m)| c.summary.bounding_box.expanded(m))
            .collect();
        let pairs = sweep::overlapping_pairs(&boxes);
        debug!(
            leaves = candidates.len(),
            candidate_pairs = pairs.len(),
            "interface broadphase"
        );

        let mut interfaces: Vec<Interface> = pairs
            .into_iter()
            .filter_map(|(i, j)| self.classify(&candidates[i], &candidates[j]))
            .collect();
        interfaces.sort_by(|x, y| x.pair().cmp(&y.pair()));

        let graph = AssemblyGraph::build(baseline, &interfaces);
        (interfaces, graph)
    }

    /// First rule that accepts the pair.
    fn classify(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Option<Interface> {
        let (a, b) = if a.id <= b.id { (a, b) } else { (b, a) };
        self.rules.iter().find_map(|rule| {
            rule.evaluate(a, b, &self.config)
                .map(|evidence| Interface::new(a.id.clone(), b.id.clone(), evidence, &self.config))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BaselineBuilder;
    use crate::testing::{self, block, drilled, part, FOUR_HOLES};
    use approx::assert_relative_eq;
    use stepbase_kernel::{AssemblyTree, ShapeNode};

    fn detect(tree: &AssemblyTree) -> (Vec<Interface>, AssemblyGraph) {
        let baseline = BaselineBuilder::default().build(tree).unwrap();
        InterfaceDetector::default().detect(&baseline)
    }

    fn pairs(interfaces: &[Interface]) -> Vec<(&str, &str, InterfaceKind)> {
        interfaces
            .iter()
            .map(|i| (i.component_a.as_str(), i.component_b.as_str(), i.kind))
            .collect()
    }

    #[test]
    fn test_bracket_interfaces() {
        let (interfaces, graph) = detect(&testing::bracket_tree());
        assert_eq!(
            pairs(&interfaces),
            [
                ("0.0", "0.1", InterfaceKind::Fastening),
                ("0.0", "0.2", InterfaceKind::Contact),
                ("0.0", "0.3", InterfaceKind::Proximity),
                ("0.1", "0.3", InterfaceKind::Proximity),
            ]
        );

        let bolted = &interfaces[0];
        assert_eq!(bolted.severity, Severity::High);
        assert!(bolted.critical);
        assert_eq!(bolted.evidence.fastener_count(), 4);
        assert_relative_eq!(bolted.evidence.fastener_diameter().unwrap(), 6.0);

        match &interfaces[1].evidence {
            Evidence::Contact {
                contact_area,
                plane_offset,
                normal_a,
                normal_b,
                ..
            } => {
                assert_relative_eq!(*contact_area, 400.0, epsilon = 1e-6);
                assert_relative_eq!(*plane_offset, 0.0);
                assert_relative_eq!(normal_a.z, -1.0);
                assert_relative_eq!(normal_b.z, 1.0);
            }
            other => panic!("unexpected evidence {other:?}"),
        }
        assert_eq!(interfaces[1].severity, Severity::Medium);

        match interfaces[2].evidence {
            Evidence::Proximity { gap, threshold } => {
                assert_relative_eq!(gap, 0.5, epsilon = 1e-9);
                assert!(threshold > gap);
            }
            ref other => panic!("unexpected evidence {other:?}"),
        }
        assert_eq!(interfaces[2].severity, Severity::Low);

        assert_eq!(graph.critical_joints.len(), 1);
        assert_eq!(graph.connected_groups, 1);
    }

    #[test]
    fn test_rule_priority() {
        assert_eq!(
            InterfaceDetector::default().rule_kinds(),
            [
                InterfaceKind::Fastening,
                InterfaceKind::Contact,
                InterfaceKind::Proximity
            ]
        );
    }

    #[test]
    fn test_one_kind_per_pair() {
        let (interfaces, _) = detect(&testing::bracket_tree());
        for (i, a) in interfaces.iter().enumerate() {
            for b in &interfaces[i + 1..] {
                assert_ne!(a.pair(), b.pair());
            }
        }
    }

    #[test]
    fn test_large_contact_escalates() {
        let tree = AssemblyTree::new(ShapeNode::assembly(
            "stack",
            vec![
                part("lower", block([0.0, 0.0, 0.0], [50.0, 50.0, 5.0])),
                part("upper", block([0.0, 0.0, 5.05], [50.0, 50.0, 5.0])),
            ],
        ));
        let (interfaces, _) = detect(&tree);
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].kind, InterfaceKind::Contact);
        assert_eq!(interfaces[0].severity, Severity::High);
    }

    #[test]
    fn test_tight_proximity_escalates() {
        let tree = AssemblyTree::new(ShapeNode::assembly(
            "pair",
            vec![
                part("a", block([0.0, 0.0, 0.0], [10.0, 10.0, 10.0])),
                // Offset sideways so no face pair overlaps.
                part("b", block([10.05, 30.0, 30.0], [10.0, 10.0, 10.0])),
            ],
        ));
        let (interfaces, _) = detect(&tree);
        assert!(interfaces.is_empty());

        let tree = AssemblyTree::new(ShapeNode::assembly(
            "pair",
            vec![
                part("a", block([0.0, 0.0, 0.0], [10.0, 10.0, 10.0])),
                // Corner to corner: 0.05 apart on every axis.
                part("b", block([10.05, 10.05, 10.05], [10.0, 10.0, 10.0])),
            ],
        ));
        let (interfaces, _) = detect(&tree);
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].kind, InterfaceKind::Proximity);
        assert_eq!(interfaces[0].severity, Severity::Medium);
    }

    #[test]
    fn test_two_holes_not_critical() {
        let tree = testing::bracket_with_cover(drilled(
            block([0.0, 0.0, 10.0], [100.0, 60.0, 5.0]),
            &FOUR_HOLES[..2],
        ));
        let (interfaces, graph) = detect(&tree);
        let bolted = &interfaces[0];
        assert_eq!(bolted.kind, InterfaceKind::Fastening);
        assert_eq!(bolted.evidence.fastener_count(), 2);
        assert!(!bolted.critical);
        assert!(graph.critical_joints.is_empty());
    }

    #[test]
    fn test_far_apart_parts_have_no_interface() {
        let tree = AssemblyTree::new(ShapeNode::assembly(
            "loose",
            vec![
                part("a", block([0.0, 0.0, 0.0], [10.0, 10.0, 10.0])),
                part("b", block([100.0, 0.0, 0.0], [10.0, 10.0, 10.0])),
            ],
        ));
        let (interfaces, graph) = detect(&tree);
        assert!(interfaces.is_empty());
        assert!(graph.nodes.is_empty());
        assert_eq!(
            graph
                .recommendations
                .iter()
                .filter(|r| r.contains("potentially floating"))
                .count(),
            2
        );
    }

    #[test]
    fn test_interface_json() {
        let (interfaces, _) = detect(&testing::bracket_tree());
        let json = serde_json::to_value(&interfaces[0]).unwrap();
        assert_eq!(json["kind"], "FASTENING");
        assert_eq!(json["severity"], "HIGH");
        assert_eq!(json["evidence"]["fastener_count"], 4);

        let back: Vec<Interface> =
            serde_json::from_str(&serde_json::to_string(&interfaces).unwrap()).unwrap();
        assert_eq!(back, interfaces);
    }
}
