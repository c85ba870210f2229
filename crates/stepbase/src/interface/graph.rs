//! Assembly graph derived from detected interfaces.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use stepbase_math::relative_eq;

use super::{Interface, InterfaceKind, Severity};
use crate::baseline::{Baseline, ComponentId};

/// Fastening joint with at least the critical number of fasteners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalJoint {
    /// Smaller id of the pair.
    pub component_a: ComponentId,
    /// Larger id of the pair.
    pub component_b: ComponentId,
    /// Aligned hole count.
    pub fastener_count: usize,
    /// Largest fastener diameter.
    pub fastener_diameter: f64,
}

/// Interface counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSummary {
    /// All interfaces.
    pub total: usize,
    /// Count per kind.
    pub by_kind: BTreeMap<InterfaceKind, usize>,
    /// Count per severity.
    pub by_severity: BTreeMap<Severity, usize>,
    /// Critical joints.
    pub critical: usize,
}

/// Components as nodes, interfaces as edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyGraph {
    /// Components taking part in at least one interface, in id order.
    pub nodes: Vec<ComponentId>,
    /// The interfaces.
    pub edges: Vec<Interface>,
    /// Neighbours of every node, in id order.
    pub adjacency: BTreeMap<ComponentId, Vec<ComponentId>>,
    /// Critical fastenings, most fasteners first.
    pub critical_joints: Vec<CriticalJoint>,
    /// Counts by kind and severity.
    pub summary: InterfaceSummary,
    /// Connected groups among the nodes.
    pub connected_groups: usize,
    /// Advisory notes.
    pub recommendations: Vec<String>,
}

impl AssemblyGraph {
    /// Build the graph of `interfaces` detected on `baseline`.
    pub fn build(baseline: &Baseline, interfaces: &[Interface]) -> Self {
        let mut adjacency: BTreeMap<ComponentId, Vec<ComponentId>> = BTreeMap::new();
        for i in interfaces {
            adjacency
                .entry(i.component_a.clone())
                .or_default()
                .push(i.component_b.clone());
            adjacency
                .entry(i.component_b.clone())
                .or_default()
                .push(i.component_a.clone());
        }
        for neighbours in adjacency.values_mut() {
            neighbours.sort();
            neighbours.dedup();
        }
        let nodes: Vec<ComponentId> = adjacency.keys().cloned().collect();

        let mut critical_joints: Vec<CriticalJoint> = interfaces
            .iter()
            .filter(|i| i.critical)
            .map(|i| CriticalJoint {
                component_a: i.component_a.clone(),
                component_b: i.component_b.clone(),
                fastener_count: i.evidence.fastener_count(),
                fastener_diameter: i.evidence.fastener_diameter().unwrap_or_default(),
            })
            .collect();
        critical_joints.sort_by(|x, y| {
            y.fastener_count
                .cmp(&x.fastener_count)
                .then_with(|| (&x.component_a, &x.component_b).cmp(&(&y.component_a, &y.component_b)))
        });

        let mut summary = InterfaceSummary {
            total: interfaces.len(),
            critical: critical_joints.len(),
            ..InterfaceSummary::default()
        };
        for i in interfaces {
            *summary.by_kind.entry(i.kind).or_default() += 1;
            *summary.by_severity.entry(i.severity).or_default() += 1;
        }

        let connected_groups = count_groups(&nodes, &adjacency);
        let mut graph = Self {
            nodes,
            edges: interfaces.to_vec(),
            adjacency,
            critical_joints,
            summary,
            connected_groups,
            recommendations: Vec::new(),
        };
        graph.recommendations = graph.recommend(baseline);
        graph
    }

    fn recommend(&self, baseline: &Baseline) -> Vec<String> {
        let mut notes = Vec::new();

        for part in baseline.parts() {
            if !self.adjacency.contains_key(&part.component_id) {
                notes.push(format!(
                    "{} ({}) has no interface and is potentially floating",
                    part.name, part.component_id
                ));
            }
        }

        let fastenings: Vec<&Interface> = self
            .edges
            .iter()
            .filter(|i| i.kind == InterfaceKind::Fastening)
            .collect();

        let unfastened: Vec<&ComponentId> = self
            .nodes
            .iter()
            .filter(|id| !fastenings.iter().any(|i| i.involves(id)))
            .collect();
        if !unfastened.is_empty() && unfastened.len() <= 5 {
            let listed: Vec<String> = unfastened
                .iter()
                .take(3)
                .map(|id| {
                    let name = baseline.component(id).map_or("?", |c| c.name.as_str());
                    format!("{name} ({id})")
                })
                .collect();
            notes.push(format!(
                "Without direct fastening: {}",
                listed.join(", ")
            ));
        }

        match fastenings.len() {
            0 => notes.push(
                "No fastening detected: the assembly may not be mechanically constrained".to_string(),
            ),
            n if n < 3 => notes.push(format!(
                "Only {n} fastening interface(s) detected: fastening is sparse"
            )),
            _ => {}
        }

        let mut per_component: BTreeMap<&ComponentId, usize> = BTreeMap::new();
        for i in &fastenings {
            *per_component.entry(&i.component_a).or_default() += 1;
            *per_component.entry(&i.component_b).or_default() += 1;
        }
        for (id, count) in per_component.into_iter().filter(|(_, n)| *n >= 3) {
            let name = baseline.component(id).map_or("?", |c| c.name.as_str());
            notes.push(format!(
                "{name} ({id}) takes part in {count} fastenings and is a main load path"
            ));
        }

        let mut diameters: Vec<f64> = Vec::new();
        for d in fastenings.iter().filter_map(|i| i.evidence.fastener_diameter()) {
            if !diameters.iter().any(|&seen| relative_eq(seen, d, 1e-3)) {
                diameters.push(d);
            }
        }
        if diameters.len() > 3 {
            notes.push(format!(
                "{} different fastener diameters in use: consider standardizing",
                diameters.len()
            ));
        }

        if self.connected_groups > 1 {
            notes.push(format!(
                "Interfaces form {} disconnected groups",
                self.connected_groups
            ));
        }

        if notes.is_empty() {
            notes.push("Interfaces look coherent".to_string());
        }
        notes
    }
}

/// Connected components by union-find.
fn count_groups(nodes: &[ComponentId], adjacency: &BTreeMap<ComponentId, Vec<ComponentId>>) -> usize {
    let index: BTreeMap<&ComponentId, usize> = nodes.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let mut parent: Vec<usize> = (0..nodes.len()).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for (id, neighbours) in adjacency {
        for n in neighbours {
            if let (Some(&a), Some(&b)) = (index.get(id), index.get(n)) {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra] = rb;
                }
            }
        }
    }
    (0..nodes.len()).filter(|&i| find(&mut parent, i) == i).count()
}
