//! The baseline record: flattened component table plus geometry.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stepbase_kernel::{FileMetadata, LinearUnit, Rgb, ShapeKind};

use crate::error::{EngineError, Result};
use crate::geometry::GeometrySummary;
use crate::interface::Interface;

/// Component type: `PART` or `ASSEMBLY`.
pub type ComponentType = ShapeKind;

/// Path-based component identifier: `"0"` for the root, `"0.2.1"` for
/// child 1 of child 2 of the root.
///
/// Ids order by their numeric segments, so `"0.2" < "0.10"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Id of the root component.
    pub fn root() -> Self {
        Self("0".to_string())
    }

    /// Id of the `index`-th child of this component.
    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}.{index}", self.0))
    }

    /// Id of the parent component, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        self.0.rsplit_once('.').map(|(head, _)| Self(head.to_string()))
    }

    /// Depth in the tree (root = 0).
    pub fn depth(&self) -> usize {
        self.0.matches('.').count()
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for ComponentId {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut a = self.0.split('.');
        let mut b = other.0.split('.');
        loop {
            match (a.next(), b.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(x), Some(y)) => {
                    let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                        (Ok(x), Ok(y)) => x.cmp(&y),
                        _ => x.cmp(y),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
    }
}

impl PartialOrd for ComponentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One node of the flattened assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Stable path-based id.
    pub component_id: ComponentId,
    /// Product name.
    pub name: String,
    /// PART or ASSEMBLY.
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    /// Depth in the tree (root = 0).
    pub level: usize,
    /// Parent component, `None` for the root.
    pub parent_id: Option<ComponentId>,
    /// Number of identical instances under the parent.
    pub quantity: u32,
    /// Display colour from the model, as `[r, g, b]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl Component {
    /// Whether this is a leaf part.
    pub fn is_part(&self) -> bool {
        self.component_type == ShapeKind::Part
    }
}

/// Where a baseline came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// File name, when the model was read from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Hex SHA-256 of the analyzed bytes.
    pub checksum: String,
}

impl SourceInfo {
    /// Describe analyzed content.
    pub fn new(file: Option<String>, data: &[u8]) -> Self {
        Self {
            file,
            checksum: hex::encode(Sha256::digest(data)),
        }
    }
}

/// Assembly-wide counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Distinct part components.
    pub part_count: usize,
    /// Assembly components, root included.
    pub assembly_count: usize,
    /// Part instances once quantities are multiplied down the tree.
    pub instance_count: u64,
    /// Root volume.
    pub total_volume: f64,
    /// Root surface area.
    pub total_surface_area: f64,
}

/// The canonical record of one analyzed model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Unique id, `BL_{YYYYmmdd_HHMMSS}_{8 hex}`.
    pub baseline_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Unit of every length.
    pub unit: LinearUnit,
    /// Origin of the analyzed content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
    /// Header information.
    #[serde(default)]
    pub metadata: FileMetadata,
    /// Components in preorder.
    pub components: Vec<Component>,
    /// Geometry per component.
    pub geometry: BTreeMap<ComponentId, GeometrySummary>,
    /// Detected interfaces, once detection has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<Interface>>,
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Mint a fresh baseline id for the current time.
///
/// The suffix hashes the timestamp, a process-wide counter and `seed`, so
/// ids minted in the same second still differ.
pub fn new_baseline_id(now: DateTime<Utc>, seed: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed).to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(seed);
    let digest = hex::encode(hasher.finalize());
    format!("BL_{}_{}", now.format("%Y%m%d_%H%M%S"), &digest[..8])
}

impl Baseline {
    /// The root component.
    pub fn root(&self) -> Option<&Component> {
        self.components.first()
    }

    /// Component by id.
    pub fn component(&self, id: &ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| &c.component_id == id)
    }

    /// Geometry of a component.
    pub fn summary(&self, id: &ComponentId) -> Option<&GeometrySummary> {
        self.geometry.get(id)
    }

    /// Direct children of a component, in order.
    pub fn children<'a>(&'a self, id: &'a ComponentId) -> impl Iterator<Item = &'a Component> + 'a {
        self.components
            .iter()
            .filter(move |c| c.parent_id.as_ref() == Some(id))
    }

    /// Leaf parts, in preorder.
    pub fn parts(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|c| c.is_part())
    }

    /// Look a component up by exact name.
    ///
    /// Fails with [`EngineError::ComponentNotFound`] listing up to five
    /// names that contain `name` (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Result<(&Component, &GeometrySummary)> {
        if let Some(component) = self.components.iter().find(|c| c.name == name) {
            let summary = self.geometry.get(&component.component_id).ok_or_else(|| {
                EngineError::parse(format!("component {} has no geometry", component.component_id))
            })?;
            return Ok((component, summary));
        }

        let needle = name.to_lowercase();
        let mut suggestions: Vec<String> = Vec::new();
        for c in &self.components {
            if c.name.to_lowercase().contains(&needle) && !suggestions.contains(&c.name) {
                suggestions.push(c.name.clone());
                if suggestions.len() == 5 {
                    break;
                }
            }
        }
        Err(EngineError::ComponentNotFound {
            name: name.to_string(),
            suggestions,
        })
    }

    /// Names from the root down to `id`, joined by `" > "`.
    pub fn component_path(&self, id: &ComponentId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(id.clone());
        while let Some(cid) = current {
            let component = self.component(&cid)?;
            names.push(component.name.as_str());
            current = component.parent_id.clone();
        }
        names.reverse();
        Some(names.join(" > "))
    }

    /// Part/assembly counts, instance count and root totals.
    pub fn totals(&self) -> Totals {
        let mut multiplier: BTreeMap<&ComponentId, u64> = BTreeMap::new();
        let mut instance_count = 0;
        for c in &self.components {
            let parent = c
                .parent_id
                .as_ref()
                .and_then(|p| multiplier.get(p).copied())
                .unwrap_or(1);
            let total = parent * u64::from(c.quantity);
            multiplier.insert(&c.component_id, total);
            if c.is_part() {
                instance_count += total;
            }
        }

        let root = self.root().and_then(|r| self.geometry.get(&r.component_id));
        Totals {
            part_count: self.parts().count(),
            assembly_count: self.components.len() - self.parts().count(),
            instance_count,
            total_volume: root.map_or(0.0, |g| g.volume),
            total_surface_area: root.map_or(0.0, |g| g.surface_area),
        }
    }

    /// A copy of this baseline carrying `interfaces`.
    pub fn with_interfaces(&self, interfaces: Vec<Interface>) -> Self {
        Self {
            interfaces: Some(interfaces),
            ..self.clone()
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BaselineBuilder;
    use crate::testing;

    #[test]
    fn test_component_id_order() {
        let mut ids: Vec<ComponentId> = ["0.10", "0.2", "0", "0.2.1", "0.1"]
            .into_iter()
            .map(ComponentId::from)
            .collect();
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(ComponentId::as_str).collect();
        assert_eq!(sorted, ["0", "0.1", "0.2", "0.2.1", "0.10"]);
    }

    #[test]
    fn test_component_id_navigation() {
        let id = ComponentId::root().child(2).child(1);
        assert_eq!(id.as_str(), "0.2.1");
        assert_eq!(id.depth(), 2);
        assert_eq!(id.parent(), Some(ComponentId::from("0.2")));
        assert_eq!(ComponentId::root().parent(), None);
    }

    #[test]
    fn test_baseline_id_format() {
        let now = Utc::now();
        let a = new_baseline_id(now, b"x");
        let b = new_baseline_id(now, b"x");
        assert_ne!(a, b);
        assert_eq!(a.len(), "BL_20240101_120000_".len() + 8);
        assert!(a.starts_with("BL_"));
        assert!(a[19..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_json_round_trip() {
        let baseline = BaselineBuilder::default()
            .build(&testing::bracket_tree())
            .unwrap();
        let text = baseline.to_json().unwrap();
        assert!(text.contains("\"type\": \"ASSEMBLY\""));
        assert!(text.contains("\"parent_id\": null"));
        let back = Baseline::from_json(&text).unwrap();
        assert_eq!(back, baseline);
    }

    #[test]
    fn test_find_by_name() {
        let baseline = BaselineBuilder::default()
            .build(&testing::bracket_tree())
            .unwrap();
        let (component, summary) = baseline.find_by_name("cover_plate").unwrap();
        assert_eq!(component.component_id.as_str(), "0.1");
        assert_eq!(summary.holes.len(), 4);

        match baseline.find_by_name("plate") {
            Err(EngineError::ComponentNotFound { suggestions, .. }) => {
                assert_eq!(suggestions, ["base_plate", "cover_plate"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_component_path_and_totals() {
        let baseline = BaselineBuilder::default()
            .build(&testing::bracket_tree())
            .unwrap();
        assert_eq!(
            baseline.component_path(&ComponentId::from("0.2")).as_deref(),
            Some("bracket_assembly > foot")
        );
        assert_eq!(baseline.component_path(&ComponentId::from("0.9")), None);

        let totals = baseline.totals();
        assert_eq!(totals.part_count, 4);
        assert_eq!(totals.assembly_count, 1);
        assert_eq!(totals.instance_count, 5);
        assert!(totals.total_volume > 0.0);
    }

    #[test]
    fn test_source_checksum() {
        let source = SourceInfo::new(Some("a.step".into()), b"abc");
        assert_eq!(
            source.checksum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
