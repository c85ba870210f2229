//! Bill of materials export.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::baseline::{Baseline, ComponentId, ComponentType};

/// One BOM row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    /// 1-based row number, in preorder.
    pub position: usize,
    /// Depth below the root.
    pub level: usize,
    /// Instances under the parent.
    pub quantity: u32,
    /// Component name.
    pub name: String,
    /// PART or ASSEMBLY.
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    /// Component id.
    pub component_id: ComponentId,
}

/// BOM rows of `baseline` in component order.
pub fn bom_lines(baseline: &Baseline) -> Vec<BomLine> {
    baseline
        .components
        .iter()
        .enumerate()
        .map(|(i, c)| BomLine {
            position: i + 1,
            level: c.level,
            quantity: c.quantity,
            name: c.name.clone(),
            component_type: c.component_type,
            component_id: c.component_id.clone(),
        })
        .collect()
}

/// Semicolon-separated BOM with a header row.
pub fn to_csv(lines: &[BomLine]) -> String {
    let mut out = String::from("Position;Level;Quantity;Name;Type;Reference\n");
    for line in lines {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{};{};{};{};{};{}",
            line.position,
            line.level,
            line.quantity,
            field(&line.name),
            line.component_type,
            line.component_id
        );
    }
    out
}

/// Quote a field holding the delimiter, a quote or a line break.
fn field(value: &str) -> String {
    if value.contains([';', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
