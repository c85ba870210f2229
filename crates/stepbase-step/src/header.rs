//! Header metadata and unit detection.

use stepbase_kernel::{FileMetadata, LinearUnit, ProductInfo};
use tracing::warn;

use crate::entities::EntityArgs;
use crate::parser::{StepFile, StepValue};

/// Collect FILE_DESCRIPTION / FILE_NAME / FILE_SCHEMA and PRODUCT entries.
pub fn read_metadata(file: &StepFile) -> FileMetadata {
    let mut meta = FileMetadata::default();

    if let Some(desc) = file.header_entity("FILE_DESCRIPTION") {
        let text = strings(desc.args.first()).join("; ");
        meta.description = non_empty(text);
    }

    if let Some(name) = file.header_entity("FILE_NAME") {
        meta.file_name = non_empty(name.string_or_empty(0).to_string());
        meta.timestamp = non_empty(name.string_or_empty(1).to_string());
        meta.author = strings(name.args.get(2)).into_iter().find(|s| !s.is_empty());
        meta.organization = strings(name.args.get(3)).into_iter().find(|s| !s.is_empty());
    }

    if let Some(schema) = file.header_entity("FILE_SCHEMA") {
        meta.schema = strings(schema.args.first())
            .into_iter()
            .filter_map(|s| {
                s.split(|c: char| c.is_whitespace() || c == '{')
                    .next()
                    .map(str::to_string)
            })
            .find(|s| !s.is_empty());
    }

    meta.products = file
        .entities_of_type("PRODUCT")
        .into_iter()
        .map(|p| ProductInfo {
            id: p.string_or_empty(0).to_string(),
            name: p.string_or_empty(1).to_string(),
            description: p.string_or_empty(2).to_string(),
        })
        .collect();

    meta
}

/// Length unit declared by the first recognizable LENGTH_UNIT instance.
///
/// Falls back to millimeters.
pub fn detect_length_unit(file: &StepFile) -> LinearUnit {
    for entity in file.entities_of_type("LENGTH_UNIT") {
        if let Some(si) = entity.record("SI_UNIT") {
            if si.enumeration(1).ok() != Some("METRE") {
                continue;
            }
            let prefix = si.args.first().and_then(StepValue::as_enum);
            match prefix {
                None => return LinearUnit::Meter,
                Some("MILLI") => return LinearUnit::Millimeter,
                Some("CENTI") => return LinearUnit::Centimeter,
                Some(other) => warn!(prefix = other, "unsupported SI length prefix"),
            }
        } else if let Some(conv) = entity.record("CONVERSION_BASED_UNIT") {
            match conv.string_or_empty(0).to_ascii_uppercase().as_str() {
                "INCH" | "IN" => return LinearUnit::Inch,
                "FOOT" | "FT" => return LinearUnit::Foot,
                other => warn!(unit = other, "unsupported conversion-based length unit"),
            }
        }
    }
    warn!("no recognizable length unit, assuming millimeters");
    LinearUnit::Millimeter
}

fn strings(value: Option<&StepValue>) -> Vec<String> {
    match value {
        Some(StepValue::List(items)) => items
            .iter()
            .filter_map(StepValue::as_string)
            .map(str::to_string)
            .collect(),
        Some(StepValue::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.trim().is_empty()).then_some(s)
}
