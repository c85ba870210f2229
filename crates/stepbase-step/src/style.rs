//! Presentation colours attached to representation items.

use std::collections::{HashMap, HashSet};

use stepbase_kernel::Rgb;

use crate::entities::EntityArgs;
use crate::parser::{StepFile, StepValue};

/// STYLED_ITEM → PRESENTATION_STYLE_ASSIGNMENT → SURFACE_STYLE_USAGE →
/// SURFACE_SIDE_STYLE → SURFACE_STYLE_FILL_AREA → FILL_AREA_STYLE →
/// FILL_AREA_STYLE_COLOUR → COLOUR_RGB, plus some slack.
const MAX_STYLE_DEPTH: usize = 10;

/// Colour of every styled item, keyed by the id of the item.
///
/// The first STYLED_ITEM (by id) wins when an item is styled several times.
pub fn item_colors(file: &StepFile) -> HashMap<u64, Rgb> {
    let mut colors = HashMap::new();
    for styled in file.entities_of_type("STYLED_ITEM") {
        let Some(view) = styled.record("STYLED_ITEM") else {
            continue;
        };
        let Ok(item) = view.entity_ref(2) else {
            continue;
        };
        let mut seen = HashSet::new();
        if let Some(rgb) = view.args.get(1).and_then(|styles| find_color(file, styles, 0, &mut seen)) {
            colors.entry(item).or_insert(rgb);
        }
    }
    colors
}

fn find_color(file: &StepFile, value: &StepValue, depth: usize, seen: &mut HashSet<u64>) -> Option<Rgb> {
    if depth > MAX_STYLE_DEPTH {
        return None;
    }
    match value {
        StepValue::List(items) => items.iter().find_map(|v| find_color(file, v, depth, seen)),
        StepValue::EntityRef(id) => {
            if !seen.insert(*id) {
                return None;
            }
            let entity = file.get(*id)?;
            if let Some(rgb) = entity.record("COLOUR_RGB") {
                let channel = |idx| rgb.real(idx).ok().map(to_byte);
                return Some([channel(1)?, channel(2)?, channel(3)?]);
            }
            if let Some(named) = entity.record("DRAUGHTING_PRE_DEFINED_COLOUR") {
                return predefined(named.string_or_empty(0));
            }
            entity.args.iter().find_map(|v| find_color(file, v, depth + 1, seen))
        }
        _ => None,
    }
}

fn to_byte(channel: f64) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// ISO 10303-46 pre-defined colour names.
fn predefined(name: &str) -> Option<Rgb> {
    match name.to_ascii_lowercase().as_str() {
        "black" => Some([0, 0, 0]),
        "red" => Some([255, 0, 0]),
        "green" => Some([0, 255, 0]),
        "blue" => Some([0, 0, 255]),
        "yellow" => Some([255, 255, 0]),
        "magenta" => Some([255, 0, 255]),
        "cyan" => Some([0, 255, 255]),
        "white" => Some([255, 255, 255]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn parse(data: &str) -> StepFile {
        let text = format!("ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n{data}ENDSEC;\nEND-ISO-10303-21;\n");
        Parser::parse(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_surface_style_chain() {
        let file = parse(
            "#1 = COLOUR_RGB('', 0.8, 0.2, 0.0);
#2 = FILL_AREA_STYLE_COLOUR('', #1);
#3 = FILL_AREA_STYLE('', (#2));
#4 = SURFACE_STYLE_FILL_AREA(#3);
#5 = SURFACE_SIDE_STYLE('', (#4));
#6 = SURFACE_STYLE_USAGE(.BOTH., #5);
#7 = PRESENTATION_STYLE_ASSIGNMENT((#6));
#8 = STYLED_ITEM('color', (#7), #50);
",
        );
        let colors = item_colors(&file);
        assert_eq!(colors.get(&50), Some(&[204, 51, 0]));
        assert_eq!(colors.len(), 1);
    }

    #[test]
    fn test_predefined_and_unstyled() {
        let file = parse(
            "#1 = DRAUGHTING_PRE_DEFINED_COLOUR('blue');
#2 = FILL_AREA_STYLE_COLOUR('', #1);
#3 = PRESENTATION_STYLE_ASSIGNMENT((#2));
#4 = STYLED_ITEM('', (#3), #60);
#5 = PRESENTATION_STYLE_ASSIGNMENT(());
#6 = STYLED_ITEM('', (#5), #61);
",
        );
        let colors = item_colors(&file);
        assert_eq!(colors.get(&60), Some(&[0, 0, 255]));
        assert!(!colors.contains_key(&61));
    }
}
