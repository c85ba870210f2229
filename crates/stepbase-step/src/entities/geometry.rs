//! Fundamental geometry entities: points, directions, and placements.

use super::EntityArgs;
use crate::error::StepError;
use crate::parser::StepFile;
use stepbase_math::{Dir3, Point3, Transform, Vec3};

/// Parse a CARTESIAN_POINT entity.
///
/// STEP syntax: `CARTESIAN_POINT(name, (x, y, z))`
pub fn parse_cartesian_point(file: &StepFile, id: u64) -> Result<Point3, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "CARTESIAN_POINT" => {
            let coords = entity.real_list(1)?;
            match coords.as_slice() {
                [x, y, z, ..] => Ok(Point3::new(*x, *y, *z)),
                [x, y] => Ok(Point3::new(*x, *y, 0.0)),
                _ => Err(StepError::parser(
                    Some(id),
                    format!("CARTESIAN_POINT needs 2 or 3 coordinates, got {}", coords.len()),
                )),
            }
        }
        other => Err(StepError::type_mismatch("CARTESIAN_POINT", other)),
    }
}

/// Parse a DIRECTION entity.
///
/// STEP syntax: `DIRECTION(name, (x, y, z))`
pub fn parse_direction(file: &StepFile, id: u64) -> Result<Dir3, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "DIRECTION" => {
            let coords = entity.real_list(1)?;
            let v = match coords.as_slice() {
                [x, y, z, ..] => Vec3::new(*x, *y, *z),
                [x, y] => Vec3::new(*x, *y, 0.0),
                _ => {
                    return Err(StepError::parser(
                        Some(id),
                        format!("DIRECTION needs 2 or 3 components, got {}", coords.len()),
                    ))
                }
            };
            if v.norm() < 1e-15 {
                return Err(StepError::InvalidGeometry(format!(
                    "zero-length direction #{id}"
                )));
            }
            Ok(Dir3::new_normalize(v))
        }
        other => Err(StepError::type_mismatch("DIRECTION", other)),
    }
}

/// Axis placement data (origin + optional directions).
#[derive(Debug, Clone)]
pub struct AxisPlacement {
    /// Location point.
    pub location: Point3,
    /// Z-axis direction (normal).
    pub axis: Option<Dir3>,
    /// X-axis direction (reference).
    pub ref_direction: Option<Dir3>,
}

impl AxisPlacement {
    /// Get the Z-axis direction, defaulting to +Z if not specified.
    pub fn z_axis(&self) -> Dir3 {
        self.axis.unwrap_or_else(|| Dir3::new_normalize(Vec3::z()))
    }

    /// Get the X-axis direction, made orthogonal to Z.
    pub fn x_axis(&self) -> Dir3 {
        let z = self.z_axis();
        let candidate = match self.ref_direction {
            Some(x) if x.cross(z.as_ref()).norm() > 1e-9 => x.into_inner(),
            // Missing or parallel reference: pick an arbitrary perpendicular
            _ if z.x.abs() < 0.9 => Vec3::x(),
            _ => Vec3::y(),
        };
        Dir3::new_normalize(candidate - candidate.dot(z.as_ref()) * z.into_inner())
    }

    /// Get the Y-axis direction (computed as Z × X).
    pub fn y_axis(&self) -> Dir3 {
        let z = self.z_axis();
        let x = self.x_axis();
        Dir3::new_normalize(z.cross(x.as_ref()))
    }

    /// Transform from this placement's local frame to the enclosing frame.
    pub fn to_transform(&self) -> Transform {
        Transform::from_frame(&self.location, &self.x_axis(), &self.y_axis(), &self.z_axis())
    }
}

fn optional_direction(
    file: &StepFile,
    entity: &impl EntityArgs,
    idx: usize,
) -> Result<Option<Dir3>, StepError> {
    if entity.is_null(idx) {
        return Ok(None);
    }
    parse_direction(file, entity.entity_ref(idx)?).map(Some)
}

/// Parse an AXIS2_PLACEMENT_3D or AXIS1_PLACEMENT entity.
///
/// STEP syntax: `AXIS2_PLACEMENT_3D(name, location, axis, ref_direction)`,
/// `AXIS1_PLACEMENT(name, location, axis)`
pub fn parse_axis2_placement(file: &StepFile, id: u64) -> Result<AxisPlacement, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "AXIS2_PLACEMENT_3D" | "AXIS1_PLACEMENT" => {
            let location = parse_cartesian_point(file, entity.entity_ref(1)?)?;
            let axis = optional_direction(file, entity, 2)?;
            let ref_direction = if entity.type_name == "AXIS2_PLACEMENT_3D" {
                optional_direction(file, entity, 3)?
            } else {
                None
            };
            Ok(AxisPlacement {
                location,
                axis,
                ref_direction,
            })
        }
        other => Err(StepError::type_mismatch("AXIS2_PLACEMENT_3D", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use approx::assert_relative_eq;

    fn file(data: &str) -> StepFile {
        let text = format!("ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n{data}\nENDSEC;\nEND-ISO-10303-21;\n");
        Parser::parse(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_placement_transform() {
        let f = file(
            "#1 = CARTESIAN_POINT('', (5.0, 0.0, 0.0));\n\
             #2 = DIRECTION('', (0.0, 0.0, 1.0));\n\
             #3 = DIRECTION('', (0.0, 1.0, 0.0));\n\
             #4 = AXIS2_PLACEMENT_3D('', #1, #2, #3);",
        );
        let placement = parse_axis2_placement(&f, 4).unwrap();
        let t = placement.to_transform();
        let p = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(placement.y_axis().x, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_placement_defaults() {
        let f = file(
            "#1 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));\n\
             #2 = AXIS2_PLACEMENT_3D('', #1, $, $);",
        );
        let placement = parse_axis2_placement(&f, 2).unwrap();
        assert!(placement.to_transform().is_identity(1e-12));
    }

    #[test]
    fn test_zero_direction_is_invalid() {
        let f = file("#1 = DIRECTION('', (0.0, 0.0, 0.0));");
        assert!(matches!(
            parse_direction(&f, 1),
            Err(StepError::InvalidGeometry(_))
        ));
        assert!(matches!(
            parse_cartesian_point(&f, 1),
            Err(StepError::TypeMismatch { .. })
        ));
    }
}
