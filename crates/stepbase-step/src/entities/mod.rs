//! Typed access to STEP entity arguments.

mod geometry;

pub use geometry::{parse_axis2_placement, parse_cartesian_point, parse_direction, AxisPlacement};

use crate::error::StepError;
use crate::parser::{RecordView, StepEntity, StepValue};

/// Helper trait for extracting argument values from STEP records.
///
/// Implementors supply the raw argument slice plus identification for error
/// messages; the typed accessors are shared.
pub trait EntityArgs {
    /// Raw arguments.
    fn args(&self) -> &[StepValue];

    /// Owning entity ID.
    fn entity_id(&self) -> u64;

    /// Record type name.
    fn entity_type(&self) -> &str;

    /// Build a parser error pointing at this record.
    fn arg_error(&self, what: &str, idx: usize) -> StepError {
        StepError::parser(
            Some(self.entity_id()),
            format!("expected {what} at arg {idx} in {}", self.entity_type()),
        )
    }

    /// Get a required real argument at index.
    fn real(&self, idx: usize) -> Result<f64, StepError> {
        self.args()
            .get(idx)
            .and_then(StepValue::as_real)
            .ok_or_else(|| self.arg_error("real", idx))
    }

    /// Get a required string argument at index.
    fn string(&self, idx: usize) -> Result<&str, StepError> {
        self.args()
            .get(idx)
            .and_then(StepValue::as_string)
            .ok_or_else(|| self.arg_error("string", idx))
    }

    /// Get a string argument, treating `$`, `*` and other values as empty.
    fn string_or_empty(&self, idx: usize) -> &str {
        self.args()
            .get(idx)
            .and_then(StepValue::as_string)
            .unwrap_or_default()
    }

    /// Get a required enum argument at index.
    fn enumeration(&self, idx: usize) -> Result<&str, StepError> {
        self.args()
            .get(idx)
            .and_then(StepValue::as_enum)
            .ok_or_else(|| self.arg_error("enum", idx))
    }

    /// Get a required boolean (`.T.`/`.F.`) argument at index.
    fn boolean(&self, idx: usize) -> Result<bool, StepError> {
        self.args()
            .get(idx)
            .and_then(StepValue::as_bool)
            .ok_or_else(|| self.arg_error("boolean", idx))
    }

    /// Get a required entity reference at index.
    fn entity_ref(&self, idx: usize) -> Result<u64, StepError> {
        self.args()
            .get(idx)
            .and_then(StepValue::as_entity_ref)
            .ok_or_else(|| self.arg_error("entity ref", idx))
    }

    /// Get a required list argument at index.
    fn list(&self, idx: usize) -> Result<&[StepValue], StepError> {
        self.args()
            .get(idx)
            .and_then(StepValue::as_list)
            .ok_or_else(|| self.arg_error("list", idx))
    }

    /// Get a list of reals at index.
    fn real_list(&self, idx: usize) -> Result<Vec<f64>, StepError> {
        self.list(idx)?
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_real().ok_or_else(|| {
                    StepError::parser(
                        Some(self.entity_id()),
                        format!("expected real at list[{i}] in arg {idx}"),
                    )
                })
            })
            .collect()
    }

    /// Get a list of entity references at index.
    fn entity_ref_list(&self, idx: usize) -> Result<Vec<u64>, StepError> {
        self.list(idx)?
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_entity_ref().ok_or_else(|| {
                    StepError::parser(
                        Some(self.entity_id()),
                        format!("expected entity ref at list[{i}] in arg {idx}"),
                    )
                })
            })
            .collect()
    }

    /// Check if argument at index is null or absent.
    fn is_null(&self, idx: usize) -> bool {
        self.args().get(idx).map_or(true, StepValue::is_null)
    }
}

impl EntityArgs for StepEntity {
    fn args(&self) -> &[StepValue] {
        &self.args
    }

    fn entity_id(&self) -> u64 {
        self.id
    }

    fn entity_type(&self) -> &str {
        &self.type_name
    }
}

impl EntityArgs for RecordView<'_> {
    fn args(&self) -> &[StepValue] {
        self.args
    }

    fn entity_id(&self) -> u64 {
        self.id
    }

    fn entity_type(&self) -> &str {
        self.type_name
    }
}
