//! [`GeometryKernel`] implementation backed by the STEP reader.

use std::path::Path;

use stepbase_kernel::{AssemblyTree, GeometryKernel, KernelError};
use tracing::debug;

use crate::header::{detect_length_unit, read_metadata};
use crate::parser::Parser;
use crate::product::build_tree;

/// Name given to the root when the file carries no usable FILE_NAME.
const DEFAULT_ROOT_NAME: &str = "model";

/// Reads ISO 10303-21 files into assembly trees.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepKernel;

impl StepKernel {
    /// Create a new STEP kernel.
    pub fn new() -> Self {
        Self
    }
}

impl GeometryKernel for StepKernel {
    fn name(&self) -> &str {
        "step"
    }

    fn parse_bytes(&self, data: &[u8]) -> Result<AssemblyTree, KernelError> {
        let file = Parser::parse(data)?;
        let metadata = read_metadata(&file);
        let unit = detect_length_unit(&file);

        let fallback = metadata
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| DEFAULT_ROOT_NAME.to_string());
        let root = build_tree(&file, &fallback)?;
        debug!(
            entities = file.entities.len(),
            nodes = root.as_ref().map_or(0, |r| r.node_count()),
            %unit,
            "parsed STEP model"
        );

        Ok(AssemblyTree {
            root,
            unit,
            metadata,
        })
    }
}
