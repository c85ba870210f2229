#![warn(missing_docs)]

//! Geometry kernel contract for stepbase.
//!
//! The baseline engine never parses CAD files itself. It talks to a
//! [`GeometryKernel`], which turns a [`ModelSource`] into an
//! [`AssemblyTree`]: a tree of named shapes whose leaves carry
//! [`Primitives`] measured in an explicit [`LinearUnit`].

mod primitives;
mod tree;

pub use primitives::{HoleFeature, PlanarFace, Primitives, TopologyCounts, TopologyKind};
pub use tree::{AssemblyTree, FileMetadata, LinearUnit, ProductInfo, Rgb, ShapeContent, ShapeKind, ShapeNode};

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors reported by a geometry kernel.
#[derive(Error, Debug)]
pub enum KernelError {
    /// The model could not be read from disk.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The content is not a well-formed model.
    #[error("malformed model: {0}")]
    Malformed(String),

    /// The content uses a construct the kernel does not handle.
    #[error("unsupported model content: {0}")]
    Unsupported(String),
}

/// Where a model comes from. Exactly one variant is populated by
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// A STEP document on the filesystem.
    Path(PathBuf),
    /// STEP content already decoded into memory.
    Bytes(Vec<u8>),
}

impl ModelSource {
    /// Short human label for logs and baseline provenance.
    pub fn label(&self) -> Option<String> {
        match self {
            ModelSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            ModelSource::Bytes(_) => None,
        }
    }

    /// Load the raw content of this source.
    pub fn read(&self) -> Result<std::borrow::Cow<'_, [u8]>, KernelError> {
        match self {
            ModelSource::Path(path) => std::fs::read(path)
                .map(std::borrow::Cow::Owned)
                .map_err(|source| KernelError::Io {
                    path: path.clone(),
                    source,
                }),
            ModelSource::Bytes(bytes) => Ok(std::borrow::Cow::Borrowed(bytes)),
        }
    }
}

/// A geometry kernel able to turn STEP content into an assembly tree.
pub trait GeometryKernel {
    /// Kernel name, for diagnostics.
    fn name(&self) -> &str;

    /// Parse in-memory content.
    fn parse_bytes(&self, data: &[u8]) -> Result<AssemblyTree, KernelError>;

    /// Parse a file on disk.
    fn parse_path(&self, path: &Path) -> Result<AssemblyTree, KernelError> {
        let data = std::fs::read(path).map_err(|source| KernelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_bytes(&data)
    }

    /// Parse either kind of source.
    fn parse(&self, source: &ModelSource) -> Result<AssemblyTree, KernelError> {
        match source {
            ModelSource::Path(path) => self.parse_path(path),
            ModelSource::Bytes(bytes) => self.parse_bytes(bytes),
        }
    }
}
