//! Engine error taxonomy.

use std::path::PathBuf;

use stepbase_kernel::{KernelError, LinearUnit};
use thiserror::Error;

/// Errors returned by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A request or configuration value is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The model could not be turned into a baseline.
    #[error("parse error: {0}")]
    Parse(String),

    /// Two baselines use different length units.
    #[error("unit mismatch: {left} vs {right}")]
    UnitMismatch {
        /// Unit of the first baseline.
        left: LinearUnit,
        /// Unit of the second baseline.
        right: LinearUnit,
    },

    /// Two baselines cannot be compared at all.
    #[error("incompatible baselines: {0}")]
    IncompatibleBaseline(String),

    /// No stored baseline has this id.
    #[error("baseline not found: {0}")]
    NotFound(String),

    /// No component has this name.
    #[error("component '{name}' not found{}", format_suggestions(.suggestions))]
    ComponentNotFound {
        /// The name that was looked up.
        name: String,
        /// Similar component names.
        suggestions: Vec<String>,
    },

    /// Filesystem failure in the store or while loading configuration.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A baseline or report could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Build a [`EngineError::Configuration`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Build a [`EngineError::Parse`].
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Build a [`EngineError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<KernelError> for EngineError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::Io { path, source } => Self::Io { path, source },
            other => Self::Parse(other.to_string()),
        }
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {})", suggestions.join(", "))
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
