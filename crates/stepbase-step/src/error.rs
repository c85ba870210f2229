//! Error types for STEP reading.

use stepbase_kernel::KernelError;
use thiserror::Error;

/// Errors that can occur while reading a STEP model.
#[derive(Error, Debug)]
pub enum StepError {
    /// Lexer error: unexpected character or malformed token.
    #[error("Lexer error at line {line}, column {col}: {message}")]
    Lexer {
        /// Line number (1-indexed).
        line: usize,
        /// Column number (1-indexed).
        col: usize,
        /// Error message.
        message: String,
    },

    /// Parser error: unexpected token or malformed structure.
    #[error("Parser error{}: {message}", entity_id.map(|id| format!(" at entity #{}", id)).unwrap_or_default())]
    Parser {
        /// Entity ID where the error occurred, if known.
        entity_id: Option<u64>,
        /// Error message.
        message: String,
    },

    /// Missing entity reference.
    #[error("Missing entity reference: #{0}")]
    MissingEntity(u64),

    /// Invalid geometry (e.g., degenerate placement, zero-length direction).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Invalid product structure (e.g., an assembly that contains itself).
    #[error("Invalid product structure: {0}")]
    InvalidStructure(String),

    /// Type mismatch (e.g., expected CARTESIAN_POINT but got DIRECTION).
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: String,
        /// Actual type name.
        actual: String,
    },
}

impl StepError {
    /// Create a lexer error.
    pub fn lexer(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            line,
            col,
            message: message.into(),
        }
    }

    /// Create a parser error.
    pub fn parser(entity_id: Option<u64>, message: impl Into<String>) -> Self {
        Self::Parser {
            entity_id,
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<StepError> for KernelError {
    fn from(err: StepError) -> Self {
        KernelError::Malformed(err.to_string())
    }
}
