//! Error types for sqlfrag

use thiserror::Error;

/// Result type alias for fragment operations
pub type FragmentResult<T> = Result<T, FragmentError>;

/// Error types for fragment construction and composition
#[derive(Debug, Error)]
pub enum FragmentError {
    /// Caller misuse: unsupported placeholder style, non-scalar parameter
    /// value, or a bad comment-replacement target
    #[error("Coding error: {0}")]
    Coding(String),

    /// Named (`:name`) and positional (`?`) placeholders mixed in one text
    #[error("Cannot mix named and positional placeholders in one statement")]
    MixedPlaceholders,

    /// Supplied parameter count does not cover the referenced placeholders
    #[error("Parameter count mismatch: expected {expected}, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    /// A named placeholder has no corresponding supplied value
    #[error("Missing parameter: '{0}'")]
    MissingParameter(String),

    /// The same placeholder name is referenced more than once in one text
    #[error("Placeholder '{0}' is referenced more than once")]
    DuplicatePlaceholder(String),
}

impl FragmentError {
    /// Create a coding error
    pub fn coding(message: impl Into<String>) -> Self {
        Self::Coding(message.into())
    }

    /// Create a parameter count error
    pub fn parameter_count(expected: usize, actual: usize) -> Self {
        Self::ParameterCount { expected, actual }
    }

    /// Check if this is a coding error
    pub fn is_coding(&self) -> bool {
        matches!(self, Self::Coding(_))
    }

    /// Check if this is a mixed-placeholder error
    pub fn is_mixed_placeholders(&self) -> bool {
        matches!(self, Self::MixedPlaceholders)
    }

    /// Check if this is a parameter count error
    pub fn is_parameter_count(&self) -> bool {
        matches!(self, Self::ParameterCount { .. })
    }

    /// Check if this is a missing parameter error
    pub fn is_missing_parameter(&self) -> bool {
        matches!(self, Self::MissingParameter(_))
    }

    /// Check if this is a duplicate placeholder error
    pub fn is_duplicate_placeholder(&self) -> bool {
        matches!(self, Self::DuplicatePlaceholder(_))
    }
}
