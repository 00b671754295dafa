//! Error types for the RAG engine.

use thiserror::Error;

/// Result type alias using RagError.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur in the RAG engine.
///
/// An empty retrieval is not an error: stages report it as an empty
/// sequence or an empty context window.
#[derive(Error, Debug)]
pub enum RagError {
    /// An external provider (embedding or generation backend) could not be
    /// reached or failed transiently.
    #[error("Provider unavailable: {provider} - {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// The generation backend explicitly refused the request.
    #[error("Generation rejected: {reason}")]
    GenerationRejected { reason: String },

    /// The sparse and dense indexes diverged. Blocks queries until rebuild.
    #[error("Index corruption: {reason}")]
    IndexCorruption { reason: String },

    /// Document not found.
    #[error("Document not found: {id}")]
    DocumentNotFound { id: u64 },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Embedding has the wrong number of dimensions.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Knowledge base text could not be parsed.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RagError {
    /// Create a provider unavailable error.
    pub fn provider_unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create a generation rejected error.
    pub fn generation_rejected(reason: impl Into<String>) -> Self {
        Self::GenerationRejected {
            reason: reason.into(),
        }
    }

    /// Create an index corruption error.
    pub fn index_corruption(reason: impl Into<String>) -> Self {
        Self::IndexCorruption {
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }

    /// Get the stable error code reported to callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            Self::GenerationRejected { .. } => "GENERATION_REJECTED",
            Self::IndexCorruption { .. } => "INDEX_CORRUPTION",
            Self::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::Cancelled => "CANCELLED",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::provider_unavailable("ollama", "connection refused");
        let text = err.to_string();
        assert!(text.contains("ollama"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RagError::DocumentNotFound { id: 7 }.error_code(),
            "DOCUMENT_NOT_FOUND"
        );
        assert_eq!(
            RagError::generation_rejected("bad prompt").error_code(),
            "GENERATION_REJECTED"
        );
        assert_eq!(
            RagError::index_corruption("count mismatch").error_code(),
            "INDEX_CORRUPTION"
        );
    }

    #[test]
    fn test_only_provider_errors_are_transient() {
        assert!(RagError::provider_unavailable("x", "timeout").is_transient());
        assert!(!RagError::generation_rejected("no").is_transient());
        assert!(!RagError::index_corruption("diverged").is_transient());
        assert!(!RagError::Cancelled.is_transient());
    }
}
