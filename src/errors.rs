//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the legal RAG engine, providing structured
//! error types and conversion utilities for all system components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from ingestion, chunking, storage, model
//!   collaborators, and the API layer
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Ingestion, Chunking, Embedding, Storage, Retrieval,
//!   Generation, API, Configuration
//!
//! ## Key Features
//! - Hierarchical error types with detailed context
//! - Automatic error conversion and chaining
//! - Category tags for structured logging
//! - Distinction between skip-and-continue failures (a single unreadable
//!   document) and fatal failures (embedding backend unavailable)

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, RagError>;

/// Error types for the legal RAG engine
#[derive(Debug, Error)]
pub enum RagError {
    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Binary serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation failed for field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    // Ingestion errors (skip-and-continue per document)
    #[error("Failed to extract text from PDF {file}: {details}")]
    PdfExtraction { file: String, details: String },

    #[error("Malformed metadata in {file}: {details}")]
    MalformedMetadata { file: String, details: String },

    #[error("No usable text in case folder '{folder}'")]
    EmptyDocument { folder: String },

    // Embedding errors
    /// Backend unreachable at startup. Fatal: ingestion aborts rather than
    /// building a partial index.
    #[error("Embedding backend unavailable: {details}")]
    EmbeddingBackendUnavailable { details: String },

    #[error("Embedding generation failed: {text_preview} - {reason}")]
    EmbeddingFailed {
        text_preview: String,
        reason: String,
    },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Generation errors (propagated to the API caller, no retry)
    #[error("Generation failed: {details}")]
    GenerationFailed { details: String },

    // API errors
    #[error("Invalid API request: {details}")]
    InvalidApiRequest { details: String },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RagError {
    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            RagError::Config { .. } | RagError::Toml(_) => "configuration",
            RagError::PdfExtraction { .. }
            | RagError::MalformedMetadata { .. }
            | RagError::EmptyDocument { .. } => "ingestion",
            RagError::EmbeddingBackendUnavailable { .. }
            | RagError::EmbeddingFailed { .. }
            | RagError::DimensionMismatch { .. } => "embedding",
            RagError::Database(_) | RagError::Serialization(_) => "storage",
            RagError::GenerationFailed { .. } => "generation",
            RagError::InvalidApiRequest { .. } => "api",
            RagError::Http(_) => "network",
            RagError::Io(_) | RagError::Json(_) => "io",
            RagError::ValidationFailed { .. } | RagError::Internal { .. } => "generic",
        }
    }

    /// Whether ingestion should skip the affected document and continue.
    ///
    /// Unreadable PDFs, malformed JSON and empty folders are per-document
    /// failures; everything else aborts the batch.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            RagError::PdfExtraction { .. }
                | RagError::MalformedMetadata { .. }
                | RagError::EmptyDocument { .. }
        )
    }
}

/// Helper macro for internal errors
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::errors::RagError::Internal {
            message: $msg.to_string(),
        }
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::RagError::Internal {
            message: format!($fmt, $($arg)*),
        }
    };
}
