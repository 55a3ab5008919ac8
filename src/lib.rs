//! # Legal RAG Engine
//!
//! ## Overview
//! This library implements a retrieval-augmented question-answering engine for
//! court case collections. Documents are normalized, segmented on legal
//! section markers, grouped sentence-by-sentence under a similarity threshold
//! and token budget, merged, embedded, and stored in a persistent vector
//! index. Queries retrieve the top-K most similar chunks, fall back to a
//! case-name-keyed metadata index when retrieval is empty, and hand the
//! assembled context to a generation collaborator.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `ingestion`: Case folder loading, PDF text extraction, metadata parsing
//! - `text_processing`: Normalization and sentence splitting
//! - `chunking`: Structural segmentation, semantic grouping, chunk merging
//! - `embedding`: Embedding collaborators (Ollama HTTP, feature hashing)
//! - `vector`: Persistent vector index with cosine top-K search
//! - `fallback`: Case-name-keyed fallback context index
//! - `generation`: LLM collaborator and legal-argument prompting
//! - `chat`: Append-only chat history with atomic id assignment
//! - `engine`: Retrieval orchestrator composing the above
//! - `api`: REST/SSE endpoints
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Case folders (PDF files + JSON metadata), free-text legal
//!   questions
//! - **Output**: Streamed, context-grounded legal arguments; persistent chat
//!   history
//!
//! ## Usage
//! ```rust,no_run
//! use legal_rag_engine::config::Config;
//!
//! let config = Config::from_file("config.toml").unwrap();
//! println!("Serving on {}:{}", config.server.host, config.server.port);
//! ```

// Core modules
pub mod api;
pub mod chat;
pub mod chunking;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod fallback;
pub mod generation;
pub mod ingestion;
pub mod text_processing;
pub mod vector;

// Re-exports for convenience
pub use config::Config;
pub use engine::RagEngine;
pub use errors::{RagError, Result};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Metadata attached to a case document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseMetadata {
    /// Case name/title
    pub case_name: String,
    /// Court that decided the case
    pub court: String,
    /// Judge who decided the case
    pub judge: String,
    /// Docket number
    pub docket_number: Option<String>,
    /// Filing date
    pub date_filed: Option<NaiveDate>,
    /// Opinion snippet from the metadata file
    pub snippet: String,
    /// Source folder name within the dataset
    pub case_folder: String,
}

/// Where a document's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Extracted from one or more PDF files
    Pdf,
    /// Synthesized from the JSON metadata snippet
    Snippet,
}

/// A loaded case document. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDocument {
    /// Normalized document text
    pub text: String,
    /// Provenance of the text
    pub source: TextSource,
    /// Case metadata
    pub metadata: CaseMetadata,
}

/// Application state shared across API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub engine: Arc<engine::RagEngine>,
}
