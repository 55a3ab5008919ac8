//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration management for the legal RAG engine, supporting
//! TOML files and environment variable overrides with validation and type-safe
//! access to all system settings.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation, dependency verification
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (highest priority)
//! 2. Configuration files
//! 3. Default values (lowest priority)
//!
//! Model and index configuration is loaded once here and injected into each
//! component at construction. There is no process-wide "current model" state.
//!
//! ## Usage
//! ```rust,no_run
//! use legal_rag_engine::config::Config;
//!
//! let config = Config::from_file("config.toml").unwrap();
//! println!("Server port: {}", config.server.port);
//! ```

use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// Document ingestion settings
    pub ingestion: IngestionConfig,
    /// Chunking pipeline configuration
    pub chunking: ChunkingConfig,
    /// Embedding collaborator configuration
    pub embedding: EmbeddingConfig,
    /// Retrieval behavior
    pub retrieval: RetrievalConfig,
    /// Generation collaborator configuration
    pub generation: GenerationConfig,
    /// Storage and database settings
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Words per SSE frame when streaming an answer
    pub stream_chunk_words: usize,
    /// Pacing delay between SSE frames in milliseconds
    pub stream_delay_ms: u64,
}

/// Document ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Root directory of the case dataset (one subfolder per case)
    pub dataset_dir: PathBuf,
    /// Metadata file name expected inside each case folder
    pub metadata_file_name: String,
    /// Maximum concurrent embedding requests during ingestion
    pub max_concurrent_embeddings: usize,
}

/// Chunking pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Section markers used by the structural segmenter
    pub section_markers: Vec<String>,
    /// Minimum words for a paragraph to count as a section in the
    /// paragraph-splitting fallback
    pub min_paragraph_words: usize,
    /// Cosine similarity threshold for appending a sentence to the running
    /// chunk
    pub similarity_threshold: f32,
    /// Soft maximum chunk size in tokens during semantic grouping
    pub max_chunk_tokens: usize,
    /// Minimum chunk size in tokens after merging
    pub min_chunk_tokens: usize,
}

/// Embedding backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama HTTP embeddings endpoint
    Ollama,
    /// Deterministic in-process feature-hashing embedder (offline, tests)
    Hashing,
}

/// Embedding collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Which backend produces sentence embeddings
    pub backend: EmbeddingBackend,
    /// Embedding vector dimension
    pub dimension: usize,
    /// Ollama base URL
    pub ollama_url: String,
    /// Embedding model name
    pub model: String,
    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

/// Retrieval behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of nearest-neighbor chunks to retrieve per query
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to count as a retrieval hit
    pub min_similarity: f32,
}

/// Generation collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Ollama base URL
    pub ollama_url: String,
    /// Completion model name
    pub model: String,
    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

/// Storage and database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file path
    pub db_path: PathBuf,
    /// Enable gzip compression of stored records
    pub enable_compression: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| RagError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("LEGAL_RAG_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LEGAL_RAG_PORT") {
            self.server.port = port.parse().map_err(|_| RagError::Config {
                message: "Invalid port number in LEGAL_RAG_PORT".to_string(),
            })?;
        }
        if let Ok(db_path) = std::env::var("LEGAL_RAG_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }
        if let Ok(dataset_dir) = std::env::var("LEGAL_RAG_DATASET_DIR") {
            self.ingestion.dataset_dir = PathBuf::from(dataset_dir);
        }
        if let Ok(url) = std::env::var("LEGAL_RAG_OLLAMA_URL") {
            self.embedding.ollama_url = url.clone();
            self.generation.ollama_url = url;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(RagError::ValidationFailed {
                field: "server.port".to_string(),
                reason: "Port cannot be zero".to_string(),
            });
        }

        if self.embedding.dimension == 0 {
            return Err(RagError::ValidationFailed {
                field: "embedding.dimension".to_string(),
                reason: "Embedding dimension must be greater than zero".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.chunking.similarity_threshold) {
            return Err(RagError::ValidationFailed {
                field: "chunking.similarity_threshold".to_string(),
                reason: "Similarity threshold must be within [0, 1]".to_string(),
            });
        }

        if self.chunking.max_chunk_tokens <= self.chunking.min_chunk_tokens {
            return Err(RagError::ValidationFailed {
                field: "chunking.max_chunk_tokens".to_string(),
                reason: "Maximum chunk size must exceed the minimum".to_string(),
            });
        }

        if self.retrieval.top_k == 0 {
            return Err(RagError::ValidationFailed {
                field: "retrieval.top_k".to_string(),
                reason: "top_k must be greater than zero".to_string(),
            });
        }

        if self.ingestion.max_concurrent_embeddings == 0 {
            return Err(RagError::ValidationFailed {
                field: "ingestion.max_concurrent_embeddings".to_string(),
                reason: "Concurrency must be greater than zero".to_string(),
            });
        }

        if self.chunking.section_markers.is_empty() {
            return Err(RagError::ValidationFailed {
                field: "chunking.section_markers".to_string(),
                reason: "At least one section marker is required".to_string(),
            });
        }

        Ok(())
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RagError::Config {
            message: format!("Failed to serialize config to TOML: {}", e),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                enable_cors: true,
                stream_chunk_words: 50,
                stream_delay_ms: 200,
            },
            ingestion: IngestionConfig {
                dataset_dir: PathBuf::from("./data/cases"),
                metadata_file_name: "data.json".to_string(),
                max_concurrent_embeddings: 8,
            },
            chunking: ChunkingConfig {
                section_markers: vec![
                    "Case:".to_string(),
                    "Document:".to_string(),
                    "Ruling:".to_string(),
                    "Facts:".to_string(),
                ],
                min_paragraph_words: 20,
                similarity_threshold: 0.75,
                max_chunk_tokens: 150,
                min_chunk_tokens: 20,
            },
            embedding: EmbeddingConfig {
                backend: EmbeddingBackend::Ollama,
                dimension: 768,
                ollama_url: "http://127.0.0.1:11434".to_string(),
                model: "nomic-embed-text".to_string(),
                request_timeout_seconds: 60,
            },
            retrieval: RetrievalConfig {
                top_k: 3,
                min_similarity: 0.0,
            },
            generation: GenerationConfig {
                ollama_url: "http://127.0.0.1:11434".to_string(),
                model: "llama3.1:latest".to_string(),
                request_timeout_seconds: 120,
            },
            storage: StorageConfig {
                db_path: PathBuf::from("./data/legal_rag.db"),
                enable_compression: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}
