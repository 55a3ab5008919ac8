//! # Vector Index Module
//!
//! ## Purpose
//! Persistent storage and similarity search for embedded chunks. Records are
//! serialized with bincode (optionally gzip-compressed) into a sled tree and
//! mirrored in memory for brute-force cosine search.
//!
//! ## Input/Output Specification
//! - **Input**: Chunk text, embedding vector, chunk metadata
//! - **Output**: Top-K `SearchResult` hits ordered by descending similarity
//! - **Persistence**: Index survives restarts; ids are assigned atomically by
//!   the sled id generator
//!
//! ## Key Features
//! - In-memory mirror behind a `tokio::sync::RwLock` for concurrent reads
//! - Optional transparent compression of stored records
//! - Minimum-similarity floor applied before ranking

use crate::embedding::cosine_similarity;
use crate::errors::{RagError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tokio::sync::RwLock;

const CHUNKS_TREE: &str = "chunks";

/// Metadata carried alongside each indexed chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Dataset folder the chunk came from
    pub case_folder: String,
    /// Case name from the metadata file
    pub case_name: String,
    /// Whitespace-token count of the chunk text
    pub num_tokens: usize,
    /// Character count of the chunk text
    pub num_chars: usize,
}

/// One embedded chunk as stored in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique, monotonically assigned id
    pub id: u64,
    /// Chunk text
    pub text: String,
    /// Embedding vector
    pub embedding: Vec<f32>,
    /// Chunk metadata
    pub metadata: ChunkMetadata,
}

/// A search hit with its similarity score
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk: ChunkRecord,
    pub similarity: f32,
}

/// Persistent vector index over embedded chunks
pub struct VectorIndex {
    db: sled::Db,
    tree: sled::Tree,
    records: RwLock<Vec<ChunkRecord>>,
    enable_compression: bool,
}

impl VectorIndex {
    /// Open the index inside an existing sled database, loading any
    /// previously stored records into the in-memory mirror.
    pub fn open(db: &sled::Db, enable_compression: bool) -> Result<Self> {
        let tree = db.open_tree(CHUNKS_TREE)?;

        let mut records = Vec::new();
        for entry in tree.iter() {
            let (_, value) = entry?;
            records.push(decode_record(&value, enable_compression)?);
        }
        records.sort_by_key(|r| r.id);

        tracing::info!("Vector index opened with {} chunks", records.len());

        Ok(Self {
            db: db.clone(),
            tree,
            records: RwLock::new(records),
            enable_compression,
        })
    }

    /// Add one chunk to the index. The id is assigned here.
    pub async fn add_chunk(
        &self,
        text: String,
        embedding: Vec<f32>,
        metadata: ChunkMetadata,
    ) -> Result<u64> {
        let id = self.db.generate_id()?;
        let record = ChunkRecord {
            id,
            text,
            embedding,
            metadata,
        };

        let encoded = encode_record(&record, self.enable_compression)?;
        self.tree.insert(id.to_be_bytes(), encoded)?;

        self.records.write().await.push(record);
        Ok(id)
    }

    /// Brute-force cosine search. Hits below `min_similarity` are dropped,
    /// the rest are returned best-first, at most `top_k` of them.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<SearchResult> {
        let records = self.records.read().await;

        let mut hits: Vec<SearchResult> = records
            .iter()
            .map(|record| SearchResult {
                similarity: cosine_similarity(query_embedding, &record.embedding),
                chunk: record.clone(),
            })
            .filter(|hit| hit.similarity >= min_similarity)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        hits
    }

    /// Number of indexed chunks
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the index holds no chunks
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Remove every chunk from the index and its backing tree
    pub async fn clear(&self) -> Result<()> {
        self.tree.clear()?;
        self.tree.flush()?;
        self.records.write().await.clear();
        Ok(())
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.tree.flush()?;
        Ok(())
    }
}

fn encode_record(record: &ChunkRecord, compress: bool) -> Result<Vec<u8>> {
    let raw = bincode::serialize(record)?;
    if !compress {
        return Ok(raw);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .and_then(|_| encoder.finish())
        .map_err(RagError::Io)
}

fn decode_record(bytes: &[u8], compressed: bool) -> Result<ChunkRecord> {
    if !compressed {
        return Ok(bincode::deserialize(bytes)?);
    }

    let mut decoder = GzDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(bincode::deserialize(&raw)?)
}
