//! # Chunking Module
//!
//! ## Purpose
//! Structure-aware document chunking for legal texts: coarse segmentation on
//! section markers, semantic grouping of consecutive sentences bounded by a
//! similarity threshold and a token budget, and merging of undersized chunks.
//!
//! ## Input/Output Specification
//! - **Input**: Normalized document text, an embedding collaborator, chunking
//!   configuration
//! - **Output**: Ordered chunk strings ready for embedding and indexing
//! - **Guarantee**: Non-empty input always yields at least one section; no
//!   text is dropped at any stage, only boundaries move
//!
//! ## Pipeline
//! 1. `segment_document` — markers, then long paragraphs, then whole text
//! 2. `group_sentences` — similarity-bounded sentence grouping per section
//! 3. `merge_short_chunks` — absorb chunks under the minimum token count

use crate::config::ChunkingConfig;
use crate::embedding::{cosine_similarity, Embedder};
use crate::errors::Result;
use crate::text_processing::{split_sentences, word_count};
use regex::Regex;

/// Split document text into sections on the configured markers.
///
/// Each marker is re-attached to the text that follows it; any preamble before
/// the first marker is kept as its own section so no text is dropped. Returns
/// an empty vector when no marker occurs.
pub fn split_sections(text: &str, markers: &[String]) -> Vec<String> {
    if markers.is_empty() {
        return Vec::new();
    }

    let pattern = markers
        .iter()
        .map(|m| regex::escape(m))
        .collect::<Vec<_>>()
        .join("|");
    let marker_re = Regex::new(&pattern).expect("escaped markers form a valid pattern");

    let starts: Vec<usize> = marker_re.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return Vec::new();
    }

    let mut sections = Vec::new();
    let preamble = text[..starts[0]].trim();
    if !preamble.is_empty() {
        sections.push(preamble.to_string());
    }

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let section = text[start..end].trim();
        if !section.is_empty() {
            sections.push(section.to_string());
        }
    }

    sections
}

/// Segment a document with the three-tier fallback.
///
/// Tier 1: section markers. Tier 2: paragraphs longer than
/// `min_paragraph_words`. Tier 3: the whole document as one section. Never
/// returns zero sections for non-empty input.
///
/// Normalization collapses blank lines along with all other whitespace, so
/// for ingested documents the paragraph tier never fires and marker-less
/// text falls through to tier 3. Tier 2 applies to callers passing raw,
/// unnormalized text.
pub fn segment_document(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let sections = split_sections(text, &config.section_markers);
    if !sections.is_empty() {
        return sections;
    }

    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| word_count(p) > config.min_paragraph_words)
        .map(str::to_string)
        .collect();
    if !paragraphs.is_empty() {
        return paragraphs;
    }

    vec![text.trim().to_string()]
}

/// Group consecutive sentences of one section into chunks.
///
/// Walks sentences in order, keeping a running chunk and the running mean of
/// its sentence embeddings. A sentence joins the current chunk when its cosine
/// similarity to the running mean reaches `similarity_threshold` and the
/// chunk is still under `max_chunk_tokens`; otherwise the chunk closes and the
/// sentence starts a new one. The first sentence always starts the first chunk
/// (there is no running mean to compare against). The last in-progress chunk
/// is emitted unconditionally, so non-empty sentence input never yields zero
/// chunks. A chunk can exceed the budget by at most the sentence that was
/// appended before the budget check failed.
pub async fn group_sentences(
    text: &str,
    embedder: &dyn Embedder,
    config: &ChunkingConfig,
) -> Result<Vec<String>> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Ok(Vec::new());
    }

    let embeddings = embedder.embed_batch(&sentences).await?;

    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut running_sum: Vec<f32> = Vec::new();

    for (sentence, embedding) in sentences.into_iter().zip(embeddings) {
        if current.is_empty() {
            running_sum = embedding;
            current.push(sentence);
            continue;
        }

        let mean: Vec<f32> = running_sum
            .iter()
            .map(|s| s / current.len() as f32)
            .collect();
        let similarity = cosine_similarity(&mean, &embedding);
        let current_tokens = word_count(&current.join(" "));

        if similarity >= config.similarity_threshold && current_tokens < config.max_chunk_tokens {
            for (sum, value) in running_sum.iter_mut().zip(&embedding) {
                *sum += value;
            }
            current.push(sentence);
        } else {
            chunks.push(current.join(" "));
            running_sum = embedding;
            current = vec![sentence];
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    Ok(chunks)
}

/// Merge chunks under `min_chunk_tokens` words into their successors.
///
/// An undersized chunk is concatenated (single separating space) onto the
/// accumulator instead of being emitted; an accumulator that meets the
/// threshold is flushed. The trailing accumulator is always emitted, even when
/// short: dropping the remainder would silently lose document text, so the
/// one permissible under-threshold chunk is the document's tail.
pub fn merge_short_chunks(chunks: Vec<String>, min_tokens: usize) -> Vec<String> {
    let mut iter = chunks.into_iter();
    let mut current = match iter.next() {
        Some(chunk) => chunk,
        None => return Vec::new(),
    };

    let mut merged = Vec::new();
    for chunk in iter {
        if word_count(&current) < min_tokens {
            current.push(' ');
            current.push_str(&chunk);
        } else {
            merged.push(current);
            current = chunk;
        }
    }
    merged.push(current);

    merged
}

/// Run the full chunking pipeline over one document.
///
/// Segments the text, groups sentences within each section, and merges
/// undersized chunks. Returns an empty vector only for effectively empty
/// input.
pub async fn chunk_document(
    text: &str,
    embedder: &dyn Embedder,
    config: &ChunkingConfig,
) -> Result<Vec<String>> {
    let sections = segment_document(text, config);

    let mut chunks = Vec::new();
    for section in &sections {
        let section_chunks = group_sentences(section, embedder, config).await?;
        chunks.extend(section_chunks);
    }

    Ok(merge_short_chunks(chunks, config.min_chunk_tokens))
}
