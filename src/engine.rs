//! # Retrieval Orchestrator Module
//!
//! ## Purpose
//! Composes ingestion, chunking, embedding, the vector index, the fallback
//! context index, generation, and chat history into the question-answering
//! flow the API exposes.
//!
//! ## Input/Output Specification
//! - **Input**: Loaded case documents (ingestion), free-text legal questions
//!   (answering)
//! - **Output**: Ingestion statistics; generated answers logged to history
//!
//! ## Retrieval Flow
//! 1. Embed the question and take the top-K chunks by cosine similarity
//! 2. If retrieval is empty, look the question up in the fallback index
//! 3. If that misses too, a fixed placeholder context keeps the prompt shape
//!    stable so the model can decline gracefully

use crate::chat::{ChatHistoryStore, ChatMessage, ChatRole};
use crate::chunking::chunk_document;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::errors::Result;
use crate::fallback::FallbackContextIndex;
use crate::generation::{build_argument_prompt, Generator};
use crate::text_processing::word_count;
use crate::vector::{ChunkMetadata, VectorIndex};
use crate::CaseDocument;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Context handed to the model when both retrieval and fallback miss
pub const NO_CONTEXT_PLACEHOLDER: &str =
    "No relevant discussion found in the retrieved legal context.";

/// Counters reported after an ingestion run
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct IngestionStats {
    /// Documents that contributed at least one chunk
    pub documents_indexed: usize,
    /// Documents skipped because chunking produced nothing
    pub documents_skipped: usize,
    /// Total chunks added to the index
    pub chunks_indexed: usize,
}

/// Live engine counters
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct EngineStats {
    pub indexed_chunks: usize,
    pub fallback_entries: usize,
    pub history_messages: usize,
}

/// The retrieval-augmented answering engine
pub struct RagEngine {
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: Arc<VectorIndex>,
    fallback: FallbackContextIndex,
    history: Arc<ChatHistoryStore>,
}

impl RagEngine {
    /// Assemble the engine from its collaborators
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        index: Arc<VectorIndex>,
        fallback: FallbackContextIndex,
        history: Arc<ChatHistoryStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            generator,
            index,
            fallback,
            history,
        }
    }

    /// Chunk, embed, and index a batch of documents.
    ///
    /// The embedding backend is health-checked first; an unreachable backend
    /// aborts the whole batch so no partial index is built. All chunks are
    /// embedded and staged before the index is touched, so a failure anywhere
    /// in the batch leaves the previous index intact. Once staging succeeds
    /// the existing index is replaced, so re-ingestion never duplicates
    /// chunks. Documents whose chunking yields nothing are skipped with a
    /// warning.
    pub async fn ingest(&self, documents: Vec<CaseDocument>) -> Result<IngestionStats> {
        self.embedder.health_check().await?;

        let mut stats = IngestionStats::default();
        let mut staged: Vec<(String, Vec<f32>, ChunkMetadata)> = Vec::new();

        for document in documents {
            let chunks =
                chunk_document(&document.text, self.embedder.as_ref(), &self.config.chunking)
                    .await?;

            if chunks.is_empty() {
                tracing::warn!(
                    "Document in folder '{}' produced no chunks, skipping",
                    document.metadata.case_folder
                );
                stats.documents_skipped += 1;
                continue;
            }

            // Bounded concurrency; buffered() preserves chunk order
            let embeddings: Vec<Result<Vec<f32>>> =
                stream::iter(chunks.iter().map(|chunk| self.embedder.embed(chunk)))
                    .buffered(self.config.ingestion.max_concurrent_embeddings)
                    .collect()
                    .await;

            for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
                let embedding = embedding?;
                let metadata = ChunkMetadata {
                    case_folder: document.metadata.case_folder.clone(),
                    case_name: document.metadata.case_name.clone(),
                    num_tokens: word_count(&chunk),
                    num_chars: chunk.chars().count(),
                };
                staged.push((chunk, embedding, metadata));
            }
            stats.documents_indexed += 1;
        }

        // The whole batch embedded; only now replace the index
        self.index.clear().await?;
        for (chunk, embedding, metadata) in staged {
            self.index.add_chunk(chunk, embedding, metadata).await?;
            stats.chunks_indexed += 1;
        }
        self.index.flush()?;
        tracing::info!(
            "Ingestion complete: {} documents, {} chunks, {} skipped",
            stats.documents_indexed,
            stats.chunks_indexed,
            stats.documents_skipped
        );
        Ok(stats)
    }

    /// Assemble the context for a question.
    ///
    /// Top-K retrieved chunks joined by blank lines; the fallback index when
    /// retrieval is empty; the fixed placeholder when both miss.
    pub async fn retrieve_context(&self, question: &str) -> Result<String> {
        let query_embedding = self.embedder.embed(question).await?;
        let hits = self
            .index
            .search(
                &query_embedding,
                self.config.retrieval.top_k,
                self.config.retrieval.min_similarity,
            )
            .await;

        if !hits.is_empty() {
            let context = hits
                .iter()
                .map(|hit| hit.chunk.text.trim())
                .collect::<Vec<_>>()
                .join("\n\n");
            return Ok(context);
        }

        if let Some(context) = self.fallback.lookup(question) {
            tracing::debug!("Retrieval empty, fallback context matched");
            return Ok(context.to_string());
        }

        Ok(NO_CONTEXT_PLACEHOLDER.to_string())
    }

    /// Answer a question against the indexed corpus.
    ///
    /// The user turn is logged immediately; the assistant turn is logged only
    /// after the full answer has been generated, so the history never holds a
    /// partial answer.
    pub async fn answer(&self, question: &str) -> Result<String> {
        self.history.append(ChatRole::User, question)?;

        let context = self.retrieve_context(question).await?;
        let prompt = build_argument_prompt(question, &context);
        let answer = self.generator.complete(&prompt).await?;

        self.history.append(ChatRole::Assistant, &answer)?;
        Ok(answer)
    }

    /// Full chat history in append order
    pub fn history(&self) -> Result<Vec<ChatMessage>> {
        self.history.list()
    }

    /// Log externally supplied messages (the history import endpoint)
    pub fn append_message(&self, role: ChatRole, content: &str) -> Result<ChatMessage> {
        self.history.append(role, content)
    }

    /// Current engine counters
    pub async fn stats(&self) -> Result<EngineStats> {
        Ok(EngineStats {
            indexed_chunks: self.index.len().await,
            fallback_entries: self.fallback.len(),
            history_messages: self.history.len()?,
        })
    }
}

/// Split an answer into word-bounded segments for streaming.
///
/// Words are grouped `words_per_segment` at a time; the final segment holds
/// the remainder. Empty input yields no segments.
pub fn segment_answer(text: &str, words_per_segment: usize) -> Vec<String> {
    if words_per_segment == 0 {
        return vec![text.to_string()];
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(words_per_segment)
        .map(|group| group.join(" "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::{CaseMetadata, TextSource};
    use async_trait::async_trait;

    /// Generator stub that returns its prompt so tests can inspect the
    /// context that reached the model
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    fn metadata(name: &str, folder: &str, snippet: &str) -> CaseMetadata {
        CaseMetadata {
            case_name: name.to_string(),
            court: "Test Court".to_string(),
            judge: "Test Judge".to_string(),
            docket_number: None,
            date_filed: None,
            snippet: snippet.to_string(),
            case_folder: folder.to_string(),
        }
    }

    fn document(name: &str, folder: &str, text: &str) -> CaseDocument {
        CaseDocument {
            text: text.to_string(),
            source: TextSource::Pdf,
            metadata: metadata(name, folder, ""),
        }
    }

    fn build_engine_with(
        dir: &tempfile::TempDir,
        cases: &[CaseMetadata],
        embedder: Arc<dyn crate::embedding::Embedder>,
    ) -> RagEngine {
        let config = Arc::new(Config::default());
        let db = sled::open(dir.path().join("db")).unwrap();
        let index = Arc::new(VectorIndex::open(&db, false).unwrap());
        let history = Arc::new(ChatHistoryStore::open(&db).unwrap());
        RagEngine::new(
            config,
            embedder,
            Arc::new(EchoGenerator),
            index,
            FallbackContextIndex::build(cases),
            history,
        )
    }

    fn build_engine(dir: &tempfile::TempDir, cases: &[CaseMetadata]) -> RagEngine {
        build_engine_with(dir, cases, Arc::new(HashingEmbedder::new(128)))
    }

    #[tokio::test]
    async fn ingest_then_retrieve_finds_relevant_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(&dir, &[]);

        let docs = vec![
            document(
                "State v. Doe",
                "state-v-doe",
                "Facts: The defendant moved to dismiss for lack of subject matter jurisdiction \
                 over the claims presented. Ruling: The court granted the motion to dismiss.",
            ),
            document(
                "Acme v. Widget",
                "acme-v-widget",
                "Facts: The contract dispute concerned late delivery of industrial widgets. \
                 Ruling: Damages were awarded to the plaintiff in full.",
            ),
        ];

        let stats = engine.ingest(docs).await.unwrap();
        assert_eq!(stats.documents_indexed, 2);
        assert!(stats.chunks_indexed >= 2);

        let context = engine
            .retrieve_context("what about subject matter jurisdiction?")
            .await
            .unwrap();
        assert!(context.contains("jurisdiction"));
    }

    #[tokio::test]
    async fn reingestion_does_not_duplicate_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(&dir, &[]);
        let doc = || {
            document(
                "A",
                "a",
                "Ruling: The motion was denied after full briefing by both parties involved.",
            )
        };

        let first = engine.ingest(vec![doc()]).await.unwrap();
        let second = engine.ingest(vec![doc()]).await.unwrap();
        assert_eq!(first.chunks_indexed, second.chunks_indexed);
        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.indexed_chunks, second.chunks_indexed);
    }

    /// Embedder that starts failing after a fixed number of calls
    struct FlakyEmbedder {
        inner: HashingEmbedder,
        calls: std::sync::atomic::AtomicUsize,
        fail_after: usize,
    }

    #[async_trait]
    impl crate::embedding::Embedder for FlakyEmbedder {
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn name(&self) -> &str {
            "flaky"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                + 1;
            if call > self.fail_after {
                return Err(crate::errors::RagError::EmbeddingFailed {
                    text_preview: text.chars().take(20).collect(),
                    reason: "injected failure".to_string(),
                });
            }
            self.inner.embed(text).await
        }
    }

    #[tokio::test]
    async fn failed_ingestion_leaves_previous_index_intact() {
        let dir = tempfile::tempdir().unwrap();
        // Calls 1-4 succeed, everything after fails: the first document
        // ingests fully, the second fails while embedding its chunk
        let engine = build_engine_with(
            &dir,
            &[],
            Arc::new(FlakyEmbedder {
                inner: HashingEmbedder::new(128),
                calls: std::sync::atomic::AtomicUsize::new(0),
                fail_after: 4,
            }),
        );

        let first = engine
            .ingest(vec![document(
                "A",
                "a",
                "Ruling: The court denied the motion to dismiss the case.",
            )])
            .await
            .unwrap();
        assert_eq!(first.chunks_indexed, 1);

        let result = engine
            .ingest(vec![document(
                "B",
                "b",
                "Case: One v. Two. Ruling: The complaint was dismissed.",
            )])
            .await;
        assert!(result.is_err());

        // The aborted batch must not leave a cleared or partial index behind
        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.indexed_chunks, first.chunks_indexed);
    }

    #[tokio::test]
    async fn empty_index_falls_back_to_case_name_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(
            &dir,
            &[metadata(
                "Smith v. Jones",
                "smith-v-jones",
                "The appeal was dismissed as untimely.",
            )],
        );

        let context = engine
            .retrieve_context("what happened in smith v. jones?")
            .await
            .unwrap();
        assert!(context.starts_with("The appeal was dismissed as untimely."));
        assert!(context.contains("Judge: Test Judge"));
    }

    #[tokio::test]
    async fn both_misses_yield_placeholder_context() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(&dir, &[]);

        let context = engine.retrieve_context("anything").await.unwrap();
        assert_eq!(context, NO_CONTEXT_PLACEHOLDER);
    }

    #[tokio::test]
    async fn answer_logs_user_then_assistant() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(&dir, &[]);

        let answer = engine.answer("Was venue proper?").await.unwrap();
        assert!(answer.contains("Was venue proper?"));

        let history = engine.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "Was venue proper?");
        assert_eq!(history[1].role, ChatRole::Assistant);
    }

    #[test]
    fn answer_segmentation_groups_words() {
        let segments = segment_answer("one two three four five", 2);
        assert_eq!(segments, vec!["one two", "three four", "five"]);
        assert!(segment_answer("", 2).is_empty());
        assert_eq!(segment_answer("a b", 0), vec!["a b"]);
    }
}
