//! End-to-end pipeline coverage: case folders on disk through PDF
//! extraction, chunking, indexing, and retrieval.

use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use legal_rag_engine::{
    chat::ChatHistoryStore,
    config::Config,
    embedding::HashingEmbedder,
    engine::RagEngine,
    errors::Result,
    fallback::FallbackContextIndex,
    generation::Generator,
    ingestion::load_case_documents,
    vector::VectorIndex,
    TextSource,
};

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

/// Write a single-page PDF containing `text`, with the cross-reference
/// offsets computed from the actual byte positions.
fn write_minimal_pdf(path: &Path, text: &str) {
    let mut pdf: Vec<u8> = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");

    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
    ];

    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );

    fs::write(path, pdf).unwrap();
}

fn build_engine(dir: &tempfile::TempDir) -> RagEngine {
    let config = Arc::new(Config::default());
    let db = sled::open(dir.path().join("db")).unwrap();
    RagEngine::new(
        config,
        Arc::new(HashingEmbedder::new(128)),
        Arc::new(EchoGenerator),
        Arc::new(VectorIndex::open(&db, false).unwrap()),
        FallbackContextIndex::build(&[]),
        Arc::new(ChatHistoryStore::open(&db).unwrap()),
    )
}

#[tokio::test]
async fn pdf_and_snippet_folders_flow_through_to_retrieval() {
    let dataset = tempfile::tempdir().unwrap();

    let pdf_case = dataset.path().join("state-v-doe");
    fs::create_dir_all(&pdf_case).unwrap();
    write_minimal_pdf(
        &pdf_case.join("opinion.pdf"),
        "Facts: The defendant moved to dismiss for lack of jurisdiction over the claims. \
         Ruling: The court granted the motion and dismissed the case.",
    );
    fs::write(
        pdf_case.join("data.json"),
        r#"{"caseName": "State v. Doe", "court": "District Court", "judge": "Hon. Carter",
            "opinions": [{"snippet": "unused because the PDF has text"}]}"#,
    )
    .unwrap();

    let snippet_case = dataset.path().join("acme-v-widget");
    fs::create_dir_all(&snippet_case).unwrap();
    fs::write(
        snippet_case.join("data.json"),
        r#"{"caseName": "Acme v. Widget", "court": "Circuit Court", "judge": "Hon. Lee",
            "opinions": [{"snippet": "The contract dispute concerned late delivery of goods."}]}"#,
    )
    .unwrap();

    let documents = load_case_documents(dataset.path(), "data.json").unwrap();
    assert_eq!(documents.len(), 2);

    let pdf_doc = documents
        .iter()
        .find(|d| d.metadata.case_folder == "state-v-doe")
        .unwrap();
    assert_eq!(pdf_doc.source, TextSource::Pdf);
    assert!(pdf_doc.text.contains("jurisdiction"));

    let snippet_doc = documents
        .iter()
        .find(|d| d.metadata.case_folder == "acme-v-widget")
        .unwrap();
    assert_eq!(snippet_doc.source, TextSource::Snippet);

    let engine_dir = tempfile::tempdir().unwrap();
    let engine = build_engine(&engine_dir);
    let stats = engine.ingest(documents).await.unwrap();
    assert_eq!(stats.documents_indexed, 2);
    assert!(stats.chunks_indexed >= 2);

    let context = engine
        .retrieve_context("what about lack of jurisdiction?")
        .await
        .unwrap();
    assert!(context.contains("jurisdiction"));
}
