//! # Document Ingestion Module
//!
//! ## Purpose
//! Loads a court case collection from a directory tree. Each case lives in
//! its own subfolder containing zero-or-more PDF files and an optional JSON
//! metadata file; folders with neither are skipped.
//!
//! ## Input/Output Specification
//! - **Input**: Dataset root directory, metadata file name
//! - **Output**: `CaseDocument` values with normalized text and metadata
//! - **Fallback**: When PDF extraction yields nothing, the metadata snippet
//!   becomes the document text
//!
//! ## Error Handling
//! Ingestion favors best-effort partial success: unreadable PDFs and
//! malformed JSON are logged and the affected file or folder is skipped while
//! processing continues. Only dataset-level I/O failures abort the load.

use crate::errors::{RagError, Result};
use crate::text_processing::TextNormalizer;
use crate::{CaseDocument, CaseMetadata, TextSource};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

/// Raw metadata shape as found in the per-case JSON files
#[derive(Debug, Deserialize)]
struct RawCaseMetadata {
    #[serde(rename = "caseName", default)]
    case_name: String,
    #[serde(default)]
    court: String,
    #[serde(default)]
    judge: String,
    #[serde(rename = "docketNumber")]
    docket_number: Option<String>,
    #[serde(rename = "dateFiled")]
    date_filed: Option<String>,
    #[serde(default)]
    opinions: Vec<RawOpinion>,
}

#[derive(Debug, Deserialize)]
struct RawOpinion {
    #[serde(default)]
    snippet: String,
}

impl RawCaseMetadata {
    fn into_metadata(self, case_folder: &str) -> CaseMetadata {
        let snippet = self
            .opinions
            .first()
            .map(|o| o.snippet.trim().to_string())
            .unwrap_or_default();

        CaseMetadata {
            case_name: self.case_name,
            court: self.court,
            judge: self.judge,
            docket_number: self.docket_number,
            date_filed: self
                .date_filed
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            snippet,
            case_folder: case_folder.to_string(),
        }
    }
}

/// Load and normalize all case documents under `dataset_dir`.
///
/// Folders with neither a PDF nor a metadata file are skipped silently;
/// folders whose PDFs and snippet both yield no text are skipped with a
/// warning. Folder order is sorted for reproducible ingestion.
pub fn load_case_documents<P: AsRef<Path>>(
    dataset_dir: P,
    metadata_file_name: &str,
) -> Result<Vec<CaseDocument>> {
    let dataset_dir = dataset_dir.as_ref();
    let normalizer = TextNormalizer::new();
    let mut documents = Vec::new();

    for case_folder in sorted_case_folders(dataset_dir)? {
        let folder_name = case_folder
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        match load_single_case(&case_folder, &folder_name, metadata_file_name, &normalizer) {
            Ok(Some(document)) => documents.push(document),
            Ok(None) => {}
            Err(e) if e.is_skippable() => {
                tracing::warn!("Skipping folder '{}': {}", folder_name, e);
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        "Loaded {} case documents from {:?}",
        documents.len(),
        dataset_dir
    );
    Ok(documents)
}

/// Load just the metadata of every case that has a metadata file.
///
/// Used to build the fallback context index without touching any PDF.
pub fn load_case_metadata<P: AsRef<Path>>(
    dataset_dir: P,
    metadata_file_name: &str,
) -> Result<Vec<CaseMetadata>> {
    let mut all = Vec::new();

    for case_folder in sorted_case_folders(dataset_dir.as_ref())? {
        let folder_name = case_folder
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let metadata_path = case_folder.join(metadata_file_name);
        if !metadata_path.exists() {
            continue;
        }

        match read_metadata(&metadata_path, &folder_name) {
            Ok(metadata) => all.push(metadata),
            Err(e) => tracing::warn!("Skipping metadata in '{}': {}", folder_name, e),
        }
    }

    Ok(all)
}

fn sorted_case_folders(dataset_dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut folders = Vec::new();
    for entry in std::fs::read_dir(dataset_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders)
}

fn load_single_case(
    case_folder: &Path,
    folder_name: &str,
    metadata_file_name: &str,
    normalizer: &TextNormalizer,
) -> Result<Option<CaseDocument>> {
    let metadata_path = case_folder.join(metadata_file_name);
    let pdf_files = list_pdf_files(case_folder)?;

    if pdf_files.is_empty() && !metadata_path.exists() {
        tracing::debug!("Skipping folder '{}': no PDF or JSON found", folder_name);
        return Ok(None);
    }

    let metadata = if metadata_path.exists() {
        read_metadata(&metadata_path, folder_name)?
    } else {
        CaseMetadata {
            case_name: String::new(),
            court: String::new(),
            judge: String::new(),
            docket_number: None,
            date_filed: None,
            snippet: String::new(),
            case_folder: folder_name.to_string(),
        }
    };

    // Unreadable individual PDFs are logged and skipped; the folder still
    // counts as long as something yields text
    let mut pdf_texts = Vec::new();
    for pdf_file in &pdf_files {
        match pdf_extract::extract_text(pdf_file) {
            Ok(text) if !text.trim().is_empty() => pdf_texts.push(text),
            Ok(_) => {
                tracing::warn!("PDF {:?} contained no extractable text", pdf_file);
            }
            Err(e) => {
                let err = RagError::PdfExtraction {
                    file: pdf_file.display().to_string(),
                    details: e.to_string(),
                };
                tracing::warn!("{}", err);
            }
        }
    }

    let combined = pdf_texts.join("\n\n");
    let cleaned = normalizer.normalize(&combined);

    let (text, source) = if !cleaned.is_empty() {
        (cleaned, TextSource::Pdf)
    } else if !metadata.snippet.is_empty() {
        (normalizer.normalize(&metadata.snippet), TextSource::Snippet)
    } else {
        return Err(RagError::EmptyDocument {
            folder: folder_name.to_string(),
        });
    };

    Ok(Some(CaseDocument {
        text,
        source,
        metadata,
    }))
}

fn list_pdf_files(case_folder: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut pdf_files = Vec::new();
    for entry in std::fs::read_dir(case_folder)? {
        let entry = entry?;
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf {
            pdf_files.push(path);
        }
    }
    pdf_files.sort();
    Ok(pdf_files)
}

fn read_metadata(metadata_path: &Path, folder_name: &str) -> Result<CaseMetadata> {
    let content =
        std::fs::read_to_string(metadata_path).map_err(|e| RagError::MalformedMetadata {
            file: metadata_path.display().to_string(),
            details: e.to_string(),
        })?;

    let raw: RawCaseMetadata =
        serde_json::from_str(&content).map_err(|e| RagError::MalformedMetadata {
            file: metadata_path.display().to_string(),
            details: e.to_string(),
        })?;

    Ok(raw.into_metadata(folder_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_case(
        dir: &Path,
        folder: &str,
        metadata: Option<&str>,
        extra_file: Option<(&str, &str)>,
    ) {
        let case_dir = dir.join(folder);
        fs::create_dir_all(&case_dir).unwrap();
        if let Some(json) = metadata {
            fs::write(case_dir.join("data.json"), json).unwrap();
        }
        if let Some((name, content)) = extra_file {
            fs::write(case_dir.join(name), content).unwrap();
        }
    }

    #[test]
    fn snippet_fallback_when_no_pdf() {
        let dir = tempfile::tempdir().unwrap();
        write_case(
            dir.path(),
            "doe-v-roe",
            Some(
                r#"{"caseName": "Doe v. Roe", "court": "District Court", "judge": "Smith",
                    "opinions": [{"snippet": "Defendant argued lack of jurisdiction."}]}"#,
            ),
            None,
        );

        let documents = load_case_documents(dir.path(), "data.json").unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].source, TextSource::Snippet);
        assert_eq!(
            documents[0].text,
            "Defendant argued lack of jurisdiction."
        );
        assert_eq!(documents[0].metadata.case_name, "Doe v. Roe");
    }

    #[test]
    fn folder_without_pdf_or_json_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path(), "empty-case", None, Some(("notes.txt", "n/a")));

        let documents = load_case_documents(dir.path(), "data.json").unwrap();
        assert!(documents.is_empty());
    }

    #[test]
    fn malformed_json_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path(), "bad-json", Some("{not json"), None);
        write_case(
            dir.path(),
            "good-case",
            Some(r#"{"caseName": "Good", "opinions": [{"snippet": "A valid snippet here."}]}"#),
            None,
        );

        let documents = load_case_documents(dir.path(), "data.json").unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].metadata.case_name, "Good");
    }

    #[test]
    fn metadata_only_pass_collects_all_cases() {
        let dir = tempfile::tempdir().unwrap();
        write_case(
            dir.path(),
            "a-case",
            Some(r#"{"caseName": "A v. B", "judge": "Jones", "court": "Circuit"}"#),
            None,
        );
        write_case(dir.path(), "no-meta", None, Some(("x.txt", "ignored")));

        let metadata = load_case_metadata(dir.path(), "data.json").unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].case_name, "A v. B");
        assert_eq!(metadata[0].case_folder, "a-case");
    }

    #[test]
    fn parses_date_filed_leniently() {
        let dir = tempfile::tempdir().unwrap();
        write_case(
            dir.path(),
            "dated",
            Some(
                r#"{"caseName": "Dated", "dateFiled": "2019-05-07",
                    "opinions": [{"snippet": "Some snippet text."}]}"#,
            ),
            None,
        );
        write_case(
            dir.path(),
            "undated",
            Some(
                r#"{"caseName": "Undated", "dateFiled": "not a date",
                    "opinions": [{"snippet": "Other snippet text."}]}"#,
            ),
            None,
        );

        let documents = load_case_documents(dir.path(), "data.json").unwrap();
        let dated = documents
            .iter()
            .find(|d| d.metadata.case_name == "Dated")
            .unwrap();
        assert_eq!(
            dated.metadata.date_filed,
            NaiveDate::from_ymd_opt(2019, 5, 7)
        );
        let undated = documents
            .iter()
            .find(|d| d.metadata.case_name == "Undated")
            .unwrap();
        assert!(undated.metadata.date_filed.is_none());
    }
}
