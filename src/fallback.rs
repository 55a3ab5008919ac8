//! # Fallback Context Module
//!
//! ## Purpose
//! Case-name-keyed context lookup used when vector retrieval returns nothing.
//! Each case contributes one entry keyed by its lowercased case name, valued
//! with the opinion snippet plus judge and court lines.
//!
//! ## Input/Output Specification
//! - **Input**: Case metadata, a free-text query
//! - **Output**: The context string of the matching case, if any
//! - **Matching**: Case-insensitive substring containment of the case name in
//!   the query; the longest matching name wins ties

use crate::CaseMetadata;

/// Immutable fallback index built once at startup
pub struct FallbackContextIndex {
    entries: Vec<(String, String)>,
}

impl FallbackContextIndex {
    /// Build the index from case metadata. Cases with an empty name are
    /// skipped since an empty key would match every query.
    pub fn build(cases: &[CaseMetadata]) -> Self {
        let mut entries = Vec::new();

        for case in cases {
            let key = case.case_name.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }

            let judge = non_empty_or(&case.judge, "Unknown");
            let court = non_empty_or(&case.court, "Unknown");
            let context = format!(
                "{}\n\nJudge: {}\nCourt: {}",
                case.snippet.trim(),
                judge,
                court
            );
            entries.push((key, context));
        }

        tracing::debug!("Fallback index built with {} entries", entries.len());
        Self { entries }
    }

    /// Find the context of the case whose name appears in the query.
    ///
    /// When several case names appear, the longest name wins: it is the most
    /// specific mention ("smith v. jones" beats "smith").
    pub fn lookup(&self, query: &str) -> Option<&str> {
        let query = query.to_lowercase();

        self.entries
            .iter()
            .filter(|(name, _)| query.contains(name.as_str()))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, context)| context.as_str())
    }

    /// Number of indexed cases
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no cases
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default
    } else {
        trimmed
    }
}
