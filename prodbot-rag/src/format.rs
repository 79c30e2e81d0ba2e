//! Rendering of retrieved candidates into the prompt context block.

use crate::document::{Candidate, Document};

/// Returned when there is nothing to render.
pub const NO_DOCUMENTS: &str = "No relevant documents found.";

/// Placed between rendered documents.
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

const MISSING: &str = "N/A";

/// Render one document as a titled review block.
pub fn format_document(document: &Document) -> String {
    format!(
        "Title: {}\nPrice: {}\nRating: {}\nReviews:\n{}",
        document.meta("product_title").unwrap_or(MISSING),
        document.meta("price").unwrap_or(MISSING),
        document.meta("rating").unwrap_or(MISSING),
        document.content.trim(),
    )
}

/// Render candidates in order, or [`NO_DOCUMENTS`] when there are none.
///
/// The output depends only on the documents' content and metadata, so the
/// prompt and the evaluation input always agree for the same candidates.
pub fn format_documents(candidates: &[Candidate]) -> String {
    if candidates.is_empty() {
        return NO_DOCUMENTS.to_string();
    }

    candidates
        .iter()
        .map(|c| format_document(&c.document))
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}
