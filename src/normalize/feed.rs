//! Feed entry normalization.

use crate::models::{Paper, PaperSource, UNKNOWN_AUTHOR};
use crate::normalize::{clean_text, non_empty};
use crate::sources::{RawEntry, RawLink};

/// Base URL for synthesized arXiv PDF links
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

/// Extract the arXiv id from an entry id URI (`.../abs/<id>`)
///
/// The version suffix is kept, so `http://arxiv.org/abs/2301.12345v2`
/// yields `2301.12345v2`.
pub fn extract_arxiv_id(entry_id: &str) -> Option<String> {
    let entry_id = entry_id.trim();
    let pos = entry_id.find("/abs/")?;
    let id = entry_id[pos + "/abs/".len()..].trim_matches('/');
    (!id.is_empty()).then(|| id.to_string())
}

fn is_pdf_link(link: &RawLink) -> bool {
    link.link_type.as_deref() == Some("application/pdf")
        || link.title.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("pdf"))
}

/// Convert one raw feed entry into a canonical paper
///
/// The PDF URL comes from an explicit PDF link when there is one, otherwise
/// it is synthesized from the arXiv id. Without either, the paper cannot be
/// analyzed.
pub fn normalize(entry: RawEntry) -> Paper {
    let id = entry.id.as_deref().map(str::trim).unwrap_or_default().to_string();
    let arxiv_id = extract_arxiv_id(&id);

    let title = entry.title.as_deref().map(clean_text).unwrap_or_default();
    let mut paper = Paper::new(id, title, PaperSource::Feed);

    paper.authors = entry
        .authors
        .iter()
        .map(|a| non_empty(a.name.as_deref()).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()))
        .collect();
    paper.summary = non_empty(entry.summary.as_deref());
    paper.published = non_empty(entry.published.as_deref());
    paper.updated = non_empty(entry.updated.as_deref());
    paper.doi = non_empty(entry.arxiv_doi.as_deref()).or_else(|| non_empty(entry.doi.as_deref()));

    paper.pdf_url = entry
        .links
        .iter()
        .find(|link| is_pdf_link(link))
        .and_then(|link| non_empty(Some(&link.href)))
        .or_else(|| {
            arxiv_id
                .as_ref()
                .map(|id| format!("{}/{}.pdf", ARXIV_PDF_URL, id))
        });
    paper.arxiv_id = arxiv_id;

    paper
}

/// Normalize a batch, preserving feed order
pub fn normalize_all(entries: Vec<RawEntry>) -> Vec<Paper> {
    entries.into_iter().map(normalize).collect()
}
