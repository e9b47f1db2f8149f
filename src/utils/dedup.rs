//! Paper identity and deduplication.
//!
//! A paper is identified by `id`. When a record has no `id`, its arXiv id and
//! then its normalized title stand in as the key.

use std::collections::HashSet;

use crate::models::Paper;

/// Normalize a title for comparison
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find a paper by key: `id` first, then arXiv id, then title
pub fn find_by_key(papers: &[Paper], key: &str) -> Option<usize> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    if let Some(idx) = papers.iter().position(|p| p.id == key) {
        return Some(idx);
    }

    if let Some(idx) = papers
        .iter()
        .position(|p| p.arxiv_id.as_deref() == Some(key))
    {
        return Some(idx);
    }

    let wanted = normalize_title(key);
    papers
        .iter()
        .position(|p| normalize_title(&p.title) == wanted)
}

/// Check whether two records describe the same paper
pub fn is_same_paper(a: &Paper, b: &Paper) -> bool {
    if !a.id.is_empty() && !b.id.is_empty() {
        if a.id == b.id {
            return true;
        }
        // Two distinct ids can still be the same arXiv paper seen via different shapes
        return matches!((&a.arxiv_id, &b.arxiv_id), (Some(x), Some(y)) if x == y);
    }

    if let (Some(x), Some(y)) = (&a.arxiv_id, &b.arxiv_id) {
        return x == y;
    }

    normalize_title(&a.title) == normalize_title(&b.title)
}

/// Find the position of a record matching `paper`
pub fn position_of(papers: &[Paper], paper: &Paper) -> Option<usize> {
    papers.iter().position(|p| is_same_paper(p, paper))
}

/// Remove duplicate papers, keeping the first occurrence
pub fn deduplicate_papers(papers: Vec<Paper>) -> Vec<Paper> {
    let mut kept: Vec<Paper> = Vec::with_capacity(papers.len());
    let mut ids: HashSet<String> = HashSet::new();

    for paper in papers {
        if !paper.id.is_empty() && ids.contains(&paper.id) {
            continue;
        }
        if position_of(&kept, &paper).is_some() {
            continue;
        }
        if !paper.id.is_empty() {
            ids.insert(paper.id.clone());
        }
        kept.push(paper);
    }

    kept
}
