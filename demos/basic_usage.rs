//! Basic usage example for the paperlens library.
//!
//! Searches a category, ranks by citation count, and saves the top paper
//! into an in-memory library.

use paperlens::analysis::HttpAnalysisService;
use paperlens::library::MemoryLibraryBackend;
use paperlens::sources::{ArxivFeed, SemanticScholarClient};
use paperlens::{Collaborators, Config, PaperService, SearchRequest, SortHint};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Real feed and citation graph, throwaway library
    let service = PaperService::new(
        Collaborators {
            feed: Arc::new(ArxivFeed::new(&config.feed)?),
            citations: Arc::new(SemanticScholarClient::new(&config.citations)?),
            analysis: Arc::new(HttpAnalysisService::new(&config.analysis)?),
            library: Arc::new(MemoryLibraryBackend::new()),
        },
        &config,
        "demo",
    );

    let request = SearchRequest::category("cs.CL")
        .sort(SortHint::Popular)
        .max_results(5);
    let papers = service.search(request).await?;

    println!("Found {} papers\n", papers.len());
    for (i, paper) in papers.iter().enumerate() {
        println!("{}. {}", i + 1, paper.title);
        println!("   Authors: {}", paper.author_line());
        if let Some(year) = paper.year() {
            println!("   Year: {}", year);
        }
        println!("   Citations: {}", paper.citation_count);
        if let Some(pdf) = &paper.pdf_url {
            println!("   PDF: {}", pdf);
        }
    }

    if let Some(top) = papers.first() {
        let saved = service.library_add(top.clone()).await?;
        println!("\nSaved '{}' (added {})", saved.title, saved.date_added.unwrap_or_default());
    }

    Ok(())
}
