// lopdf helper - Pure Rust PDF text access when poppler is not installed
use anyhow::{Context, Result};
use lopdf::Document;
use std::path::Path;

/// Load a PDF document using lopdf
pub fn load_pdf(path: &Path) -> Result<Document> {
    Document::load(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Embedded text of the given 1-based page range (all pages when unbounded)
pub fn extract_text(path: &Path, first_page: Option<u32>, last_page: Option<u32>) -> Result<String> {
    let document = load_pdf(path)?;
    let pages: Vec<u32> = document
        .get_pages()
        .keys()
        .copied()
        .filter(|page| first_page.map_or(true, |first| *page >= first))
        .filter(|page| last_page.map_or(true, |last| *page <= last))
        .collect();
    if pages.is_empty() {
        return Ok(String::new());
    }
    Ok(document.extract_text(&pages)?)
}
