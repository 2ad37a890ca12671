// PDF page rasterization through poppler's pdftoppm
use image::DynamicImage;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::command::run_to_string;
use crate::types::{IngestError, Result};

/// Resolution and optional 1-based inclusive page range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterRequest {
    pub dpi: u32,
    pub first_page: Option<u32>,
    pub last_page: Option<u32>,
}

/// Converts PDF pages to images, in page order
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, path: &Path, request: &RasterRequest) -> Result<Vec<DynamicImage>>;
}

#[derive(Debug, Clone, Default)]
pub struct PdftoppmRasterizer;

impl PdftoppmRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize(&self, path: &Path, request: &RasterRequest) -> Result<Vec<DynamicImage>> {
        if !path.is_file() {
            return Err(IngestError::RasterizationFailed(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let workdir = tempfile::tempdir()
            .map_err(|e| IngestError::RasterizationFailed(format!("temp dir: {}", e)))?;
        let prefix = workdir.path().join("page");

        let mut command = Command::new("pdftoppm");
        command.arg("-r").arg(request.dpi.to_string());
        if let Some(first) = request.first_page {
            command.arg("-f").arg(first.to_string());
        }
        if let Some(last) = request.last_page {
            command.arg("-l").arg(last.to_string());
        }
        command.arg("-png").arg(path).arg(&prefix);
        run_to_string(&mut command)
            .map_err(|e| IngestError::RasterizationFailed(format!("{:#}", e)))?;

        let pages = rendered_pages(workdir.path())?;
        if pages.is_empty() {
            return Err(IngestError::RasterizationFailed(format!(
                "no pages rendered from {}",
                path.display()
            )));
        }
        debug!("rasterized {} pages at {} dpi", pages.len(), request.dpi);

        pages
            .iter()
            .map(|page| {
                image::open(page).map_err(|e| {
                    IngestError::RasterizationFailed(format!("{}: {}", page.display(), e))
                })
            })
            .collect()
    }
}

// pdftoppm names pages <prefix>-<n>.png with variable zero padding
fn page_number(path: &Path) -> Option<u32> {
    path.file_stem()?.to_str()?.rsplit('-').next()?.parse().ok()
}

fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "png"))
        .filter_map(|p| page_number(&p).map(|n| (n, p)))
        .collect();
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_page_number_parsing() {
        assert_eq!(page_number(Path::new("/tmp/x/page-1.png")), Some(1));
        assert_eq!(page_number(Path::new("/tmp/x/page-012.png")), Some(12));
        assert_eq!(page_number(Path::new("/tmp/x/notes.png")), None);
    }

    #[test]
    fn test_rendered_pages_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-2.png", "page-1.png", "page-3.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let pages = rendered_pages(dir.path()).unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-2.png", "page-10.png"]);
    }

    #[test]
    fn test_missing_file_fails() {
        let request = RasterRequest { dpi: 300, first_page: None, last_page: None };
        let err = PdftoppmRasterizer::new()
            .rasterize(Path::new("/nonexistent/scan.pdf"), &request)
            .unwrap_err();
        assert!(matches!(err, IngestError::RasterizationFailed(_)));
    }
}
