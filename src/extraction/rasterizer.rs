// PDF page rasterization via poppler's pdftoppm
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use image::DynamicImage;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::config::{RENDER_DPI_PRIMARY, RENDER_DPI_REDUCED};
use crate::error::ExtractionError;

/// One render configuration. Tiers are tried in order; each is a genuinely
/// different setting, not a blind retry.
#[derive(Debug, Clone, Copy)]
enum RenderTier {
    Dpi(u32),
    EngineDefaults,
}

const RENDER_TIERS: [RenderTier; 3] = [
    RenderTier::Dpi(RENDER_DPI_PRIMARY),
    RenderTier::Dpi(RENDER_DPI_REDUCED),
    RenderTier::EngineDefaults,
];

/// Render every page of the PDF to a normalized RGB image.
///
/// Walks the degrade chain (200 DPI, 150 DPI, renderer defaults) and returns
/// the first tier that produces pages. All tiers exhausted means the
/// document cannot be rasterized at all.
pub fn rasterize_pages(pdf_path: &Path) -> Result<Vec<DynamicImage>, ExtractionError> {
    let mut last_error = String::from("no render tier produced output");

    for tier in RENDER_TIERS {
        match render_with_tier(pdf_path, tier) {
            Ok(pages) if !pages.is_empty() => {
                debug!(?tier, pages = pages.len(), "rasterized document");
                return Ok(pages);
            }
            Ok(_) => {
                warn!(?tier, "renderer produced no pages");
                last_error = format!("{tier:?} produced no pages");
            }
            Err(e) => {
                warn!(?tier, error = %e, "rasterization attempt failed");
                last_error = e.to_string();
            }
        }
    }

    Err(ExtractionError::RasterizationFailed(last_error))
}

fn render_with_tier(pdf_path: &Path, tier: RenderTier) -> Result<Vec<DynamicImage>> {
    // Page images land in a scratch directory that is removed when this
    // function returns, success or not.
    let out_dir = TempDir::new()?;
    let prefix = out_dir.path().join("page");

    let mut cmd = Command::new("pdftoppm");
    cmd.arg("-png");
    if let RenderTier::Dpi(dpi) = tier {
        cmd.args(["-r", &dpi.to_string()]);
    }
    cmd.arg(pdf_path).arg(&prefix);

    let output = cmd.output()?;
    if !output.status.success() {
        anyhow::bail!(
            "pdftoppm exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let mut page_files: Vec<PathBuf> = std::fs::read_dir(out_dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
        .collect();
    // pdftoppm zero-pads page numbers, so lexical order is page order
    page_files.sort();

    let mut pages = Vec::with_capacity(page_files.len());
    for file in &page_files {
        let img = image::open(file)?;
        pages.push(DynamicImage::ImageRgb8(img.to_rgb8()));
    }

    Ok(pages)
}
