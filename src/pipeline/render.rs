//! PDF rasterisation: render the first page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not run on Tokio worker threads. The render is moved onto
//! the blocking pool.
//!
//! Only page one is ever loaded. A primary document (invoice, receipt, bank
//! slip) carries its transaction on the first page; later pages are not
//! touched.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rasterise the first page of the PDF at `pdf_path`.
pub async fn render_first_page(
    pdf_path: &Path,
    config: &AnalysisConfig,
) -> Result<DynamicImage, AnalysisError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let lib_path = config.pdfium_lib_path.clone();

    tokio::task::spawn_blocking(move || {
        render_first_page_blocking(&path, dpi, max_pixels, lib_path.as_deref())
    })
    .await
    .map_err(|e| AnalysisError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of first-page rendering.
fn render_first_page_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    lib_path: Option<&Path>,
) -> Result<DynamicImage, AnalysisError> {
    let encoding_err = |detail: String| AnalysisError::Encoding {
        path: pdf_path.to_path_buf(),
        detail,
    };

    let pdfium = bind_pdfium(lib_path)
        .map_err(|e| encoding_err(format!("cannot bind pdfium library: {:?}", e)))?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| encoding_err(format!("cannot open PDF: {:?}", e)))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);
    if total_pages == 0 {
        return Err(encoding_err("PDF has no pages".into()));
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let page = pages
        .get(0)
        .map_err(|e| encoding_err(format!("cannot load page 1: {:?}", e)))?;

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| encoding_err(format!("rasterisation failed: {:?}", e)))?;

    let image = bitmap.as_image();
    debug!("Rendered page 1 → {}x{} px", image.width(), image.height());

    Ok(image)
}

/// Bind to the pdfium shared library.
///
/// `lib_path` may point at the library file itself or at the directory that
/// holds it. Without a path the system library search path is used.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, PdfiumError> {
    let bindings = match lib_path {
        Some(p) if p.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))?
        }
        Some(p) => Pdfium::bind_to_library(PathBuf::from(p))?,
        None => Pdfium::bind_to_system_library()?,
    };
    Ok(Pdfium::new(bindings))
}
