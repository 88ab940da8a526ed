//! Document encoding: file → base64 image payload for the multimodal API.
//!
//! PNG and JPEG files are sent byte-for-byte (no transcoding). A PDF has its
//! first page rasterised and PNG-encoded, since the vision endpoint accepts
//! images only.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::pipeline::input::{Document, DocumentKind};
use crate::pipeline::render;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// A base64 image plus the MIME type of the bytes it encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: String,
    pub content_type: &'static str,
}

impl EncodedImage {
    /// `data:<content-type>;base64,<payload>` for an `image_url` part.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, self.data)
    }
}

/// Base64 payload of a document, without content-type resolution.
///
/// PDFs are rasterised; every other path is read and encoded as-is, whatever
/// its extension.
pub async fn encode_payload(
    doc: &Document,
    config: &AnalysisConfig,
) -> Result<String, AnalysisError> {
    match doc.kind() {
        DocumentKind::Pdf => {
            let img = render::render_first_page(doc.path(), config).await?;
            encode_png(&img).map_err(|e| AnalysisError::Encoding {
                path: doc.path().to_path_buf(),
                detail: format!("PNG encoding failed: {}", e),
            })
        }
        _ => encode_file(doc.path()).await,
    }
}

/// Encode a document into an [`EncodedImage`].
///
/// The payload is produced first; an unsupported extension is reported by the
/// content-type step that follows.
pub async fn encode_document(
    doc: &Document,
    config: &AnalysisConfig,
) -> Result<EncodedImage, AnalysisError> {
    let data = encode_payload(doc, config).await?;
    let content_type = doc.content_type()?;
    Ok(EncodedImage { data, content_type })
}

/// Read a file and base64 its raw bytes.
pub async fn encode_file(path: &Path) -> Result<String, AnalysisError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AnalysisError::Encoding {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    let b64 = STANDARD.encode(&bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    Ok(b64)
}

/// PNG-encode a rendered page and base64 the result.
pub fn encode_png(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());
    Ok(b64)
}
