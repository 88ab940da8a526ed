//! Input documents: kind detection, directory discovery, random selection.
//!
//! A document's kind is decided by its lower-cased extension only. Files
//! with any other extension still form a valid [`Document`] (their bytes can
//! be read and encoded), but [`DocumentKind::content_type`] refuses them, so
//! they never reach the inference endpoint.

use crate::error::AnalysisError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Detected format of an input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
    /// Anything else; holds the original extension including the dot
    /// (empty when the file has none).
    Other(String),
}

impl DocumentKind {
    /// Detect the kind from a path's extension, case-insensitively.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("pdf") => DocumentKind::Pdf,
            Some("png") => DocumentKind::Png,
            Some("jpg") | Some("jpeg") => DocumentKind::Jpeg,
            Some(other) => DocumentKind::Other(format!(".{other}")),
            None => DocumentKind::Other(String::new()),
        }
    }

    /// MIME type of the image that will be sent for this kind.
    ///
    /// PDFs are rasterised to PNG before encoding, so they report
    /// `image/png`.
    pub fn content_type(&self, path: &Path) -> Result<&'static str, AnalysisError> {
        match self {
            DocumentKind::Pdf | DocumentKind::Png => Ok("image/png"),
            DocumentKind::Jpeg => Ok("image/jpeg"),
            DocumentKind::Other(ext) => Err(AnalysisError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: ext.clone(),
            }),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, DocumentKind::Other(_))
    }
}

/// An input document: a path plus its detected kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    kind: DocumentKind,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = DocumentKind::from_path(&path);
        Self { path, kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> &DocumentKind {
        &self.kind
    }

    /// See [`DocumentKind::content_type`].
    pub fn content_type(&self) -> Result<&'static str, AnalysisError> {
        self.kind.content_type(&self.path)
    }
}

/// Recursively find every supported document under `root`.
///
/// A file `root` is returned as-is when supported. Unreadable directory
/// entries are skipped. The result is sorted by path.
pub fn discover_documents(root: &Path) -> Vec<Document> {
    if root.is_file() {
        let doc = Document::new(root);
        return if doc.kind().is_supported() {
            vec![doc]
        } else {
            vec![]
        };
    }

    let mut docs: Vec<Document> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| Document::new(e.into_path()))
        .filter(|d| d.kind().is_supported())
        .collect();

    docs.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("Discovered {} documents under {}", docs.len(), root.display());
    docs
}

/// Pick one document uniformly at random, or `None` when `docs` is empty.
pub fn pick_random<'a, R: Rng + ?Sized>(docs: &'a [Document], rng: &mut R) -> Option<&'a Document> {
    docs.choose(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn kind_detection_is_case_insensitive() {
        assert_eq!(DocumentKind::from_path(Path::new("a.PDF")), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_path(Path::new("a.Png")), DocumentKind::Png);
        assert_eq!(DocumentKind::from_path(Path::new("a.jpg")), DocumentKind::Jpeg);
        assert_eq!(DocumentKind::from_path(Path::new("a.JPEG")), DocumentKind::Jpeg);
        assert_eq!(
            DocumentKind::from_path(Path::new("a.tiff")),
            DocumentKind::Other(".tiff".into())
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("README")),
            DocumentKind::Other(String::new())
        );
    }

    #[test]
    fn pdf_is_tagged_as_png() {
        let doc = Document::new("invoices/march.pdf");
        assert_eq!(doc.content_type().unwrap(), "image/png");
    }

    #[test]
    fn content_type_for_images() {
        assert_eq!(Document::new("x.png").content_type().unwrap(), "image/png");
        assert_eq!(Document::new("x.jpg").content_type().unwrap(), "image/jpeg");
        assert_eq!(Document::new("x.jpeg").content_type().unwrap(), "image/jpeg");
    }

    #[test]
    fn unsupported_extension_fails_content_type() {
        let err = Document::new("scan.gif").content_type().unwrap_err();
        match err {
            AnalysisError::UnsupportedFormat { extension, .. } => assert_eq!(extension, ".gif"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("q1").join("jan");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("b.PNG"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(nested.join("a.pdf"), b"x").unwrap();
        std::fs::write(nested.join("c.jpeg"), b"x").unwrap();

        let docs = discover_documents(dir.path());
        let names: Vec<String> = docs
            .iter()
            .map(|d| d.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.PNG", "a.pdf", "c.jpeg"]);
    }

    #[test]
    fn discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("only.jpg");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(discover_documents(&file).len(), 1);

        let other = dir.path().join("only.bmp");
        std::fs::write(&other, b"x").unwrap();
        assert!(discover_documents(&other).is_empty());
    }

    #[test]
    fn pick_random_handles_empty_and_nonempty() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(pick_random(&[], &mut rng).is_none());

        let docs = vec![Document::new("a.png"), Document::new("b.pdf")];
        let picked = pick_random(&docs, &mut rng).unwrap();
        assert!(docs.contains(picked));
    }
}
