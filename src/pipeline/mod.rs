//! Pipeline stages for document analysis.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ references ──▶ llm ──▶ extract
//! (kind)    (pdfium,   (base64)   (3 texts)      (POST)  (JSON)
//!           PDF only)
//! ```
//!
//! 1. [`input`]: detect the document kind; discover and pick documents
//! 2. [`render`]: rasterise the first PDF page; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]: base64 the image bytes and tag their content type
//! 4. [`references`]: read system prompt, chart of accounts, output format
//! 5. [`llm`]: build the two-message request and call the endpoint;
//!    the only stage with network I/O
//! 6. [`extract`]: recover JSON from the generated text

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod references;
pub mod render;
