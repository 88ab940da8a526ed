//! # ledgerscan
//!
//! Turn primary accounting documents (invoices, receipts, bank slips) into
//! candidate ledger entries using a Vision Language Model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document (.pdf / .png / .jpg / .jpeg)
//!  │
//!  ├─ 1. Encode      image bytes as-is, or first PDF page → PNG; base64
//!  ├─ 2. References  system prompt, chart of accounts, output-format example
//!  ├─ 3. Prompt      system message + user message (instructions, image)
//!  ├─ 4. Inference   one POST to an OpenAI-compatible completions endpoint
//!  └─ 5. Extract     bare JSON, else the first ```json fenced block
//! ```
//!
//! The entries are returned verbatim as parsed JSON. Nothing here checks
//! that they balance or that the accounts exist; that is the caller's job.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ledgerscan::{analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AnalysisConfig::builder()
//!         .api_key(std::env::var("OPENROUTER_API_KEY").unwrap_or_default())
//!         .model("google/gemini-2.5-flash")
//!         .build()
//!         .expect("valid config");
//!
//!     match analyze("documents/invoice.pdf", &config).await {
//!         Some(out) => println!("{}", out.entries.to_pretty_json().unwrap()),
//!         None => eprintln!("Analysis failed."),
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ledgerscan` binary (clap, anyhow, tracing-subscriber, indicatif, dialoguer) |
//!
//! PDF input needs the pdfium shared library at runtime, either on the
//! system library path or at [`AnalysisConfig::pdfium_lib_path`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_bytes, analyze_sync, analyze_to_file, try_analyze};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, ReferencePaths, DEFAULT_ENDPOINT};
pub use error::{AnalysisError, ExtractionError, TransportKind};
pub use output::{
    write_result, AnalysisOutput, AnalysisStats, BatchStats, DocumentOutcome, LedgerEntrySet,
};
pub use pipeline::extract::extract_json;
pub use pipeline::input::{discover_documents, pick_random, Document, DocumentKind};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{analyze_batch, analyze_stream, OutcomeStream};
