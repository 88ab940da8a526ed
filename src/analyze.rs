//! Single-document analysis entry points.
//!
//! The pipeline for one document is strictly sequential:
//!
//! ```text
//! encode ──▶ references ──▶ build request ──▶ POST ──▶ extract JSON
//! ```
//!
//! [`try_analyze`] returns every failure as an [`AnalysisError`].
//! [`analyze`] is the boundary the CLI uses: it logs the failure with its
//! context and returns `None`, so one bad document never ends a session.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::output::{AnalysisOutput, AnalysisStats, LedgerEntrySet};
use crate::pipeline::encode;
use crate::pipeline::extract::extract_json;
use crate::pipeline::input::Document;
use crate::pipeline::llm::{CompletionRequest, InferenceClient};
use crate::pipeline::references::load_references;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

/// Analyse a document, returning `None` on any failure.
///
/// The error is logged at `ERROR` level first; for transport failures the
/// log line includes the response body.
pub async fn analyze(
    path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Option<AnalysisOutput> {
    let path = path.as_ref();
    match try_analyze(path, config).await {
        Ok(output) => Some(output),
        Err(e) => {
            error!("Analysis of {} failed: {}", path.display(), e);
            None
        }
    }
}

/// Analyse a document and return its ledger entries.
///
/// # Errors
/// - [`AnalysisError::Encoding`]: unreadable file or PDF render failure
/// - [`AnalysisError::MissingReference`]: a reference text is missing
/// - [`AnalysisError::UnsupportedFormat`]: extension not `.pdf/.png/.jpg/.jpeg`
/// - [`AnalysisError::Transport`]: the completion call failed
/// - [`AnalysisError::Extraction`]: the model output is not JSON
pub async fn try_analyze(
    path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let client = InferenceClient::new(config)?;
    analyze_with_client(&client, &Document::new(path.as_ref()), config).await
}

/// Pipeline body shared by single and batch analysis.
pub(crate) async fn analyze_with_client(
    client: &InferenceClient,
    doc: &Document,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let total_start = Instant::now();
    let path = doc.path();
    info!("Analyzing file: {}", path.display());

    let file_size_bytes = tokio::fs::metadata(path)
        .await
        .map_err(|e| AnalysisError::Encoding {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?
        .len();
    info!(
        "File size: {:.2} MB",
        file_size_bytes as f64 / (1024.0 * 1024.0)
    );

    // ── Step 1: Encode ───────────────────────────────────────────────────
    let encode_start = Instant::now();
    let payload = encode::encode_payload(doc, config).await?;
    let encode_duration_ms = encode_start.elapsed().as_millis() as u64;

    // ── Step 2: Reference texts ──────────────────────────────────────────
    let refs = load_references(&config.references).await?;

    // ── Step 3: Content type ─────────────────────────────────────────────
    let image = encode::EncodedImage {
        content_type: doc.content_type()?,
        data: payload,
    };
    let encoded_bytes = image.data.len();

    // ── Step 4: Build and send ───────────────────────────────────────────
    let request = CompletionRequest::build(&config.model, &refs, &image);
    drop(image);
    let completion = client.complete(&request).await?;
    debug!(
        "Generated content: {} chars in {}ms",
        completion.content.len(),
        completion.duration_ms
    );

    // ── Step 5: Extract JSON ─────────────────────────────────────────────
    let entries = LedgerEntrySet(extract_json(&completion.content)?);

    let stats = AnalysisStats {
        file_size_bytes,
        encoded_bytes,
        input_tokens: completion.usage.map(|u| u.prompt_tokens),
        output_tokens: completion.usage.map(|u| u.completion_tokens),
        attempts: completion.attempts,
        encode_duration_ms,
        llm_duration_ms: completion.duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Analysis complete: {} entries from {} in {}ms",
        entries.len(),
        path.display(),
        stats.total_duration_ms
    );

    Ok(AnalysisOutput {
        source: path.to_path_buf(),
        entries,
        stats,
    })
}

/// Analyse a document and write its entries to `<output_dir>/<stem>.json`.
///
/// Returns the written path alongside the output.
pub async fn analyze_to_file(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<(AnalysisOutput, std::path::PathBuf), AnalysisError> {
    let output = try_analyze(path, config).await?;
    let written = crate::output::write_result(output_dir.as_ref(), &output.source, &output.entries)
        .await?;
    Ok((output, written))
}

/// Synchronous wrapper around [`try_analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalysisError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(try_analyze(path, config))
}

/// Analyse a document held in memory.
///
/// `extension` (e.g. `"pdf"`, `".jpg"`) decides how the bytes are treated.
/// They are written to a managed temp file that is removed on return.
pub async fn analyze_bytes(
    bytes: &[u8],
    extension: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut tmp = tempfile::Builder::new()
        .prefix("ledgerscan-")
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| AnalysisError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| AnalysisError::Internal(format!("tempfile write: {e}")))?;
    tmp.flush()
        .map_err(|e| AnalysisError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when this returns
    try_analyze(tmp.path(), config).await
}
