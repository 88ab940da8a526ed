//! Batch analysis: many documents, bounded concurrency.
//!
//! Each document runs the same sequential pipeline as
//! [`crate::analyze::try_analyze`]; up to `config.concurrency` of them are in
//! flight at once. Outcomes are emitted in completion order (sort by
//! `index` if order matters). A failed document yields an `Err` outcome and
//! never affects the others.

use crate::analyze::analyze_with_client;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::output::{BatchStats, DocumentOutcome};
use crate::pipeline::input::Document;
use crate::pipeline::llm::InferenceClient;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of per-document outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = DocumentOutcome> + Send>>;

/// Analyse `documents`, streaming outcomes as they complete.
///
/// Progress callbacks fire per document; `on_batch_start` fires before the
/// stream is returned. `on_batch_complete` is left to the consumer (see
/// [`analyze_batch`]) because only it knows when the stream is drained.
pub fn analyze_stream(
    documents: Vec<Document>,
    config: &AnalysisConfig,
) -> Result<OutcomeStream, AnalysisError> {
    let total = documents.len();
    info!(
        "Starting batch of {} documents (concurrency {})",
        total, config.concurrency
    );

    let client = InferenceClient::new(config)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let concurrency = config.concurrency;
    let config = config.clone();

    let s = stream::iter(documents.into_iter().enumerate().map(move |(i, doc)| {
        let client = client.clone();
        let cfg = config.clone();
        async move {
            let index = i + 1;
            if let Some(ref cb) = cfg.progress_callback {
                cb.on_document_start(index, total, doc.path());
            }

            let result = analyze_with_client(&client, &doc, &cfg).await;

            match &result {
                Ok(out) => {
                    if let Some(ref cb) = cfg.progress_callback {
                        cb.on_document_complete(index, total, out.entries.len());
                    }
                }
                Err(e) => {
                    warn!("Document {}/{} ({}) failed: {}", index, total, doc.path().display(), e);
                    if let Some(ref cb) = cfg.progress_callback {
                        cb.on_document_error(index, total, &e.to_string());
                    }
                }
            }

            DocumentOutcome {
                index,
                source: doc.path().to_path_buf(),
                result,
            }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

/// Analyse `documents` and collect every outcome, sorted by batch index.
pub async fn analyze_batch(
    documents: Vec<Document>,
    config: &AnalysisConfig,
) -> Result<(Vec<DocumentOutcome>, BatchStats), AnalysisError> {
    let start = Instant::now();
    let total = documents.len();

    let mut outcomes: Vec<DocumentOutcome> = analyze_stream(documents, config)?.collect().await;
    outcomes.sort_by_key(|o| o.index);

    let stats = BatchStats::from_outcomes(&outcomes, start.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {}/{} documents, {}ms",
        stats.succeeded, total, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.succeeded);
    }

    Ok((outcomes, stats))
}
