//! Error types for the ledgerscan library.
//!
//! Two types cover two layers:
//!
//! * [`AnalysisError`]: everything that can stop the analysis of **one**
//!   document: an unreadable file, an unsupported extension, a missing
//!   reference text, a failed HTTP call, or model output that is not JSON.
//!   Returned as `Err(AnalysisError)` from [`crate::analyze::try_analyze`].
//!
//! * [`ExtractionError`]: the two terminal failures of the response
//!   extractor. Wrapped by [`AnalysisError::Extraction`].
//!
//! None of these errors is fatal to a run. [`crate::analyze::analyze`] logs
//! them and returns `None`; batch analysis stores them per document in
//! [`crate::output::DocumentOutcome`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned while analysing a single document.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The document could not be read, rasterised, or encoded.
    #[error("Failed to encode '{path}': {detail}")]
    Encoding { path: PathBuf, detail: String },

    /// The file extension is outside `.pdf`, `.png`, `.jpg`, `.jpeg`.
    #[error("Unsupported file type: '{extension}' ({path})\nSupported: .pdf, .png, .jpg, .jpeg")]
    UnsupportedFormat { path: PathBuf, extension: String },

    // ── Reference errors ──────────────────────────────────────────────────
    /// One of the three reference texts is absent or unreadable.
    #[error("Reference file '{path}' could not be read: {source}")]
    MissingReference {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Inference errors ──────────────────────────────────────────────────
    /// The completion call failed: transport error, non-2xx status, or a
    /// response body that does not have the expected shape.
    ///
    /// `body` holds the raw response text whenever the server sent one.
    #[error("{}", transport_message(*status, message, body.as_deref()))]
    Transport {
        kind: TransportKind,
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },

    /// The model answered, but its output is not JSON.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a result file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task join failure, runtime creation).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// What went wrong on the way to or from the inference endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request did not complete within `api_timeout_secs`.
    Timeout,
    /// No connection could be established.
    Connect,
    /// The endpoint answered with a non-2xx status.
    Status,
    /// Anything else: a dropped connection mid-response, a body that is not
    /// a chat completion.
    Protocol,
}

impl AnalysisError {
    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Only transport failures qualify: timeouts, connection failures, rate
    /// limiting (429), and server errors (5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Transport { kind, status, .. } => match kind {
                TransportKind::Timeout | TransportKind::Connect => true,
                TransportKind::Status => {
                    matches!(status, Some(code) if *code == 429 || (500..=599).contains(code))
                }
                TransportKind::Protocol => false,
            },
            _ => false,
        }
    }
}

fn transport_message(status: Option<u16>, message: &str, body: Option<&str>) -> String {
    let mut out = match status {
        Some(code) => format!("Inference API error (HTTP {code}): {message}"),
        None => format!("Inference API error: {message}"),
    };
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        out.push_str("\nAPI response: ");
        out.push_str(body);
    }
    out
}

/// Terminal failures of the response extractor.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Neither the whole text nor any ```` ```json ```` block parsed.
    #[error("No valid JSON or JSON markdown block found in generated content: {content}")]
    NoJsonFound { content: String },

    /// A ```` ```json ```` block was found but its content is not JSON.
    #[error("Extracted content is not valid JSON: {block}")]
    InvalidFencedJson {
        block: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_display_includes_status_and_body() {
        let e = AnalysisError::Transport {
            kind: TransportKind::Status,
            status: Some(401),
            message: "Unauthorized".into(),
            body: Some(r#"{"error":"invalid key"}"#.into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 401"), "got: {msg}");
        assert!(msg.contains("invalid key"), "got: {msg}");
    }

    #[test]
    fn transport_display_without_body() {
        let e = AnalysisError::Transport {
            kind: TransportKind::Connect,
            status: None,
            message: "connection refused".into(),
            body: None,
        };
        let msg = e.to_string();
        assert!(!msg.contains("API response"), "got: {msg}");
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn unsupported_format_display() {
        let e = AnalysisError::UnsupportedFormat {
            path: PathBuf::from("scan.tiff"),
            extension: ".tiff".into(),
        };
        assert!(e.to_string().contains(".tiff"));
    }

    #[test]
    fn retryable_classification() {
        let transport = |kind: TransportKind, status: Option<u16>, message: &str| {
            AnalysisError::Transport {
                kind,
                status,
                message: message.into(),
                body: None,
            }
        };
        use TransportKind::*;
        assert!(transport(Status, Some(429), "Too Many Requests").is_retryable());
        assert!(transport(Status, Some(503), "Service Unavailable").is_retryable());
        assert!(!transport(Status, Some(401), "Unauthorized").is_retryable());
        assert!(!transport(Status, Some(400), "Bad Request").is_retryable());
        assert!(transport(Timeout, None, "request timed out").is_retryable());
        assert!(transport(Connect, None, "failed to connect").is_retryable());
        assert!(!transport(Protocol, Some(200), "response has no choices").is_retryable());
    }

    #[test]
    fn dropped_connection_is_not_retried() {
        let e = AnalysisError::Transport {
            kind: TransportKind::Protocol,
            status: None,
            message: "connection closed before message completed".into(),
            body: None,
        };
        assert!(!e.is_retryable());
        assert!(!AnalysisError::InvalidConfig("x".into()).is_retryable());
    }

    #[test]
    fn extraction_messages() {
        let e = ExtractionError::NoJsonFound {
            content: "not json at all".into(),
        };
        assert!(e
            .to_string()
            .contains("No valid JSON or JSON markdown block found"));

        let source = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let e = ExtractionError::InvalidFencedJson {
            block: "{invalid}".into(),
            source,
        };
        assert!(e.to_string().contains("not valid JSON"));
    }
}
