//! Configuration types for document analysis.
//!
//! Every knob of the pipeline lives in [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. The API key and model are plain fields: the
//! library never reads the process environment on its own, the CLI does that
//! once and hands the resulting value in.

use crate::error::AnalysisError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Default completions endpoint (OpenRouter, OpenAI-compatible wire format).
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Configuration for analysing primary documents.
///
/// # Example
/// ```rust
/// use ledgerscan::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .api_key("sk-or-...")
///     .model("google/gemini-2.5-flash")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Bearer token sent in the `Authorization` header.
    ///
    /// Not validated up front: an empty or wrong key surfaces as an HTTP 401
    /// from the endpoint.
    pub api_key: String,

    /// Model identifier forwarded verbatim in the request body.
    pub model: String,

    /// Completions URL. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Where the three reference texts live.
    pub references: ReferencePaths,

    /// Rendering DPI for the first page of a PDF. Range: 72–400. Default: 72.
    ///
    /// 72 DPI renders the page at its native PDF size (one pixel per point).
    pub dpi: u32,

    /// Cap on either edge of a rendered PDF page, in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Per-request timeout for the completion call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Retries on transient inference failures. Default: 0 (single shot).
    ///
    /// Only timeouts, connection errors, HTTP 429 and HTTP 5xx are retried.
    pub max_retries: u32,

    /// Base delay of the exponential backoff in milliseconds. Default: 500.
    pub retry_backoff_ms: u64,

    /// Documents in flight at once during batch analysis. Default: 4.
    pub concurrency: usize,

    /// Directory (or full path) of the pdfium shared library.
    /// If None, pdfium is looked up on the system library path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Batch progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            references: ReferencePaths::default(),
            dpi: 72,
            max_rendered_pixels: 4000,
            api_timeout_secs: 120,
            max_retries: 0,
            retry_backoff_ms: 500,
            concurrency: 4,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("references", &self.references)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("concurrency", &self.concurrency)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn references(mut self, paths: ReferencePaths) -> Self {
        self.config.references = paths;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(AnalysisError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(AnalysisError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(AnalysisError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(AnalysisError::InvalidConfig(format!(
                "Endpoint must be an HTTP/HTTPS URL, got '{}'",
                c.endpoint
            )));
        }
        Ok(self.config)
    }
}

/// Locations of the three reference texts that ground the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePaths {
    /// System instructions. Default: `prompt.txt`.
    pub system_prompt: PathBuf,
    /// Chart of accounts. Default: `plan.json`.
    pub chart_of_accounts: PathBuf,
    /// Example of the expected output JSON. Default: `output_format.json`.
    pub output_format: PathBuf,
}

impl Default for ReferencePaths {
    fn default() -> Self {
        Self {
            system_prompt: PathBuf::from("prompt.txt"),
            chart_of_accounts: PathBuf::from("plan.json"),
            output_format: PathBuf::from("output_format.json"),
        }
    }
}

impl ReferencePaths {
    /// Default file names resolved against `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let defaults = Self::default();
        Self {
            system_prompt: dir.join(defaults.system_prompt),
            chart_of_accounts: dir.join(defaults.chart_of_accounts),
            output_format: dir.join(defaults.output_format),
        }
    }
}
