//! Output types and result persistence.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Ledger entries extracted from one document.
///
/// The model is asked for an array of entry objects, but whatever JSON it
/// returned is kept verbatim; no schema is enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerEntrySet(pub Value);

impl LedgerEntrySet {
    /// Number of entries: the array length, or 1 for any non-array value.
    pub fn len(&self) -> usize {
        match &self.0 {
            Value::Array(a) => a.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Pretty JSON with four-space indentation. Non-ASCII text is kept as-is.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.0.serialize(&mut ser)?;
        // serde_json only ever writes valid UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl From<Value> for LedgerEntrySet {
    fn from(v: Value) -> Self {
        Self(v)
    }
}

/// Timings and sizes for one analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Size of the input file in bytes.
    pub file_size_bytes: u64,
    /// Length of the base64 image payload.
    pub encoded_bytes: usize,
    /// Prompt tokens, when the endpoint reports usage.
    pub input_tokens: Option<u32>,
    /// Completion tokens, when the endpoint reports usage.
    pub output_tokens: Option<u32>,
    /// Inference attempts made (1 unless retries were needed).
    pub attempts: u32,
    pub encode_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Successful analysis of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub source: PathBuf,
    pub entries: LedgerEntrySet,
    pub stats: AnalysisStats,
}

/// One item of a batch: the document and what became of it.
#[derive(Debug)]
pub struct DocumentOutcome {
    /// 1-indexed position in the batch.
    pub index: usize,
    pub source: PathBuf,
    pub result: Result<AnalysisOutput, AnalysisError>,
}

/// Aggregate figures for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_documents: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl BatchStats {
    pub fn from_outcomes(outcomes: &[DocumentOutcome], total_duration_ms: u64) -> Self {
        let ok: Vec<&AnalysisOutput> = outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect();
        Self {
            total_documents: outcomes.len(),
            succeeded: ok.len(),
            failed: outcomes.len() - ok.len(),
            total_input_tokens: ok
                .iter()
                .filter_map(|o| o.stats.input_tokens)
                .map(u64::from)
                .sum(),
            total_output_tokens: ok
                .iter()
                .filter_map(|o| o.stats.output_tokens)
                .map(u64::from)
                .sum(),
            total_duration_ms,
        }
    }
}

/// Write `entries` to `<output_dir>/<stem>.json`.
///
/// The directory is created if absent. The file is written to a temporary
/// sibling first and renamed into place, so readers never see a partial
/// result.
pub async fn write_result(
    output_dir: &Path,
    source: &Path,
    entries: &LedgerEntrySet,
) -> Result<PathBuf, AnalysisError> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result".to_string());
    let path = output_dir.join(format!("{stem}.json"));

    let write_err = |source: std::io::Error| AnalysisError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(write_err)?;

    let json = entries
        .to_pretty_json()
        .map_err(|e| AnalysisError::Internal(format!("serialise result: {e}")))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(write_err)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn len_counts_array_items() {
        assert_eq!(LedgerEntrySet(json!([{}, {}, {}])).len(), 3);
        assert_eq!(LedgerEntrySet(json!({"a": 1})).len(), 1);
        assert!(LedgerEntrySet(json!([])).is_empty());
    }

    #[test]
    fn pretty_json_uses_four_spaces_and_keeps_unicode() {
        let e = LedgerEntrySet(json!([{"Description": "Ieņēmumi"}]));
        let s = e.to_pretty_json().unwrap();
        assert_eq!(s, "[\n    {\n        \"Description\": \"Ieņēmumi\"\n    }\n]");
    }

    #[test]
    fn transparent_serialisation() {
        let e = LedgerEntrySet(json!([1]));
        assert_eq!(serde_json::to_string(&e).unwrap(), "[1]");
    }

    #[tokio::test]
    async fn write_result_creates_dir_and_names_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("results");
        let entries = LedgerEntrySet(json!([{"account": "6110", "amount": 100}]));

        let path = write_result(&out_dir, Path::new("in/2024/invoice-17.pdf"), &entries)
            .await
            .expect("write should succeed");

        assert_eq!(path, out_dir.join("invoice-17.json"));
        let text = std::fs::read_to_string(&path).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, entries.0);
        assert!(!out_dir.join("invoice-17.json.tmp").exists());
    }

    #[test]
    fn batch_stats_counts() {
        let ok = |index: usize| DocumentOutcome {
            index,
            source: PathBuf::from(format!("{index}.png")),
            result: Ok(AnalysisOutput {
                source: PathBuf::from(format!("{index}.png")),
                entries: LedgerEntrySet(json!([])),
                stats: AnalysisStats {
                    input_tokens: Some(100),
                    output_tokens: Some(20),
                    ..Default::default()
                },
            }),
        };
        let failed = DocumentOutcome {
            index: 3,
            source: PathBuf::from("3.gif"),
            result: Err(AnalysisError::InvalidConfig("x".into())),
        };
        let stats = BatchStats::from_outcomes(&[ok(1), ok(2), failed], 42);
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_input_tokens, 200);
        assert_eq!(stats.total_output_tokens, 40);
        assert_eq!(stats.total_duration_ms, 42);
    }
}
