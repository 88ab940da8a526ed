//! Reference texts: system prompt, chart of accounts, output-format example.
//!
//! The three files are read fresh for every analysis so edits take effect
//! on the next document without a restart. There is no fallback content: a
//! missing file fails the analysis.

use crate::config::ReferencePaths;
use crate::error::AnalysisError;
use std::path::Path;
use tracing::debug;

/// The three texts that ground the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceBundle {
    pub system_prompt: String,
    pub chart_of_accounts: String,
    pub output_format: String,
}

/// Read all three reference texts.
///
/// The reads run concurrently; the first failure is returned.
pub async fn load_references(paths: &ReferencePaths) -> Result<ReferenceBundle, AnalysisError> {
    let (system_prompt, chart_of_accounts, output_format) = tokio::try_join!(
        read_reference(&paths.system_prompt),
        read_reference(&paths.chart_of_accounts),
        read_reference(&paths.output_format),
    )?;

    Ok(ReferenceBundle {
        system_prompt,
        chart_of_accounts,
        output_format,
    })
}

async fn read_reference(path: &Path) -> Result<String, AnalysisError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AnalysisError::MissingReference {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Loaded reference {} ({} bytes)", path.display(), text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_refs(dir: &Path) -> ReferencePaths {
        let paths = ReferencePaths::in_dir(dir);
        std::fs::write(&paths.system_prompt, "Ты бухгалтер.").unwrap();
        std::fs::write(&paths.chart_of_accounts, r#"{"6110": "Ieņēmumi"}"#).unwrap();
        std::fs::write(&paths.output_format, r#"[{"account": ""}]"#).unwrap();
        paths
    }

    #[tokio::test]
    async fn loads_all_three_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_refs(dir.path());

        let bundle = load_references(&paths).await.expect("all files present");
        assert_eq!(bundle.system_prompt, "Ты бухгалтер.");
        assert_eq!(bundle.chart_of_accounts, r#"{"6110": "Ieņēmumi"}"#);
        assert_eq!(bundle.output_format, r#"[{"account": ""}]"#);
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_refs(dir.path());
        std::fs::remove_file(&paths.chart_of_accounts).unwrap();

        let err = load_references(&paths).await.unwrap_err();
        match err {
            AnalysisError::MissingReference { path, .. } => {
                assert_eq!(path, paths.chart_of_accounts)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_fresh_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_refs(dir.path());

        let first = load_references(&paths).await.unwrap();
        std::fs::write(&paths.system_prompt, "updated").unwrap();
        let second = load_references(&paths).await.unwrap();

        assert_ne!(first.system_prompt, second.system_prompt);
        assert_eq!(second.system_prompt, "updated");
    }
}
