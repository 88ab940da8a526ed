//! Response extraction: recover a JSON value from the model's text output.
//!
//! Models are told to answer with bare JSON but regularly wrap it in a
//! ```` ```json ```` fence anyway. Extraction therefore tries an ordered list
//! of [`ExtractionStrategy`] values and stops at the first that yields JSON:
//!
//! 1. [`ExtractionStrategy::Direct`]: the whole text is JSON.
//! 2. [`ExtractionStrategy::FencedJson`]: the first ```` ```json ```` block
//!    is JSON.
//!
//! A fenced block that exists but does not parse is terminal; no further
//! heuristics are attempted.

use crate::error::ExtractionError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\n([\s\S]*?)\n```").unwrap());

/// One way of finding JSON in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Parse the entire text.
    Direct,
    /// Parse the content of the first ```` ```json ```` fenced block.
    FencedJson,
}

/// Strategies in the order they are tried.
pub const STRATEGIES: [ExtractionStrategy; 2] =
    [ExtractionStrategy::Direct, ExtractionStrategy::FencedJson];

/// Result of applying a single strategy.
#[derive(Debug)]
enum Attempt {
    Parsed(Value),
    /// The strategy does not apply; try the next one.
    NotApplicable,
    /// The strategy applied and failed; stop.
    Failed(ExtractionError),
}

impl ExtractionStrategy {
    fn attempt(self, text: &str) -> Attempt {
        match self {
            ExtractionStrategy::Direct => match serde_json::from_str(text) {
                Ok(v) => Attempt::Parsed(v),
                Err(_) => Attempt::NotApplicable,
            },
            ExtractionStrategy::FencedJson => match RE_JSON_FENCE.captures(text) {
                None => Attempt::NotApplicable,
                Some(caps) => {
                    let block = &caps[1];
                    match serde_json::from_str(block) {
                        Ok(v) => Attempt::Parsed(v),
                        Err(source) => Attempt::Failed(ExtractionError::InvalidFencedJson {
                            block: block.to_string(),
                            source,
                        }),
                    }
                }
            },
        }
    }
}

/// Extract a JSON value from generated text.
///
/// Pure: the same input always yields the same output.
pub fn extract_json(text: &str) -> Result<Value, ExtractionError> {
    for strategy in STRATEGIES {
        match strategy.attempt(text) {
            Attempt::Parsed(v) => return Ok(v),
            Attempt::NotApplicable => continue,
            Attempt::Failed(e) => return Err(e),
        }
    }
    Err(ExtractionError::NoJsonFound {
        content: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_json() {
        assert_eq!(extract_json(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn bare_json_with_surrounding_whitespace() {
        assert_eq!(extract_json("\n  [1, 2]\n").unwrap(), json!([1, 2]));
    }

    #[test]
    fn fenced_json_after_prose() {
        let text = "Here is the result:\n```json\n{\"a\":1}\n```";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn multiline_fenced_array() {
        let text = "```json\n[\n  {\"account\": \"7170\", \"amount\": 12.5},\n  {\"account\": \"57221\", \"amount\": 2.63}\n]\n```\nLet me know if you need more.";
        let v = extract_json(text).unwrap();
        assert_eq!(v.as_array().map(Vec::len), Some(2));
        assert_eq!(v[1]["account"], "57221");
    }

    #[test]
    fn first_fenced_block_wins() {
        let text = "```json\n{\"n\":1}\n```\nand\n```json\n{\"n\":2}\n```";
        assert_eq!(extract_json(text).unwrap(), json!({"n": 1}));
    }

    #[test]
    fn no_json_anywhere() {
        let err = extract_json("not json at all").unwrap_err();
        assert!(matches!(err, ExtractionError::NoJsonFound { .. }));
        assert!(err
            .to_string()
            .contains("No valid JSON or JSON markdown block found"));
    }

    #[test]
    fn invalid_fenced_block_is_terminal() {
        let err = extract_json("```json\n{invalid}\n```").unwrap_err();
        match &err {
            ExtractionError::InvalidFencedJson { block, .. } => assert_eq!(block, "{invalid}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn untagged_fence_is_not_recognised() {
        let err = extract_json("```\n{\"a\":1}\n```").unwrap_err();
        assert!(matches!(err, ExtractionError::NoJsonFound { .. }));
    }

    #[test]
    fn idempotent() {
        let text = "Result:\n```json\n{\"a\":[1,2,3]}\n```";
        let first = extract_json(text).unwrap();
        let second = extract_json(text).unwrap();
        assert_eq!(first, second);
    }
}
