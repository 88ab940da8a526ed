//! Inference: build the multimodal completion request and send it.
//!
//! The request layout is fixed:
//!
//! 1. **System message**: the system-prompt reference text, verbatim.
//! 2. **User message**: two parts, in order: the instruction text from
//!    [`crate::prompts::user_prompt`], then the document image as a data URL.
//!
//! [`InferenceClient`] performs one POST per attempt with bearer auth. Any
//! transport error, non-2xx status, or unexpected body surfaces as
//! [`AnalysisError::Transport`], with the response body attached when the
//! server sent one.
//!
//! ## Retry Strategy
//!
//! Off by default (`max_retries = 0`). When enabled, only transient failures
//! are retried (see [`AnalysisError::is_retryable`]) with exponential backoff
//! `retry_backoff_ms * 2^attempt`, capped at 30 s.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, TransportKind};
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::references::ReferenceBundle;
use crate::prompts::user_prompt;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

// ── Request types ────────────────────────────────────────────────────────

/// Body of a chat-completions POST.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

impl CompletionRequest {
    /// Assemble the two-message request for one document.
    pub fn build(model: &str, refs: &ReferenceBundle, image: &EncodedImage) -> Self {
        let text = user_prompt(&refs.chart_of_accounts, &refs.output_format);

        Self {
            model: model.to_string(),
            messages: vec![
                Message {
                    role: Role::System,
                    content: MessageContent::Text(refs.system_prompt.clone()),
                },
                Message {
                    role: Role::User,
                    content: MessageContent::Parts(vec![
                        ContentPart::Text { text },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.data_url(),
                            },
                        },
                    ]),
                },
            ],
        }
    }
}

// ── Response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

/// Generated content of a successful call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: Option<Usage>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}

// ── Client ───────────────────────────────────────────────────────────────

/// HTTP client for the completions endpoint.
#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl InferenceClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| AnalysisError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    /// Send `request`, retrying transient failures when configured.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AnalysisError> {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            match self.send_once(request).await {
                Ok((content, usage)) => {
                    let duration_ms = start.elapsed().as_millis() as u64;
                    if let Some(u) = usage {
                        debug!(
                            "Completion: {} input tokens, {} output tokens, {}ms",
                            u.prompt_tokens, u.completion_tokens, duration_ms
                        );
                    }
                    return Ok(Completion {
                        content,
                        usage,
                        attempts: attempt + 1,
                        duration_ms,
                    });
                }
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    let backoff = backoff_duration(attempt, self.retry_backoff_ms);
                    attempt += 1;
                    warn!(
                        "Inference call failed: {}; retry {}/{} after {:?}",
                        e, attempt, self.max_retries, backoff
                    );
                    sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        request: &CompletionRequest,
    ) -> Result<(String, Option<Usage>), AnalysisError> {
        debug!("POST {} model={}", self.endpoint, request.model);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Transport {
                kind: TransportKind::Status,
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
                body: Some(body),
            });
        }

        let body = response.text().await.map_err(transport_error)?;
        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| AnalysisError::Transport {
                kind: TransportKind::Protocol,
                status: Some(status.as_u16()),
                message: format!("malformed response JSON: {e}"),
                body: Some(body.clone()),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnalysisError::Transport {
                kind: TransportKind::Protocol,
                status: Some(status.as_u16()),
                message: "response has no choices with text content".to_string(),
                body: Some(body.clone()),
            })?;

        Ok((content, parsed.usage))
    }
}

fn transport_error(e: reqwest::Error) -> AnalysisError {
    let (kind, message) = if e.is_timeout() {
        (TransportKind::Timeout, format!("request timed out: {e}"))
    } else if e.is_connect() {
        (TransportKind::Connect, format!("failed to connect: {e}"))
    } else if e.status().is_some() {
        (TransportKind::Status, e.to_string())
    } else {
        (TransportKind::Protocol, e.to_string())
    };
    AnalysisError::Transport {
        kind,
        status: e.status().map(|s| s.as_u16()),
        message,
        body: None,
    }
}

/// `base_ms * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_ms: u64) -> Duration {
    let delay = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle() -> ReferenceBundle {
        ReferenceBundle {
            system_prompt: "SYSTEM".into(),
            chart_of_accounts: "6110 Revenue".into(),
            output_format: r#"[{"account":""}]"#.into(),
        }
    }

    #[test]
    fn request_wire_format() {
        let image = EncodedImage {
            data: "QUJD".into(),
            content_type: "image/jpeg",
        };
        let req = CompletionRequest::build("vendor/model-x", &bundle(), &image);
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["model"], "vendor/model-x");
        assert_eq!(v["messages"].as_array().unwrap().len(), 2);
        assert_eq!(v["messages"][0], json!({"role": "system", "content": "SYSTEM"}));

        let user = &v["messages"][1];
        assert_eq!(user["role"], "user");
        let parts = user["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert!(parts[0]["text"].as_str().unwrap().contains("6110 Revenue"));
        assert_eq!(
            parts[1],
            json!({"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,QUJD"}})
        );
    }

    #[test]
    fn request_round_trips_through_serde() {
        let image = EncodedImage {
            data: "AA==".into(),
            content_type: "image/png",
        };
        let req = CompletionRequest::build("m", &bundle(), &image);
        let back: CompletionRequest =
            serde_json::from_str(&serde_json::to_string(&req).unwrap()).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn response_without_usage_parses() {
        let r: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"[]"}}]}"#).unwrap();
        assert!(r.usage.is_none());
        assert_eq!(r.choices[0].message.content.as_deref(), Some("[]"));
    }

    #[test]
    fn backoff_exponential_and_capped() {
        assert_eq!(backoff_duration(0, 500), Duration::from_millis(500));
        assert_eq!(backoff_duration(1, 500), Duration::from_millis(1000));
        assert_eq!(backoff_duration(2, 500), Duration::from_millis(2000));
        assert_eq!(backoff_duration(20, 500), Duration::from_millis(30_000));
    }

    #[test]
    fn client_from_default_config() {
        let client = InferenceClient::new(&AnalysisConfig::default()).unwrap();
        assert_eq!(client.endpoint, crate::config::DEFAULT_ENDPOINT);
        assert_eq!(client.max_retries, 0);
    }
}
