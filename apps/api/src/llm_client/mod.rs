//! LLM Client: the single point of entry for completion API calls.
//!
//! AI handlers depend on the `CompletionClient` trait, never on the HTTP
//! client directly, so tests can script the model's replies.
//!
//! Model: claude-sonnet-4-5, shared by every AI feature.
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("AI service not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Black-box text completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the raw text of the model's reply.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Messages API request body. One user turn per call.
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'static str,
    max_tokens: u32,
    system: &'a str,
    messages: [Turn<'a>; 1],
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<ReplyBlock>,
    usage: Option<TokenUsage>,
}

/// Only `text` blocks carry the answer; anything else is skipped.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplyBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct TokenUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl MessagesReply {
    fn into_text(self) -> String {
        self.content
            .into_iter()
            .filter_map(|block| match block {
                ReplyBlock::Text { text } => Some(text),
                ReplyBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Anthropic Messages API client. Without an API key every call fails with
/// `LlmError::NotConfigured`.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// One request, no retries. Returns the concatenated text blocks.
    async fn send(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let Some(api_key) = self.api_key.as_deref() else {
            error!("AI service not configured: ANTHROPIC_API_KEY missing");
            return Err(LlmError::NotConfigured);
        };

        let body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: [Turn {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorEnvelope>(&raw) {
                Ok(envelope) => envelope.error.message,
                Err(_) => raw,
            };
            warn!(status = status.as_u16(), "Completion API error: {message}");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: MessagesReply = response.json().await?;
        if let Some(usage) = &reply.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Completion finished"
            );
        }
        Ok(reply.into_text())
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let text = self.send(system, prompt).await?;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text)
    }
}

/// Deserializes a model reply as JSON, tolerating Markdown code fences.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    serde_json::from_str(strip_json_fences(text)).map_err(LlmError::Parse)
}

/// Removes a surrounding Markdown fence. The opening fence may carry a
/// language tag (```json); a missing closing fence is tolerated.
pub fn strip_json_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string on the opening line, if any.
    let body = match after_open.find('\n') {
        Some(newline) if !after_open[..newline].contains('{') => &after_open[newline + 1..],
        _ => after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_language_tag() {
        let reply = "```json\n{\"overall_score\": 81}\n```";
        assert_eq!(strip_json_fences(reply), "{\"overall_score\": 81}");
    }

    #[test]
    fn test_strip_fences_bare_and_uppercase_tag() {
        let bare = "```\n[\"Rust\", \"SQL\"]\n```";
        assert_eq!(strip_json_fences(bare), "[\"Rust\", \"SQL\"]");
        let upper = "```JSON\n{\"improved\": \"x\"}\n```";
        assert_eq!(strip_json_fences(upper), "{\"improved\": \"x\"}");
    }

    #[test]
    fn test_strip_fences_single_line_and_unfenced() {
        assert_eq!(strip_json_fences("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_fences_unterminated() {
        let reply = "```json\n{\"match_score\": 64}";
        assert_eq!(strip_json_fences(reply), "{\"match_score\": 64}");
    }

    #[test]
    fn test_parse_json_fenced_and_plain_agree() {
        let fenced: serde_json::Value =
            parse_json("```json\n{\"overall_score\": 80}\n```").unwrap();
        let plain: serde_json::Value = parse_json("  {\"overall_score\": 80}\n").unwrap();
        assert_eq!(fenced, plain);
    }

    #[test]
    fn test_parse_json_rejects_prose() {
        let result: Result<serde_json::Value, _> = parse_json("Sure! Here is your analysis.");
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_reply_text_joins_text_blocks_only() {
        let reply: MessagesReply = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"first"},{"type":"tool_use","id":"t"},{"type":"text","text":"second"}]}"#,
        )
        .unwrap();
        assert_eq!(reply.into_text(), "first\nsecond");
    }

    #[tokio::test]
    async fn test_blank_api_key_is_not_configured() {
        let client = LlmClient::new(Client::new(), Some("  ".to_string()));
        assert!(!client.is_configured());
        let err = client.complete("system", "prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }
}
