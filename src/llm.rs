use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Why a completion query failed, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    ConnectionError,
    UpstreamError,
    MalformedResponse,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::ConnectionError => write!(f, "connection_error"),
            ErrorKind::UpstreamError => write!(f, "upstream_error"),
            ErrorKind::MalformedResponse => write!(f, "malformed_response"),
        }
    }
}

/// Outcome of one completion query. Always exactly one variant; failures are
/// values the dispatcher turns into user replies, never propagated errors.
#[derive(Debug, Clone)]
pub enum CompletionResult {
    Success { text: String, latency_ms: f64 },
    Failure { kind: ErrorKind, detail: String },
}

const MAX_ATTEMPTS: u32 = 3;
const BODY_SNIPPET_LEN: usize = 200;
const PROMPT_LOG_LEN: usize = 60;

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

fn snippet(body: &str) -> String {
    let mut end = body.len().min(BODY_SNIPPET_LEN);
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

fn prompt_prefix(prompt: &str) -> String {
    let mut end = prompt.len().min(PROMPT_LOG_LEN);
    while end > 0 && !prompt.is_char_boundary(end) {
        end -= 1;
    }
    prompt[..end].to_string()
}

pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
    retry_base_delay: std::time::Duration,
}

impl CompletionClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry_base_delay: config.retry_base_delay,
        })
    }

    /// Send one user prompt to the completion service. Up to three attempts
    /// with doubling delay, retrying only on 408/429/5xx gateway statuses and
    /// transport errors; other 4xx fail immediately.
    pub async fn query(&self, prompt: &str) -> CompletionResult {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let started = Instant::now();
        let mut last_failure = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let delay = self.retry_base_delay * 2u32.pow(attempt - 2);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying completion request");
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let result = Self::extract(resp, started).await;
                        self.log_outcome(prompt, attempt, &result);
                        return result;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let detail = format!("HTTP {}: {}", status.as_u16(), snippet(&body));
                    if !is_retryable_status(status) {
                        let result = CompletionResult::Failure {
                            kind: ErrorKind::UpstreamError,
                            detail,
                        };
                        self.log_outcome(prompt, attempt, &result);
                        return result;
                    }
                    warn!(status = status.as_u16(), attempt, "Completion service error");
                    last_failure = Some((ErrorKind::UpstreamError, detail));
                }
                Err(e) => {
                    let kind = if e.is_timeout() {
                        ErrorKind::Timeout
                    } else {
                        ErrorKind::ConnectionError
                    };
                    warn!(error = %e, attempt, "Completion request failed");
                    last_failure = Some((kind, e.to_string()));
                }
            }
        }

        let (kind, detail) = last_failure.unwrap_or((
            ErrorKind::ConnectionError,
            "no attempt completed".to_string(),
        ));
        let result = CompletionResult::Failure { kind, detail };
        self.log_outcome(prompt, MAX_ATTEMPTS, &result);
        result
    }

    async fn extract(resp: reqwest::Response, started: Instant) -> CompletionResult {
        let parsed: ChatResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) => {
                return CompletionResult::Failure {
                    kind: ErrorKind::MalformedResponse,
                    detail: format!("body did not parse: {}", e),
                }
            }
        };
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content);
        match content {
            Some(text) => CompletionResult::Success {
                text,
                latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            },
            None => CompletionResult::Failure {
                kind: ErrorKind::MalformedResponse,
                detail: "response had no message content".to_string(),
            },
        }
    }

    fn log_outcome(&self, prompt: &str, attempts: u32, result: &CompletionResult) {
        match result {
            CompletionResult::Success { text, latency_ms } => info!(
                prompt = %prompt_prefix(prompt),
                attempts,
                latency_ms = *latency_ms as u64,
                reply_chars = text.len(),
                "Completion succeeded"
            ),
            CompletionResult::Failure { kind, detail } => warn!(
                prompt = %prompt_prefix(prompt),
                attempts,
                kind = %kind,
                detail = %snippet(detail),
                "Completion failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_match_policy() {
        for code in [408u16, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(
                reqwest::StatusCode::from_u16(code).unwrap()
            ));
        }
        for code in [400u16, 401, 403, 404, 422] {
            assert!(!is_retryable_status(
                reqwest::StatusCode::from_u16(code).unwrap()
            ));
        }
    }

    #[test]
    fn snippet_is_bounded_and_respects_char_boundaries() {
        let long = "á".repeat(300);
        let s = snippet(&long);
        assert!(s.len() <= BODY_SNIPPET_LEN);
        assert!(long.starts_with(&s));
    }
}
