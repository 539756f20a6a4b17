// Claude completion client for the judgment stage
//
// Retry policy for transient provider errors lives here, at the
// collaborator boundary; the judgment node itself calls `complete`
// exactly once per audit.
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Language-model completion collaborator. Returns raw text only;
/// validating it against the verdict schema is the caller's job.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str, response_schema: &Value) -> Result<String, String>;
}

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    system: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl ClaudeClient {
    pub fn new(api_key: String, request_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            request_timeout,
        }
    }
}

#[async_trait]
impl CompletionModel for ClaudeClient {
    async fn complete(&self, prompt: &str, response_schema: &Value) -> Result<String, String> {
        let system = format!(
            "You are a compliance auditor. Respond with a single JSON object matching this \
             schema and nothing else - no prose, no markdown:\n{}",
            response_schema
        );

        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: 4096,
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system,
            temperature: 0.0,
        };

        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(300)),
            ..Default::default()
        };

        let operation = || async {
            let response = self
                .client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .timeout(self.request_timeout)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() || e.is_timeout() {
                        tracing::warn!("Claude API connection error (retrying): {}", e);
                        backoff::Error::transient(format!("Connection error: {}", e))
                    } else {
                        backoff::Error::permanent(format!("Request error: {}", e))
                    }
                })?;

            let status = response.status();
            let response_text = response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(format!("Failed to read response: {}", e)))?;

            // Retry on rate limits and server-side errors
            if matches!(status.as_u16(), 429 | 500 | 502 | 503) {
                tracing::warn!("Claude API returned {} (retrying)", status);
                return Err(backoff::Error::transient(format!(
                    "API error ({}): {}",
                    status, response_text
                )));
            }

            if !status.is_success() {
                return Err(backoff::Error::permanent(format!(
                    "API error ({}): {}",
                    status, response_text
                )));
            }

            serde_json::from_str::<ClaudeResponse>(&response_text).map_err(|e| {
                backoff::Error::permanent(format!("Failed to parse response envelope: {}", e))
            })
        };

        let response = retry(backoff_config, operation).await?;

        for content in response.content {
            if let ResponseContent::Text { text } = content {
                return Ok(text);
            }
        }

        Err("No text content in Claude response".to_string())
    }
}
