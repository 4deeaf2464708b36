// HTTP client for the Google Gemini API
//
// The one opaque remote dependency in the system. Errors are surfaced as
// anyhow errors with a human-readable cause; the caller decides what a
// failure means (commands turn it into a failure outcome, never a crash).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::retry::with_retry;
use super::types::{
    ChatMessage, ChatResponse, GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest,
    GeminiResponse, TokenUsage,
};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_OUTPUT_TOKENS: i32 = 8192;

/// The AI client facade: everything the rest of the crate knows about the
/// remote call. Stateless; key and model travel with each request so a
/// `/setup` or `/models` change takes effect on the next call.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `prompt` with the ordered conversation history replayed before it.
    async fn send(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<ChatResponse>;
}

/// Gemini implementation of the chat backend.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(prompt: &str, history: &[ChatMessage]) -> GeminiRequest {
        // Gemini uses "model" instead of "assistant"
        let mut contents: Vec<GeminiContent> = history
            .iter()
            .map(|msg| GeminiContent {
                role: if msg.role == "assistant" {
                    "model".to_string()
                } else {
                    msg.role.clone()
                },
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        contents.push(GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart {
                text: prompt.to_string(),
            }],
        });

        GeminiRequest {
            contents,
            generation_config: Some(GeminiGenerationConfig {
                temperature: None,
                max_output_tokens: Some(DEFAULT_MAX_OUTPUT_TOKENS),
            }),
        }
    }

    async fn send_once(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<ChatResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, api_key
        );
        let request = Self::build_request(prompt, history);

        tracing::debug!(model, turns = request.contents.len(), "Sending Gemini request");

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Gemini API request failed\n\nStatus: {}\nBody: {}",
                status,
                error_body
            );
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .context("Failed to parse Gemini API response")?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .context("Gemini returned no candidates in response")?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            anyhow::bail!("Gemini returned an empty response");
        }

        let usage = gemini_response
            .usage_metadata
            .map(|meta| TokenUsage {
                prompt_tokens: meta.prompt_token_count.unwrap_or(0),
                completion_tokens: meta.candidates_token_count.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            text,
            model: model.to_string(),
            usage,
        })
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn send(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<ChatResponse> {
        with_retry(|| self.send_once(api_key, model, prompt, history)).await
    }
}
