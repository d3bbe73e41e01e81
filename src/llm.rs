//! Chat completion client for the hosted language model.

use crate::config::Settings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// System prompt steering replies toward parseable hardware phrasing.
const SYSTEM_PROMPT: &str = "You are a helpful assistant that can control Arduino components. \
    When asked about controlling hardware, respond with clear instructions that can be parsed \
    into Arduino commands. You can control LEDs, servos, buzzers, and other components.";

/// Completion length cap; replies only need a sentence or two.
const MAX_TOKENS: u32 = 150;

/// Chat message structure for the completions API.
///
/// # Details
/// Represents a single message in the exchange, containing the role
/// (user, assistant, or system) and the message content.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Request structure for the completions API.
#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

/// Response structure for the completions API.
///
/// # Details
/// Only the fields the bridge consumes are modeled; everything else in
/// the provider's payload is ignored during deserialization.
#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

/// A single generated choice within a completion response.
#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

/// Client for an OpenAI-style chat completions endpoint.
///
/// # Details
/// Holds the HTTP client and resolved endpoint settings. The endpoint
/// URL is configurable so local gateways that speak the same protocol
/// work without code changes.
pub struct LlmClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

/// Implementation of the chat completion client.
impl LlmClient {
    /// Builds a client from resolved settings.
    ///
    /// # Arguments
    /// * `settings` - Resolved runtime settings.
    ///
    /// # Returns
    /// * `Self` - A client ready for completion requests.
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: settings.chat_api_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.chat_model.clone(),
        }
    }

    /// Reports whether an API key is configured.
    ///
    /// # Returns
    /// * `bool` - `true` when a non-empty key was provided.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Requests a completion for one user message.
    ///
    /// # Details
    /// Sends the fixed system prompt plus the user message and returns
    /// the content of the first choice. Provider errors, transport
    /// failures, and malformed payloads all surface as errors for the
    /// caller to log and translate into its own failure reply.
    ///
    /// # Arguments
    /// * `message` - The user message to complete against.
    ///
    /// # Returns
    /// * `Ok(String)` - The assistant reply text.
    ///
    /// # Errors
    /// Returns an error when no key is configured, the request cannot
    /// be sent, the provider rejects it, or the response is malformed.
    pub async fn chat(&self, message: &str) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .context("OpenAI API key not configured")?;
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: message.to_string(),
                },
            ],
            max_tokens: MAX_TOKENS,
        };
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await
            .with_context(|| "Failed to send chat completion request")?
            .error_for_status()
            .with_context(|| "Chat completion request was rejected")?;
        let completion: CompletionResponse = response
            .json()
            .await
            .with_context(|| "Failed to parse chat completion response")?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("Chat completion contained no choices")
    }
}
