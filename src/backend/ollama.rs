//! Ollama chat API client.
//!
//! Uses the non-streaming `/api/chat` endpoint. Images travel as base64
//! strings in the message's `images` field.

use crate::backend::{TextGenerator, VisionBackend};
use crate::error::{KioskError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BACKEND: &str = "ollama";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Blocking client for one Ollama model.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// # Errors
    /// `Backend` if the HTTP client cannot be built.
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KioskError::backend(BACKEND, format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat(&self, content: &str, images: Vec<&str>) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
                images,
            }],
            stream: false,
        };
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(model = %self.model, %url, "sending chat request");

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| KioskError::backend(BACKEND, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(KioskError::backend(
                BACKEND,
                format!("API error {status}: {}", body.trim()),
            ));
        }

        let body = response
            .text()
            .map_err(|e| KioskError::backend(BACKEND, format!("failed to read response: {e}")))?;
        parse_chat_response(&body)
    }
}

fn parse_chat_response(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| KioskError::backend(BACKEND, format!("invalid response format: {e}")))?;
    Ok(parsed.message.content)
}

impl VisionBackend for OllamaClient {
    fn describe(&self, image_png_b64: &str, instruction: &str) -> Result<String> {
        self.chat(instruction, vec![image_png_b64])
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

impl TextGenerator for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(prompt, Vec::new())
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
