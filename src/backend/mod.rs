//! Model backends: image description and text generation.

pub mod ollama;

pub use ollama::OllamaClient;

use crate::error::{KioskError, Result};
use std::sync::{Arc, Mutex};

/// Multimodal model that describes an image.
pub trait VisionBackend: Send + Sync {
    /// Describe a base64-encoded PNG following `instruction`.
    fn describe(&self, image_png_b64: &str, instruction: &str) -> Result<String>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Text model that completes a prompt.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

#[derive(Debug, Default)]
struct MockLog {
    calls: usize,
    last_input: Option<String>,
}

/// Mock vision backend for testing.
///
/// Clones share the call log.
#[derive(Debug, Clone)]
pub struct MockVisionBackend {
    response: std::result::Result<String, String>,
    log: Arc<Mutex<MockLog>>,
}

impl MockVisionBackend {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            log: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            log: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.log.lock().map(|log| log.calls).unwrap_or_default()
    }

    /// The image payload of the most recent call.
    pub fn last_image(&self) -> Option<String> {
        self.log.lock().ok().and_then(|log| log.last_input.clone())
    }
}

impl VisionBackend for MockVisionBackend {
    fn describe(&self, image_png_b64: &str, _instruction: &str) -> Result<String> {
        if let Ok(mut log) = self.log.lock() {
            log.calls += 1;
            log.last_input = Some(image_png_b64.to_string());
        }
        self.response
            .clone()
            .map_err(|message| KioskError::backend("mock", message))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock text generator for testing.
///
/// Clones share the call log.
#[derive(Debug, Clone)]
pub struct MockTextGenerator {
    response: std::result::Result<String, String>,
    log: Arc<Mutex<MockLog>>,
}

impl MockTextGenerator {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            log: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            log: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.log.lock().map(|log| log.calls).unwrap_or_default()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.log.lock().ok().and_then(|log| log.last_input.clone())
    }
}

impl TextGenerator for MockTextGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut log) = self.log.lock() {
            log.calls += 1;
            log.last_input = Some(prompt.to_string());
        }
        self.response
            .clone()
            .map_err(|message| KioskError::backend("mock", message))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
