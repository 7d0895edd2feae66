//! Free-text scene descriptions from a multimodal model.

use crate::backend::VisionBackend;
use crate::error::{KioskError, Result};
use crate::vision::camera::Camera;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Instruction sent along with the captured image.
pub const DESCRIPTION_PROMPT: &str = "Look at the person in this photo and describe them in one \
    short, neutral sentence: their overall look, facial expression, and any clothing or \
    accessories that stand out. For example: 'A person with curly hair and a warm smile, \
    wearing a green jacket and round glasses.'";

pub struct GenerativeDescriber {
    camera: Camera,
    backend: Box<dyn VisionBackend>,
}

impl GenerativeDescriber {
    pub fn new(camera: Camera, backend: Box<dyn VisionBackend>) -> Self {
        Self { camera, backend }
    }

    pub fn describe(&mut self) -> Result<String> {
        let frame = self.camera.capture()?;
        let image = STANDARD.encode(frame.to_png()?);

        tracing::info!(backend = self.backend.name(), "requesting scene description");
        let description = self.backend.describe(&image, DESCRIPTION_PROMPT)?;
        let description = description.trim();
        if description.is_empty() {
            return Err(KioskError::backend(
                self.backend.name(),
                "empty scene description",
            ));
        }
        tracing::info!("scene description: {}", description);
        Ok(description.to_string())
    }

    pub fn shutdown(&mut self) {
        self.camera.shutdown();
    }
}
