//! Scene capture and description.
//!
//! A [`SceneDescriber`] grabs one camera frame and turns it into a
//! [`SceneObservation`]. It never fails past its boundary: problems come
//! back as [`SceneObservation::Failed`].

pub mod camera;
pub mod face;
pub mod frame;
pub mod generative;
pub mod heuristic;
pub mod palette;

pub use camera::{Camera, CameraDevice, FfmpegCamera, MockCamera};
pub use face::{CommandFaceDetector, FaceDetector, MockFaceDetector};
pub use frame::{Frame, Region, Rgb};
pub use generative::GenerativeDescriber;
pub use heuristic::HeuristicDescriber;
pub use palette::Color;

use serde::{Deserialize, Serialize};

/// Facial expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprised",
        }
    }
}

/// Structured features of one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneFeatures {
    pub face_detected: bool,
    pub emotion: Option<Emotion>,
    /// Most prominent first, no duplicates.
    pub colors: Vec<Color>,
}

/// What one capture produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneObservation {
    Description(String),
    Features(SceneFeatures),
    Failed(String),
}

impl SceneObservation {
    /// The error message of a failed observation.
    pub fn error(&self) -> Option<&str> {
        match self {
            SceneObservation::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Scene describer chosen at startup.
pub enum SceneDescriber {
    Heuristic(HeuristicDescriber),
    Generative(GenerativeDescriber),
}

impl SceneDescriber {
    /// Capture a frame and describe it.
    pub fn capture_and_analyze(&mut self) -> SceneObservation {
        let result = match self {
            SceneDescriber::Heuristic(describer) => {
                describer.describe().map(SceneObservation::Features)
            }
            SceneDescriber::Generative(describer) => {
                describer.describe().map(SceneObservation::Description)
            }
        };
        result.unwrap_or_else(|e| {
            let message = format!("scene analysis failed: {e}");
            tracing::warn!("{}", message);
            SceneObservation::Failed(message)
        })
    }

    /// Release the camera.
    pub fn shutdown(&mut self) {
        match self {
            SceneDescriber::Heuristic(describer) => describer.shutdown(),
            SceneDescriber::Generative(describer) => describer.shutdown(),
        }
    }
}
