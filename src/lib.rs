//! skyy - a voice-activated compliment kiosk
//!
//! Listens for a trigger phrase, asks permission, looks through the camera
//! and speaks a compliment. Every external collaborator sits behind a trait
//! so the whole cycle runs against mocks in tests.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
pub mod backend;
pub mod compose;
pub mod config;
pub mod consent;
pub mod defaults;
pub mod error;
pub mod exec;
pub mod pipeline;
pub mod speech;
pub mod stt;
pub mod vision;

// Collaborator traits
pub use audio::recorder::AudioSource;
pub use backend::{TextGenerator, VisionBackend};
pub use exec::{CommandExecutor, SystemCommandExecutor};
pub use speech::{Recognizer, Speaker};
pub use stt::transcriber::Transcriber;
pub use vision::{CameraDevice, FaceDetector};

// Kiosk loop
pub use pipeline::{CycleOutcome, CycleState, Kiosk, KioskConfig, RunSummary};
pub use pipeline::{ErrorReporter, StageError};

// Error handling
pub use error::{KioskError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
