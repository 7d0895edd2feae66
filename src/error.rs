//! Error types for skyy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KioskError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Recognition errors
    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    // Playback errors
    #[error("Speech synthesis failed: {message}")]
    Speech { message: String },

    // External command errors
    #[error("Required command not found: {command}")]
    CommandNotFound { command: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    // Camera errors
    #[error("Camera capture failed: {message}")]
    CaptureFailure { message: String },

    // Vision and text-generation backends
    #[error("{backend} backend failed: {message}")]
    Backend { backend: String, message: String },

    #[error("Generated text rejected: {reason}")]
    QualityRejection { reason: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KioskError {
    /// Shorthand for a backend failure tagged with the backend's name.
    pub fn backend(backend: &str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a camera failure.
    pub fn capture(message: impl Into<String>) -> Self {
        Self::CaptureFailure {
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, KioskError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = KioskError::ConfigInvalidValue {
            key: "trigger.similarity_threshold".to_string(),
            message: "must be between 0.0 and 1.0".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for trigger.similarity_threshold: must be between 0.0 and 1.0"
        );
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = KioskError::AudioDeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn test_transcription_model_not_found_display() {
        let error = KioskError::TranscriptionModelNotFound {
            path: "/models/whisper.bin".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription model not found at /models/whisper.bin"
        );
    }

    #[test]
    fn test_speech_display() {
        let error = KioskError::Speech {
            message: "espeak-ng exited with status 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Speech synthesis failed: espeak-ng exited with status 1"
        );
    }

    #[test]
    fn test_command_not_found_display() {
        let error = KioskError::CommandNotFound {
            command: "ffmpeg".to_string(),
        };
        assert_eq!(error.to_string(), "Required command not found: ffmpeg");
    }

    #[test]
    fn test_capture_helper_display() {
        let error = KioskError::capture("camera unavailable");
        assert_eq!(error.to_string(), "Camera capture failed: camera unavailable");
    }

    #[test]
    fn test_backend_helper_display() {
        let error = KioskError::backend("ollama", "connection refused");
        assert_eq!(error.to_string(), "ollama backend failed: connection refused");
    }

    #[test]
    fn test_quality_rejection_display() {
        let error = KioskError::QualityRejection {
            reason: "contains refusal marker".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Generated text rejected: contains refusal marker"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: KioskError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: KioskError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: KioskError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    /// Exhaustive: every variant maps to a stage.
    fn stage(error: &KioskError) -> &'static str {
        match error {
            KioskError::ConfigInvalidValue { .. } | KioskError::Config(_) => "config",
            KioskError::AudioDeviceNotFound { .. }
            | KioskError::AudioCapture { .. }
            | KioskError::TranscriptionModelNotFound { .. }
            | KioskError::Transcription { .. } => "listen",
            KioskError::Speech { .. } => "speak",
            KioskError::CommandNotFound { .. } | KioskError::CommandFailed { .. } => "exec",
            KioskError::CaptureFailure { .. } => "capture",
            KioskError::Backend { .. } | KioskError::QualityRejection { .. } => "compose",
            KioskError::Io(_) => "io",
        }
    }

    #[test]
    fn test_variants_map_to_stages() {
        assert_eq!(stage(&KioskError::capture("x")), "capture");
        assert_eq!(stage(&KioskError::backend("ollama", "x")), "compose");
        assert_eq!(
            stage(&KioskError::from(io::Error::other("disk"))),
            "io"
        );
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KioskError>();
        assert_sync::<KioskError>();
    }
}
